// PPU rendering - scanline background renderer and lazy sprite compositing
//
// The background for a line is drawn when the previous line ends, into a
// background-only plane, using the decoded tile and attribute caches. The
// composited frame is assembled lazily: whenever a register write could
// change what already-executed dots should have shown (scroll, mask,
// palette, VRAM writes), the lines completed so far get their sprites
// merged in. Sprites run in two passes around the background copy so the
// OAM priority bit works per pixel, with the priority table deciding
// overlaps between sprites.

use super::tile::{SCREEN_HEIGHT, SCREEN_WIDTH};
use super::Ppu;
use crate::cartridge::Mapper;
use crate::ppu::constants::{FIRST_VISIBLE_SCANLINE, LAST_VISIBLE_SCANLINE};

impl Ppu {
    /// Decode one OAM byte into the sprite attribute arrays
    pub(crate) fn sprite_ram_update(&mut self, addr: u8, value: u8) {
        let sprite = (addr >> 2) as usize;
        match addr & 3 {
            0 => self.spr_y[sprite] = value as i32,
            1 => self.spr_tile[sprite] = value as u16,
            2 => {
                self.vert_flip[sprite] = value & 0x80 != 0;
                self.horiz_flip[sprite] = value & 0x40 != 0;
                self.bg_priority[sprite] = value & 0x20 != 0;
                self.spr_col[sprite] = (value & 0x03) << 2;
            }
            _ => self.spr_x[sprite] = value as i32,
        }
    }

    /// Resolve the 16 palette RAM entries to RGB under the current emphasis
    pub(crate) fn update_palettes(&mut self) {
        let mask = if self.mask_grayscale { 0x30 } else { 0x3F };
        for i in 0..16 {
            let img = self.mem.mem[0x3F00 + i] & mask;
            let spr = self.mem.mem[0x3F10 + i] & mask;
            self.img_palette[i] = self.palette_table.get_entry(img);
            self.spr_palette[i] = self.palette_table.get_entry(spr);
        }
    }

    /// Composite sprites over the lines completed before the current one
    ///
    /// Called from register writes that change rendering state mid-frame,
    /// so earlier lines keep the values they were drawn with.
    pub(crate) fn trigger_rendering(&mut self, mapper: &mut dyn Mapper) {
        if (FIRST_VISIBLE_SCANLINE..=LAST_VISIBLE_SCANLINE).contains(&self.scanline) {
            let current = (self.scanline - FIRST_VISIBLE_SCANLINE) as i32;
            if current > self.last_rendered_scanline {
                let start = (self.last_rendered_scanline + 1) as usize;
                let count = (current - self.last_rendered_scanline) as usize;
                self.render_frame_partially(start, count, mapper);
                self.last_rendered_scanline = current;
            }
        }
    }

    /// Merge sprites and the background plane into the frame for a line range
    pub(crate) fn render_frame_partially(
        &mut self,
        start_scan: usize,
        scan_count: usize,
        mapper: &mut dyn Mapper,
    ) {
        if self.mask_sp_visible {
            self.render_sprites_partially(start_scan, scan_count, true, mapper);
        }
        if self.mask_bg_visible {
            let si = start_scan << 8;
            let ei = ((start_scan + scan_count) << 8).min(SCREEN_WIDTH * SCREEN_HEIGHT);
            for i in si..ei {
                if self.pixrendered[i] > 0xFF {
                    self.buffer[i] = self.bgbuffer[i];
                }
            }
        }
        if self.mask_sp_visible {
            self.render_sprites_partially(start_scan, scan_count, false, mapper);
        }
        self.valid_tile_data = false;
    }

    /// Render one background line from the tile caches
    ///
    /// `scan` may be one past the last visible line (the renderer is called
    /// at every line end); drawing is skipped but the vertical scroll
    /// counters still advance.
    pub(crate) fn render_bg_scanline(
        &mut self,
        into_bg_plane: bool,
        scan: usize,
        mapper: &mut dyn Mapper,
    ) {
        let fine_y = ((self.v >> 12) & 0x07) as usize;

        if scan < SCREEN_HEIGHT && scan >= fine_y {
            let base_tile = self.ctrl_bg_table;
            let mut coarse_x = (self.v & 0x1F) as usize;
            let mut nt_x = ((self.v >> 10) & 1) as usize;
            let nt_y = ((self.v >> 11) & 1) as usize;
            let coarse_y = ((self.v >> 5) & 0x1F) as usize;
            let row_offset = fine_y << 3;
            let fine_x = self.fine_x as i32;

            let target = if into_bg_plane {
                &mut self.bgbuffer
            } else {
                &mut self.buffer
            };

            for tile in 0..32usize {
                // Rows 30/31 of the address space hold attribute data; a
                // scroll pointed there fetches nothing.
                if coarse_y < 30 {
                    let (tile_index, attrib);
                    if self.valid_tile_data {
                        tile_index = self.scantile[tile];
                        attrib = self.scan_attrib[tile];
                    } else {
                        let nt = &self.mem.name_tables[self.mem.quadrant[(nt_y << 1) | nt_x]];
                        tile_index = base_tile + nt.tile_index(coarse_x, coarse_y) as u16;
                        attrib = nt.attrib(coarse_x, coarse_y);
                        self.scantile[tile] = tile_index;
                        self.scan_attrib[tile] = attrib;
                    }

                    let t = mapper.pattern_tile(tile_index as usize);
                    let x_base = (tile << 3) as i32 - fine_x;
                    for sx in 0..8usize {
                        let x = x_base + sx as i32;
                        if !(0..SCREEN_WIDTH as i32).contains(&x) {
                            continue;
                        }
                        let colour = t.pixels[row_offset + sx];
                        if colour != 0 {
                            let dest = (scan << 8) + x as usize;
                            target[dest] = self.img_palette[(colour + attrib) as usize];
                            self.pixrendered[dest] |= 0x100;
                        }
                    }
                }

                coarse_x += 1;
                if coarse_x == 32 {
                    coarse_x = 0;
                    nt_x ^= 1;
                }
            }

            self.valid_tile_data = true;
        }

        // Vertical scroll increment, with the 30-row nametable wrap.
        let mut fy = (self.v >> 12) & 0x07;
        fy += 1;
        if fy == 8 {
            fy = 0;
            let mut cy = (self.v >> 5) & 0x1F;
            cy += 1;
            if cy == 30 {
                cy = 0;
                self.v ^= 0x0800;
            } else if cy == 32 {
                cy = 0;
            }
            self.v = (self.v & !0x03E0) | (cy << 5);
            self.valid_tile_data = false;
        }
        self.v = (self.v & !0x7000) | (fy << 12);
    }

    /// Draw the sprites of one priority class over a line range
    pub(crate) fn render_sprites_partially(
        &mut self,
        start_scan: usize,
        scan_count: usize,
        behind: bool,
        mapper: &mut dyn Mapper,
    ) {
        let start = start_scan as i32;
        let end = (start_scan + scan_count) as i32;
        let height = if self.ctrl_sprite_size_16 { 16 } else { 8 };
        for i in 0..64usize {
            if self.bg_priority[i] != behind
                || self.spr_x[i] < 0
                || self.spr_x[i] >= SCREEN_WIDTH as i32
                || self.spr_y[i] + height < start
                || self.spr_y[i] >= end
            {
                continue;
            }

            if !self.ctrl_sprite_size_16 {
                let mut srcy1 = 0;
                let mut srcy2 = 8;
                if self.spr_y[i] < start {
                    srcy1 = start - self.spr_y[i] - 1;
                }
                if self.spr_y[i] + 8 > end {
                    srcy2 = end - self.spr_y[i] + 1;
                }
                let tile = mapper.pattern_tile((self.spr_tile[i] + self.ctrl_sp_table) as usize);
                tile.render(
                    &mut self.buffer,
                    0,
                    srcy1,
                    8,
                    srcy2,
                    self.spr_x[i],
                    self.spr_y[i] + 1,
                    &self.spr_palette,
                    self.spr_col[i] as usize,
                    self.horiz_flip[i],
                    self.vert_flip[i],
                    i as u16,
                    &mut self.pixrendered,
                );
            } else {
                // 8x16: the pattern table comes from bit 0 of the index.
                let mut top = self.spr_tile[i] as usize;
                if top & 1 != 0 {
                    top = (top - 1) + 256;
                }
                let flip = self.vert_flip[i];

                let mut srcy1 = 0;
                let mut srcy2 = 8;
                if self.spr_y[i] < start {
                    srcy1 = start - self.spr_y[i] - 1;
                }
                if self.spr_y[i] + 8 > end {
                    srcy2 = end - self.spr_y[i];
                }
                let tile = mapper.pattern_tile(top + usize::from(flip));
                tile.render(
                    &mut self.buffer,
                    0,
                    srcy1,
                    8,
                    srcy2,
                    self.spr_x[i],
                    self.spr_y[i] + 1,
                    &self.spr_palette,
                    self.spr_col[i] as usize,
                    self.horiz_flip[i],
                    flip,
                    i as u16,
                    &mut self.pixrendered,
                );

                let mut srcy1 = 0;
                let mut srcy2 = 8;
                if self.spr_y[i] + 8 < start {
                    srcy1 = start - (self.spr_y[i] + 8 + 1);
                }
                if self.spr_y[i] + 16 > end {
                    srcy2 = end - (self.spr_y[i] + 8);
                }
                let tile = mapper.pattern_tile(top + usize::from(!flip));
                tile.render(
                    &mut self.buffer,
                    0,
                    srcy1,
                    8,
                    srcy2,
                    self.spr_x[i],
                    self.spr_y[i] + 1 + 8,
                    &self.spr_palette,
                    self.spr_col[i] as usize,
                    self.horiz_flip[i],
                    flip,
                    i as u16,
                    &mut self.pixrendered,
                );
            }
        }
    }

    /// Predict where sprite 0 overlaps opaque background on `scan`
    ///
    /// The background for the line must already be rendered; the hit dot is
    /// stored so the dot loop can raise the status bit at the exact pixel.
    pub(crate) fn check_sprite0(&mut self, scan: i32, mapper: &mut dyn Mapper) -> bool {
        self.spr0_hit_x = -1;
        self.spr0_hit_y = -1;

        if !(0..SCREEN_HEIGHT as i32).contains(&scan) {
            return false;
        }

        let x = self.spr_x[0];
        let y = self.spr_y[0] + 1;
        let height = if self.ctrl_sprite_size_16 { 16 } else { 8 };

        if !(y <= scan && y + height > scan && x >= -7 && x < SCREEN_WIDTH as i32) {
            return false;
        }

        // Select the tile and row within it.
        let (tile_index, row) = if !self.ctrl_sprite_size_16 {
            let row = if self.vert_flip[0] {
                7 - (scan - y)
            } else {
                scan - y
            };
            ((self.spr_tile[0] + self.ctrl_sp_table) as usize, row)
        } else {
            let mut top = self.spr_tile[0] as usize;
            if top & 1 != 0 {
                top = (top - 1) + 256;
            }
            let mut row = if self.vert_flip[0] {
                15 - (scan - y)
            } else {
                scan - y
            };
            let tile = if row < 8 {
                top + usize::from(self.vert_flip[0])
            } else {
                row -= 8;
                top + usize::from(!self.vert_flip[0])
            };
            (tile, row)
        };

        let tile = mapper.pattern_tile(tile_index);
        let row_base = (row as usize) << 3;

        for i in 0..8 {
            let screen_x = x + i;
            if !(0..SCREEN_WIDTH as i32).contains(&screen_x) {
                continue;
            }
            let index = (scan as usize) << 8 | screen_x as usize;
            // Opaque background pixel under an opaque sprite pixel.
            if self.pixrendered[index] > 0xFF {
                let sx = if self.horiz_flip[0] { 7 - i } else { i } as usize;
                if tile.pixels[row_base + sx] != 0 {
                    self.spr0_hit_x = screen_x;
                    self.spr0_hit_y = scan;
                    return true;
                }
            }
        }
        false
    }

    /// Raise the sprite-overflow flag when a line holds more than 8 sprites
    pub(crate) fn evaluate_sprite_overflow(&mut self, line: i32) {
        if self.status_overflow || !(0..SCREEN_HEIGHT as i32).contains(&line) {
            return;
        }
        let height = if self.ctrl_sprite_size_16 { 16 } else { 8 };
        let mut count = 0;
        for i in 0..64 {
            let y = self.spr_y[i] + 1;
            if y <= line && y + height > line {
                count += 1;
                if count > 8 {
                    self.status_overflow = true;
                    return;
                }
            }
        }
    }

    /// Left-column clipping applied when the frame completes
    pub(crate) fn end_frame_clip(&mut self) {
        if !self.mask_bg_left || !self.mask_sp_left {
            for y in 0..SCREEN_HEIGHT {
                for x in 0..8 {
                    self.buffer[(y << 8) + x] = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{create_mapper, Cartridge, Mirroring};

    /// A CHR-RAM board so tests can compose their own tiles
    fn test_mapper() -> Box<dyn Mapper> {
        create_mapper(Cartridge {
            prg_rom: vec![0; 16 * 1024],
            chr_rom: Vec::new(),
            trainer: None,
            mapper: 0,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
        })
        .expect("mapper 0")
    }

    /// Fill tile `index` with solid colour 1
    fn solid_tile(mapper: &mut dyn Mapper, index: u16) {
        for row in 0..8 {
            mapper.chr_write(index * 16 + row, 0xFF);
        }
    }

    fn enable_rendering(ppu: &mut Ppu, mapper: &mut dyn Mapper) {
        ppu.write_register(1, 0x1E, mapper); // bg + sprites, no clipping
    }

    fn set_palette(ppu: &mut Ppu, mapper: &mut dyn Mapper) {
        // Backdrop black, colour 1 of both palettes white.
        ppu.write_register(6, 0x3F, mapper);
        ppu.write_register(6, 0x00, mapper);
        ppu.write_register(7, 0x0D, mapper);
        ppu.write_register(7, 0x30, mapper);
        ppu.write_register(6, 0x3F, mapper);
        ppu.write_register(6, 0x11, mapper);
        ppu.write_register(7, 0x30, mapper);
    }

    #[test]
    fn test_bg_scanline_draws_tiles() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        solid_tile(mapper.as_mut(), 1);
        set_palette(&mut ppu, mapper.as_mut());
        enable_rendering(&mut ppu, mapper.as_mut());

        // Tile (0,0) of nametable 0 -> tile index 1.
        ppu.write_register(6, 0x20, mapper.as_mut());
        ppu.write_register(6, 0x00, mapper.as_mut());
        ppu.write_register(7, 0x01, mapper.as_mut());

        ppu.start_frame();
        ppu.v = 0;
        ppu.render_bg_scanline(false, 0, mapper.as_mut());

        assert_eq!(ppu.buffer[0], 0xFFFFFF, "tile pixel drawn");
        assert!(ppu.pixrendered[0] > 0xFF, "opacity recorded");
        assert_eq!(ppu.buffer[8], 0, "next tile empty");
    }

    #[test]
    fn test_bg_scanline_advances_vertical_scroll() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        ppu.v = 0;
        for _ in 0..8 {
            ppu.render_bg_scanline(true, 0, mapper.as_mut());
        }
        assert_eq!((ppu.v >> 12) & 7, 0, "fine Y wrapped");
        assert_eq!((ppu.v >> 5) & 0x1F, 1, "coarse Y stepped");
    }

    #[test]
    fn test_vertical_wrap_toggles_nametable() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        ppu.v = (29 << 5) | (7 << 12); // last row, last fine line
        ppu.render_bg_scanline(true, 239, mapper.as_mut());
        assert_eq!((ppu.v >> 5) & 0x1F, 0, "coarse Y wrapped at 30");
        assert_eq!(ppu.v & 0x0800, 0x0800, "vertical nametable toggled");
    }

    #[test]
    fn test_sprite0_hit_prediction() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        solid_tile(mapper.as_mut(), 1);
        set_palette(&mut ppu, mapper.as_mut());
        enable_rendering(&mut ppu, mapper.as_mut());

        // Opaque background across line 4.
        for x in 0..SCREEN_WIDTH {
            ppu.pixrendered[4 * SCREEN_WIDTH + x] = 0x100;
        }
        // Sprite 0 at (10, 3): OAM y is one less than the screen line.
        ppu.sprite_ram_update(0, 3);
        ppu.sprite_ram_update(1, 1);
        ppu.sprite_ram_update(2, 0);
        ppu.sprite_ram_update(3, 10);

        assert!(ppu.check_sprite0(4, mapper.as_mut()));
        assert_eq!(ppu.spr0_hit_x, 10);
        assert_eq!(ppu.spr0_hit_y, 4);
    }

    #[test]
    fn test_sprite0_needs_opaque_background() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        solid_tile(mapper.as_mut(), 1);
        enable_rendering(&mut ppu, mapper.as_mut());

        ppu.sprite_ram_update(0, 3);
        ppu.sprite_ram_update(1, 1);
        ppu.sprite_ram_update(2, 0);
        ppu.sprite_ram_update(3, 10);

        assert!(
            !ppu.check_sprite0(4, mapper.as_mut()),
            "transparent background cannot hit"
        );
    }

    #[test]
    fn test_dot_loop_raises_sprite0_at_hit_pixel() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        enable_rendering(&mut ppu, mapper.as_mut());
        ppu.spr0_hit_x = 100;
        ppu.spr0_hit_y = 0;
        ppu.scanline = FIRST_VISIBLE_SCANLINE;
        ppu.cur_x = 99;

        ppu.advance(1, mapper.as_mut());
        assert!(!ppu.status_sprite0, "dot 99 is before the hit");
        ppu.advance(1, mapper.as_mut());
        assert!(ppu.status_sprite0, "flag raised at the hit dot");
    }

    #[test]
    fn test_front_sprite_draws_over_background() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        solid_tile(mapper.as_mut(), 2);
        set_palette(&mut ppu, mapper.as_mut());
        enable_rendering(&mut ppu, mapper.as_mut());

        // Front-priority sprite 0 at (0, -1) so its first row is line 0.
        ppu.sprite_ram_update(0, 0xFF);
        ppu.sprite_ram_update(1, 2);
        ppu.sprite_ram_update(2, 0x00);
        ppu.sprite_ram_update(3, 0);
        // OAM y of $FF wraps the add; place it explicitly instead.
        ppu.spr_y[0] = -1;

        ppu.start_frame();
        ppu.render_frame_partially(0, 8, mapper.as_mut());
        assert_eq!(ppu.buffer[0], 0xFFFFFF, "sprite pixel composited");
    }

    #[test]
    fn test_behind_sprite_hidden_by_opaque_background() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        solid_tile(mapper.as_mut(), 2);
        set_palette(&mut ppu, mapper.as_mut());
        enable_rendering(&mut ppu, mapper.as_mut());

        ppu.sprite_ram_update(1, 2);
        ppu.sprite_ram_update(2, 0x20); // behind the background
        ppu.sprite_ram_update(3, 0);
        ppu.spr_y[0] = -1;

        ppu.start_frame();
        // Opaque background pixel at (0,0) in the bg plane.
        ppu.bgbuffer[0] = 0x123456;
        ppu.pixrendered[0] = 0x100;
        ppu.render_frame_partially(0, 8, mapper.as_mut());
        assert_eq!(ppu.buffer[0], 0x123456, "background covers the sprite");
        assert_eq!(ppu.buffer[1], 0xFFFFFF, "sprite shows where bg is clear");
    }

    #[test]
    fn test_sprite_overflow_flag() {
        let mut ppu = Ppu::new();
        // Nine sprites covering line 25; the zeroed rest of OAM only
        // covers lines 1-8.
        for i in 0..9u8 {
            ppu.sprite_ram_update(i * 4, 20);
            ppu.sprite_ram_update(i * 4 + 3, i * 8);
        }
        ppu.evaluate_sprite_overflow(25);
        assert!(ppu.status_overflow);
    }

    #[test]
    fn test_no_overflow_with_eight_sprites() {
        let mut ppu = Ppu::new();
        for i in 0..8u8 {
            ppu.sprite_ram_update(i * 4, 20);
        }
        ppu.evaluate_sprite_overflow(25);
        assert!(!ppu.status_overflow);
    }

    #[test]
    fn test_left_column_clip() {
        let mut ppu = Ppu::new();
        let mut mapper = test_mapper();
        ppu.write_register(1, 0x18, mapper.as_mut()); // visible, clipped left
        ppu.buffer[0] = 0xFFFFFF;
        ppu.buffer[8] = 0xFFFFFF;
        ppu.end_frame_clip();
        assert_eq!(ppu.buffer[0], 0, "left 8 pixels cleared");
        assert_eq!(ppu.buffer[8], 0xFFFFFF, "ninth pixel survives");
    }
}
