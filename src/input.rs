// Input module - standard controllers and the light gun
//
// Each controller is an 8-bit shift register behind $4016/$4017. Writing
// $4016 with bit 0 high holds the strobe: reads return button A live. On
// the falling edge the current button state latches, and the next eight
// reads walk A, B, Select, Start, Up, Down, Left, Right; reads after that
// return 1.
//
// The light gun shares $4017: bit 3 reports light at the aimed pixel,
// bit 4 the trigger.

use serde::{Deserialize, Serialize};

/// The eight buttons, in shift-register order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
}

impl Button {
    /// Map a raw index (the wire protocol order) to a button
    pub fn from_index(index: u8) -> Option<Button> {
        match index {
            0 => Some(Button::A),
            1 => Some(Button::B),
            2 => Some(Button::Select),
            3 => Some(Button::Start),
            4 => Some(Button::Up),
            5 => Some(Button::Down),
            6 => Some(Button::Left),
            7 => Some(Button::Right),
            _ => None,
        }
    }
}

/// One standard controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Controller {
    /// Live button state
    buttons: [bool; 8],
    /// Latched shift register
    latched: u8,
    /// Bits shifted out since the latch
    reads: u8,
    /// Strobe line state
    strobe: bool,
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            buttons: [false; 8],
            latched: 0,
            reads: 0,
            strobe: false,
        }
    }

    /// Update a button from the host
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.buttons[button as usize] = pressed;
    }

    /// $4016 write: bit 0 drives the strobe line
    pub fn write_strobe(&mut self, value: u8) {
        let high = value & 0x01 != 0;
        if self.strobe && !high {
            // Falling edge: snapshot the buttons into the shift register.
            self.latched = self
                .buttons
                .iter()
                .enumerate()
                .fold(0, |acc, (i, &b)| acc | (u8::from(b) << i));
            self.reads = 0;
        }
        self.strobe = high;
    }

    /// Shift one bit out ($4016/$4017 read, bit 0)
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            // While the strobe is held the register keeps reloading, so
            // every read sees button A.
            return u8::from(self.buttons[Button::A as usize]);
        }
        if self.reads >= 8 {
            return 1;
        }
        let bit = (self.latched >> self.reads) & 1;
        self.reads += 1;
        bit
    }

    /// Drop strobe/latch state (console reset)
    pub fn reset(&mut self) {
        self.latched = 0;
        self.reads = 0;
        self.strobe = false;
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Light gun state; the light sense itself lives with the PPU framebuffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zapper {
    /// Aimed screen position
    pub x: i32,
    pub y: i32,
    /// Trigger held
    pub trigger: bool,
}

impl Zapper {
    pub fn new() -> Self {
        Zapper {
            x: -1,
            y: -1,
            trigger: false,
        }
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn set_trigger(&mut self, held: bool) {
        self.trigger = held;
    }
}

impl Default for Zapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latch(c: &mut Controller) {
        c.write_strobe(1);
        c.write_strobe(0);
    }

    #[test]
    fn test_strobe_high_returns_a() {
        let mut c = Controller::new();
        c.set_button(Button::A, true);
        c.write_strobe(1);
        assert_eq!(c.read(), 1);
        assert_eq!(c.read(), 1, "still A while strobe is high");

        c.set_button(Button::A, false);
        assert_eq!(c.read(), 0, "live state, not a latch");
    }

    #[test]
    fn test_latched_sequence() {
        let mut c = Controller::new();
        c.set_button(Button::A, true);
        c.set_button(Button::Start, true);
        c.set_button(Button::Right, true);
        latch(&mut c);

        let bits: Vec<u8> = (0..8).map(|_| c.read()).collect();
        assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_reads_past_eight_return_one() {
        let mut c = Controller::new();
        latch(&mut c);
        for _ in 0..8 {
            c.read();
        }
        assert_eq!(c.read(), 1);
        assert_eq!(c.read(), 1);
    }

    #[test]
    fn test_button_changes_after_latch_invisible() {
        let mut c = Controller::new();
        c.set_button(Button::B, true);
        latch(&mut c);
        c.set_button(Button::B, false);
        c.read(); // A
        assert_eq!(c.read(), 1, "latched B survives the release");
    }

    #[test]
    fn test_relatch_restarts_sequence() {
        let mut c = Controller::new();
        c.set_button(Button::A, true);
        latch(&mut c);
        for _ in 0..5 {
            c.read();
        }
        latch(&mut c);
        assert_eq!(c.read(), 1, "back to button A");
    }
}
