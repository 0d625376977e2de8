//! The APU's five sound channels

mod dmc;
mod noise;
mod pulse;
mod triangle;

pub use dmc::DmcChannel;
pub use noise::NoiseChannel;
pub use pulse::PulseChannel;
pub use triangle::TriangleChannel;
