// Save state functionality
//
// Serialises the complete console as a nested record of {cpu, ppu, papu,
// mmap} inside a versioned envelope. Byte storage round-trips as plain
// integer sequences; rendering scratch is rebuilt on restore, so
// `from_json(to_json(s))` restores every observable field.

use crate::apu::ApuState;
use crate::cartridge::MapperState;
use crate::cpu::InterruptRequest;
use crate::input::{Controller, Zapper};
use crate::ppu::PpuState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Current save state format version
pub const SAVE_STATE_VERSION: u32 = 1;

/// Errors that can occur during save state operations
#[derive(Debug)]
pub enum SaveStateError {
    /// I/O error (hosts that stream states through readers/writers)
    Io(io::Error),
    /// Serialization/deserialization error
    Serialization(serde_json::Error),
    /// Save state version mismatch
    VersionMismatch {
        expected: u32,
        found: u32,
    },
    /// The state was captured from a different board or memory shape
    Structural(String),
}

impl fmt::Display for SaveStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStateError::Io(e) => write!(f, "I/O error: {}", e),
            SaveStateError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SaveStateError::VersionMismatch { expected, found } => {
                write!(f, "Version mismatch: expected {}, found {}", expected, found)
            }
            SaveStateError::Structural(msg) => write!(f, "Incompatible save state: {}", msg),
        }
    }
}

impl std::error::Error for SaveStateError {}

impl From<io::Error> for SaveStateError {
    fn from(e: io::Error) -> Self {
        SaveStateError::Io(e)
    }
}

impl From<serde_json::Error> for SaveStateError {
    fn from(e: serde_json::Error) -> Self {
        SaveStateError::Serialization(e)
    }
}

/// CPU-side state: registers, internal RAM and the bus bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuState {
    /// 2KB internal RAM
    pub mem: Vec<u8>,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    pub cycles: u64,
    /// Last byte driven on the data bus
    pub data_bus: u8,
    /// Dead cycles owed to DMA stalls
    pub cycles_to_halt: u32,
    /// Pending interrupt record
    pub irq: InterruptRequest,
}

/// Memory-map-side state: the mapper plus the input hardware it decodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmapState {
    pub mapper: MapperState,
    pub controllers: [Controller; 2],
    pub zapper: Zapper,
}

/// Complete console save state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    /// Version number for compatibility checking
    pub version: u32,
    /// RFC 3339 timestamp of the capture
    pub timestamp: String,
    pub cpu: CpuState,
    pub ppu: PpuState,
    pub papu: ApuState,
    pub mmap: MmapState,
}

impl SaveState {
    /// Stamp a freshly captured state
    pub fn stamp(cpu: CpuState, ppu: PpuState, papu: ApuState, mmap: MmapState) -> Self {
        SaveState {
            version: SAVE_STATE_VERSION,
            timestamp: chrono::Utc::now().to_rfc3339(),
            cpu,
            ppu,
            papu,
            mmap,
        }
    }

    /// Serialise to JSON
    pub fn to_json(&self) -> Result<String, SaveStateError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON, checking the version
    pub fn from_json(json: &str) -> Result<SaveState, SaveStateError> {
        let state: SaveState = serde_json::from_str(json)?;
        if state.version != SAVE_STATE_VERSION {
            return Err(SaveStateError::VersionMismatch {
                expected: SAVE_STATE_VERSION,
                found: state.version,
            });
        }
        Ok(state)
    }
}
