/// spicli - CLI for Raspberry Pi SPI/GPIO communication
///
/// This library provides SPI word framing with optional CRC checking,
/// a full-duplex transaction layer with a hardware (rppal) and a stand-in
/// backend, and GPIO pin control for bring-up and benchmarking work.

pub mod benchmark;
pub mod config;
pub mod crc;
pub mod error;
pub mod frame;
pub mod gpio;
pub mod spi;

// Re-export main types for convenience
pub use config::Config;
pub use crc::CrcEngine;
pub use error::Error;
pub use spi::{SpiBus, SpiController, StubBus};
