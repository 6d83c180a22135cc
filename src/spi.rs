use log::{debug, warn};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::config::SpiConfig;
use crate::crc::CrcEngine;
use crate::error::Error;
use crate::frame;

/// One full-duplex exchange: every outbound byte position clocks in one
/// inbound byte, so the returned frame always matches the outbound length.
pub trait SpiBus {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Real SPI device via rppal (`/dev/spidevB.D`).
pub struct HardwareBus {
    spi: Spi,
}

impl HardwareBus {
    pub fn open(config: &SpiConfig) -> Result<Self, Error> {
        let bus = match config.bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            3 => Bus::Spi3,
            4 => Bus::Spi4,
            5 => Bus::Spi5,
            6 => Bus::Spi6,
            other => {
                return Err(Error::Configuration(format!(
                    "unknown SPI bus index {}",
                    other
                )))
            }
        };
        let slave = match config.device {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => {
                return Err(Error::Configuration(format!(
                    "unknown SPI chip-select index {}",
                    other
                )))
            }
        };
        let mode = match config.mode {
            0 => Mode::Mode0,
            1 => Mode::Mode1,
            2 => Mode::Mode2,
            3 => Mode::Mode3,
            other => {
                return Err(Error::Configuration(format!(
                    "SPI mode must be 0-3, got {}",
                    other
                )))
            }
        };
        let spi = Spi::new(bus, slave, config.rate_hz, mode)?;
        debug!(
            "Opened SPI bus {} device {} at {} Hz, mode {}",
            config.bus, config.device, config.rate_hz, config.mode
        );
        Ok(HardwareBus { spi })
    }
}

impl SpiBus for HardwareBus {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error> {
        let mut rx = vec![0u8; tx.len()];
        self.spi.transfer(&mut rx, tx)?;
        Ok(rx)
    }
}

/// Stand-in bus for development without hardware. Responds with zeros unless
/// a response is configured, and records the last transmitted frame.
#[derive(Debug, Default)]
pub struct StubBus {
    response: Vec<u8>,
    pub last_tx: Option<Vec<u8>>,
}

impl StubBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: Vec<u8>) -> Self {
        StubBus {
            response,
            last_tx: None,
        }
    }
}

impl SpiBus for StubBus {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Error> {
        self.last_tx = Some(tx.to_vec());
        let mut rx = vec![0u8; tx.len()];
        // Right-align the canned response, as a value clocked in at the tail.
        let n = self.response.len().min(tx.len());
        rx[tx.len() - n..].copy_from_slice(&self.response[self.response.len() - n..]);
        Ok(rx)
    }
}

/// Result of comparing the received CRC field against a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcCheck {
    pub received: u128,
    pub expected: u128,
}

impl CrcCheck {
    pub fn matches(&self) -> bool {
        self.received == self.expected
    }
}

/// Outcome of a read: the reassembled full word, plus the CRC comparison
/// when one was requested. A mismatch never withholds the value.
#[derive(Debug, Clone, Copy)]
pub struct ReadOutcome {
    pub value: u128,
    pub crc: Option<CrcCheck>,
}

/// Drives single full-duplex exchanges over a bus backend.
///
/// Receive-word layout with CRC enabled: the CRC field occupies the trailing
/// CRC bytes of the frame, the received CRC value is the low `width` bits of
/// that field, and the payload sits above it.
pub struct SpiController {
    bus: Box<dyn SpiBus>,
    byte_count: usize,
    crc: CrcEngine,
}

impl SpiController {
    pub fn new(bus: Box<dyn SpiBus>, byte_count: usize, crc: CrcEngine) -> Result<Self, Error> {
        if byte_count == 0 || byte_count > 16 {
            return Err(Error::Configuration(format!(
                "word length of {} bytes is outside the supported 1-16 byte range",
                byte_count
            )));
        }
        if byte_count + crc.byte_count() > 16 {
            return Err(Error::Configuration(
                "word plus CRC field exceeds 128 bits".to_string(),
            ));
        }
        Ok(SpiController {
            bus,
            byte_count,
            crc,
        })
    }

    /// Write `word` over the bus; returns the transmitted frame for echo
    /// diagnostics. The response bytes are clocked in but not interpreted.
    pub fn write(&mut self, word: u128, with_crc: bool) -> Result<Vec<u8>, Error> {
        let tx = frame::encode(word, self.byte_count, self.crc_engine(with_crc))?;
        debug!("Sending bytes {:02x?}", tx);
        self.bus.transfer(&tx)?;
        Ok(tx)
    }

    /// Exchange `word` and reassemble the full received word: the inbound
    /// frame ORed onto the outbound payload, which the protocol transmits
    /// above zero-padded receive positions.
    pub fn read(&mut self, word: u128, with_crc: bool) -> Result<ReadOutcome, Error> {
        let tx = frame::encode(word, self.byte_count, self.crc_engine(with_crc))?;
        debug!("Sending bytes {:02x?}", tx);
        let rx = self.bus.transfer(&tx)?;
        let rx_value = frame::decode(&rx);

        if !with_crc {
            let value = word | rx_value;
            debug!("Read back {:#x}", value);
            return Ok(ReadOutcome { value, crc: None });
        }

        let field_bits = self.crc.byte_count() * 8;
        let full = (word << field_bits) | rx_value;
        let width_mask = if self.crc.width() == 128 {
            u128::MAX
        } else {
            (1u128 << self.crc.width()) - 1
        };
        let received = full & width_mask;
        debug!("Got CRC word {:#x}", received);

        let payload = full >> field_bits;
        let payload_frame = frame::encode(payload, self.byte_count, None)?;
        let expected = self.crc.checksum(&payload_frame);
        let check = CrcCheck { received, expected };
        if !check.matches() {
            warn!(
                "CRC mismatch: expected {:#x}, received {:#x}",
                expected, received
            );
        }
        debug!("Read back {:#x}", payload);
        Ok(ReadOutcome {
            value: full,
            crc: Some(check),
        })
    }

    /// CRC of `word` framed to the configured byte count (gen-crc).
    pub fn crc_word(&self, word: u128) -> Result<u128, Error> {
        let payload = frame::encode(word, self.byte_count, None)?;
        Ok(self.crc.checksum(&payload))
    }

    fn crc_engine(&self, with_crc: bool) -> Option<&CrcEngine> {
        if with_crc {
            Some(&self.crc)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(bus: StubBus) -> SpiController {
        let engine = CrcEngine::new(8, 0xA2, 0).unwrap();
        SpiController::new(Box::new(bus), 4, engine).unwrap()
    }

    #[test]
    fn stub_records_tx_and_right_aligns_response() {
        let mut bus = StubBus::with_response(vec![0xBE, 0xEF]);
        let rx = bus.transfer(&[1, 2, 3, 4]).unwrap();
        assert_eq!(rx, vec![0, 0, 0xBE, 0xEF]);
        assert_eq!(bus.last_tx, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn write_frames_word_big_endian() {
        let mut ctl = controller(StubBus::new());
        let tx = ctl.write(0xDEADBEEF, false).unwrap();
        assert_eq!(tx, vec![222, 173, 190, 239]);
    }

    #[test]
    fn write_decimal_word_is_zero_padded() {
        let mut ctl = controller(StubBus::new());
        let tx = ctl.write(43981, false).unwrap();
        assert_eq!(tx, vec![0, 0, 171, 205]);
    }

    #[test]
    fn write_with_crc_appends_checksum() {
        let mut ctl = controller(StubBus::new());
        let tx = ctl.write(0xDEADBEEF, true).unwrap();
        assert_eq!(tx, vec![222, 173, 190, 239, 210]);
    }

    #[test]
    fn write_overflow_is_fatal() {
        let engine = CrcEngine::new(8, 0xA2, 0).unwrap();
        let mut ctl = SpiController::new(Box::new(StubBus::new()), 2, engine).unwrap();
        assert!(matches!(
            ctl.write(0xDEADBEEF, false),
            Err(Error::Overflow { .. })
        ));
    }

    #[test]
    fn read_merges_outbound_and_inbound() {
        let mut ctl = controller(StubBus::with_response(vec![0xBE, 0xEF]));
        let outcome = ctl.read(0xDEAD0000, false).unwrap();
        assert_eq!(outcome.value, 0xDEADBEEF);
        assert!(outcome.crc.is_none());
    }

    #[test]
    fn read_with_matching_crc() {
        // crc8(AA AA 55 55, poly 0xA2) == 0x44, so this response checks out.
        let mut ctl = controller(StubBus::with_response(vec![0x55, 0x55, 0x44]));
        let outcome = ctl.read(0xAAAA0000, true).unwrap();
        assert_eq!(outcome.value, 0xAAAA555544);
        let check = outcome.crc.unwrap();
        assert_eq!(check.received, 0x44);
        assert_eq!(check.expected, 0x44);
        assert!(check.matches());
    }

    #[test]
    fn read_with_crc_mismatch_still_returns_value() {
        let mut ctl = controller(StubBus::with_response(vec![0x55, 0x55, 0x45]));
        let outcome = ctl.read(0xAAAA0000, true).unwrap();
        assert_eq!(outcome.value, 0xAAAA555545);
        let check = outcome.crc.unwrap();
        assert_eq!(check.received, 0x45);
        assert_eq!(check.expected, 0x44);
        assert!(!check.matches());
    }

    #[test]
    fn read_of_looped_back_frame_validates() {
        // A stub echoing the transmitted frame behaves like MISO tied to MOSI.
        let engine = CrcEngine::new(8, 0xA2, 0).unwrap();
        let echo = frame::encode(0xDEADBEEF, 4, Some(&engine)).unwrap();
        let mut ctl = controller(StubBus::with_response(echo));
        let outcome = ctl.read(0xDEADBEEF, true).unwrap();
        assert_eq!(outcome.value, 0xDEADBEEFD2);
        assert!(outcome.crc.unwrap().matches());
    }

    #[test]
    fn zero_filled_stub_keeps_tool_usable() {
        let mut ctl = controller(StubBus::new());
        let outcome = ctl.read(0xDEADBEEF, false).unwrap();
        assert_eq!(outcome.value, 0xDEADBEEF);
    }

    #[test]
    fn crc_word_matches_gen_crc_vector() {
        let ctl = controller(StubBus::new());
        assert_eq!(ctl.crc_word(0xF7E6D5C4).unwrap(), 0x4E);
    }

    #[test]
    fn controller_rejects_oversize_frame() {
        let engine = CrcEngine::new(8, 0xA2, 0).unwrap();
        assert!(SpiController::new(Box::new(StubBus::new()), 16, engine).is_err());
    }
}
