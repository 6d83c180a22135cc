use std::fmt;

use crc_all::CrcAlgo;

use crate::config::CrcConfig;
use crate::error::Error;
use crate::frame;

/// Runtime-configured CRC: MSB-first, no bit reflection, no output XOR.
///
/// The width is not limited to the usual 8/16/32; anything from 1 to 128
/// bits works, with the polynomial and initial register value sized to it.
pub struct CrcEngine {
    width: u32,
    poly: u128,
    init: u128,
    algo: CrcAlgo<u128>,
}

impl CrcEngine {
    pub fn new(width: u32, poly: u128, init: u128) -> Result<Self, Error> {
        if width == 0 || width > 128 {
            return Err(Error::Configuration(format!(
                "CRC width must be 1-128 bits, got {}",
                width
            )));
        }
        if width < 128 {
            let limit = 1u128 << width;
            if poly >= limit {
                return Err(Error::Configuration(format!(
                    "polynomial {:#x} does not fit in {} bits",
                    poly, width
                )));
            }
            if init >= limit {
                return Err(Error::Configuration(format!(
                    "initial value {:#x} does not fit in {} bits",
                    init, width
                )));
            }
        }
        Ok(CrcEngine {
            width,
            poly,
            init,
            algo: CrcAlgo::<u128>::new(poly, width as usize, init, 0, false),
        })
    }

    pub fn from_config(config: &CrcConfig) -> Result<Self, Error> {
        let poly = frame::parse_word(&config.polynomial).map_err(|_| {
            Error::Configuration(format!(
                "polynomial `{}` is not a valid numeral",
                config.polynomial
            ))
        })?;
        let init = frame::parse_word(&config.initial_value).map_err(|_| {
            Error::Configuration(format!(
                "initial value `{}` is not a valid numeral",
                config.initial_value
            ))
        })?;
        Self::new(config.width, poly, init)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of bytes the CRC value occupies in a frame.
    pub fn byte_count(&self) -> usize {
        (self.width as usize + 7) / 8
    }

    /// Checksum over `data`, always strictly less than `2^width`.
    pub fn checksum(&self, data: &[u8]) -> u128 {
        let mut crc = self.init;
        self.algo.update_crc(&mut crc, data);
        self.algo.finish_crc(&crc)
    }
}

impl fmt::Debug for CrcEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrcEngine")
            .field("width", &self.width)
            .field("poly", &format_args!("{:#x}", self.poly))
            .field("init", &format_args!("{:#x}", self.init))
            .finish()
    }
}
