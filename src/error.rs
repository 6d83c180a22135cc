use thiserror::Error;

/// Errors raised by the framing, CRC and bus layers.
///
/// A CRC mismatch on a read is deliberately not represented here: it is a
/// diagnostic carried in the read outcome, not a failure of the transaction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("`{0}` is not a decimal or 0x-prefixed hexadecimal numeral")]
    Format(String),

    #[error("word {word:#x} does not fit in {byte_count} byte(s)")]
    Overflow { word: u128, byte_count: usize },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("SPI bus error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}
