use std::io;

/// Invalid or contradictory capture settings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Must specify clock frequency (--clk-freq)")]
    ZeroClockFrequency,

    #[error("Invalid clock divisor {0}: must be between 1 and 16777216")]
    InvalidDivisor(u32),

    #[error("Device reports {0} probes, at most 32 are supported")]
    TooManyProbes(u32),

    #[error("No valid channel groups enabled (requested 0x{enable:X}, available 0x{mask:X})")]
    NoGroupsEnabled { enable: u32, mask: u32 },

    #[error("Capture of {0} samples does not fit the sample count fields")]
    SampleCountTooLarge(u32),

    #[error("Sample period of {divisor}/{clk_freq_hz} seconds cannot be expressed as a VCD timescale")]
    TimescaleOutOfRange { divisor: u32, clk_freq_hz: u32 },

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Invalid trigger '{0}': must be number=number")]
    InvalidTrigger(String),

    #[error("Invalid VCD value specifier '{0}'")]
    InvalidVcdValue(String),

    #[error("VCD value '{0}' has more than 32 bits")]
    TooManyVcdBits(String),

    #[error("Too many VCD values specified (max 32)")]
    TooManyVcdValues,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("Unknown ident: {0}")]
    UnrecognizedDevice(String),

    #[error("Unexpected extended metadata type {kind} (from byte 0x{tag:02X})")]
    UnexpectedMetadataKind { kind: u8, tag: u8 },
}
