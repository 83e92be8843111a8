// Licensed under the Apache-2.0 license

use thiserror::Error;

/// Errors produced while parsing or encoding a firmware package binary.
///
/// The parser never performs I/O itself; these variants describe problems
/// found in the byte buffer handed to it, not filesystem failures.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of buffer: needed {needed} bytes, {available} remaining")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("unknown PLDM firmware package version identifier {0}")]
    UnknownPackageVersion(uuid::Uuid),

    #[error("package header size field ({declared}) does not match computed header size ({computed})")]
    HeaderSizeMismatch { declared: u16, computed: u16 },

    #[error("package header checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    HeaderChecksumMismatch { expected: u32, computed: u32 },

    #[error("firmware payload checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    PayloadChecksumMismatch { expected: u32, computed: u32 },

    #[error("applicable component index {0} is out of range")]
    ComponentIndexOutOfRange(u8),

    #[error("version string is not valid UTF-8")]
    InvalidVersionString,

    #[error("manifest validation failed: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}
