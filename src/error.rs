//! Error types, split by how far each failure is allowed to propagate.
//!
//! `ConfigError` aborts the run before any frame is read. `DecodeError` kills
//! one frame. `CryptoError` and the MAC-command stream errors never escape
//! the decode of a single frame; they degrade to raw/partial output plus a
//! diagnostic on stderr.

use thiserror::Error;

/// Fatal configuration problems, checked before the input loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Region identifier not in the band registry.
    #[error("unknown band: {0}")]
    UnknownBand(String),

    /// Band exists but does not support the requested PHY version.
    #[error("band {band} does not support PHY version {phy}")]
    UnsupportedPhyVersion { band: &'static str, phy: String },

    /// Unparseable MAC version string.
    #[error("invalid MAC version: {0}")]
    InvalidMacVersion(String),

    /// Unparseable PHY version string.
    #[error("invalid PHY version: {0}")]
    InvalidPhyVersion(String),

    /// Key hex that is not exactly 16 bytes.
    #[error("invalid {name}: {reason}")]
    InvalidKey { name: &'static str, reason: String },

    /// Key supplied that the negotiated MAC version does not allow.
    #[error("{name} must not be specified for MAC version {version}")]
    KeyNotAllowed { name: &'static str, version: String },

    /// The encode direction is not implemented.
    #[error("encoding not implemented")]
    EncodeUnimplemented,
}

/// Per-frame fatal errors. The frame is skipped, processing continues.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The outer wire envelope could not be parsed.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Failures inside the symmetric crypto primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("empty payload")]
    EmptyPayload,

    /// FOpts is at most 15 bytes on the wire; longer buffers cannot be an
    /// encrypted options field.
    #[error("FOpts buffer too long: {0} bytes")]
    FOptsTooLong(usize),

    /// Join-Accept bodies are exactly one or two AES blocks.
    #[error("invalid Join-Accept length: {0} bytes")]
    InvalidJoinAcceptLength(usize),

    /// Candidate plaintext did not form a complete MAC command stream.
    #[error("plaintext is not a valid MAC command stream")]
    ImplausiblePlaintext,
}
