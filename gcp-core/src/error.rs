//! Error types for gcp-core.
//!
//! This module provides structured error types for all gcp-core operations:
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`ProtocolError`] - Decode errors local to one wire field
//! - [`CorrelationError`] - Violated correlation invariants
//!
//! Protocol errors never stop a message decode: the caller substitutes a
//! placeholder value and keeps going. Correlation errors stop analysis of the
//! current message only; they are raised before any registry is touched.

use thiserror::Error;

/// Main error type for gcp-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed value in a decoded field
    #[error("Protocol decode error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Correlation state does not match the message being analyzed
    #[error("Correlation error: {0}")]
    Correlation(#[from] CorrelationError),
}

/// Errors in the semantic range of decoded field values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Transaction or context id wider than 32 bits
    #[error("{protocol}: {field} {value:#x} does not fit in 32 bits")]
    IdOutOfRange {
        protocol: &'static str,
        field: &'static str,
        value: u64,
    },
}

/// Invariant violations of the correlation registries.
///
/// These indicate that a frame was replayed whose first-pass state does not
/// exist, usually because the host broke the first-visit ordering contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    /// A replayed message references a transaction it did not create
    #[error("frame {frame}: replayed message has no transaction {trx_id:#x}")]
    MissingTransaction { frame: u64, trx_id: u32 },

    /// No context is registered for the transaction or id
    #[error("frame {frame}: no context {ctx_id:#x} registered for transaction {trx_id:#x}")]
    MissingContext { frame: u64, trx_id: u32, ctx_id: u32 },

    /// Every version of a context id was created after the replayed frame
    #[error("frame {frame}: context {ctx_id:#x} has no version at or before this frame")]
    ContextChainExhausted { frame: u64, ctx_id: u32 },

    /// A replayed message references a command it did not create
    #[error("frame {frame}: no command at offset {offset} in transaction {trx_id:#x}")]
    MissingCommand {
        frame: u64,
        trx_id: u32,
        offset: usize,
    },

    /// A replayed message references a termination it did not create
    #[error("frame {frame}: termination {name} not found in its context")]
    MissingTermination { frame: u64, name: String },

    /// A frame was visited for the first time after a later frame
    #[error("frame {frame} first visited after frame {last_frame}")]
    FrameOutOfOrder { frame: u64, last_frame: u64 },

    /// A handle from another message scope or a previous session
    #[error("{kind} handle does not belong to the current message scope")]
    StaleHandle { kind: &'static str },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
