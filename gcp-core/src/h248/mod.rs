//! H.248/MEGACO (binary encoding) driver for the correlation engine.
//!
//! [`H248Dissector`] walks a [`DecodedMessage`] top-down and calls the
//! [`GcpSession`](crate::gcp::GcpSession) at each checkpoint (transaction id,
//! context id, command tag, termination id), emitting the wire-derived
//! fields as it goes.

mod dissector;
mod model;

pub use dissector::{DecodeContext, H248Dissector};
pub use model::{
    DecodedAction, DecodedCommand, DecodedMessage, DecodedTermination, DecodedTransaction,
};

use crate::tree::{ExpertInfo, Severity};

/// Transaction or context id wider than 32 bits.
pub const ID_OUT_OF_RANGE: ExpertInfo = ExpertInfo {
    name: "h248.id_out_of_range",
    severity: Severity::Warn,
    summary: "Id does not fit in 32 bits",
};

/// Command or transaction carrying an error descriptor.
pub const COMMAND_ERROR: ExpertInfo = ExpertInfo {
    name: "h248.errored_command",
    severity: Severity::Warn,
    summary: "Errored command",
};

/// Context id with no version at the replayed frame.
pub const CONTEXT_UNAVAILABLE: ExpertInfo = ExpertInfo {
    name: "h248.ctx_unavailable",
    severity: Severity::Error,
    summary: "Context information unavailable",
};
