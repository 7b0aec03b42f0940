//! Gateway Control Protocol correlation engine.
//!
//! Rebuilds the Message → Transaction → Context → Command → Termination
//! hierarchy across independently decoded H.248 messages.
//!
//! A decoder calls into a [`GcpSession`] at fixed syntactic checkpoints:
//!
//! | checkpoint | operation |
//! |---|---|
//! | message start | [`GcpSession::gcp_msg`] |
//! | transaction id | [`GcpSession::gcp_trx`] |
//! | context id | [`GcpSession::gcp_ctx`] |
//! | command tag | [`GcpSession::gcp_cmd`] |
//! | termination id | [`GcpSession::gcp_cmd_add_term`] |
//!
//! Afterwards [`GcpSession::gcp_msg_to_string`] renders the summary line and
//! [`GcpSession::gcp_analyze_msg`] emits the context view.
//!
//! The [`Phase`] carried by each [`MessageRef`] selects the behaviour of
//! every downstream call: `Building` grows the registries, `Replaying` only
//! reads them, and `Transient` keeps records for one message only.

mod command;
mod handle;
mod present;
mod record;
mod session;
mod summary;
mod termination;

pub use handle::{CmdRef, CtxRef, Handle, MsgHandle, TermRef, TrxRef};
pub use present::GcpFieldIds;
pub use record::{
    CmdType, Command, Context, FrameInfo, Message, MessageRef, Phase, TermCandidate, TermType,
    Termination, Transaction, TrxType, Wildcard,
};
pub use session::{GcpSession, SessionStats};

use tracing::warn;

use crate::error::ProtocolError;

/// Context id meaning "no context".
pub const NULL_CONTEXT: u32 = 0;
/// Context id `$`: the gateway creates a new context.
pub const CHOOSE_CONTEXT: u32 = 0xFFFF_FFFE;
/// Context id `*`: every context.
pub const ALL_CONTEXT: u32 = 0xFFFF_FFFF;
/// Registry key used in place of an out-of-range transaction id.
pub const INVALID_TRANSACTION_ID: u32 = 0;

/// Narrow a decoded transaction or context id to 32 bits.
///
/// Out-of-range values are reported rather than truncated; the caller
/// substitutes [`INVALID_TRANSACTION_ID`] or [`NULL_CONTEXT`] and flags the
/// field.
pub fn checked_id(field: &'static str, raw: u64) -> Result<u32, ProtocolError> {
    u32::try_from(raw).map_err(|_| {
        warn!(field, value = raw, "id does not fit in 32 bits");
        ProtocolError::IdOutOfRange {
            protocol: "h248",
            field,
            value: raw,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_id() {
        assert_eq!(checked_id("transactionId", 0x1234), Ok(0x1234));
        assert_eq!(checked_id("contextId", u32::MAX as u64), Ok(ALL_CONTEXT));
        assert_eq!(
            checked_id("transactionId", 0x1_0000_0001),
            Err(ProtocolError::IdOutOfRange {
                protocol: "h248",
                field: "transactionId",
                value: 0x1_0000_0001,
            })
        );
    }
}
