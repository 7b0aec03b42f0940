//! Convenient re-exports for common usage.
//!
//! # Example
//!
//! ```rust
//! use gcp_core::prelude::*;
//!
//! let session = GcpSession::new(GcpConfig::default().with_track_context(true));
//! assert_eq!(session.stats(), SessionStats::default());
//! ```

// Engine
pub use crate::gcp::{
    CmdRef, CmdType, CtxRef, FrameInfo, GcpFieldIds, GcpSession, MessageRef, MsgHandle, Phase,
    SessionStats, TermCandidate, TermRef, TermType, TrxRef, TrxType, Wildcard, ALL_CONTEXT,
    CHOOSE_CONTEXT, NULL_CONTEXT,
};

// H.248 driver
pub use crate::h248::{
    DecodeContext, DecodedAction, DecodedCommand, DecodedMessage, DecodedTermination,
    DecodedTransaction, H248Dissector,
};

// ALCAP
pub use crate::alcap::{bearer_key, AlcapMessage, AlcapMsgType, LegLookup, LegTable, NoLegs};

// Tree and fields
pub use crate::field::FieldValue;
pub use crate::tree::{ExpertInfo, NodeId, ProtoTree, Severity, Span, TreeSink};

// Configuration and addressing
pub use crate::config::{FrameOrderPolicy, GcpConfig};
pub use crate::conversation::{Address, ConversationKey};

// Error types
pub use crate::error::{CorrelationError, Error, ProtocolError, Result};
