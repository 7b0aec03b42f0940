//! # gcp-core
//!
//! Transaction and context correlation for H.248/MEGACO gateway control.
//!
//! Protocol decoders see one message at a time. This crate rebuilds the
//! hierarchy that spans messages (Message → Transaction → Context → Command
//! → Termination) so that a reply lands on its request, a context keeps its
//! history across id reuse, and wildcarded terminations resolve to the
//! terminations they stood for. The same state answers replays of earlier
//! frames without changing.
//!
//! ## Features
//!
//! - **Correlation engine**: message, transaction and context registries,
//!   command ledger and termination resolver over one session arena
//! - **Replay**: revisiting a committed frame reads the registries without
//!   growing them, reconstructing contexts as they were at that frame
//! - **Summaries**: one line per transaction for a packet list column
//! - **Context view**: generated tree of command history and terminations,
//!   joined to ALCAP bearer legs by NSAP/BIR
//! - **ALCAP leg tracking**: ERQ/ECF/REL/RLC legs indexed by association id
//!   and bearer key
//!
//! ## Quick Start
//!
//! ```rust
//! use gcp_core::prelude::*;
//!
//! let mut session = GcpSession::new(GcpConfig::default());
//! let frame = FrameInfo::new(1, Address::PointCode(0x101), Address::PointCode(0x202));
//!
//! let msg = DecodedMessage::new().transaction(
//!     DecodedTransaction::request(1).action(
//!         DecodedAction::choose().command(
//!             DecodedCommand::new(CmdType::AddReq, 20).term(DecodedTermination::text("A4444:1")),
//!         ),
//!     ),
//! );
//!
//! let mut tree = ProtoTree::new();
//! let summary = H248Dissector::new()
//!     .dissect(&mut session, &frame, 0, &msg, &mut tree)
//!     .unwrap();
//! assert_eq!(summary, "T 1 { C fffffffe { AddReq { A4444:1 } } }");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                           gcp-core                                  |
//! +---------------------------------------------------------------------+
//! |  h248/         - Decoded message model, DecodeContext, dissector    |
//! |  gcp/          - GcpSession: registries, ledger, resolver,          |
//! |                  summary renderer, context view                     |
//! |  alcap/        - Leg table and bearer-key lookup                    |
//! |  tree/         - TreeSink (host display tree), ProtoTree            |
//! |  field/        - FieldValue                                         |
//! |  conversation/ - Canonical endpoint pair                            |
//! |  config/       - GcpConfig, FrameOrderPolicy                        |
//! |  error/        - Error types                                        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Lifecycle
//!
//! A [`GcpSession`](gcp::GcpSession) holds everything learned from one open
//! capture. Frames must be visited for the first time in increasing order;
//! after that any committed frame may be revisited. Closing the capture is
//! [`reset`](gcp::GcpSession::reset) (or dropping the session).

pub mod alcap;
pub mod config;
pub mod conversation;
pub mod error;
pub mod field;
pub mod gcp;
pub mod h248;
pub mod prelude;
pub mod tree;

pub use config::{FrameOrderPolicy, GcpConfig};
pub use error::{CorrelationError, Error, ProtocolError, Result};
pub use gcp::{GcpSession, SessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
