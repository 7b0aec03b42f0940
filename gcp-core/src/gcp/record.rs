//! Correlation records and their enumerations.

use std::cell::OnceCell;

use compact_str::CompactString;
use smallvec::SmallVec;

use super::handle::{CmdRef, CtxRef, MsgHandle, TermRef, TrxRef};
use crate::conversation::{Address, ConversationKey};

/// How a message's correlation calls are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Context tracking disabled: records are scoped to this message.
    Transient,
    /// First visit: registries are created and extended.
    Building,
    /// The message was committed on an earlier visit: registries are only read.
    Replaying,
}

/// A message handle plus the phase its correlation calls run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub id: MsgHandle,
    pub phase: Phase,
}

/// Capture frame metadata supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub number: u64,
    /// Capture timestamp (microseconds since epoch).
    pub timestamp_us: i64,
    pub src: Address,
    pub dst: Address,
}

impl FrameInfo {
    pub fn new(number: u64, src: Address, dst: Address) -> Self {
        Self {
            number,
            timestamp_us: 0,
            src,
            dst,
        }
    }

    pub fn with_timestamp(mut self, timestamp_us: i64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }
}

/// Transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrxType {
    Request,
    Pending,
    Reply,
    Ack,
}

impl TrxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrxType::Request => "Request",
            TrxType::Pending => "Pending",
            TrxType::Reply => "Reply",
            TrxType::Ack => "Ack",
        }
    }
}

/// Command kinds (requests and their replies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdType {
    None,
    AddReq,
    MoveReq,
    ModReq,
    SubReq,
    AuditCapReq,
    AuditValReq,
    NotifyReq,
    SvcChgReq,
    TopologyReq,
    CtxAttrAuditReq,
    OtherReq,
    AddReply,
    MoveReply,
    ModReply,
    SubReply,
    AuditCapReply,
    AuditValReply,
    NotifyReply,
    SvcChgReply,
    TopologyReply,
    Reply,
}

impl CmdType {
    /// Label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            CmdType::None => "NoCommand",
            CmdType::AddReq => "AddReq",
            CmdType::MoveReq => "MoveReq",
            CmdType::ModReq => "ModReq",
            CmdType::SubReq => "SubReq",
            CmdType::AuditCapReq => "AuditCapReq",
            CmdType::AuditValReq => "AuditValReq",
            CmdType::NotifyReq => "NotifyReq",
            CmdType::SvcChgReq => "SvcChgReq",
            CmdType::TopologyReq => "TopologyReq",
            CmdType::CtxAttrAuditReq => "CtxAttribAuditReq",
            CmdType::OtherReq => "OtherReq",
            CmdType::AddReply => "AddReply",
            CmdType::MoveReply => "MoveReply",
            CmdType::ModReply => "ModReply",
            CmdType::SubReply => "SubReply",
            CmdType::AuditCapReply => "AuditCapReply",
            CmdType::AuditValReply => "AuditValReply",
            CmdType::NotifyReply => "NotifyReply",
            CmdType::SvcChgReply => "SvcChgReply",
            CmdType::TopologyReply => "TopologyReply",
            CmdType::Reply => "ReplyCommand",
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            CmdType::AddReq
                | CmdType::MoveReq
                | CmdType::ModReq
                | CmdType::SubReq
                | CmdType::AuditCapReq
                | CmdType::AuditValReq
                | CmdType::NotifyReq
                | CmdType::SvcChgReq
                | CmdType::TopologyReq
                | CmdType::CtxAttrAuditReq
                | CmdType::OtherReq
        )
    }
}

/// Coarse termination classification set by package decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TermType {
    #[default]
    Unknown = 0,
    Aal1 = 1,
    Aal2 = 2,
    Aal1Struct = 3,
    IpRtp = 4,
    Tdm = 5,
}

impl TermType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermType::Unknown => "unknown",
            TermType::Aal1 => "aal1",
            TermType::Aal2 => "aal2",
            TermType::Aal1Struct => "aal1_struct",
            TermType::IpRtp => "ip_rtp",
            TermType::Tdm => "tdm",
        }
    }
}

/// Wildcard carried by a termination id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wildcard {
    #[default]
    None,
    /// `$`: the gateway picks the termination.
    Choose,
    /// `*`: every matching termination.
    All,
}

/// One decoded protocol message.
#[derive(Debug, Clone)]
pub struct Message {
    pub frame: u64,
    pub offset: usize,
    pub timestamp_us: i64,
    pub conversation: ConversationKey,
    /// Transactions referenced by this message, in decode order.
    pub transactions: SmallVec<[TrxRef; 2]>,
    /// ALL placeholders reserved while building this message, in order.
    pub wildcards: SmallVec<[TermRef; 1]>,
    pub committed: bool,
}

impl Message {
    pub(crate) fn new(frame: &FrameInfo, offset: usize) -> Self {
        Self {
            frame: frame.number,
            offset,
            timestamp_us: frame.timestamp_us,
            conversation: ConversationKey::new(&frame.src, &frame.dst),
            transactions: SmallVec::new(),
            wildcards: SmallVec::new(),
            committed: false,
        }
    }
}

/// One request/pending/reply/ack unit, possibly spanning several messages.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Message that first referenced this transaction.
    pub initial: MsgHandle,
    pub id: u32,
    pub kind: TrxType,
    pub pending_count: u32,
    pub error: u32,
    /// Commands of every message of this transaction, in creation order.
    pub commands: Vec<CmdRef>,
}

/// A logical call: terminations grouped under one context id.
#[derive(Debug, Clone)]
pub struct Context {
    /// Message that created this version of the context.
    pub initial: MsgHandle,
    pub id: u32,
    pub commands: Vec<CmdRef>,
    /// One entry per termination occurrence; entries may repeat a record.
    pub terms: Vec<TermRef>,
    /// Previous context that used the same numeric id.
    pub prev: Option<CtxRef>,
}

impl Context {
    pub(crate) fn new(initial: MsgHandle, id: u32) -> Self {
        Self {
            initial,
            id,
            commands: Vec::new(),
            terms: Vec::new(),
            prev: None,
        }
    }
}

/// One command inside a transaction and a context.
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CmdType,
    /// Byte offset of the command body within its message.
    pub offset: usize,
    pub msg: MsgHandle,
    pub trx: TrxRef,
    pub ctx: CtxRef,
    pub terms: SmallVec<[TermRef; 2]>,
    pub error: u32,
    pub(crate) display: OnceCell<String>,
}

/// A gateway endpoint referenced by commands.
#[derive(Debug, Clone)]
pub struct Termination {
    pub name: CompactString,
    /// Raw id bytes; `None` for an ALL placeholder awaiting its fill-in.
    pub buffer: Option<Vec<u8>>,
    pub kind: TermType,
    pub bir: Option<CompactString>,
    pub nsap: Option<CompactString>,
    /// Message that first introduced this termination in its context.
    pub start: Option<MsgHandle>,
}

impl Termination {
    pub(crate) fn from_candidate(candidate: &TermCandidate, start: Option<MsgHandle>) -> Self {
        Self {
            name: candidate.name.clone(),
            buffer: Some(candidate.bytes.clone()),
            kind: TermType::Unknown,
            bir: None,
            nsap: None,
            start,
        }
    }

    pub(crate) fn placeholder(start: MsgHandle) -> Self {
        Self {
            name: CompactString::const_new("*"),
            buffer: None,
            kind: TermType::Unknown,
            bir: None,
            nsap: None,
            start: Some(start),
        }
    }

    pub(crate) fn choose() -> Self {
        Self {
            name: CompactString::const_new("$"),
            buffer: Some(Vec::new()),
            kind: TermType::Unknown,
            bir: None,
            nsap: None,
            start: None,
        }
    }

    /// True for an ALL placeholder whose concrete id is not known yet.
    pub fn is_placeholder(&self) -> bool {
        self.buffer.is_none()
    }
}

/// A termination id as decoded from the wire, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCandidate {
    pub name: CompactString,
    pub bytes: Vec<u8>,
}

impl TermCandidate {
    pub fn new(name: impl AsRef<str>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: CompactString::new(name.as_ref()),
            bytes: bytes.into(),
        }
    }

    /// Candidate whose display name is its own text.
    pub fn text(name: &str) -> Self {
        Self::new(name, name.as_bytes())
    }
}
