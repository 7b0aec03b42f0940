//! Decoded H.248 message model.
//!
//! This is the typed output of the BER decoding layer: ids are carried as
//! decoded (up to 64 bits) together with the offsets the values were found
//! at. The builder methods let hosts and tests assemble messages without a
//! BER encoder.

use std::fmt::Write as _;

use compact_str::CompactString;

use crate::gcp::{CmdType, TermCandidate, TermType, TrxType, Wildcard, CHOOSE_CONTEXT};

/// One H.248 message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    pub transactions: Vec<DecodedTransaction>,
}

impl DecodedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction(mut self, trx: DecodedTransaction) -> Self {
        self.transactions.push(trx);
        self
    }
}

/// A transaction request, pending, reply or response acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub kind: TrxType,
    /// Transaction id as decoded; may exceed 32 bits on malformed input.
    pub id: u64,
    pub offset: usize,
    pub actions: Vec<DecodedAction>,
    /// Transaction-level error descriptor.
    pub error: Option<u32>,
}

impl DecodedTransaction {
    pub fn new(kind: TrxType, id: u64) -> Self {
        Self {
            kind,
            id,
            offset: 0,
            actions: Vec::new(),
            error: None,
        }
    }

    pub fn request(id: u64) -> Self {
        Self::new(TrxType::Request, id)
    }

    pub fn reply(id: u64) -> Self {
        Self::new(TrxType::Reply, id)
    }

    pub fn pending(id: u64) -> Self {
        Self::new(TrxType::Pending, id)
    }

    pub fn ack(id: u64) -> Self {
        Self::new(TrxType::Ack, id)
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn action(mut self, action: DecodedAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn error(mut self, code: u32) -> Self {
        self.error = Some(code);
        self
    }
}

/// An action request or reply: the commands addressed to one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAction {
    pub context_id: u64,
    pub offset: usize,
    pub commands: Vec<DecodedCommand>,
    /// Error descriptor of an action reply.
    pub error: Option<u32>,
}

impl DecodedAction {
    pub fn new(context_id: u64) -> Self {
        Self {
            context_id,
            offset: 0,
            commands: Vec::new(),
            error: None,
        }
    }

    /// Action on context `$`.
    pub fn choose() -> Self {
        Self::new(u64::from(CHOOSE_CONTEXT))
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn command(mut self, cmd: DecodedCommand) -> Self {
        self.commands.push(cmd);
        self
    }

    pub fn error(mut self, code: u32) -> Self {
        self.error = Some(code);
        self
    }
}

/// A command request or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCommand {
    pub kind: CmdType,
    /// Offset of the command body; identifies the command within its message.
    pub offset: usize,
    pub terminations: Vec<DecodedTermination>,
    pub error: Option<u32>,
}

impl DecodedCommand {
    pub fn new(kind: CmdType, offset: usize) -> Self {
        Self {
            kind,
            offset,
            terminations: Vec::new(),
            error: None,
        }
    }

    pub fn term(mut self, term: DecodedTermination) -> Self {
        self.terminations.push(term);
        self
    }

    pub fn error(mut self, code: u32) -> Self {
        self.error = Some(code);
        self
    }
}

/// A termination id plus the bearer details package decoders found for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTermination {
    pub bytes: Vec<u8>,
    pub wildcard: Wildcard,
    pub offset: usize,
    pub kind: TermType,
    pub nsap: Option<CompactString>,
    pub bir: Option<CompactString>,
}

impl DecodedTermination {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            wildcard: Wildcard::None,
            offset: 0,
            kind: TermType::Unknown,
            nsap: None,
            bir: None,
        }
    }

    /// Termination whose id is the given text.
    pub fn text(name: &str) -> Self {
        Self::new(name.as_bytes())
    }

    /// `$` termination.
    pub fn choose() -> Self {
        Self::new(b"$".as_slice()).wildcard(Wildcard::Choose)
    }

    /// `*`-wildcarded termination id.
    pub fn all(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes).wildcard(Wildcard::All)
    }

    pub fn wildcard(mut self, wildcard: Wildcard) -> Self {
        self.wildcard = wildcard;
        self
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn kind(mut self, kind: TermType) -> Self {
        self.kind = kind;
        self
    }

    pub fn nsap(mut self, nsap: &str) -> Self {
        self.nsap = Some(CompactString::new(nsap));
        self
    }

    pub fn bir(mut self, bir: &str) -> Self {
        self.bir = Some(CompactString::new(bir));
        self
    }

    /// Display name: the id text when printable, hex otherwise.
    pub fn display_name(&self) -> CompactString {
        match self.wildcard {
            Wildcard::Choose => return CompactString::const_new("$"),
            Wildcard::All if self.bytes.is_empty() => return CompactString::const_new("*"),
            _ => {}
        }
        if !self.bytes.is_empty() && self.bytes.iter().all(|b| b.is_ascii_graphic()) {
            // Printable ASCII is valid UTF-8.
            return CompactString::new(String::from_utf8_lossy(&self.bytes));
        }
        let mut name = CompactString::with_capacity(self.bytes.len() * 2);
        for byte in &self.bytes {
            let _ = write!(name, "{byte:02x}");
        }
        name
    }

    pub fn candidate(&self) -> TermCandidate {
        TermCandidate::new(self.display_name(), self.bytes.clone())
    }
}
