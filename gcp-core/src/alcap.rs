//! ALCAP (Q.2630) leg tracking.
//!
//! An AAL2 bearer leg is set up by an ERQ/ECF exchange and torn down by
//! REL/RLC. Each side names the leg by its own signalling association id, so
//! a leg is indexed under both. Legs whose ERQ carried a destination NSAP and
//! a served-user generated reference are also indexed by bearer key, which
//! is how H.248 terminations carrying the same NSAP/BIR find them.

use std::collections::HashMap;

use compact_str::CompactString;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::field::FieldValue;
use crate::tree::{NodeId, Span, TreeSink};

/// ALCAP message types relevant to leg tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlcapMsgType {
    /// Establish confirm
    Ecf = 4,
    /// Establish request
    Erq = 5,
    /// Release confirm
    Rlc = 6,
    /// Release request
    Rel = 7,
}

impl AlcapMsgType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            4 => Some(AlcapMsgType::Ecf),
            5 => Some(AlcapMsgType::Erq),
            6 => Some(AlcapMsgType::Rlc),
            7 => Some(AlcapMsgType::Rel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlcapMsgType::Ecf => "ECF",
            AlcapMsgType::Erq => "ERQ",
            AlcapMsgType::Rlc => "RLC",
            AlcapMsgType::Rel => "REL",
        }
    }
}

/// Leg-relevant parameters of one decoded ALCAP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlcapMessage {
    pub kind: AlcapMsgType,
    /// Destination signalling association id (message header).
    pub dsaid: u32,
    /// Originating signalling association id (OSAI parameter).
    pub osaid: Option<u32>,
    pub path_id: Option<u32>,
    pub cid: Option<u8>,
    /// Served-user generated reference (SUGR parameter).
    pub sugr: Option<u32>,
    pub orig_nsap: Option<CompactString>,
    pub dest_nsap: Option<CompactString>,
    /// Cause value of a REL.
    pub cause: Option<u8>,
}

impl AlcapMessage {
    pub fn new(kind: AlcapMsgType, dsaid: u32) -> Self {
        Self {
            kind,
            dsaid,
            osaid: None,
            path_id: None,
            cid: None,
            sugr: None,
            orig_nsap: None,
            dest_nsap: None,
            cause: None,
        }
    }

    pub fn with_osaid(mut self, osaid: u32) -> Self {
        self.osaid = Some(osaid);
        self
    }

    pub fn with_channel(mut self, path_id: u32, cid: u8) -> Self {
        self.path_id = Some(path_id);
        self.cid = Some(cid);
        self
    }

    pub fn with_sugr(mut self, sugr: u32) -> Self {
        self.sugr = Some(sugr);
        self
    }

    pub fn with_dest_nsap(mut self, nsap: &str) -> Self {
        self.dest_nsap = Some(CompactString::new(nsap));
        self
    }

    pub fn with_orig_nsap(mut self, nsap: &str) -> Self {
        self.orig_nsap = Some(CompactString::new(nsap));
        self
    }

    pub fn with_cause(mut self, cause: u8) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// A message recorded on a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegEvent {
    pub frame: u64,
    pub kind: AlcapMsgType,
}

/// Snapshot of a tracked leg, as handed to other dissectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegSummary {
    pub osaid: u32,
    pub dsaid: Option<u32>,
    pub path_id: Option<u32>,
    pub cid: Option<u8>,
    pub sugr: Option<u32>,
    pub orig_nsap: Option<CompactString>,
    pub dest_nsap: Option<CompactString>,
    pub release_cause: Option<u8>,
    pub events: SmallVec<[LegEvent; 4]>,
}

impl LegSummary {
    /// Add the leg's fields under `parent`, marked as generated.
    pub fn emit(&self, tree: &mut dyn TreeSink, parent: NodeId) -> NodeId {
        let leg = tree.add_subtree(Some(parent), "[ ALCAP Leg ]");
        tree.set_generated(leg);

        let field = |tree: &mut dyn TreeSink, name: &'static str, value: FieldValue| {
            let node = tree.add_field(Some(leg), name, value, Span::GENERATED);
            tree.set_generated(node);
        };
        field(tree, "alcap.leg.osaid", FieldValue::UInt32(self.osaid));
        if let Some(dsaid) = self.dsaid {
            field(tree, "alcap.leg.dsaid", FieldValue::UInt32(dsaid));
        }
        if let Some(path_id) = self.path_id {
            field(tree, "alcap.leg.pathid", FieldValue::UInt32(path_id));
        }
        if let Some(cid) = self.cid {
            field(tree, "alcap.leg.cid", FieldValue::UInt8(cid));
        }
        if let Some(cause) = self.release_cause {
            field(tree, "alcap.leg.cause", FieldValue::UInt8(cause));
        }
        for event in &self.events {
            let node = tree.add_field(
                Some(leg),
                "alcap.leg.msg",
                FieldValue::UInt64(event.frame),
                Span::GENERATED,
            );
            tree.append_text(node, &format!(" {}", event.kind.as_str()));
            tree.set_generated(node);
        }
        leg
    }
}

/// Read-only access to tracked legs by bearer key.
pub trait LegLookup {
    /// Look up a leg by `lowercase("<nsap>:<bir>")`, see [`bearer_key`].
    fn lookup_leg_by_bearer_key(&self, key: &str) -> Option<LegSummary>;
}

/// Lookup that never finds a leg, for hosts without ALCAP tracking.
#[derive(Clone, Debug, Default)]
pub struct NoLegs;

impl LegLookup for NoLegs {
    fn lookup_leg_by_bearer_key(&self, _key: &str) -> Option<LegSummary> {
        None
    }
}

/// Bearer key joining an H.248 termination's NSAP/BIR to an ALCAP leg.
pub fn bearer_key(nsap: &str, bir: &str) -> CompactString {
    CompactString::new(format!("{nsap}:{bir}").to_ascii_lowercase())
}

/// Identifier of a leg within a [`LegTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LegId(usize);

/// Leg state built from ALCAP messages as frames are decoded.
#[derive(Debug, Default)]
pub struct LegTable {
    legs: Vec<LegSummary>,
    /// Leg recorded for each frame, so revisiting a frame changes nothing.
    by_frame: HashMap<u64, LegId>,
    by_osaid: HashMap<u32, LegId>,
    by_dsaid: HashMap<u32, LegId>,
    by_bearer: HashMap<CompactString, LegId>,
}

impl LegTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn leg(&self, id: LegId) -> Option<&LegSummary> {
        self.legs.get(id.0)
    }

    /// Record `msg` decoded from `frame` and return the leg it belongs to.
    ///
    /// Returns `None` for confirmations and releases of unknown legs.
    pub fn record(&mut self, frame: u64, msg: &AlcapMessage) -> Option<LegId> {
        if let Some(&id) = self.by_frame.get(&frame) {
            trace!(frame, "alcap frame already recorded");
            return Some(id);
        }

        let id = match msg.kind {
            AlcapMsgType::Erq => self.establish(msg)?,
            AlcapMsgType::Ecf => {
                let id = self.find(msg.dsaid)?;
                if let Some(osaid) = msg.osaid {
                    self.legs[id.0].dsaid = Some(osaid);
                    self.by_dsaid.insert(osaid, id);
                }
                id
            }
            AlcapMsgType::Rel => {
                let id = self.find(msg.dsaid)?;
                self.legs[id.0].release_cause = msg.cause;
                id
            }
            AlcapMsgType::Rlc => self.find(msg.dsaid)?,
        };

        self.legs[id.0].events.push(LegEvent {
            frame,
            kind: msg.kind,
        });
        self.by_frame.insert(frame, id);
        Some(id)
    }

    fn establish(&mut self, msg: &AlcapMessage) -> Option<LegId> {
        let Some(osaid) = msg.osaid else {
            warn!("alcap ERQ without originating association id");
            return None;
        };
        let id = LegId(self.legs.len());
        self.legs.push(LegSummary {
            osaid,
            dsaid: None,
            path_id: msg.path_id,
            cid: msg.cid,
            sugr: msg.sugr,
            orig_nsap: msg.orig_nsap.clone(),
            dest_nsap: msg.dest_nsap.clone(),
            release_cause: None,
            events: SmallVec::new(),
        });
        self.by_osaid.insert(osaid, id);

        if let (Some(nsap), Some(sugr)) = (&msg.dest_nsap, msg.sugr) {
            let key = bearer_key(nsap, &format!("{sugr:08X}"));
            debug!(%key, osaid, "alcap leg indexed by bearer");
            self.by_bearer.insert(key, id);
        } else {
            debug!(osaid, "new alcap leg");
        }
        Some(id)
    }

    /// Find a leg by the association id a message is addressed to.
    fn find(&self, said: u32) -> Option<LegId> {
        let found = self
            .by_osaid
            .get(&said)
            .or_else(|| self.by_dsaid.get(&said))
            .copied();
        if found.is_none() {
            warn!(said, "alcap message for unknown leg");
        }
        found
    }
}

impl LegLookup for LegTable {
    fn lookup_leg_by_bearer_key(&self, key: &str) -> Option<LegSummary> {
        let id = self.by_bearer.get(key)?;
        self.legs.get(id.0).cloned()
    }
}
