//! Session arenas and the message, transaction and context registries.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace, warn};

use super::handle::{CtxRef, Handle, MsgHandle, Store, TermRef, TrxRef};
use super::{
    Command, Context, FrameInfo, Message, MessageRef, Phase, Termination, Transaction, TrxType,
    CHOOSE_CONTEXT,
};
use crate::config::{FrameOrderPolicy, GcpConfig};
use crate::conversation::ConversationKey;
use crate::error::CorrelationError;

/// Record storage for one scope (session or transient message).
#[derive(Debug, Default)]
pub(crate) struct Arena {
    messages: Vec<Message>,
    transactions: Vec<Transaction>,
    contexts: Vec<Context>,
    commands: Vec<Command>,
    terminations: Vec<Termination>,
}

impl Arena {
    fn clear(&mut self) {
        self.messages.clear();
        self.transactions.clear();
        self.contexts.clear();
        self.commands.clear();
        self.terminations.clear();
    }
}

/// A record type stored in an [`Arena`].
pub(crate) trait Record: Sized {
    const KIND: &'static str;
    fn slots(arena: &Arena) -> &Vec<Self>;
    fn slots_mut(arena: &mut Arena) -> &mut Vec<Self>;
}

macro_rules! impl_record {
    ($ty:ty, $field:ident, $kind:literal) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;
            fn slots(arena: &Arena) -> &Vec<Self> {
                &arena.$field
            }
            fn slots_mut(arena: &mut Arena) -> &mut Vec<Self> {
                &mut arena.$field
            }
        }
    };
}

impl_record!(Message, messages, "message");
impl_record!(Transaction, transactions, "transaction");
impl_record!(Context, contexts, "context");
impl_record!(Command, commands, "command");
impl_record!(Termination, terminations, "termination");

type TrxKey = (ConversationKey, u32);
type CtxKey = (ConversationKey, u32);

/// Registry sizes, for monitoring and replay checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub messages: usize,
    pub transactions: usize,
    pub contexts: usize,
    /// Contexts that replaced an earlier context with the same id.
    pub context_versions: usize,
    pub commands: usize,
    pub terminations: usize,
    /// Termination occurrences recorded across all contexts.
    pub term_associations: usize,
}

/// Correlation state for one open capture.
///
/// All records live in session-owned arenas and refer to each other by
/// [`Handle`]. Dropping or [`reset`](Self::reset)ting the session discards
/// everything at once.
#[derive(Debug)]
pub struct GcpSession {
    config: GcpConfig,
    pub(crate) persistent: Arena,
    pub(crate) scratch: Arena,
    pub(crate) scratch_generation: u32,
    pub(crate) choose_term: Termination,
    messages: BTreeMap<(u64, usize), MsgHandle>,
    transactions: HashMap<TrxKey, TrxRef>,
    ctx_by_trx: HashMap<TrxKey, CtxRef>,
    ctx_by_id: HashMap<CtxKey, CtxRef>,
    last_frame: Option<u64>,
}

impl GcpSession {
    pub fn new(config: GcpConfig) -> Self {
        Self {
            config,
            persistent: Arena::default(),
            scratch: Arena::default(),
            scratch_generation: 0,
            choose_term: Termination::choose(),
            messages: BTreeMap::new(),
            transactions: HashMap::new(),
            ctx_by_trx: HashMap::new(),
            ctx_by_id: HashMap::new(),
            last_frame: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GcpConfig::default())
    }

    pub fn config(&self) -> &GcpConfig {
        &self.config
    }

    /// Discard all correlation state (capture closed).
    ///
    /// Handles obtained before the reset must not be used afterwards.
    pub fn reset(&mut self) {
        debug!(messages = self.messages.len(), "resetting gcp session");
        self.persistent.clear();
        self.scratch.clear();
        self.scratch_generation = self.scratch_generation.wrapping_add(1);
        self.messages.clear();
        self.transactions.clear();
        self.ctx_by_trx.clear();
        self.ctx_by_id.clear();
        self.last_frame = None;
    }

    pub fn stats(&self) -> SessionStats {
        let arena = &self.persistent;
        SessionStats {
            messages: arena.messages.len(),
            transactions: arena.transactions.len(),
            contexts: arena.contexts.len(),
            context_versions: arena.contexts.iter().filter(|c| c.prev.is_some()).count(),
            commands: arena.commands.len(),
            terminations: arena.terminations.len(),
            term_associations: arena.contexts.iter().map(|c| c.terms.len()).sum(),
        }
    }

    // ------------------------------------------------------------------
    // Arena access
    // ------------------------------------------------------------------

    fn arena(&self, store: Store) -> Option<&Arena> {
        match store {
            Store::Persistent => Some(&self.persistent),
            Store::Scratch(generation) if generation == self.scratch_generation => {
                Some(&self.scratch)
            }
            _ => None,
        }
    }

    fn arena_mut(&mut self, store: Store) -> Option<&mut Arena> {
        match store {
            Store::Persistent => Some(&mut self.persistent),
            Store::Scratch(generation) if generation == self.scratch_generation => {
                Some(&mut self.scratch)
            }
            _ => None,
        }
    }

    pub(crate) fn get<T: Record>(&self, handle: Handle<T>) -> Option<&T> {
        T::slots(self.arena(handle.store)?).get(handle.index as usize)
    }

    pub(crate) fn get_mut<T: Record>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        T::slots_mut(self.arena_mut(handle.store)?).get_mut(handle.index as usize)
    }

    pub(crate) fn fetch<T: Record>(&self, handle: Handle<T>) -> Result<&T, CorrelationError> {
        self.get(handle)
            .ok_or(CorrelationError::StaleHandle { kind: T::KIND })
    }

    pub(crate) fn fetch_mut<T: Record>(
        &mut self,
        handle: Handle<T>,
    ) -> Result<&mut T, CorrelationError> {
        self.get_mut(handle)
            .ok_or(CorrelationError::StaleHandle { kind: T::KIND })
    }

    pub(crate) fn alloc<T: Record>(&mut self, store: Store, record: T) -> Handle<T> {
        let arena = match store {
            Store::Persistent => &mut self.persistent,
            Store::Scratch(_) | Store::Sentinel => &mut self.scratch,
        };
        let slots = T::slots_mut(arena);
        let index = slots.len() as u32;
        slots.push(record);
        Handle::new(store, index)
    }

    /// Fail unless `handle` lives in the same scope as `msg`.
    pub(crate) fn check_scope<T: Record>(
        msg: MessageRef,
        handle: Handle<T>,
    ) -> Result<(), CorrelationError> {
        if handle.store == msg.id.store {
            Ok(())
        } else {
            Err(CorrelationError::StaleHandle { kind: T::KIND })
        }
    }

    // ------------------------------------------------------------------
    // Public accessors
    // ------------------------------------------------------------------

    pub fn message(&self, msg: MsgHandle) -> Option<&Message> {
        self.get(msg)
    }

    pub fn transaction(&self, trx: TrxRef) -> Option<&Transaction> {
        self.get(trx)
    }

    pub fn context(&self, ctx: CtxRef) -> Option<&Context> {
        self.get(ctx)
    }

    pub fn command(&self, cmd: super::CmdRef) -> Option<&Command> {
        self.get(cmd)
    }

    pub fn termination(&self, term: TermRef) -> Option<&Termination> {
        match term.store {
            Store::Sentinel => Some(&self.choose_term),
            _ => self.get(term),
        }
    }

    /// Handle of the shared `$` termination.
    pub fn choose_termination(&self) -> TermRef {
        Handle::new(Store::Sentinel, 0)
    }

    /// Walk the version chain of a context, newest first.
    pub fn context_versions(&self, ctx: CtxRef) -> impl Iterator<Item = CtxRef> + '_ {
        std::iter::successors(Some(ctx), move |c| self.get(*c).and_then(|c| c.prev))
            .filter(move |c| self.get(*c).is_some())
    }

    /// Frame number of the message that created `ctx`.
    fn context_frame(&self, ctx: CtxRef) -> Option<u64> {
        let initial = self.get(ctx)?.initial;
        self.get(initial).map(|m| m.frame)
    }

    /// The version of a context chain that existed when `frame` was first
    /// processed.
    pub(crate) fn version_at(&self, head: CtxRef, frame: u64) -> Option<CtxRef> {
        self.context_versions(head)
            .find(|c| self.context_frame(*c).is_some_and(|f| f <= frame))
    }

    // ------------------------------------------------------------------
    // Message registry
    // ------------------------------------------------------------------

    /// Get or create the message for `(frame, offset)`.
    ///
    /// In persistent mode a message seen before is returned in
    /// [`Phase::Replaying`]; otherwise a new message in [`Phase::Building`].
    /// Non-persistent calls always yield a fresh [`Phase::Transient`]
    /// message and release the previous transient one.
    pub fn gcp_msg(
        &mut self,
        frame: &FrameInfo,
        offset: usize,
        persistent: bool,
    ) -> Result<MessageRef, CorrelationError> {
        if !persistent {
            self.scratch.clear();
            self.scratch_generation = self.scratch_generation.wrapping_add(1);
            let store = Store::Scratch(self.scratch_generation);
            let id = self.alloc(store, Message::new(frame, offset));
            trace!(frame = frame.number, offset, "transient gcp message");
            return Ok(MessageRef {
                id,
                phase: Phase::Transient,
            });
        }

        if let Some(&id) = self.messages.get(&(frame.number, offset)) {
            self.fetch_mut(id)?.committed = true;
            trace!(frame = frame.number, offset, "replaying committed gcp message");
            return Ok(MessageRef {
                id,
                phase: Phase::Replaying,
            });
        }

        self.check_frame_order(frame.number)?;
        let id = self.alloc(Store::Persistent, Message::new(frame, offset));
        self.messages.insert((frame.number, offset), id);
        debug!(frame = frame.number, offset, "new gcp message");
        Ok(MessageRef {
            id,
            phase: Phase::Building,
        })
    }

    fn check_frame_order(&mut self, frame: u64) -> Result<(), CorrelationError> {
        if let Some(last_frame) = self.last_frame.filter(|last| frame < *last) {
            match self.config.frame_order {
                FrameOrderPolicy::Trust => {}
                FrameOrderPolicy::Warn => {
                    warn!(frame, last_frame, "frame first visited out of order");
                }
                FrameOrderPolicy::Reject => {
                    return Err(CorrelationError::FrameOutOfOrder { frame, last_frame });
                }
            }
        }
        self.last_frame = Some(self.last_frame.map_or(frame, |last| last.max(frame)));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transaction registry
    // ------------------------------------------------------------------

    /// Get or create the transaction `id` referenced by `msg`.
    ///
    /// Transactions are keyed by conversation and id so that a reply in the
    /// opposite direction resolves to the request's record.
    pub fn gcp_trx(
        &mut self,
        msg: MessageRef,
        id: u32,
        kind: TrxType,
    ) -> Result<TrxRef, CorrelationError> {
        match msg.phase {
            Phase::Transient => {
                let trx = self.alloc(msg.id.store, Transaction::new(msg.id, id, kind));
                self.fetch_mut(msg.id)?.transactions.push(trx);
                Ok(trx)
            }
            Phase::Replaying => {
                let m = self.fetch(msg.id)?;
                m.transactions
                    .iter()
                    .copied()
                    .find(|t| self.get(*t).is_some_and(|t| t.id == id))
                    .ok_or(CorrelationError::MissingTransaction {
                        frame: m.frame,
                        trx_id: id,
                    })
            }
            Phase::Building => {
                let conversation = self.fetch(msg.id)?.conversation;
                let key = (conversation, id);
                let trx = match self.transactions.get(&key).copied() {
                    Some(trx) => {
                        let t = self.fetch_mut(trx)?;
                        if kind == TrxType::Pending {
                            t.pending_count += 1;
                        } else {
                            t.kind = kind;
                        }
                        trace!(trx_id = id, kind = kind.as_str(), "continuing transaction");
                        trx
                    }
                    None => {
                        let trx =
                            self.alloc(Store::Persistent, Transaction::new(msg.id, id, kind));
                        self.transactions.insert(key, trx);
                        debug!(trx_id = id, kind = kind.as_str(), %conversation, "new transaction");
                        trx
                    }
                };
                let m = self.fetch_mut(msg.id)?;
                if !m.transactions.contains(&trx) {
                    m.transactions.push(trx);
                }
                Ok(trx)
            }
        }
    }

    /// Record an error descriptor that applies to a whole transaction.
    pub fn gcp_trx_set_error(&mut self, trx: TrxRef, code: u32) -> Result<(), CorrelationError> {
        self.fetch_mut(trx)?.error = code;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Context registry
    // ------------------------------------------------------------------

    /// Get or create the context `id` addressed by `trx` in `msg`.
    ///
    /// `CHOOSE_CONTEXT` yields one new context per transaction. A concrete id
    /// resolves through the by-transaction and by-id maps; when a transaction
    /// binds an id already owned by a different context, a new version is
    /// pushed onto that id's chain. Replayed messages walk the chain back to
    /// the version that existed at their frame.
    pub fn gcp_ctx(
        &mut self,
        msg: MessageRef,
        trx: TrxRef,
        id: u32,
    ) -> Result<CtxRef, CorrelationError> {
        Self::check_scope(msg, trx)?;
        match msg.phase {
            Phase::Transient => Ok(self.alloc(msg.id.store, Context::new(msg.id, id))),
            Phase::Replaying => self.replay_ctx(msg, trx, id),
            Phase::Building => self.build_ctx(msg, trx, id),
        }
    }

    fn replay_ctx(
        &self,
        msg: MessageRef,
        trx: TrxRef,
        id: u32,
    ) -> Result<CtxRef, CorrelationError> {
        let m = self.fetch(msg.id)?;
        let trx_id = self.fetch(trx)?.id;
        let missing = CorrelationError::MissingContext {
            frame: m.frame,
            trx_id,
            ctx_id: id,
        };

        // The by-transaction entry holds the context the transaction touched
        // last; it only answers for the same id (or for CHOOSE).
        if let Some(ctx) = self.ctx_by_trx.get(&(m.conversation, trx_id)).copied() {
            let bound = self.fetch(ctx)?.id;
            if id == CHOOSE_CONTEXT || bound == id {
                return Ok(ctx);
            }
        }
        if id == CHOOSE_CONTEXT {
            return Err(missing);
        }

        let head = self
            .ctx_by_id
            .get(&(m.conversation, id))
            .copied()
            .ok_or(missing)?;
        self.version_at(head, m.frame)
            .ok_or(CorrelationError::ContextChainExhausted {
                frame: m.frame,
                ctx_id: id,
            })
    }

    fn build_ctx(
        &mut self,
        msg: MessageRef,
        trx: TrxRef,
        id: u32,
    ) -> Result<CtxRef, CorrelationError> {
        let conversation = self.fetch(msg.id)?.conversation;
        let trx_id = self.fetch(trx)?.id;
        let trx_key = (conversation, trx_id);

        // Context this transaction already holds for the requested id, or a
        // CHOOSE context still waiting for its id.
        let by_trx = self
            .ctx_by_trx
            .get(&trx_key)
            .copied()
            .filter(|c| {
                self.get(*c)
                    .is_some_and(|c| c.id == CHOOSE_CONTEXT || c.id == id)
            });

        if id == CHOOSE_CONTEXT {
            if let Some(ctx) = by_trx {
                return Ok(ctx);
            }
            let ctx = self.alloc(Store::Persistent, Context::new(msg.id, CHOOSE_CONTEXT));
            self.ctx_by_trx.insert(trx_key, ctx);
            debug!(trx_id, "new context (choose)");
            return Ok(ctx);
        }

        let id_key = (conversation, id);
        let by_id = self.ctx_by_id.get(&id_key).copied();

        let ctx = match (by_trx, by_id) {
            (Some(t), Some(i)) if t == i => t,
            (Some(t), Some(i)) => {
                // The id now names a context logically different from the
                // one it named before: push a new version.
                let version = if self.fetch(t)?.id == CHOOSE_CONTEXT {
                    t
                } else {
                    self.alloc(Store::Persistent, Context::new(msg.id, id))
                };
                let c = self.fetch_mut(version)?;
                c.id = id;
                c.initial = msg.id;
                c.prev = Some(i);
                self.ctx_by_id.insert(id_key, version);
                debug!(ctx_id = id, trx_id, "new context version");
                version
            }
            (Some(t), None) => {
                self.fetch_mut(t)?.id = id;
                self.ctx_by_id.insert(id_key, t);
                debug!(ctx_id = id, trx_id, "choose context bound to id");
                t
            }
            (None, Some(i)) => i,
            (None, None) => {
                let ctx = self.alloc(Store::Persistent, Context::new(msg.id, id));
                self.ctx_by_id.insert(id_key, ctx);
                debug!(ctx_id = id, trx_id, "new context");
                ctx
            }
        };

        self.ctx_by_trx.insert(trx_key, ctx);
        Ok(ctx)
    }
}

impl Default for GcpSession {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Transaction {
    pub(crate) fn new(initial: MsgHandle, id: u32, kind: TrxType) -> Self {
        Self {
            initial,
            id,
            kind,
            pending_count: u32::from(kind == TrxType::Pending),
            error: 0,
            commands: Vec::new(),
        }
    }
}
