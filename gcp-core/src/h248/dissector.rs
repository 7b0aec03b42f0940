//! Message walk driving the correlation engine.

use tracing::{trace, warn};

use super::model::{
    DecodedAction, DecodedCommand, DecodedMessage, DecodedTermination, DecodedTransaction,
};
use super::{COMMAND_ERROR, CONTEXT_UNAVAILABLE, ID_OUT_OF_RANGE};
use crate::alcap::{LegLookup, NoLegs};
use crate::error::{CorrelationError, Result};
use crate::field::FieldValue;
use crate::gcp::{
    checked_id, CmdRef, CtxRef, FrameInfo, GcpFieldIds, GcpSession, MessageRef, TermRef,
    TermType, TrxRef, Wildcard, INVALID_TRANSACTION_ID, NULL_CONTEXT,
};
use crate::tree::{NodeId, Span, TreeSink};

/// Correlation handles for the current decode position.
///
/// Each subtree of the walk gets its own copy scoped to that subtree:
/// entering a transaction clears the context, command and termination, and
/// so on down. Package decoders reach the termination they belong to
/// through [`term`](Self::term).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    pub msg: MessageRef,
    trx: Option<TrxRef>,
    ctx: Option<CtxRef>,
    cmd: Option<CmdRef>,
    term: Option<TermRef>,
}

impl DecodeContext {
    pub fn new(msg: MessageRef) -> Self {
        Self {
            msg,
            trx: None,
            ctx: None,
            cmd: None,
            term: None,
        }
    }

    pub fn with_trx(self, trx: TrxRef) -> Self {
        Self {
            trx: Some(trx),
            ..Self::new(self.msg)
        }
    }

    pub fn with_ctx(self, ctx: CtxRef) -> Self {
        Self {
            ctx: Some(ctx),
            cmd: None,
            term: None,
            ..self
        }
    }

    pub fn with_cmd(self, cmd: CmdRef) -> Self {
        Self {
            cmd: Some(cmd),
            term: None,
            ..self
        }
    }

    pub fn with_term(self, term: TermRef) -> Self {
        Self {
            term: Some(term),
            ..self
        }
    }

    pub fn trx(&self) -> std::result::Result<TrxRef, CorrelationError> {
        self.trx
            .ok_or(CorrelationError::StaleHandle { kind: "transaction" })
    }

    pub fn ctx(&self) -> std::result::Result<CtxRef, CorrelationError> {
        self.ctx.ok_or(CorrelationError::StaleHandle { kind: "context" })
    }

    pub fn cmd(&self) -> std::result::Result<CmdRef, CorrelationError> {
        self.cmd.ok_or(CorrelationError::StaleHandle { kind: "command" })
    }

    /// Termination most recently resolved in the current command.
    pub fn term(&self) -> Option<TermRef> {
        self.term
    }
}

/// Drives a [`GcpSession`] from decoded H.248 messages.
pub struct H248Dissector<'a> {
    ids: GcpFieldIds,
    legs: &'a dyn LegLookup,
}

impl H248Dissector<'static> {
    pub fn new() -> Self {
        Self {
            ids: GcpFieldIds::default(),
            legs: &NoLegs,
        }
    }
}

impl Default for H248Dissector<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> H248Dissector<'a> {
    /// Join terminations to ALCAP legs tracked by `legs`.
    pub fn with_legs<'b>(self, legs: &'b dyn LegLookup) -> H248Dissector<'b> {
        H248Dissector {
            ids: self.ids,
            legs,
        }
    }

    pub fn with_field_ids(mut self, ids: GcpFieldIds) -> Self {
        self.ids = ids;
        self
    }

    /// Dissect one message found at `offset` in `frame` and return its
    /// summary line.
    ///
    /// Calling this again for the same frame and offset replays the
    /// correlation state built the first time.
    pub fn dissect(
        &self,
        session: &mut GcpSession,
        frame: &FrameInfo,
        offset: usize,
        msg: &DecodedMessage,
        tree: &mut dyn TreeSink,
    ) -> Result<String> {
        let persistent = session.config().track_context;
        let m = session.gcp_msg(frame, offset, persistent)?;
        let root = tree.add_subtree(None, "MEGACO");
        let dc = DecodeContext::new(m);

        for trx in &msg.transactions {
            self.dissect_transaction(session, dc, trx, tree, root)?;
        }

        if session.config().show_context_tree {
            session.gcp_analyze_msg(
                tree,
                Some(root),
                m.id,
                &self.ids,
                &COMMAND_ERROR,
                self.legs,
            )?;
        }

        let summary = session.gcp_msg_to_string(m.id);
        trace!(frame = frame.number, offset, %summary, "h248 message dissected");
        Ok(summary)
    }

    fn dissect_transaction(
        &self,
        session: &mut GcpSession,
        dc: DecodeContext,
        trx: &DecodedTransaction,
        tree: &mut dyn TreeSink,
        parent: NodeId,
    ) -> Result<()> {
        let node = tree.add_field(
            Some(parent),
            "h248.transactionId",
            FieldValue::UInt64(trx.id),
            Span::new(trx.offset, 0),
        );
        tree.append_text(node, &format!(" ({})", trx.kind.as_str()));
        let id = checked_id("transactionId", trx.id).unwrap_or_else(|_| {
            tree.add_expert(node, &ID_OUT_OF_RANGE);
            INVALID_TRANSACTION_ID
        });

        let t = session.gcp_trx(dc.msg, id, trx.kind)?;
        let dc = dc.with_trx(t);
        for action in &trx.actions {
            self.dissect_action(session, dc, action, tree, node)?;
        }

        if let Some(code) = trx.error {
            session.gcp_trx_set_error(t, code)?;
            tree.add_expert(node, &COMMAND_ERROR);
        }
        Ok(())
    }

    fn dissect_action(
        &self,
        session: &mut GcpSession,
        dc: DecodeContext,
        action: &DecodedAction,
        tree: &mut dyn TreeSink,
        parent: NodeId,
    ) -> Result<()> {
        let node = tree.add_field(
            Some(parent),
            "h248.contextId",
            FieldValue::UInt64(action.context_id),
            Span::new(action.offset, 0),
        );
        let id = checked_id("contextId", action.context_id).unwrap_or_else(|_| {
            tree.add_expert(node, &ID_OUT_OF_RANGE);
            NULL_CONTEXT
        });

        let ctx = match session.gcp_ctx(dc.msg, dc.trx()?, id) {
            Ok(ctx) => ctx,
            Err(err @ CorrelationError::ContextChainExhausted { .. }) => {
                // Shown instead of guessing; the action's commands are skipped.
                warn!(%err, "context unavailable");
                let na = tree.add_subtree(Some(node), "[ Context information unavailable ]");
                tree.add_expert(na, &CONTEXT_UNAVAILABLE);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let dc = dc.with_ctx(ctx);

        let mut last = None;
        for cmd in &action.commands {
            last = Some(self.dissect_command(session, dc, cmd, tree, node)?);
        }

        // An action reply's error belongs to its last command, or to the
        // transaction when the reply carries none.
        if let Some(code) = action.error {
            match last {
                Some(cmd) => session.gcp_cmd_set_error(cmd, code)?,
                None => session.gcp_trx_set_error(dc.trx()?, code)?,
            }
            tree.add_expert(node, &COMMAND_ERROR);
        }
        Ok(())
    }

    fn dissect_command(
        &self,
        session: &mut GcpSession,
        dc: DecodeContext,
        cmd: &DecodedCommand,
        tree: &mut dyn TreeSink,
        parent: NodeId,
    ) -> Result<CmdRef> {
        let node = tree.add_field(
            Some(parent),
            "h248.command",
            FieldValue::str(cmd.kind.label()),
            Span::new(cmd.offset, 0),
        );
        let c = session.gcp_cmd(dc.msg, dc.trx()?, dc.ctx()?, cmd.kind, cmd.offset)?;
        let mut dc = dc.with_cmd(c);

        for term in &cmd.terminations {
            let term_node = tree.add_field(
                Some(node),
                "h248.terminationId",
                FieldValue::str(term.display_name()),
                Span::new(term.offset, term.bytes.len()),
            );
            match term.wildcard {
                Wildcard::All => tree.append_text(term_node, " (all)"),
                Wildcard::Choose => tree.append_text(term_node, " (choose)"),
                Wildcard::None => {}
            }
            let resolved = session.gcp_cmd_add_term(
                dc.msg,
                dc.trx()?,
                dc.cmd()?,
                &term.candidate(),
                term.wildcard,
            )?;
            dc = dc.with_term(resolved);
            self.apply_bearer(session, &dc, term)?;
        }

        if let Some(code) = cmd.error {
            session.gcp_cmd_set_error(c, code)?;
            tree.add_expert(node, &COMMAND_ERROR);
        }
        Ok(c)
    }

    /// Thread package-decoded bearer details into the current termination.
    fn apply_bearer(
        &self,
        session: &mut GcpSession,
        dc: &DecodeContext,
        decoded: &DecodedTermination,
    ) -> Result<()> {
        let Some(term) = dc.term() else {
            return Ok(());
        };
        if decoded.kind != TermType::Unknown {
            session.gcp_term_set_type(dc.msg, term, decoded.kind)?;
        }
        if let Some(nsap) = &decoded.nsap {
            session.gcp_term_set_nsap(dc.msg, term, nsap)?;
        }
        if let Some(bir) = &decoded.bir {
            session.gcp_term_set_bir(dc.msg, term, bir)?;
        }
        Ok(())
    }
}
