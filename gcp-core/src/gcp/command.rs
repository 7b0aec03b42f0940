//! Command ledger.

use std::cell::OnceCell;

use smallvec::SmallVec;
use tracing::trace;

use super::handle::{CmdRef, CtxRef, Store, TrxRef};
use super::session::GcpSession;
use super::{CmdType, Command, MessageRef, Phase};
use crate::error::CorrelationError;

impl GcpSession {
    /// Get or create the command at `offset` in `msg`.
    ///
    /// A new command is appended to both its transaction's and its
    /// context's command lists. A replayed message must find the command it
    /// created on its first pass.
    pub fn gcp_cmd(
        &mut self,
        msg: MessageRef,
        trx: TrxRef,
        ctx: CtxRef,
        kind: CmdType,
        offset: usize,
    ) -> Result<CmdRef, CorrelationError> {
        Self::check_scope(msg, trx)?;
        Self::check_scope(msg, ctx)?;

        if msg.phase == Phase::Replaying {
            let t = self.fetch(trx)?;
            return t
                .commands
                .iter()
                .copied()
                .find(|c| {
                    self.get(*c)
                        .is_some_and(|c| c.msg == msg.id && c.offset == offset)
                })
                .ok_or_else(|| CorrelationError::MissingCommand {
                    frame: self.get(msg.id).map_or(0, |m| m.frame),
                    trx_id: t.id,
                    offset,
                });
        }

        // Both owners must exist before anything is appended.
        self.fetch(trx)?;
        self.fetch(ctx)?;

        let store = match msg.phase {
            Phase::Transient => msg.id.store,
            _ => Store::Persistent,
        };
        let cmd = self.alloc(
            store,
            Command {
                kind,
                offset,
                msg: msg.id,
                trx,
                ctx,
                terms: SmallVec::new(),
                error: 0,
                display: OnceCell::new(),
            },
        );
        self.fetch_mut(trx)?.commands.push(cmd);
        self.fetch_mut(ctx)?.commands.push(cmd);
        trace!(kind = kind.label(), offset, "command appended");
        Ok(cmd)
    }

    /// Record an error descriptor decoded inside a command body.
    pub fn gcp_cmd_set_error(&mut self, cmd: CmdRef, code: u32) -> Result<(), CorrelationError> {
        let c = self.fetch_mut(cmd)?;
        c.error = code;
        c.display = OnceCell::new();
        Ok(())
    }
}
