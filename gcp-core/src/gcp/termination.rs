//! Termination resolver.
//!
//! Terminations are deduplicated by display name within a context. Every
//! reference still appends an occurrence to the context's list, so the list
//! doubles as the history of commands touching each termination.
//!
//! `*` references reserve a placeholder owned by the current message which a
//! later concrete reference in the same message fills in. While it is
//! unfilled, further `*` references in that message resolve to the same
//! placeholder; once filled, the next `*` reserves a new one.

use compact_str::CompactString;
use tracing::{debug, trace};

use super::handle::{CmdRef, CtxRef, Store, TermRef, TrxRef};
use super::session::GcpSession;
use super::{MessageRef, Phase, TermCandidate, TermType, Termination, Wildcard};
use crate::error::CorrelationError;

impl GcpSession {
    /// Resolve a termination id referenced by `cmd`.
    pub fn gcp_cmd_add_term(
        &mut self,
        msg: MessageRef,
        trx: TrxRef,
        cmd: CmdRef,
        candidate: &TermCandidate,
        wildcard: Wildcard,
    ) -> Result<TermRef, CorrelationError> {
        if wildcard == Wildcard::Choose {
            return Ok(self.choose_termination());
        }
        Self::check_scope(msg, trx)?;
        Self::check_scope(msg, cmd)?;

        let term = match msg.phase {
            Phase::Transient => {
                let term = self.alloc(
                    msg.id.store,
                    Termination::from_candidate(candidate, Some(msg.id)),
                );
                self.fetch_mut(cmd)?.terms.push(term);
                term
            }
            Phase::Replaying => return self.replay_term(msg, cmd, candidate, wildcard),
            Phase::Building => {
                let term = self.build_term(msg, cmd, candidate, wildcard)?;
                let ctx = self.fetch(cmd)?.ctx;
                self.fetch_mut(ctx)?.terms.push(term);
                self.fetch_mut(cmd)?.terms.push(term);
                term
            }
        };
        self.fetch_mut(cmd)?.display.take();
        Ok(term)
    }

    fn replay_term(
        &self,
        msg: MessageRef,
        cmd: CmdRef,
        candidate: &TermCandidate,
        wildcard: Wildcard,
    ) -> Result<TermRef, CorrelationError> {
        let c = self.fetch(cmd)?;
        let ctx = self.fetch(c.ctx)?;
        // The command's own references first, then the whole context.
        let lists = [c.terms.as_slice(), ctx.terms.as_slice()];
        let same_name = |t: &Termination| !t.is_placeholder() && t.name == candidate.name;
        let by_name = || lists.iter().find_map(|list| self.find_term(list, &same_name));

        let found = match wildcard {
            Wildcard::All => {
                // Placeholders keep their identity after being filled.
                let reserved = &self.fetch(msg.id)?.wildcards;
                lists
                    .iter()
                    .find_map(|list| list.iter().copied().find(|t| reserved.contains(t)))
                    .or_else(by_name)
            }
            _ => by_name(),
        };
        found.ok_or_else(|| CorrelationError::MissingTermination {
            frame: self.get(msg.id).map_or(0, |m| m.frame),
            name: candidate.name.to_string(),
        })
    }

    fn build_term(
        &mut self,
        msg: MessageRef,
        cmd: CmdRef,
        candidate: &TermCandidate,
        wildcard: Wildcard,
    ) -> Result<TermRef, CorrelationError> {
        let ctx = self.fetch(cmd)?.ctx;
        let terms = &self.fetch(ctx)?.terms;

        let found = self.find_term(terms, |t| {
            (!t.is_placeholder() && t.name == candidate.name)
                || (t.is_placeholder() && t.start == Some(msg.id))
        });

        if let Some(term) = found {
            let fill = wildcard != Wildcard::All
                && self.fetch(term)?.is_placeholder();
            if fill {
                self.fill_placeholder(ctx, term, candidate)?;
            }
            trace!(name = %candidate.name, "termination reused");
            return Ok(term);
        }

        if wildcard == Wildcard::All {
            let term = self.alloc(Store::Persistent, Termination::placeholder(msg.id));
            self.fetch_mut(msg.id)?.wildcards.push(term);
            debug!("termination placeholder reserved");
            return Ok(term);
        }

        debug!(name = %candidate.name, "new termination");
        Ok(self.alloc(
            Store::Persistent,
            Termination::from_candidate(candidate, Some(msg.id)),
        ))
    }

    fn find_term(
        &self,
        list: &[TermRef],
        pred: impl Fn(&Termination) -> bool,
    ) -> Option<TermRef> {
        list.iter()
            .copied()
            .find(|t| self.get(*t).is_some_and(&pred))
    }

    /// Give a placeholder its concrete id. Summaries of this message's
    /// commands in `ctx` that already reference it pick up the new name.
    fn fill_placeholder(
        &mut self,
        ctx: CtxRef,
        term: TermRef,
        candidate: &TermCandidate,
    ) -> Result<(), CorrelationError> {
        let t = self.fetch_mut(term)?;
        t.name = candidate.name.clone();
        t.buffer = Some(candidate.bytes.clone());
        debug!(name = %candidate.name, "termination placeholder filled");

        let commands = self.fetch(ctx)?.commands.clone();
        for cmd in commands {
            if let Some(c) = self.get_mut(cmd).filter(|c| c.terms.contains(&term)) {
                c.display.take();
            }
        }
        Ok(())
    }

    /// Writable termination for bearer details, if this phase may write.
    fn term_for_update(
        &mut self,
        msg: MessageRef,
        term: TermRef,
    ) -> Result<Option<&mut Termination>, CorrelationError> {
        if term.store == Store::Sentinel || msg.phase == Phase::Replaying {
            return Ok(None);
        }
        self.fetch_mut(term).map(Some)
    }

    /// Set the coarse type of a resolved termination.
    pub fn gcp_term_set_type(
        &mut self,
        msg: MessageRef,
        term: TermRef,
        kind: TermType,
    ) -> Result<(), CorrelationError> {
        if let Some(t) = self.term_for_update(msg, term)? {
            t.kind = kind;
        }
        Ok(())
    }

    /// Attach the bearer NSAP address decoded by a package parameter.
    pub fn gcp_term_set_nsap(
        &mut self,
        msg: MessageRef,
        term: TermRef,
        nsap: &str,
    ) -> Result<(), CorrelationError> {
        if let Some(t) = self.term_for_update(msg, term)? {
            t.nsap = Some(CompactString::new(nsap));
        }
        Ok(())
    }

    /// Attach the bearer identification (BIR) decoded by a package parameter.
    pub fn gcp_term_set_bir(
        &mut self,
        msg: MessageRef,
        term: TermRef,
        bir: &str,
    ) -> Result<(), CorrelationError> {
        if let Some(t) = self.term_for_update(msg, term)? {
            t.bir = Some(CompactString::new(bir));
        }
        Ok(())
    }
}
