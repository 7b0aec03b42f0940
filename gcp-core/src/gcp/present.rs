//! Context view emitted after a message has been decoded.

use std::collections::HashSet;

use super::handle::{CtxRef, MsgHandle};
use super::session::GcpSession;
use super::TermType;
use crate::alcap::{bearer_key, LegLookup};
use crate::error::CorrelationError;
use crate::field::FieldValue;
use crate::tree::{ExpertInfo, NodeId, Span, TreeSink};

/// Field names used by the context view.
///
/// Each protocol driving the engine registers its own names; the default
/// set is the H.248 one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcpFieldIds {
    pub ctx: &'static str,
    pub ctx_cmd: &'static str,
    pub ctx_term: &'static str,
    pub ctx_term_type: &'static str,
    pub ctx_term_bir: &'static str,
    pub ctx_term_nsap: &'static str,
}

impl Default for GcpFieldIds {
    fn default() -> Self {
        Self {
            ctx: "h248.ctx",
            ctx_cmd: "h248.ctx.cmd",
            ctx_term: "h248.ctx.term",
            ctx_term_type: "h248.ctx.term.type",
            ctx_term_bir: "h248.ctx.term.bir",
            ctx_term_nsap: "h248.ctx.term.nsap",
        }
    }
}

impl GcpSession {
    /// Emit the contexts touched by `msg`, with their full command history
    /// and the terminations they use.
    ///
    /// Every emitted node is generated. Commands with a non-zero error are
    /// annotated with `error_indicator`. Terminations carrying both NSAP and
    /// BIR are joined to their ALCAP leg through `legs`.
    pub fn gcp_analyze_msg(
        &self,
        tree: &mut dyn TreeSink,
        parent: Option<NodeId>,
        msg: MsgHandle,
        ids: &GcpFieldIds,
        error_indicator: &ExpertInfo,
        legs: &dyn LegLookup,
    ) -> Result<(), CorrelationError> {
        for ctx in self.touched_contexts(msg)? {
            self.present_context(tree, parent, ctx, ids, error_indicator, legs)?;
        }
        Ok(())
    }

    /// Distinct contexts reached through msg → transactions → commands.
    fn touched_contexts(&self, msg: MsgHandle) -> Result<Vec<CtxRef>, CorrelationError> {
        let mut seen = HashSet::new();
        let mut contexts = Vec::new();
        for trx in &self.fetch(msg)?.transactions {
            for cmd in &self.fetch(*trx)?.commands {
                let ctx = self.fetch(*cmd)?.ctx;
                if seen.insert(ctx) {
                    contexts.push(ctx);
                }
            }
        }
        Ok(contexts)
    }

    fn present_context(
        &self,
        tree: &mut dyn TreeSink,
        parent: Option<NodeId>,
        ctx: CtxRef,
        ids: &GcpFieldIds,
        error_indicator: &ExpertInfo,
        legs: &dyn LegLookup,
    ) -> Result<(), CorrelationError> {
        let context = self.fetch(ctx)?;
        let ctx_node = tree.add_field(
            parent,
            ids.ctx,
            FieldValue::UInt32(context.id),
            Span::GENERATED,
        );
        tree.set_generated(ctx_node);

        let history = tree.add_subtree(Some(ctx_node), "[ Command History ]");
        tree.set_generated(history);
        for cmd in &context.commands {
            let c = self.fetch(*cmd)?;
            let frame = self.fetch(c.msg)?.frame;
            let node = tree.add_field(
                Some(history),
                ids.ctx_cmd,
                FieldValue::UInt64(frame),
                Span::GENERATED,
            );
            tree.append_text(node, &format!("  {} ", self.gcp_cmd_to_string(*cmd)));
            tree.set_generated(node);
            if c.error != 0 {
                tree.add_expert(node, error_indicator);
            }
        }

        let used = tree.add_subtree(Some(ctx_node), "[ Terminations Used ]");
        tree.set_generated(used);
        let mut seen = HashSet::new();
        for term in &context.terms {
            if !seen.insert(*term) {
                continue;
            }
            let Some(t) = self.termination(*term) else {
                continue;
            };
            if t.is_placeholder() || t.name.is_empty() {
                continue;
            }

            let node = tree.add_field(
                Some(used),
                ids.ctx_term,
                FieldValue::str(&t.name),
                Span::GENERATED,
            );
            tree.set_generated(node);
            let mut detail = |name: &'static str, value: FieldValue| {
                let child = tree.add_field(Some(node), name, value, Span::GENERATED);
                tree.set_generated(child);
            };
            if t.kind != TermType::Unknown {
                detail(ids.ctx_term_type, FieldValue::UInt8(t.kind as u8));
            }
            if let Some(bir) = &t.bir {
                detail(ids.ctx_term_bir, FieldValue::str(bir));
            }
            if let Some(nsap) = &t.nsap {
                detail(ids.ctx_term_nsap, FieldValue::str(nsap));
            }

            if let (Some(nsap), Some(bir)) = (&t.nsap, &t.bir) {
                if let Some(leg) = legs.lookup_leg_by_bearer_key(&bearer_key(nsap, bir)) {
                    leg.emit(tree, node);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alcap::{AlcapMessage, AlcapMsgType, LegTable, NoLegs};
    use crate::conversation::Address;
    use crate::gcp::{CmdType, FrameInfo, TermCandidate, TrxType, Wildcard};
    use crate::tree::{ProtoTree, Severity};

    const CMD_ERROR: ExpertInfo = ExpertInfo {
        name: "h248.cmd_error",
        severity: Severity::Warn,
        summary: "command error",
    };

    fn frame(number: u64) -> FrameInfo {
        FrameInfo::new(number, Address::PointCode(1), Address::PointCode(2))
    }

    #[test]
    fn test_context_view() {
        let mut session = GcpSession::with_defaults();
        let m = session.gcp_msg(&frame(4), 0, true).unwrap();
        let t = session.gcp_trx(m, 1, TrxType::Request).unwrap();
        let c = session.gcp_ctx(m, t, 5).unwrap();
        let add = session.gcp_cmd(m, t, c, CmdType::AddReq, 10).unwrap();
        let term = session
            .gcp_cmd_add_term(m, t, add, &TermCandidate::text("A1"), Wildcard::None)
            .unwrap();
        session.gcp_term_set_type(m, term, TermType::Tdm).unwrap();
        let modify = session.gcp_cmd(m, t, c, CmdType::ModReq, 30).unwrap();
        session
            .gcp_cmd_add_term(m, t, modify, &TermCandidate::text("A1"), Wildcard::None)
            .unwrap();
        session.gcp_cmd_set_error(modify, 500).unwrap();

        let mut tree = ProtoTree::new();
        session
            .gcp_analyze_msg(&mut tree, None, m.id, &GcpFieldIds::default(), &CMD_ERROR, &NoLegs)
            .unwrap();

        let ctx = tree.find("h248.ctx").unwrap();
        assert_eq!(tree.node(ctx).value, FieldValue::UInt32(5));
        assert!(tree.node(ctx).generated);

        let cmds = tree.find_all("h248.ctx.cmd");
        assert_eq!(cmds.len(), 2);
        assert_eq!(tree.node(cmds[0]).label, "  AddReq { A1 } ");
        assert!(tree.node(cmds[0]).experts.is_empty());
        assert_eq!(tree.node(cmds[1]).experts.as_slice(), &[CMD_ERROR]);

        // One entry per termination record, not per occurrence.
        let terms = tree.find_all("h248.ctx.term");
        assert_eq!(terms.len(), 1);
        let kind = tree.find("h248.ctx.term.type").unwrap();
        assert_eq!(tree.node(kind).value, FieldValue::UInt8(TermType::Tdm as u8));
    }

    #[test]
    fn test_contexts_deduplicated() {
        let mut session = GcpSession::with_defaults();
        let m = session.gcp_msg(&frame(1), 0, true).unwrap();
        let t = session.gcp_trx(m, 1, TrxType::Request).unwrap();
        let c = session.gcp_ctx(m, t, 5).unwrap();
        session.gcp_cmd(m, t, c, CmdType::AddReq, 10).unwrap();
        session.gcp_cmd(m, t, c, CmdType::AddReq, 20).unwrap();

        let mut tree = ProtoTree::new();
        session
            .gcp_analyze_msg(&mut tree, None, m.id, &GcpFieldIds::default(), &CMD_ERROR, &NoLegs)
            .unwrap();
        assert_eq!(tree.find_all("h248.ctx").len(), 1);
        assert!(tree.find("h248.ctx.term").is_none());
    }

    #[test]
    fn test_alcap_leg_joined() {
        let mut legs = LegTable::new();
        let erq = AlcapMessage::new(AlcapMsgType::Erq, 0)
            .with_osaid(0x42)
            .with_sugr(0x0a)
            .with_dest_nsap("4500AB");
        legs.record(1, &erq).unwrap();

        let mut session = GcpSession::with_defaults();
        let m = session.gcp_msg(&frame(2), 0, true).unwrap();
        let t = session.gcp_trx(m, 1, TrxType::Request).unwrap();
        let c = session.gcp_ctx(m, t, 5).unwrap();
        let add = session.gcp_cmd(m, t, c, CmdType::AddReq, 10).unwrap();
        let term = session
            .gcp_cmd_add_term(m, t, add, &TermCandidate::text("A1"), Wildcard::None)
            .unwrap();
        session.gcp_term_set_nsap(m, term, "4500ab").unwrap();
        session.gcp_term_set_bir(m, term, "0000000A").unwrap();

        let mut tree = ProtoTree::new();
        session
            .gcp_analyze_msg(&mut tree, None, m.id, &GcpFieldIds::default(), &CMD_ERROR, &legs)
            .unwrap();

        let term_node = tree.find("h248.ctx.term").unwrap();
        let leg = tree.find_label("[ ALCAP Leg ]").unwrap();
        assert!(tree.children(term_node).contains(&leg));
        let osaid = tree.find("alcap.leg.osaid").unwrap();
        assert_eq!(tree.node(osaid).value, FieldValue::UInt32(0x42));
    }
}
