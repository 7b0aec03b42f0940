//! Summary-column rendering.
//!
//! Rendering only reads the registries. The per-command string is memoised
//! on the command and dropped whenever the command changes.

use std::fmt::Write as _;

use super::handle::{CmdRef, CtxRef, MsgHandle, TrxRef};
use super::session::GcpSession;
use super::CmdType;

impl GcpSession {
    /// `"<Type> { <term> ... }"`, with `" Error=<code>"` before the closing
    /// brace when the command carries an error.
    pub fn gcp_cmd_to_string(&self, cmd: CmdRef) -> String {
        let Some(c) = self.get(cmd) else {
            return String::new();
        };
        if c.kind == CmdType::None {
            return "-".to_string();
        }
        c.display
            .get_or_init(|| {
                let mut s = format!("{} {{", c.kind.label());
                for term in &c.terms {
                    if let Some(t) = self.termination(*term) {
                        let _ = write!(s, " {}", t.name);
                    }
                }
                if c.error != 0 {
                    let _ = write!(s, " Error={}", c.error);
                }
                s.push_str(" }");
                s
            })
            .clone()
    }

    /// `"T <id> { C <ctx> { <commands> } }"` for the commands `trx` has in
    /// `msg`; ids are hex.
    pub fn gcp_trx_to_string(&self, msg: MsgHandle, trx: TrxRef) -> String {
        let Some(t) = self.get(trx) else {
            return String::new();
        };
        let mut s = format!("T {:x} {{", t.id);

        // Group this message's commands by context, in order of appearance.
        let mut groups: Vec<(CtxRef, Vec<CmdRef>)> = Vec::new();
        for cmd in &t.commands {
            let Some(c) = self.get(*cmd).filter(|c| c.msg == msg) else {
                continue;
            };
            match groups.iter_mut().find(|(ctx, _)| *ctx == c.ctx) {
                Some((_, cmds)) => cmds.push(*cmd),
                None => groups.push((c.ctx, vec![*cmd])),
            }
        }
        if groups.is_empty() {
            // Nothing of this message's own: show which context the
            // transaction is about.
            if let Some(ctx) = t.commands.first().and_then(|c| self.get(*c)).map(|c| c.ctx) {
                groups.push((ctx, Vec::new()));
            }
        }

        for (ctx, cmds) in &groups {
            let id = self.get(*ctx).map_or(0, |c| c.id);
            let _ = write!(s, " C {id:x} {{");
            for cmd in cmds {
                let _ = write!(s, " {}", self.gcp_cmd_to_string(*cmd));
            }
            s.push_str(" }");
        }

        if t.error != 0 {
            let _ = write!(s, " Error={}", t.error);
        }
        s.push_str(" }");
        s
    }

    /// Summary of every transaction `msg` references, space separated.
    pub fn gcp_msg_to_string(&self, msg: MsgHandle) -> String {
        let Some(m) = self.get(msg) else {
            return String::new();
        };
        m.transactions
            .iter()
            .map(|trx| self.gcp_trx_to_string(msg, *trx))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use crate::conversation::Address;
    use crate::gcp::{CmdType, FrameInfo, GcpSession, TermCandidate, TrxType, Wildcard};

    fn frame(number: u64, reply: bool) -> FrameInfo {
        let (a, b) = (Address::PointCode(10), Address::PointCode(20));
        if reply {
            FrameInfo::new(number, b, a)
        } else {
            FrameInfo::new(number, a, b)
        }
    }

    #[test]
    fn test_command_string() {
        let mut session = GcpSession::with_defaults();
        let m = session.gcp_msg(&frame(1, false), 0, true).unwrap();
        let t = session.gcp_trx(m, 1, TrxType::Request).unwrap();
        let c = session.gcp_ctx(m, t, 5).unwrap();
        let cmd = session.gcp_cmd(m, t, c, CmdType::AddReq, 10).unwrap();
        assert_eq!(session.gcp_cmd_to_string(cmd), "AddReq { }");

        session
            .gcp_cmd_add_term(m, t, cmd, &TermCandidate::text("A4444:1"), Wildcard::None)
            .unwrap();
        session
            .gcp_cmd_add_term(m, t, cmd, &TermCandidate::text("$"), Wildcard::Choose)
            .unwrap();
        assert_eq!(session.gcp_cmd_to_string(cmd), "AddReq { A4444:1 $ }");

        session.gcp_cmd_set_error(cmd, 500).unwrap();
        assert_eq!(session.gcp_cmd_to_string(cmd), "AddReq { A4444:1 $ Error=500 }");
    }

    #[test]
    fn test_no_command_renders_dash() {
        let mut session = GcpSession::with_defaults();
        let m = session.gcp_msg(&frame(1, false), 0, true).unwrap();
        let t = session.gcp_trx(m, 1, TrxType::Request).unwrap();
        let c = session.gcp_ctx(m, t, 5).unwrap();
        let cmd = session.gcp_cmd(m, t, c, CmdType::None, 10).unwrap();
        assert_eq!(session.gcp_cmd_to_string(cmd), "-");
    }

    #[test]
    fn test_transaction_string_scoped_to_message() {
        let mut session = GcpSession::with_defaults();
        let m1 = session.gcp_msg(&frame(1, false), 0, true).unwrap();
        let t = session.gcp_trx(m1, 0x1a, TrxType::Request).unwrap();
        let c = session.gcp_ctx(m1, t, 0x2b).unwrap();
        session.gcp_cmd(m1, t, c, CmdType::ModReq, 10).unwrap();

        let m2 = session.gcp_msg(&frame(2, true), 0, true).unwrap();
        let t = session.gcp_trx(m2, 0x1a, TrxType::Reply).unwrap();
        let c = session.gcp_ctx(m2, t, 0x2b).unwrap();
        session.gcp_cmd(m2, t, c, CmdType::ModReply, 10).unwrap();

        assert_eq!(session.gcp_msg_to_string(m1.id), "T 1a { C 2b { ModReq { } } }");
        assert_eq!(session.gcp_msg_to_string(m2.id), "T 1a { C 2b { ModReply { } } }");
    }

    #[test]
    fn test_transaction_without_own_commands() {
        let mut session = GcpSession::with_defaults();
        let m1 = session.gcp_msg(&frame(1, false), 0, true).unwrap();
        let t = session.gcp_trx(m1, 3, TrxType::Request).unwrap();
        let c = session.gcp_ctx(m1, t, 7).unwrap();
        session.gcp_cmd(m1, t, c, CmdType::NotifyReq, 10).unwrap();

        let pending = session.gcp_msg(&frame(2, true), 0, true).unwrap();
        let t = session.gcp_trx(pending, 3, TrxType::Pending).unwrap();
        session.gcp_trx_set_error(t, 504).unwrap();
        assert_eq!(
            session.gcp_msg_to_string(pending.id),
            "T 3 { C 7 { } Error=504 }"
        );
    }

    #[test]
    fn test_message_joins_transactions() {
        let mut session = GcpSession::with_defaults();
        let m = session.gcp_msg(&frame(1, false), 0, true).unwrap();
        for (trx_id, ctx_id) in [(1, 1), (2, 2)] {
            let t = session.gcp_trx(m, trx_id, TrxType::Request).unwrap();
            let c = session.gcp_ctx(m, t, ctx_id).unwrap();
            session.gcp_cmd(m, t, c, CmdType::SubReq, trx_id as usize * 10).unwrap();
        }
        assert_eq!(
            session.gcp_msg_to_string(m.id),
            "T 1 { C 1 { SubReq { } } } T 2 { C 2 { SubReq { } } }"
        );
    }
}
