//! Whole-frame correlation scenarios.
//!
//! These tests drive the engine the way a host does: first-pass decoding of
//! frames in order, then replays of committed frames.

use gcp_core::prelude::*;
use std::net::{IpAddr, Ipv4Addr};

// ============================================================================
// Helpers
// ============================================================================

const MGC: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));
const MG: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

const CMD_ERROR: ExpertInfo = ExpertInfo {
    name: "h248.errored_command",
    severity: Severity::Warn,
    summary: "Errored command",
};

fn to_mg(frame: u64) -> FrameInfo {
    FrameInfo::new(frame, MGC.into(), MG.into())
}

fn to_mgc(frame: u64) -> FrameInfo {
    FrameInfo::new(frame, MG.into(), MGC.into())
}

fn dissect(session: &mut GcpSession, frame: &FrameInfo, msg: &DecodedMessage) -> String {
    H248Dissector::new()
        .dissect(session, frame, 0, msg, &mut ProtoTree::new())
        .unwrap()
}

fn add_choose(trx: u64, term: &str) -> DecodedMessage {
    DecodedMessage::new().transaction(
        DecodedTransaction::request(trx).action(
            DecodedAction::choose().command(
                DecodedCommand::new(CmdType::AddReq, 16)
                    .term(DecodedTermination::text(term))
                    .term(DecodedTermination::choose()),
            ),
        ),
    )
}

fn add_reply(trx: u64, ctx: u64, terms: &[&str]) -> DecodedMessage {
    let mut cmd = DecodedCommand::new(CmdType::AddReply, 16);
    for term in terms {
        cmd = cmd.term(DecodedTermination::text(term));
    }
    DecodedMessage::new().transaction(
        DecodedTransaction::reply(trx).action(DecodedAction::new(ctx).command(cmd)),
    )
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn test_replay_is_idempotent() {
    let mut session = GcpSession::with_defaults();
    let subtract_all = DecodedMessage::new().transaction(
        DecodedTransaction::request(2).action(
            DecodedAction::new(5).command(
                DecodedCommand::new(CmdType::SubReq, 16)
                    .term(DecodedTermination::all(b"*".to_vec())),
            ),
        ),
    );
    let frames = [
        (to_mg(1), add_choose(1, "A4444:1")),
        (to_mgc(2), add_reply(1, 5, &["A4444:1", "A5555:2"])),
        (to_mg(3), subtract_all),
    ];

    let mut summaries = Vec::new();
    for (frame, msg) in &frames {
        let first = dissect(&mut session, frame, msg);
        let stats = session.stats();
        assert_eq!(dissect(&mut session, frame, msg), first);
        assert_eq!(session.stats(), stats);
        summaries.push(first);
    }
    assert_eq!(summaries[1], "T 1 { C 5 { AddReply { A4444:1 A5555:2 } } }");
    assert_eq!(summaries[2], "T 2 { C 5 { SubReq { * } } }");

    // Revisiting everything out of order does not grow the registries.
    let stats = session.stats();
    for (frame, msg) in frames.iter().rev() {
        dissect(&mut session, frame, msg);
    }
    assert_eq!(session.stats(), stats);
}

#[test]
fn test_replay_marks_committed() {
    let mut session = GcpSession::with_defaults();
    let m = session.gcp_msg(&to_mg(1), 0, true).unwrap();
    assert!(!session.message(m.id).unwrap().committed);
    let again = session.gcp_msg(&to_mg(1), 0, true).unwrap();
    assert_eq!(again.phase, Phase::Replaying);
    assert!(session.message(m.id).unwrap().committed);
}

// ============================================================================
// Conversation symmetry and context identity
// ============================================================================

#[test]
fn test_request_and_reply_share_transaction() {
    let mut session = GcpSession::with_defaults();
    let m1 = session.gcp_msg(&to_mg(1), 0, true).unwrap();
    let t1 = session.gcp_trx(m1, 0x77, TrxType::Request).unwrap();
    let m2 = session.gcp_msg(&to_mgc(2), 0, true).unwrap();
    let t2 = session.gcp_trx(m2, 0x77, TrxType::Reply).unwrap();
    assert_eq!(t1, t2);

    // A different peer pair does not share it.
    let other = FrameInfo::new(3, MGC.into(), Address::PointCode(7));
    let m3 = session.gcp_msg(&other, 0, true).unwrap();
    assert_ne!(session.gcp_trx(m3, 0x77, TrxType::Request).unwrap(), t1);
}

#[test]
fn test_choose_context_unique_per_transaction() {
    let mut session = GcpSession::with_defaults();
    let m = session.gcp_msg(&to_mg(1), 0, true).unwrap();
    let t1 = session.gcp_trx(m, 1, TrxType::Request).unwrap();
    let t2 = session.gcp_trx(m, 2, TrxType::Request).unwrap();
    let a = session.gcp_ctx(m, t1, CHOOSE_CONTEXT).unwrap();
    let b = session.gcp_ctx(m, t1, CHOOSE_CONTEXT).unwrap();
    let c = session.gcp_ctx(m, t2, CHOOSE_CONTEXT).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_version_chain_replay_in_time() {
    let mut session = GcpSession::with_defaults();
    let modify = |trx: u64, ctx: u64| {
        DecodedMessage::new().transaction(
            DecodedTransaction::request(trx).action(
                DecodedAction::new(ctx).command(
                    DecodedCommand::new(CmdType::ModReq, 16).term(DecodedTermination::text("T1")),
                ),
            ),
        )
    };

    dissect(&mut session, &to_mg(10), &modify(1, 7));
    dissect(&mut session, &to_mg(30), &modify(3, 7));
    dissect(&mut session, &to_mg(31), &modify(3, 9));
    dissect(&mut session, &to_mg(50), &add_choose(2, "T2"));
    dissect(&mut session, &to_mgc(51), &add_reply(2, 7, &["T2"]));
    dissect(&mut session, &to_mg(60), &modify(4, 7));

    let stats = session.stats();
    assert_eq!(stats.context_versions, 1);

    let lookup = |session: &mut GcpSession, frame: u64, trx: u32| {
        let m = session.gcp_msg(&to_mg(frame), 0, true).unwrap();
        let t = session.gcp_trx(m, trx, TrxType::Request).unwrap();
        session.gcp_ctx(m, t, 7).unwrap()
    };
    let x = lookup(&mut session, 30, 3);
    let y = lookup(&mut session, 60, 4);
    assert_ne!(x, y);
    assert_eq!(session.context(y).unwrap().prev, Some(x));
    assert_eq!(session.context_versions(y).collect::<Vec<_>>(), vec![y, x]);

    // X still holds the terminations it had; Y only the new one.
    let names = |session: &GcpSession, ctx: CtxRef| {
        let mut names: Vec<String> = session
            .context(ctx)
            .unwrap()
            .terms
            .iter()
            .map(|t| session.termination(*t).unwrap().name.to_string())
            .collect();
        names.dedup();
        names
    };
    assert_eq!(names(&session, x), vec!["T1"]);
    assert_eq!(names(&session, y), vec!["T2", "T1"]);
    assert_eq!(session.stats(), stats);
}

// ============================================================================
// Terminations
// ============================================================================

#[test]
fn test_all_wildcard_filled_in_place() {
    let mut session = GcpSession::with_defaults();
    let msg = DecodedMessage::new().transaction(
        DecodedTransaction::request(5).action(
            DecodedAction::new(3)
                .command(
                    DecodedCommand::new(CmdType::SubReq, 16)
                        .term(DecodedTermination::all(b"A*".to_vec())),
                )
                .command(
                    DecodedCommand::new(CmdType::AuditValReq, 40)
                        .term(DecodedTermination::text("A12")),
                ),
        ),
    );
    let summary = dissect(&mut session, &to_mg(1), &msg);

    assert_eq!(session.stats().terminations, 1);
    assert_eq!(session.stats().term_associations, 2);
    assert_eq!(summary, "T 5 { C 3 { SubReq { A12 } AuditValReq { A12 } } }");
}

#[test]
fn test_reply_leaves_request_wildcard_unfilled() {
    let mut session = GcpSession::with_defaults();
    let subtract_all = DecodedMessage::new().transaction(
        DecodedTransaction::request(9).action(
            DecodedAction::new(5).command(
                DecodedCommand::new(CmdType::SubReq, 16)
                    .term(DecodedTermination::all(b"*".to_vec())),
            ),
        ),
    );
    let first = dissect(&mut session, &to_mg(1), &subtract_all);
    assert_eq!(first, "T 9 { C 5 { SubReq { * } } }");

    let reply = dissect(&mut session, &to_mgc(2), &add_reply(9, 5, &["A1"]));
    assert_eq!(reply, "T 9 { C 5 { AddReply { A1 } } }");

    // Frame 2 does not rewrite what frame 1 showed.
    let stats = session.stats();
    assert_eq!(dissect(&mut session, &to_mg(1), &subtract_all), first);
    assert_eq!(session.stats(), stats);
    assert_eq!(stats.terminations, 2);
}

#[test]
fn test_dedup_by_content_across_commands() {
    let mut session = GcpSession::with_defaults();
    let msg = DecodedMessage::new().transaction(
        DecodedTransaction::request(5).action(
            DecodedAction::new(3)
                .command(
                    DecodedCommand::new(CmdType::ModReq, 16).term(DecodedTermination::text("A1")),
                )
                .command(
                    DecodedCommand::new(CmdType::MoveReq, 40).term(DecodedTermination::text("A1")),
                ),
        ),
    );
    dissect(&mut session, &to_mg(1), &msg);

    let m = session.gcp_msg(&to_mg(1), 0, true).unwrap();
    let trx = session.message(m.id).unwrap().transactions[0];
    let cmds = &session.transaction(trx).unwrap().commands;
    let first = session.command(cmds[0]).unwrap().terms[0];
    let second = session.command(cmds[1]).unwrap().terms[0];
    assert_eq!(first, second);

    let ctx = session.command(cmds[0]).unwrap().ctx;
    assert_eq!(session.context(ctx).unwrap().terms, vec![first, first]);
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_reply_in_other_transaction_does_not_rebind() {
    let mut session = GcpSession::with_defaults();
    let request = dissect(&mut session, &to_mg(1), &add_choose(1, "A4444:1"));
    assert_eq!(request, "T 1 { C fffffffe { AddReq { A4444:1 $ } } }");

    let reply = dissect(&mut session, &to_mgc(2), &add_reply(2, 5, &[]));
    assert_eq!(reply, "T 2 { C 5 { AddReply { } } }");
    assert!(!reply.contains("AddReq {"));

    // Transaction 1 still owns an unbound CHOOSE context.
    let m1 = session.gcp_msg(&to_mg(1), 0, true).unwrap();
    let trx = session.message(m1.id).unwrap().transactions[0];
    let cmd = session.transaction(trx).unwrap().commands[0];
    let ctx = session.command(cmd).unwrap().ctx;
    assert_eq!(session.context(ctx).unwrap().id, CHOOSE_CONTEXT);
    assert_eq!(session.stats().contexts, 2);
}

#[test]
fn test_reply_binds_choose_context() {
    let mut session = GcpSession::with_defaults();
    dissect(&mut session, &to_mg(1), &add_choose(1, "A4444:1"));
    let reply = dissect(&mut session, &to_mgc(2), &add_reply(1, 5, &["A4444:1"]));
    assert_eq!(reply, "T 1 { C 5 { AddReply { A4444:1 } } }");
    assert_eq!(session.stats().contexts, 1);
    assert_eq!(session.stats().terminations, 1);

    // The request now renders with the bound id.
    let request = dissect(&mut session, &to_mg(1), &add_choose(1, "A4444:1"));
    assert_eq!(request, "T 1 { C 5 { AddReq { A4444:1 $ } } }");
}

#[test]
fn test_error_descriptor_surfaces() {
    let mut session = GcpSession::with_defaults();
    dissect(&mut session, &to_mg(1), &add_choose(1, "A1"));
    let msg = DecodedMessage::new().transaction(
        DecodedTransaction::reply(1).action(
            DecodedAction::new(5)
                .command(DecodedCommand::new(CmdType::AddReply, 16).error(500)),
        ),
    );
    let frame = to_mgc(2);
    let mut tree = ProtoTree::new();
    let summary = H248Dissector::new()
        .dissect(&mut session, &frame, 0, &msg, &mut tree)
        .unwrap();
    assert!(summary.contains("Error=500"));

    let flagged: Vec<_> = tree
        .find_all("h248.ctx.cmd")
        .into_iter()
        .filter(|n| tree.node(*n).experts.contains(&CMD_ERROR))
        .collect();
    assert_eq!(flagged.len(), 1);
    assert!(tree.node(flagged[0]).label.contains("Error=500"));
}

#[test]
fn test_pending_counts() {
    let mut session = GcpSession::with_defaults();
    dissect(&mut session, &to_mg(1), &add_choose(9, "A1"));
    let pending = DecodedMessage::new().transaction(DecodedTransaction::pending(9));
    dissect(&mut session, &to_mgc(2), &pending);
    dissect(&mut session, &to_mgc(3), &pending);
    // Replay does not count again.
    dissect(&mut session, &to_mgc(3), &pending);

    let m = session.gcp_msg(&to_mg(1), 0, true).unwrap();
    let trx = session.message(m.id).unwrap().transactions[0];
    assert_eq!(session.transaction(trx).unwrap().pending_count, 2);
}

// ============================================================================
// ALCAP cross-reference
// ============================================================================

#[test]
fn test_termination_joined_to_alcap_leg() {
    let mut legs = LegTable::new();
    let erq = AlcapMessage::new(AlcapMsgType::Erq, 0)
        .with_osaid(0x1234)
        .with_channel(17, 9)
        .with_sugr(0x2a)
        .with_dest_nsap("49001234AB");
    legs.record(1, &erq);
    legs.record(2, &AlcapMessage::new(AlcapMsgType::Ecf, 0x1234).with_osaid(0x5678));

    let msg = DecodedMessage::new().transaction(
        DecodedTransaction::request(1).action(
            DecodedAction::choose().command(
                DecodedCommand::new(CmdType::AddReq, 16)
                    .term(DecodedTermination::choose())
                    .term(
                        DecodedTermination::text("bnc/1")
                            .kind(TermType::Aal2)
                            .nsap("49001234ab")
                            .bir("0000002A"),
                    ),
            ),
        ),
    );

    let mut session = GcpSession::with_defaults();
    let mut tree = ProtoTree::new();
    H248Dissector::new()
        .with_legs(&legs)
        .dissect(&mut session, &to_mg(3), 0, &msg, &mut tree)
        .unwrap();

    let term = tree.find("h248.ctx.term").unwrap();
    assert_eq!(tree.node(term).value, FieldValue::str("bnc/1"));
    let osaid = tree.find("alcap.leg.osaid").unwrap();
    assert_eq!(tree.node(osaid).value, FieldValue::UInt32(0x1234));
    let dsaid = tree.find("alcap.leg.dsaid").unwrap();
    assert_eq!(tree.node(dsaid).value, FieldValue::UInt32(0x5678));
    assert_eq!(tree.find_all("alcap.leg.msg").len(), 2);
}
