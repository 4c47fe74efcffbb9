//! End-to-end tests for the deep-copy engine
//!
//! Images are built with `ImageWriter` (or by exporting natively built IR),
//! copied, and checked against the original after the image is gone.

use vexcopy::ir::{
    compare_blocks, pp_expr, Arch, BlockId, Callee, Cas, Const, Dirty, Effect, Endness, Expr,
    FxState, IrArena, IrType, JumpKind, MBusEvent, Op, PutI, Stmt, StmtTag, Temp,
};
use vexcopy::{
    copy_block, copy_callee, copy_const, copy_expr, copy_reg_array, copy_stmt, copy_type_env, export_block,
    Addr, AllocTracker, CopyConfig, CopySession, Error, ImageWriter, NodeKind, SourceView,
};

// =============================================================================
// FIXTURES
// =============================================================================

/// Addresses inside the three-statement scenario image
struct Scenario {
    block: Addr,
    env: Addr,
    one: Addr,
    s0: Addr,
    load: Addr,
    s1: Addr,
    guard: Addr,
    s2: Addr,
}

/// `t0 = 0x1:I64; t1 = LDle:I64(t0); if (t1) goto 0x400010`
fn scenario() -> (ImageWriter, Scenario) {
    let mut w = ImageWriter::new();
    let env = w.type_env(&[IrType::I64, IrType::I64]);
    let one = w.constant(&Const::U64(1));
    let one_expr = w.const_expr(one);
    let s0 = w.wr_tmp(Temp(0), one_expr);
    let t0 = w.rd_tmp(Temp(0));
    let load = w.load(Endness::Le, IrType::I64, t0);
    let s1 = w.wr_tmp(Temp(1), load);
    let guard = w.rd_tmp(Temp(1));
    let dst = w.constant(&Const::U64(0x400010));
    let s2 = w.exit(guard, JumpKind::Boring, dst, 184);
    let next_con = w.constant(&Const::U64(0x400004));
    let next = w.const_expr(next_con);
    let block = w.block(env, &[s0, s1, s2], next, JumpKind::Boring, 184, Arch::Amd64);
    (
        w,
        Scenario {
            block,
            env,
            one,
            s0,
            load,
            s1,
            guard,
            s2,
        },
    )
}

/// A block using every statement kind, expression kind and constant kind
fn kitchen_sink() -> (IrArena, BlockId) {
    use IrType::*;
    let mut a = IrArena::new();
    let env = a
        .type_env_of(vec![I64, I64, I8, V128, I1, I32, I64, I64, I64, I64, I1])
        .unwrap();
    let descr = a.reg_array_of(0x100, I8, 8).unwrap();
    let cee = a.callee_of("amd64g_calculate_rflags_c", 0x5000_1000, 1).unwrap();
    a.callee_mut(cee).mcx_mask = 0b1;
    let t = |a: &mut IrArena, n: u32| a.rd_tmp(Temp(n)).unwrap();
    let mut stmts = Vec::new();

    stmts.push(a.imark(0x400000, 4, 0).unwrap());
    let get = a.get(16, I64).unwrap();
    stmts.push(a.wr_tmp(Temp(0), get).unwrap());

    let t0 = t(&mut a, 0);
    let one = a.const_expr(Const::U64(1)).unwrap();
    let call = a.ccall(cee, I64, vec![t0, one]).unwrap();
    stmts.push(a.wr_tmp(Temp(1), call).unwrap());

    let ix = t(&mut a, 0);
    let geti = a
        .alloc_expr(Expr::GetI {
            descr,
            ix,
            bias: 3,
        })
        .unwrap();
    stmts.push(a.wr_tmp(Temp(2), geti).unwrap());

    let ix = t(&mut a, 0);
    let data = t(&mut a, 2);
    stmts.push(
        a.alloc_stmt(Stmt::PutI(Box::new(PutI {
            descr,
            ix,
            bias: -1,
            data,
        })))
        .unwrap(),
    );

    let qargs = [t(&mut a, 0), t(&mut a, 1), t(&mut a, 6), t(&mut a, 7)];
    let q = a.alloc_expr(Expr::Qop { op: Op(0x1600), args: qargs }).unwrap();
    let c8 = a.const_expr(Const::U8(0xfe)).unwrap();
    let c16 = a.const_expr(Const::U16(0xbeef)).unwrap();
    let tri = a
        .alloc_expr(Expr::Triop {
            op: Op(0x1601),
            args: [q, c8, c16],
        })
        .unwrap();
    let v = a.const_expr(Const::V128(0x00ff)).unwrap();
    let cond = t(&mut a, 2);
    let mux = a
        .alloc_expr(Expr::Mux0X {
            cond,
            expr0: tri,
            expr_x: v,
        })
        .unwrap();
    stmts.push(a.wr_tmp(Temp(3), mux).unwrap());

    let t1 = t(&mut a, 1);
    let zero = a.const_expr(Const::U64(0)).unwrap();
    let ne = a.binop(Op::CMPNE64, t1, zero).unwrap();
    let cmp = a.unop(Op(0x1700), ne).unwrap();
    stmts.push(a.wr_tmp(Temp(4), cmp).unwrap());

    let f32c = a.const_expr(Const::F32(0x3f80_0000)).unwrap();
    stmts.push(a.put(200, f32c).unwrap());
    let f32i = a.const_expr(Const::F32i(1)).unwrap();
    stmts.push(a.put(204, f32i).unwrap());
    let f64c = a.const_expr(Const::F64(0x3ff0_0000_0000_0000)).unwrap();
    stmts.push(a.put(208, f64c).unwrap());
    let f64i = a.const_expr(Const::F64i(2)).unwrap();
    stmts.push(a.put(216, f64i).unwrap());
    let v256 = a.const_expr(Const::V256(0xffff_0000)).unwrap();
    stmts.push(a.put(224, v256).unwrap());
    let u32c = a.const_expr(Const::U32(7)).unwrap();
    stmts.push(a.put(256, u32c).unwrap());
    let binder = a.alloc_expr(Expr::Binder(2)).unwrap();
    stmts.push(a.put(260, binder).unwrap());

    let addr = t(&mut a, 0);
    let val = t(&mut a, 1);
    stmts.push(a.store(Endness::Be, addr, val).unwrap());

    let addr = t(&mut a, 0);
    let expd_hi = a.const_expr(Const::U64(0)).unwrap();
    let expd_lo = a.const_expr(Const::U64(1)).unwrap();
    let data_hi = t(&mut a, 0);
    let data_lo = t(&mut a, 1);
    stmts.push(
        a.alloc_stmt(Stmt::Cas(Box::new(Cas {
            old_hi: Temp(6),
            old_lo: Temp(7),
            end: Endness::Le,
            addr,
            expd_hi: Some(expd_hi),
            expd_lo,
            data_hi: Some(data_hi),
            data_lo,
        })))
        .unwrap(),
    );
    let addr = t(&mut a, 0);
    let expd = t(&mut a, 1);
    let new = t(&mut a, 0);
    stmts.push(
        a.alloc_stmt(Stmt::Cas(Box::new(Cas {
            old_hi: Temp::INVALID,
            old_lo: Temp(8),
            end: Endness::Le,
            addr,
            expd_hi: None,
            expd_lo: expd,
            data_hi: None,
            data_lo: new,
        })))
        .unwrap(),
    );

    let addr = t(&mut a, 0);
    stmts.push(
        a.alloc_stmt(Stmt::Llsc {
            end: Endness::Le,
            result: Temp(9),
            addr,
            storedata: None,
        })
        .unwrap(),
    );
    let addr = t(&mut a, 0);
    let data = t(&mut a, 9);
    stmts.push(
        a.alloc_stmt(Stmt::Llsc {
            end: Endness::Le,
            result: Temp(10),
            addr,
            storedata: Some(data),
        })
        .unwrap(),
    );

    let guard = a.const_expr(Const::U1(true)).unwrap();
    let arg = t(&mut a, 0);
    let m_addr = t(&mut a, 0);
    stmts.push(
        a.alloc_stmt(Stmt::Dirty(Box::new(Dirty {
            cee,
            guard,
            args: vec![arg],
            tmp: Temp(5),
            m_fx: Effect::Read,
            m_addr: Some(m_addr),
            m_size: 8,
            needs_bbp: true,
            fx_state: vec![
                FxState {
                    fx: Effect::Read,
                    offset: 16,
                    size: 8,
                    n_repeats: 0,
                    repeat_len: 0,
                },
                FxState {
                    fx: Effect::Modify,
                    offset: 0x200,
                    size: 16,
                    n_repeats: 7,
                    repeat_len: 16,
                },
            ],
        })))
        .unwrap(),
    );

    stmts.push(a.alloc_stmt(Stmt::Mbe(MBusEvent::Fence)).unwrap());
    let base = t(&mut a, 0);
    let nia = a.const_expr(Const::U64(0x400004)).unwrap();
    stmts.push(
        a.alloc_stmt(Stmt::AbiHint {
            base,
            len: 128,
            nia,
        })
        .unwrap(),
    );
    stmts.push(a.alloc_stmt(Stmt::NoOp).unwrap());
    let guard = t(&mut a, 4);
    stmts.push(
        a.exit(guard, JumpKind::SigSegv, Const::U64(0x400100), 184)
            .unwrap(),
    );

    let next = t(&mut a, 1);
    let bb = a
        .block_of(env, stmts, next, JumpKind::Call, 184, Arch::Amd64)
        .unwrap();
    (a, bb)
}

fn sink_image() -> (IrArena, BlockId, Vec<u8>, Addr) {
    let (arena, bb) = kitchen_sink();
    let (bytes, root) = export_block(&arena, bb).unwrap();
    (arena, bb, bytes, root)
}

// =============================================================================
// SCENARIO
// =============================================================================

#[test]
fn test_scenario_copy_survives_source_release() {
    let (w, at) = scenario();
    let mut bytes = w.finish().unwrap();
    let copied = {
        let view = SourceView::new(&bytes).unwrap();
        copy_block(view, at.block, &CopyConfig::default()).unwrap()
    };

    // Release the source: scribble over it, then free it.
    bytes.fill(0xAA);
    drop(bytes);

    let arena = copied.arena();
    let block = arena.block(copied.root());
    assert_eq!(block.stmts.len(), 3);
    let tags: Vec<StmtTag> = block.stmts.iter().map(|&s| arena.stmt(s).tag()).collect();
    assert_eq!(tags, vec![StmtTag::WrTmp, StmtTag::WrTmp, StmtTag::Exit]);

    match arena.stmt(block.stmts[2]) {
        Stmt::Exit { guard, jk, dst, .. } => {
            assert_eq!(arena.expr(*guard), &Expr::RdTmp(Temp(1)));
            assert_eq!(*jk, JumpKind::Boring);
            assert_eq!(arena.constant(*dst), &Const::U64(0x400010));
        }
        other => panic!("expected Exit, got {:?}", other),
    }
    assert_eq!(arena.node_count(), 13);
}

#[test]
fn test_scenario_pretty_print() {
    let (w, at) = scenario();
    let bytes = w.finish().unwrap();
    let view = SourceView::new(&bytes).unwrap();
    let copied = copy_block(view, at.block, &CopyConfig::default()).unwrap();
    let text = vexcopy::ir::pp_block(copied.arena(), copied.root());
    assert!(text.contains("t0 = 0x1:I64"));
    assert!(text.contains("t1 = LDle:I64(t0)"));
    assert!(text.contains("if (t1) { PUT(184) = 0x400010:I64; exit-Boring }"));
}

// =============================================================================
// STRUCTURAL EQUALITY, INDEPENDENCE, IDEMPOTENCE
// =============================================================================

#[test]
fn test_copy_is_structurally_equal_to_source() {
    let (original, bb, bytes, root) = sink_image();
    let view = SourceView::new(&bytes).unwrap();
    let copied = copy_block(view, root, &CopyConfig::default()).unwrap();
    assert_eq!(
        compare_blocks(&original, bb, copied.arena(), copied.root()),
        Ok(())
    );
}

#[test]
fn test_copy_owns_its_memory() {
    let (_, _, bytes, root) = sink_image();
    let view = SourceView::new(&bytes).unwrap();
    let copied = copy_block(view, root, &CopyConfig::default()).unwrap();
    let image = bytes.as_ptr_range();
    let name = copied.arena().callee(vexcopy::ir::CalleeId(0)).name.as_ptr();
    assert!(!image.contains(&name));
}

#[test]
fn test_copy_independent_of_released_image() {
    let (original, bb, mut bytes, root) = sink_image();
    let copied = {
        let view = SourceView::new(&bytes).unwrap();
        copy_block(view, root, &CopyConfig::default()).unwrap()
    };
    bytes.iter_mut().for_each(|b| *b = !*b);
    drop(bytes);

    let text = vexcopy::ir::pp_block(copied.arena(), copied.root());
    assert_eq!(text, vexcopy::ir::pp_block(&original, bb));
    assert_eq!(
        compare_blocks(&original, bb, copied.arena(), copied.root()),
        Ok(())
    );
}

#[test]
fn test_copy_of_copy_is_equal() {
    let (_, _, bytes, root) = sink_image();
    let view = SourceView::new(&bytes).unwrap();
    let first = copy_block(view, root, &CopyConfig::default()).unwrap();

    let (again, again_root) = export_block(first.arena(), first.root()).unwrap();
    let view = SourceView::new(&again).unwrap();
    let second = copy_block(view, again_root, &CopyConfig::default()).unwrap();

    assert_eq!(
        compare_blocks(first.arena(), first.root(), second.arena(), second.root()),
        Ok(())
    );
    assert_eq!(first.arena().node_count(), second.arena().node_count());
}

// =============================================================================
// SHARED SUBSTRUCTURES
// =============================================================================

#[test]
fn test_shared_callee_and_reg_array_copied_once() {
    let (_, _, bytes, root) = sink_image();
    let view = SourceView::new(&bytes).unwrap();
    let copied = copy_block(view, root, &CopyConfig::default()).unwrap();
    let arena = copied.arena();
    assert_eq!(arena.callee_count(), 1);
    assert_eq!(arena.reg_array_count(), 1);

    let block = arena.block(copied.root());
    let ccall_cee = block
        .stmts
        .iter()
        .find_map(|&s| match arena.stmt(s) {
            Stmt::WrTmp { data, .. } => match arena.expr(*data) {
                Expr::CCall { cee, .. } => Some(*cee),
                _ => None,
            },
            _ => None,
        })
        .unwrap();
    let dirty_cee = block
        .stmts
        .iter()
        .find_map(|&s| match arena.stmt(s) {
            Stmt::Dirty(d) => Some(d.cee),
            _ => None,
        })
        .unwrap();
    assert_eq!(ccall_cee, dirty_cee);
    assert_eq!(
        arena.callee(ccall_cee),
        &Callee {
            regparms: 1,
            name: "amd64g_calculate_rflags_c".to_string(),
            addr: 0x5000_1000,
            mcx_mask: 1,
        }
    );
}

#[test]
fn test_dedup_disabled_copies_per_reference() {
    let (original, bb, bytes, root) = sink_image();
    let view = SourceView::new(&bytes).unwrap();
    let config = CopyConfig::default().with_dedup(false);
    let copied = copy_block(view, root, &config).unwrap();
    assert_eq!(copied.arena().callee_count(), 2);
    assert_eq!(copied.arena().reg_array_count(), 2);

    // Same values, different aliasing.
    let mismatch = compare_blocks(&original, bb, copied.arena(), copied.root()).unwrap_err();
    assert!(mismatch.path.ends_with("descr") || mismatch.path.ends_with("cee"));
}

#[test]
fn test_type_env_shared_across_session() {
    let mut w = ImageWriter::new();
    let env = w.type_env(&[IrType::I32]);
    let mut blocks = Vec::new();
    for i in 0..2u64 {
        let get = w.get(8, IrType::I32);
        let s = w.wr_tmp(Temp(0), get);
        let con = w.constant(&Const::U64(0x1000 + i));
        let next = w.const_expr(con);
        blocks.push(w.block(env, &[s], next, JumpKind::Boring, 68, Arch::X86));
    }
    let bytes = w.finish().unwrap();
    let view = SourceView::new(&bytes).unwrap();
    let config = CopyConfig::default();

    let mut session = CopySession::new(view, &config);
    let a = session.block(blocks[0]).unwrap();
    let b = session.block(blocks[1]).unwrap();
    let arena = session.finish().unwrap();

    assert_eq!(arena.type_env_count(), 1);
    assert_eq!(arena.block(a).tyenv, arena.block(b).tyenv);
    assert_ne!(arena.block(a).next, arena.block(b).next);
}

#[test]
fn test_granular_copies() {
    let (w, at) = scenario();
    let bytes = w.finish().unwrap();
    let view = SourceView::new(&bytes).unwrap();
    let config = CopyConfig::default();

    let con = copy_const(view, at.one, &config).unwrap();
    assert_eq!(con.arena().constant(con.root()), &Const::U64(1));

    let env = copy_type_env(view, at.env, &config).unwrap();
    assert_eq!(env.arena().type_env(env.root()).len(), 2);

    let stmt = copy_stmt(view, at.s1, &config).unwrap();
    assert_eq!(stmt.arena().stmt(stmt.root()).tag(), StmtTag::WrTmp);
    assert_eq!(stmt.arena().node_count(), 3);

    let mut w = ImageWriter::new();
    let cee = w.callee(&Callee {
        regparms: 0,
        name: "x86g_use_seg_selector".to_string(),
        addr: 0xffff_ffff_0000_0000,
        mcx_mask: 0,
    });
    let descr = w.reg_array(&vexcopy::ir::RegArray {
        base: 64,
        elem_ty: IrType::F64,
        n_elems: 8,
    });
    let bytes = w.finish().unwrap();
    let view = SourceView::new(&bytes).unwrap();
    let cee = copy_callee(view, cee, &config).unwrap();
    assert_eq!(cee.arena().callee(cee.root()).addr, 0xffff_ffff_0000_0000);
    let descr = copy_reg_array(view, descr, &config).unwrap();
    assert_eq!(descr.arena().reg_array(descr.root()).n_elems, 8);
}

// =============================================================================
// FAIL-FAST ON UNKNOWN TAGS
// =============================================================================

fn copy_tracked(bytes: &[u8], root: Addr) -> (Result<(), Error>, AllocTracker) {
    let tracker = AllocTracker::new();
    let config = CopyConfig::default().with_tracker(tracker.clone());
    let view = SourceView::new(bytes).unwrap();
    let result = copy_block(view, root, &config).map(|_| ());
    (result, tracker)
}

#[test]
fn test_unknown_tags_abort_and_release() {
    let field = ImageWriter::field;
    let cases: Vec<(&str, Box<dyn Fn(&mut ImageWriter, &Scenario)>, NodeKind, u32)> = vec![
        (
            "stmt",
            Box::new(move |w: &mut ImageWriter, at: &Scenario| w.patch_word(at.s2, 0, 0x1E0C).unwrap()),
            NodeKind::Stmt,
            0x1E0C,
        ),
        (
            "expr",
            Box::new(move |w: &mut ImageWriter, at: &Scenario| w.patch_word(at.load, 0, 0x1999).unwrap()),
            NodeKind::Expr,
            0x1999,
        ),
        (
            "const",
            Box::new(move |w: &mut ImageWriter, at: &Scenario| w.patch_word(at.one, 0, 0x130B).unwrap()),
            NodeKind::Const,
            0x130B,
        ),
        (
            "load type",
            Box::new(move |w: &mut ImageWriter, at: &Scenario| w.patch_word(at.load, field(1), 0x1000).unwrap()),
            NodeKind::Type,
            0x1000,
        ),
        (
            "tyenv type",
            Box::new(move |w: &mut ImageWriter, at: &Scenario| w.patch_word(at.env, 2, 0x110F).unwrap()),
            NodeKind::Type,
            0x110F,
        ),
        (
            "endness",
            Box::new(move |w: &mut ImageWriter, at: &Scenario| w.patch_word(at.load, field(0), 0x1202).unwrap()),
            NodeKind::Endness,
            0x1202,
        ),
        (
            "jump kind",
            Box::new(move |w: &mut ImageWriter, at: &Scenario| w.patch_word(at.s2, field(1), 0x1A15).unwrap()),
            NodeKind::JumpKind,
            0x1A15,
        ),
    ];

    for (name, corrupt, kind, tag) in cases {
        let (mut w, at) = scenario();
        corrupt(&mut w, &at);
        let bytes = w.finish().unwrap();
        let (result, tracker) = copy_tracked(&bytes, at.block);
        match result {
            Err(Error::UnknownTag {
                kind: got_kind,
                tag: got_tag,
                ..
            }) => {
                assert_eq!(got_kind, kind, "{}", name);
                assert_eq!(got_tag, tag, "{}", name);
            }
            other => panic!("{}: expected UnknownTag, got {:?}", name, other),
        }
        assert_eq!(tracker.live(), 0, "{} leaked", name);
    }
}

#[test]
fn test_unknown_tag_late_in_block_frees_earlier_nodes() {
    let (mut w, at) = scenario();
    w.patch_word(at.s2, 0, 0xdead).unwrap();
    let bytes = w.finish().unwrap();
    let (result, tracker) = copy_tracked(&bytes, at.block);
    assert!(matches!(result, Err(Error::UnknownTag { .. })));
    // Env and the first two statements were allocated before the failure.
    assert!(tracker.total() >= 7);
    assert_eq!(tracker.live(), 0);
}

// =============================================================================
// ALL-OR-NOTHING ON ALLOCATION FAILURE
// =============================================================================

#[test]
fn test_allocation_failure_at_every_point_leaves_nothing() {
    let (_, _, bytes, root) = sink_image();
    let view = SourceView::new(&bytes).unwrap();
    let total = copy_block(view, root, &CopyConfig::default())
        .unwrap()
        .arena()
        .node_count();
    assert!(total > 80);

    for limit in 0..total {
        let tracker = AllocTracker::new();
        let config = CopyConfig::default()
            .with_node_limit(limit)
            .with_tracker(tracker.clone());
        let err = copy_block(view, root, &config).unwrap_err();
        assert!(
            matches!(err, Error::AllocationFailure { live, limit: Some(l), .. } if live == limit && l == limit),
            "limit {}: {:?}",
            limit,
            err
        );
        assert_eq!(tracker.live(), 0, "limit {}", limit);
        assert_eq!(tracker.peak(), limit);
        assert_eq!(tracker.failures(), 1);
    }

    let tracker = AllocTracker::new();
    let config = CopyConfig::default()
        .with_node_limit(total)
        .with_tracker(tracker.clone());
    let copied = copy_block(view, root, &config).unwrap();
    assert_eq!(tracker.live(), total);
    drop(copied);
    assert_eq!(tracker.live(), 0);
}

#[test]
fn test_failed_session_releases_earlier_roots() {
    let (mut w, at) = scenario();
    let bad = w.raw(&[0x1E77]);
    let bytes = w.finish().unwrap();
    let view = SourceView::new(&bytes).unwrap();
    let tracker = AllocTracker::new();
    let config = CopyConfig::default().with_tracker(tracker.clone());

    let mut session = CopySession::new(view, &config);
    session.block(at.block).unwrap();
    assert_eq!(tracker.live(), 13);
    assert!(session.stmt(bad).is_err());
    assert_eq!(tracker.live(), 0);
    assert!(session.finish().is_err());
}

// =============================================================================
// INVARIANT VIOLATIONS
// =============================================================================

fn expect_violation(bytes: &[u8], root: Addr, needle: &str) {
    let (result, tracker) = copy_tracked(bytes, root);
    match result {
        Err(Error::InvariantViolation { detail, .. }) => {
            assert!(detail.contains(needle), "{:?} lacks {:?}", detail, needle)
        }
        other => panic!("expected InvariantViolation({}), got {:?}", needle, other),
    }
    assert_eq!(tracker.live(), 0);
}

#[test]
fn test_unbound_temp() {
    let (mut w, at) = scenario();
    w.patch_word(at.guard, ImageWriter::field(0), 7).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "t7 is not bound");
}

#[test]
fn test_invalid_temp_in_wr_tmp() {
    let (mut w, at) = scenario();
    w.patch_word(at.s0, ImageWriter::field(0), u32::MAX).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "IRTemp_INVALID");
}

#[test]
fn test_temp_checks_can_be_disabled() {
    let (mut w, at) = scenario();
    w.patch_word(at.guard, ImageWriter::field(0), 7).unwrap();
    let bytes = w.finish().unwrap();
    let view = SourceView::new(&bytes).unwrap();
    let config = CopyConfig::default().with_temp_checks(false);
    assert!(copy_block(view, at.block, &config).is_ok());
}

#[test]
fn test_null_required_child() {
    let (mut w, at) = scenario();
    w.patch_word(at.s1, ImageWriter::field(1), 0).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "`data` is NULL");
}

#[test]
fn test_dangling_and_misaligned_pointers() {
    let (mut w, at) = scenario();
    w.patch_word(at.s1, ImageWriter::field(1), 0x00ff_fff0).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "runs past the end");

    let (mut w, at) = scenario();
    w.patch_word(at.s1, ImageWriter::field(1), at.load.0 + 2).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "misaligned");

    let (mut w, at) = scenario();
    w.patch_word(at.s1, ImageWriter::field(1), 4).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "header");
}

#[test]
fn test_negative_stmts_used() {
    let (mut w, at) = scenario();
    w.patch_word(at.block, 1, (-1i32) as u32).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "negative stmts_used");
}

#[test]
fn test_out_of_range_scalars() {
    let mut w = ImageWriter::new();
    let env = w.type_env(&[]);
    let bad_u1 = w.raw(&[0x1300, 2]);
    let guard = w.const_expr(bad_u1);
    let dst = w.constant(&Const::U32(0));
    let exit = w.exit(guard, JumpKind::Boring, dst, 0);
    let next = w.const_expr(dst);
    let bb = w.block(env, &[exit], next, JumpKind::Boring, 0, Arch::X86);
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, bb, "exceeds 0x1");

    let mut w = ImageWriter::new();
    let env = w.type_env(&[]);
    let imark = w.imark(0x1000, 4, 0);
    w.patch_word(imark, ImageWriter::field(3), 256).unwrap();
    let con = w.constant(&Const::U32(0));
    let next = w.const_expr(con);
    let bb = w.block(env, &[imark], next, JumpKind::Boring, 0, Arch::X86);
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, bb, "delta 256");
}

#[test]
fn test_bad_callee_and_reg_array() {
    let mut w = ImageWriter::new();
    let env = w.type_env(&[IrType::I64]);
    let cee = w.callee(&Callee {
        regparms: 4,
        name: "helper".to_string(),
        addr: 0,
        mcx_mask: 0,
    });
    let args = w.expr_vec(&[]);
    let call = w.ccall(cee, IrType::I64, args);
    let s = w.wr_tmp(Temp(0), call);
    let con = w.constant(&Const::U32(0));
    let next = w.const_expr(con);
    let bb = w.block(env, &[s], next, JumpKind::Boring, 0, Arch::X86);
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, bb, "regparms 4");

    let mut w = ImageWriter::new();
    let env = w.type_env(&[IrType::I8]);
    let descr = w.reg_array(&vexcopy::ir::RegArray {
        base: 0,
        elem_ty: IrType::I8,
        n_elems: 0,
    });
    let ix = w.get(0, IrType::I32);
    let geti = w.get_i(descr, ix, 0);
    let s = w.wr_tmp(Temp(0), geti);
    let con = w.constant(&Const::U32(0));
    let next = w.const_expr(con);
    let bb = w.block(env, &[s], next, JumpKind::Boring, 0, Arch::X86);
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, bb, "n_elems 0");
}

#[test]
fn test_dirty_effect_consistency() {
    use vexcopy::image::{DirtyFields, FxFields};

    let build = |n_fx: usize, m_fx: Effect, with_addr: bool| {
        let mut w = ImageWriter::new();
        let env = w.type_env(&[]);
        let cee = w.callee(&Callee {
            regparms: 0,
            name: "helper".to_string(),
            addr: 0,
            mcx_mask: 0,
        });
        let one = w.constant(&Const::U1(true));
        let guard = w.const_expr(one);
        let args = w.expr_vec(&[]);
        let m_addr = if with_addr {
            w.get(0, IrType::I64)
        } else {
            Addr::NULL
        };
        let fx = FxFields {
            fx: Effect::Write,
            offset: 8,
            size: 8,
            n_repeats: 0,
            repeat_len: 0,
        };
        let dirty = w.dirty(&DirtyFields {
            cee,
            guard,
            args,
            tmp: Temp::INVALID,
            m_fx,
            m_addr,
            m_size: if with_addr { 8 } else { 0 },
            needs_bbp: false,
            fx_state: vec![fx; n_fx],
        });
        let con = w.constant(&Const::U32(0));
        let next = w.const_expr(con);
        let bb = w.block(env, &[dirty], next, JumpKind::Boring, 0, Arch::X86);
        (w.finish().unwrap(), bb)
    };

    let (bytes, bb) = build(7, Effect::Modify, true);
    let (result, _) = copy_tracked(&bytes, bb);
    assert!(result.is_ok());

    let (bytes, bb) = build(8, Effect::None, false);
    expect_violation(&bytes, bb, "nFxState 8");

    let (bytes, bb) = build(0, Effect::Read, false);
    expect_violation(&bytes, bb, "without mAddr");

    let (bytes, bb) = build(0, Effect::None, true);
    expect_violation(&bytes, bb, "mAddr set");
}

#[test]
fn test_half_double_cas_rejected() {
    use vexcopy::image::CasFields;

    let mut w = ImageWriter::new();
    let env = w.type_env(&[IrType::I64, IrType::I64]);
    let addr = w.rd_tmp(Temp(0));
    let hi = w.rd_tmp(Temp(0));
    let lo = w.rd_tmp(Temp(0));
    let data = w.rd_tmp(Temp(0));
    let cas = w.cas(CasFields {
        old_hi: Temp(0),
        old_lo: Temp(1),
        end: Endness::Le,
        addr,
        expd_hi: hi,
        expd_lo: lo,
        data_hi: Addr::NULL,
        data_lo: data,
    });
    let con = w.constant(&Const::U32(0));
    let next = w.const_expr(con);
    let bb = w.block(env, &[cas], next, JumpKind::Boring, 0, Arch::X86);
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, bb, "both present");
}

#[test]
fn test_unterminated_expr_vector() {
    let mut w = ImageWriter::new();
    let env = w.type_env(&[IrType::I64]);
    let arg = w.rd_tmp(Temp(0));
    let cee = w.callee(&Callee {
        regparms: 0,
        name: "helper".to_string(),
        addr: 0,
        mcx_mask: 0,
    });
    let call = w.ccall(cee, IrType::I64, Addr::NULL);
    let s = w.wr_tmp(Temp(0), call);
    let con = w.constant(&Const::U32(0));
    let next = w.const_expr(con);
    let bb = w.block(env, &[s], next, JumpKind::Boring, 0, Arch::X86);
    // The argument vector is the last record, so its terminator is missing.
    let args = w.raw(&[arg.0]);
    w.patch_word(call, ImageWriter::field(2), args.0).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, bb, "runs past the end");
}

// =============================================================================
// NESTING
// =============================================================================

/// `Not64(Not64(...(t0)))` with `depth` expressions on the longest path
fn not_chain(depth: usize) -> (Vec<u8>, Addr) {
    let mut w = ImageWriter::new();
    let mut e = w.rd_tmp(Temp(0));
    for _ in 1..depth {
        e = w.unop(Op::NOT64, e);
    }
    (w.finish().unwrap(), e)
}

#[test]
fn test_self_cycle_rejected_with_defaults() {
    let (mut w, at) = scenario();
    w.patch_word(at.load, ImageWriter::field(2), at.load.0).unwrap();
    let bytes = w.finish().unwrap();
    expect_violation(&bytes, at.block, "nesting exceeds 512");
}

#[test]
fn test_chain_at_max_depth_copies() {
    let config = CopyConfig::default();
    let (bytes, root) = not_chain(config.max_depth);
    let view = SourceView::new(&bytes).unwrap();
    let copied = copy_expr(view, root, &config).unwrap();
    assert_eq!(copied.arena().node_count(), config.max_depth);

    let (bytes, root) = not_chain(config.max_depth + 1);
    let view = SourceView::new(&bytes).unwrap();
    let tracker = AllocTracker::new();
    let err = copy_expr(view, root, &config.clone().with_tracker(tracker.clone())).unwrap_err();
    assert!(matches!(err, Error::InvariantViolation { .. }));
    assert_eq!(tracker.live(), 0);
}

#[test]
fn test_very_deep_chain_copies_when_allowed() {
    let mut arena = IrArena::new();
    let mut e = arena.rd_tmp(Temp(0)).unwrap();
    for _ in 0..100_000 {
        e = arena.unop(Op::NOT64, e).unwrap();
    }
    let (bytes, root) = vexcopy::export_expr(&arena, e).unwrap();
    let view = SourceView::new(&bytes).unwrap();
    let config = CopyConfig::default().with_max_depth(100_001);
    let copied = copy_expr(view, root, &config).unwrap();
    assert_eq!(copied.arena().node_count(), 100_001);
    assert_eq!(pp_expr(&arena, e), pp_expr(copied.arena(), copied.root()));
}
