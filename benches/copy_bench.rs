use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vexcopy::ir::{Arch, Const, Endness, IrArena, IrType, JumpKind, Op, Temp};
use vexcopy::{copy_block, export_block, CopyConfig, SourceView};

/// One guest instruction's worth of IR, repeated `insns` times
fn lifted_image(insns: u32) -> (Vec<u8>, vexcopy::Addr) {
    let mut a = IrArena::new();
    let env = a.type_env_of(vec![IrType::I64; 3 * insns as usize]).unwrap();
    let helper = a.callee_of("amd64g_calculate_condition", 0x5000_2000, 0).unwrap();
    let mut stmts = Vec::new();
    for i in 0..insns {
        let (t0, t1, t2) = (Temp(3 * i), Temp(3 * i + 1), Temp(3 * i + 2));
        stmts.push(a.imark(0x400000 + 4 * i as u64, 4, 0).unwrap());
        let get = a.get(16, IrType::I64).unwrap();
        stmts.push(a.wr_tmp(t0, get).unwrap());
        let addr = a.rd_tmp(t0).unwrap();
        let off = a.const_expr(Const::U64(8)).unwrap();
        let sum = a.binop(Op::ADD64, addr, off).unwrap();
        let load = a.load(Endness::Le, IrType::I64, sum).unwrap();
        stmts.push(a.wr_tmp(t1, load).unwrap());
        let arg = a.rd_tmp(t1).unwrap();
        let call = a.ccall(helper, IrType::I64, vec![arg]).unwrap();
        stmts.push(a.wr_tmp(t2, call).unwrap());
        let guard = a.rd_tmp(t2).unwrap();
        stmts.push(a.exit(guard, JumpKind::Boring, Const::U64(0x500000), 184).unwrap());
    }
    let next = a.const_expr(Const::U64(0x400000 + 4 * insns as u64)).unwrap();
    let bb = a
        .block_of(env, stmts, next, JumpKind::Boring, 184, Arch::Amd64)
        .unwrap();
    export_block(&a, bb).unwrap()
}

fn copy_benchmark(c: &mut Criterion) {
    let config = CopyConfig::default();

    let (small, small_root) = lifted_image(4);
    c.bench_function("copy block of 4 instructions", |b| {
        b.iter(|| {
            let view = SourceView::new(black_box(&small)).unwrap();
            copy_block(view, small_root, &config).unwrap()
        })
    });

    let (large, large_root) = lifted_image(256);
    c.bench_function("copy block of 256 instructions", |b| {
        b.iter(|| {
            let view = SourceView::new(black_box(&large)).unwrap();
            copy_block(view, large_root, &config).unwrap()
        })
    });
}

criterion_group!(benches, copy_benchmark);
criterion_main!(benches);
