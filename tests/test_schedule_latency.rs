use patsched::backend::{
    patmos::{
        regs::{p, r},
        AluOp,
        CmpOp,
        Guard,
        Imm,
        LoadOp,
        PatmosInst,
        StoreOp,
    },
    schedule::{Dependence, LatencyMode, LatencyModel, PlacedSnapshot, ScheduleError},
    Bundle,
    MContext,
};

#[test]
fn test_raw_latency() {
    let mut mctx = MContext::new();
    let lw = PatmosInst::build_load(&mut mctx, LoadOp::Lwc, r(1), r(2), 0);
    let mul = PatmosInst::build_mul(&mut mctx, r(3), r(4), r(5));
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(6), r(1), r(3));
    let model = LatencyModel::new(&mctx);

    let deps = model.dependence(lw, add);
    assert_eq!(deps.len(), 1);
    assert!(deps.contains(&Dependence::Raw));

    assert_eq!(model.inst_latency(lw, add, LatencyMode::Data), 2);
    assert_eq!(model.inst_latency(mul, add, LatencyMode::Data), 3);
    assert!(model.dependence(lw, mul).is_empty());
    assert_eq!(model.inst_latency(lw, mul, LatencyMode::Data), 0);
}

#[test]
fn test_guard_is_a_use() {
    let mut mctx = MContext::new();
    let cmp = PatmosInst::build_cmp(&mut mctx, CmpOp::Lt, p(1), r(1), r(2));
    let add = PatmosInst::build_alu_i(&mut mctx, AluOp::Add, r(3), r(3), 1)
        .set_guard(&mut mctx, Guard::new(p(1), true));
    let model = LatencyModel::new(&mctx);

    assert!(model.dependence(cmp, add).contains(&Dependence::Raw));
    assert_eq!(model.inst_latency(cmp, add, LatencyMode::Data), 1);
}

#[test]
fn test_hardwired_registers() {
    let mut mctx = MContext::new();
    let clear = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(0), r(1), r(2));
    let read = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(3), r(0), r(0));
    let model = LatencyModel::new(&mctx);

    assert!(model.dependence(clear, read).is_empty());
    assert!(model.dependence(read, clear).is_empty());
}

#[test]
fn test_war_and_waw() {
    let mut mctx = MContext::new();
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(1), r(2), r(3));
    let li = PatmosInst::build_li(&mut mctx, r(2), 7);
    let mul = PatmosInst::build_mul(&mut mctx, r(4), r(5), r(5));
    let li4 = PatmosInst::build_li(&mut mctx, r(4), 1);
    let model = LatencyModel::new(&mctx);

    let deps = model.dependence(add, li);
    assert_eq!(deps.len(), 1);
    assert!(deps.contains(&Dependence::War));
    assert_eq!(model.inst_latency(add, li, LatencyMode::Data), 0);

    // the later write must land after the multiplication
    assert!(model.dependence(mul, li4).contains(&Dependence::Waw));
    assert_eq!(model.inst_latency(mul, li4, LatencyMode::Data), 3);
    assert_eq!(model.inst_latency(li4, mul, LatencyMode::Data), 1);
}

#[test]
fn test_memory_ordering() {
    let mut mctx = MContext::new();
    let sw = PatmosInst::build_store(&mut mctx, StoreOp::Swc, r(1), 0, r(2));
    let lw = PatmosInst::build_load(&mut mctx, LoadOp::Lwc, r(3), r(4), 0);
    let lw2 = PatmosInst::build_load(&mut mctx, LoadOp::Lbc, r(5), r(4), 1);
    let model = LatencyModel::new(&mctx);

    assert!(model.dependence(sw, lw).contains(&Dependence::Mem));
    assert_eq!(model.inst_latency(sw, lw, LatencyMode::Data), 1);

    assert!(model.dependence(lw, sw).contains(&Dependence::Mem));
    assert_eq!(model.inst_latency(lw, sw, LatencyMode::Data), 0);

    // two loads never conflict
    assert!(model.dependence(lw, lw2).is_empty());
}

#[test]
fn test_control_dependence() {
    let mut mctx = MContext::new();
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(1), r(2), r(3));
    let br = PatmosInst::build_br(&mut mctx, Imm::sym(".LBB0_2"), true);
    let call = PatmosInst::build_call(&mut mctx, Imm::sym("g"), true);
    let after = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(4), r(5), r(6));
    let model = LatencyModel::new(&mctx);

    assert!(model.dependence(add, br).contains(&Dependence::Control));
    assert_eq!(model.inst_latency(add, br, LatencyMode::Data), 0);

    assert!(model.dependence(call, after).contains(&Dependence::Control));
    assert_eq!(model.inst_latency(call, after, LatencyMode::Data), 1);

    assert_eq!(model.inst_latency(call, after, LatencyMode::ControlOnly), 3);
    assert_eq!(model.inst_latency(br, after, LatencyMode::ControlOnly), 2);
    assert_eq!(model.inst_latency(add, after, LatencyMode::ControlOnly), 0);
}

#[test]
fn test_call_defines_return_registers() {
    let mut mctx = MContext::new();
    let call = PatmosInst::build_call(&mut mctx, Imm::sym("g"), false);
    let ret = PatmosInst::build_ret(&mut mctx, true);
    let model = LatencyModel::new(&mctx);

    let deps = model.dependence(call, ret);
    assert!(deps.contains(&Dependence::Raw));
    assert!(deps.contains(&Dependence::Control));
    assert_eq!(model.inst_latency(call, ret, LatencyMode::Data), 1);
}

#[test]
fn test_bundle_latency() {
    let mut mctx = MContext::new();
    let lw = PatmosInst::build_load(&mut mctx, LoadOp::Lwc, r(1), r(2), 0);
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(3), r(4), r(5));
    let use_lw = PatmosInst::build_alu_r(&mut mctx, AluOp::Sub, r(6), r(1), r(1));
    let use_add = PatmosInst::build_alu_r(&mut mctx, AluOp::Sub, r(7), r(3), r(3));
    let model = LatencyModel::new(&mctx);

    let producer = Bundle::from_insts([add, lw]).unwrap();
    assert_eq!(model.latency(&producer, &Bundle::single(use_add), LatencyMode::Data), 1);
    assert_eq!(model.latency(&producer, &Bundle::single(use_lw), LatencyMode::Data), 2);

    let consumer = Bundle::from_insts([use_add, use_lw]).unwrap();
    assert_eq!(model.latency(&producer, &consumer, LatencyMode::Data), 2);
    assert!(model.depends(&producer, &consumer));
    assert!(!model.depends(&Bundle::single(use_add), &Bundle::single(use_lw)));
}

#[test]
fn test_control_only_ignores_consumer() {
    let mut mctx = MContext::new();
    let ret = PatmosInst::build_ret(&mut mctx, true);
    let model = LatencyModel::new(&mctx);

    let latency = model.latency(&Bundle::single(ret), &Bundle::new(), LatencyMode::ControlOnly);
    assert_eq!(latency, 3);
    assert_eq!(model.control_latency(&Bundle::single(ret)), 3);
}

#[test]
fn test_unit_latency_window() {
    let mut mctx = MContext::new();
    let mul = PatmosInst::build_mul(&mut mctx, r(1), r(2), r(3));
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(4), r(1), r(1));
    let window = [Bundle::single(mul), Bundle::single(add)];
    let model = LatencyModel::new(&mctx);

    assert_eq!(model.unit_latency(&window, 0, 1, LatencyMode::Data).unwrap(), 3);
    assert!(matches!(
        model.unit_latency(&window, 0, 2, LatencyMode::Data),
        Err(ScheduleError::OutOfWindow { index: 2, len: 2 })
    ));
    assert!(matches!(
        model.unit_latency(&window, 1, 0, LatencyMode::Data),
        Err(ScheduleError::NotInProgramOrder {
            producer: 1,
            consumer: 0
        })
    ));
    assert!(matches!(
        model.unit_latency(&window, 1, 1, LatencyMode::Data),
        Err(ScheduleError::NotInProgramOrder { .. })
    ));
}

#[test]
fn test_earliest_cycle() {
    let mut mctx = MContext::new();
    let lw = PatmosInst::build_load(&mut mctx, LoadOp::Lwc, r(1), r(2), 0);
    let li = PatmosInst::build_li(&mut mctx, r(3), 1);
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(4), r(1), r(3));
    let other = PatmosInst::build_li(&mut mctx, r(5), 2);
    let model = LatencyModel::new(&mctx);

    let placed = [Bundle::single(lw), Bundle::single(li)];
    let snapshot = PlacedSnapshot::new(&placed);
    assert_eq!(snapshot.next_cycle(), 2);

    // lw at 0 + 2, li at 1 + 1
    assert_eq!(model.earliest_cycle(&snapshot, &Bundle::single(add)), 2);
    assert_eq!(model.earliest_cycle(&snapshot, &Bundle::single(other)), 0);
    assert_eq!(model.earliest_cycle(&PlacedSnapshot::new(&[]), &Bundle::single(add)), 0);
}
