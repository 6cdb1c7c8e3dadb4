use patsched::backend::{
    inst::Resource,
    patmos::{
        regs::r,
        AluOp,
        Imm,
        LoadOp,
        PatmosInst,
        StoreOp,
    },
    schedule::{check_bundle, try_pair, verify_schedule, ScheduleError},
    Bundle,
    MContext,
};

#[test]
fn test_check_bundle() {
    let mut mctx = MContext::new();
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(1), r(2), r(3));
    let lw = PatmosInst::build_load(&mut mctx, LoadOp::Lwc, r(4), r(5), 0);
    let sw = PatmosInst::build_store(&mut mctx, StoreOp::Swc, r(6), 0, r(7));
    let mul1 = PatmosInst::build_mul(&mut mctx, r(8), r(9), r(10));
    let mul2 = PatmosInst::build_mul(&mut mctx, r(11), r(9), r(10));
    let br = PatmosInst::build_br(&mut mctx, Imm::sym(".LBB0_1"), true);
    let nop = PatmosInst::build_nop(&mut mctx);

    let bundle = |insts: &[PatmosInst]| Bundle::from_insts(insts.iter().copied()).unwrap();

    assert!(check_bundle(&mctx, &bundle(&[add, lw])).is_ok());
    assert!(check_bundle(&mctx, &bundle(&[lw, mul1])).is_ok());
    assert!(check_bundle(&mctx, &bundle(&[add, br])).is_ok());
    assert!(check_bundle(&mctx, &bundle(&[nop, nop])).is_ok());
    assert!(check_bundle(&mctx, &bundle(&[br])).is_ok());

    assert!(matches!(
        check_bundle(&mctx, &Bundle::new()),
        Err(ScheduleError::EmptyBundle)
    ));
    assert!(matches!(
        check_bundle(&mctx, &bundle(&[lw, sw])),
        Err(ScheduleError::ResourceConflict {
            resource: Resource::Mem
        })
    ));
    assert!(matches!(
        check_bundle(&mctx, &bundle(&[mul1, mul2])),
        Err(ScheduleError::ResourceConflict {
            resource: Resource::Mul
        })
    ));
    assert!(matches!(
        check_bundle(&mctx, &bundle(&[br, add])),
        Err(ScheduleError::IllegalControlSlot { slot: 0 })
    ));
}

#[test]
fn test_try_pair() {
    let mut mctx = MContext::new();
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(1), r(2), r(3));
    let sub = PatmosInst::build_alu_r(&mut mctx, AluOp::Sub, r(4), r(2), r(3));
    let lw = PatmosInst::build_load(&mut mctx, LoadOp::Lwc, r(5), r(6), 0);
    let sw = PatmosInst::build_store(&mut mctx, StoreOp::Swc, r(6), 0, r(7));
    let call = PatmosInst::build_call(&mut mctx, Imm::sym("g"), true);
    let ret = PatmosInst::build_ret(&mut mctx, true);

    let pair = try_pair(&mctx, &Bundle::single(add), sub, None).unwrap();
    assert_eq!(pair.iter().collect::<Vec<_>>(), vec![add, sub]);

    // control flow moves to the terminal slot
    let pair = try_pair(&mctx, &Bundle::single(call), add, None).unwrap();
    assert_eq!(pair.iter().collect::<Vec<_>>(), vec![add, call]);
    let pair = try_pair(&mctx, &Bundle::single(add), call, None).unwrap();
    assert_eq!(pair.iter().collect::<Vec<_>>(), vec![add, call]);

    assert!(try_pair(&mctx, &Bundle::single(lw), sw, None).is_none());
    assert!(try_pair(&mctx, &Bundle::single(call), ret, None).is_none());

    let full = Bundle::from_insts([add, sub]).unwrap();
    assert!(try_pair(&mctx, &full, lw, None).is_none());

    // the block terminator never shares its bundle
    assert!(try_pair(&mctx, &Bundle::single(add), ret, Some(ret)).is_none());
    assert!(try_pair(&mctx, &Bundle::single(ret), add, Some(ret)).is_none());
    assert!(try_pair(&mctx, &Bundle::single(add), call, Some(ret)).is_some());
}

#[test]
fn test_verify_permutation() {
    let mut mctx = MContext::new();
    let li1 = PatmosInst::build_li(&mut mctx, r(1), 1);
    let li2 = PatmosInst::build_li(&mut mctx, r(2), 2);
    let stranger = PatmosInst::build_li(&mut mctx, r(3), 3);
    let nop = PatmosInst::build_nop(&mut mctx);
    let input = [li1, li2];

    let ok = [Bundle::single(li2), Bundle::single(nop), Bundle::single(li1)];
    assert!(verify_schedule(&mctx, &input, None, &ok).is_ok());

    let lost = [Bundle::single(li1)];
    assert!(matches!(
        verify_schedule(&mctx, &input, None, &lost),
        Err(ScheduleError::InstructionLost { position: 1 })
    ));

    let duplicated = [Bundle::single(li1), Bundle::single(li2), Bundle::single(li1)];
    assert!(matches!(
        verify_schedule(&mctx, &input, None, &duplicated),
        Err(ScheduleError::InstructionDuplicated { position: 0 })
    ));

    let foreign = [Bundle::from_insts([li1, li2]).unwrap(), Bundle::single(stranger)];
    assert!(matches!(
        verify_schedule(&mctx, &input, None, &foreign),
        Err(ScheduleError::ForeignInstruction { .. })
    ));
}

#[test]
fn test_verify_latency() {
    let mut mctx = MContext::new();
    let lw = PatmosInst::build_load(&mut mctx, LoadOp::Lwc, r(1), r(2), 0);
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(3), r(1), r(1));
    let nop = PatmosInst::build_nop(&mut mctx);
    let input = [lw, add];

    let stalled = [Bundle::single(lw), Bundle::single(nop), Bundle::single(add)];
    assert!(verify_schedule(&mctx, &input, None, &stalled).is_ok());

    // the load result is not there before cycle 2
    let early = [Bundle::single(lw), Bundle::single(add)];
    assert!(matches!(
        verify_schedule(&mctx, &input, None, &early),
        Err(ScheduleError::HazardAtCycle {
            cycle: 1,
            earliest: 2
        })
    ));

    let reversed = [Bundle::single(add), Bundle::single(nop), Bundle::single(lw)];
    assert!(matches!(
        verify_schedule(&mctx, &input, None, &reversed),
        Err(ScheduleError::LatencyViolated { actual: -2, .. })
    ));
}

#[test]
fn test_verify_control() {
    let mut mctx = MContext::new();
    let call = PatmosInst::build_call(&mut mctx, Imm::sym("g"), true);
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(1), r(2), r(3));
    let li = PatmosInst::build_li(&mut mctx, r(4), 4);
    let ret = PatmosInst::build_ret(&mut mctx, true);

    // an instruction after a call may not move into the call's bundle
    let input = [call, add];
    let hoisted = [Bundle::from_insts([add, call]).unwrap()];
    assert!(matches!(
        verify_schedule(&mctx, &input, None, &hoisted),
        Err(ScheduleError::ControlOrderViolated {
            producer: 0,
            consumer: 1
        })
    ));

    let input = [li, ret];
    let terminator = Bundle::single(ret);

    let shared = [Bundle::from_insts([li, ret]).unwrap()];
    assert!(matches!(
        verify_schedule(&mctx, &input, Some(&terminator), &shared),
        Err(ScheduleError::TerminatorNotAlone)
    ));

    let early = [Bundle::single(ret), Bundle::single(li)];
    assert!(matches!(
        verify_schedule(&mctx, &input, Some(&terminator), &early),
        Err(ScheduleError::TerminatorNotLast)
    ));

    let ok = [Bundle::single(li), Bundle::single(ret)];
    assert!(verify_schedule(&mctx, &input, Some(&terminator), &ok).is_ok());
}

#[test]
fn test_verify_latency_within_bundle() {
    let mut mctx = MContext::new();
    let li = PatmosInst::build_li(&mut mctx, r(1), 1);
    let add = PatmosInst::build_alu_r(&mut mctx, AluOp::Add, r(2), r(1), r(1));
    let sub = PatmosInst::build_alu_r(&mut mctx, AluOp::Sub, r(1), r(3), r(3));
    let input = [li, add];

    let paired = [Bundle::from_insts([li, add]).unwrap()];
    assert!(matches!(
        verify_schedule(&mctx, &input, None, &paired),
        Err(ScheduleError::LatencyViolated {
            producer: 0,
            consumer: 1,
            required: 1,
            actual: 0
        })
    ));

    // a write after read may share the bundle of the read
    let input = [add, sub];
    let paired = [Bundle::from_insts([add, sub]).unwrap()];
    assert!(verify_schedule(&mctx, &input, None, &paired).is_ok());
}
