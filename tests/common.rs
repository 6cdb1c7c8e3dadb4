#![allow(dead_code)]

use patsched::backend::{
    inst::MInst,
    patmos::{self, AluOp, CmpOp, Guard, Imm, LoadOp, PatmosInst, StoreOp},
    patmos::regs::{p, r},
    Bundle,
    DisplayConfig,
    MBlock,
    MContext,
    MFunc,
};

pub type Ctx = MContext<PatmosInst>;

/// A context with a single function `f` and its single block `f`.
pub fn new_block() -> (Ctx, MBlock<PatmosInst>) {
    let mut mctx = MContext::new();
    let func = MFunc::new(&mut mctx, "f");
    let block = MBlock::new(&mut mctx, "f");
    func.push_back(&mut mctx, block);
    (mctx, block)
}

/// Parse `src` and return the entry block of the first function.
pub fn parse_block(src: &str) -> (Ctx, MBlock<PatmosInst>) {
    let mctx = patmos::parse(src).unwrap();
    let block = mctx.funcs()[0].entry_block(&mctx).unwrap();
    (mctx, block)
}

pub fn render(mctx: &Ctx) -> String { mctx.display(&DisplayConfig::default()).to_string() }

/// Real instructions of `block` in issue order.
pub fn real_insts(mctx: &Ctx, block: MBlock<PatmosInst>) -> Vec<PatmosInst> {
    block
        .insts(mctx)
        .into_iter()
        .filter(|inst| !inst.is_placeholder(mctx))
        .collect()
}

/// The issue cycle of every real instruction of `block`.
pub fn cycles(mctx: &Ctx, block: MBlock<PatmosInst>) -> Vec<(PatmosInst, usize)> {
    block
        .bundles(mctx)
        .iter()
        .enumerate()
        .flat_map(|(cycle, bundle)| bundle.iter().map(move |inst| (inst, cycle)))
        .filter(|(inst, _)| !inst.is_placeholder(mctx))
        .collect()
}

/// If the bundle issues nothing but placeholders.
pub fn is_empty_slot(mctx: &Ctx, bundle: &Bundle<PatmosInst>) -> bool {
    bundle.iter().all(|inst| inst.is_placeholder(mctx))
}

/// Deterministic xorshift generator.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self { Self(seed.max(1)) }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, n: u64) -> u64 { self.next_u64() % n }

    pub fn chance(&mut self, percent: u64) -> bool { self.below(100) < percent }
}

/// Append a random straight-line instruction to `block`.
///
/// Registers are drawn from a small pool so that dependences are frequent.
pub fn push_random_inst(mctx: &mut Ctx, block: MBlock<PatmosInst>, rng: &mut XorShift) {
    let reg = |rng: &mut XorShift| r(1 + rng.below(6) as u8);

    let inst = match rng.below(8) {
        0 => {
            let (rd, rs1, rs2) = (reg(rng), reg(rng), reg(rng));
            PatmosInst::build_alu_r(mctx, AluOp::Add, rd, rs1, rs2)
        }
        1 => {
            let (rd, rs1) = (reg(rng), reg(rng));
            PatmosInst::build_alu_i(mctx, AluOp::Sl, rd, rs1, 2)
        }
        2 => {
            let rd = reg(rng);
            PatmosInst::build_li(mctx, rd, rng.below(100) as i64)
        }
        3 => {
            let (rd, rs1, rs2) = (reg(rng), reg(rng), reg(rng));
            PatmosInst::build_mul(mctx, rd, rs1, rs2)
        }
        4 => {
            let (rs1, rs2) = (reg(rng), reg(rng));
            let pd = p(1 + rng.below(2) as u8);
            PatmosInst::build_cmp(mctx, CmpOp::Lt, pd, rs1, rs2)
        }
        5 | 6 => {
            let (rd, base) = (reg(rng), reg(rng));
            PatmosInst::build_load(mctx, LoadOp::Lwc, rd, base, rng.below(4) as i64)
        }
        _ => {
            let (base, rs) = (reg(rng), reg(rng));
            PatmosInst::build_store(mctx, StoreOp::Swc, base, rng.below(4) as i64, rs)
        }
    };

    if rng.chance(20) {
        let guard = Guard::new(p(1 + rng.below(2) as u8), rng.chance(50));
        inst.set_guard(mctx, guard);
    }

    block.push_back(mctx, inst);
}

/// A random block of `len` straight-line instructions, sometimes with a call
/// in the middle, ending with a random terminator or none.
pub fn random_block(seed: u64, len: usize) -> (Ctx, MBlock<PatmosInst>) {
    let (mut mctx, block) = new_block();
    let mut rng = XorShift::new(seed);

    for _ in 0..len {
        if rng.chance(5) {
            let call = PatmosInst::build_call(&mut mctx, Imm::sym("callee"), rng.chance(50));
            block.push_back(&mut mctx, call);
        } else {
            push_random_inst(&mut mctx, block, &mut rng);
        }
    }

    let terminator = match rng.below(4) {
        0 => Some(PatmosInst::build_ret(&mut mctx, true)),
        1 => Some(PatmosInst::build_ret(&mut mctx, false)),
        2 => Some(PatmosInst::build_br(&mut mctx, Imm::sym(".LBB0_1"), true)),
        _ => None,
    };
    if let Some(terminator) = terminator {
        block.push_back(&mut mctx, terminator);
    }

    (mctx, block)
}
