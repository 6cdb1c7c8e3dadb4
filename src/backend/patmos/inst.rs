use std::fmt;

use super::regs;
use crate::{
    backend::{
        context::{DisplayConfig, MContext, PrintBytes},
        func::MLabel,
        inst::{DisplayMInst, MInst, Resource},
        regs::PReg,
    },
    collections::storage::{ArenaAlloc, ArenaDeref, ArenaPtr, BaseArenaPtr},
};

/// An immediate operand, either a constant or a symbol resolved later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Imm {
    Value(i64),
    Sym(MLabel),
}

impl From<i64> for Imm {
    fn from(value: i64) -> Self { Self::Value(value) }
}

impl From<i32> for Imm {
    fn from(value: i32) -> Self { Self::Value(value.into()) }
}

impl From<MLabel> for Imm {
    fn from(label: MLabel) -> Self { Self::Sym(label) }
}

impl Imm {
    pub fn sym(label: impl Into<MLabel>) -> Self { Self::Sym(label.into()) }
}

/// The guard predicate of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guard {
    pub reg: PReg,
    pub negated: bool,
}

impl Default for Guard {
    fn default() -> Self {
        Self {
            reg: regs::ptrue(),
            negated: false,
        }
    }
}

impl Guard {
    pub fn new(reg: PReg, negated: bool) -> Self { Self { reg, negated } }

    /// If the guard always holds, i.e., `p0` not negated.
    pub fn is_always(&self) -> bool { self.reg == regs::ptrue() && !self.negated }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_always() {
            // instead of `( $p0)`
            write!(f, "      ")
        } else {
            write!(f, "({}{})", if self.negated { "!" } else { " " }, self.reg)
        }
    }
}

pub struct PatmosInstData {
    kind: PatmosInstKind,
    guard: Guard,
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub struct PatmosInst(BaseArenaPtr<PatmosInstData>);

impl PatmosInst {
    pub fn kind(self, mctx: &MContext<Self>) -> &PatmosInstKind { &self.deref(mctx).kind }

    pub fn guard(self, mctx: &MContext<Self>) -> Guard { self.deref(mctx).guard }

    /// Predicate the instruction.
    pub fn set_guard(self, mctx: &mut MContext<Self>, guard: Guard) -> Self {
        self.deref_mut(mctx).guard = guard;
        self
    }

    fn build(mctx: &mut MContext<Self>, kind: PatmosInstKind) -> Self {
        mctx.alloc(PatmosInstData {
            kind,
            guard: Guard::default(),
        })
    }

    pub fn build_alu_r(mctx: &mut MContext<Self>, op: AluOp, rd: PReg, rs1: PReg, rs2: PReg) -> Self {
        Self::build(mctx, PatmosInstKind::AluR { op, rd, rs1, rs2 })
    }

    pub fn build_alu_i(
        mctx: &mut MContext<Self>,
        op: AluOp,
        rd: PReg,
        rs1: PReg,
        imm: impl Into<Imm>,
    ) -> Self {
        let imm = imm.into();
        Self::build(mctx, PatmosInstKind::AluI { op, rd, rs1, imm })
    }

    pub fn build_li(mctx: &mut MContext<Self>, rd: PReg, imm: impl Into<Imm>) -> Self {
        let imm = imm.into();
        Self::build(mctx, PatmosInstKind::Li { rd, imm })
    }

    pub fn build_mul(mctx: &mut MContext<Self>, rd: PReg, rs1: PReg, rs2: PReg) -> Self {
        Self::build(mctx, PatmosInstKind::Mul { rd, rs1, rs2 })
    }

    pub fn build_cmp(mctx: &mut MContext<Self>, op: CmpOp, pd: PReg, rs1: PReg, rs2: PReg) -> Self {
        Self::build(mctx, PatmosInstKind::Cmp { op, pd, rs1, rs2 })
    }

    pub fn build_load(
        mctx: &mut MContext<Self>,
        op: LoadOp,
        rd: PReg,
        base: PReg,
        offset: impl Into<Imm>,
    ) -> Self {
        let offset = offset.into();
        Self::build(mctx, PatmosInstKind::Load { op, rd, base, offset })
    }

    pub fn build_store(
        mctx: &mut MContext<Self>,
        op: StoreOp,
        base: PReg,
        offset: impl Into<Imm>,
        rs: PReg,
    ) -> Self {
        let offset = offset.into();
        Self::build(mctx, PatmosInstKind::Store { op, base, offset, rs })
    }

    pub fn build_br(mctx: &mut MContext<Self>, target: impl Into<Imm>, delayed: bool) -> Self {
        let target = target.into();
        Self::build(mctx, PatmosInstKind::Br { target, delayed })
    }

    pub fn build_call(mctx: &mut MContext<Self>, target: impl Into<Imm>, delayed: bool) -> Self {
        let target = target.into();
        Self::build(mctx, PatmosInstKind::Call { target, delayed })
    }

    pub fn build_ret(mctx: &mut MContext<Self>, delayed: bool) -> Self {
        Self::build(mctx, PatmosInstKind::Ret { delayed })
    }

    pub fn build_nop(mctx: &mut MContext<Self>) -> Self { Self::build(mctx, PatmosInstKind::Nop) }

    /// Left shift applied to the immediate when printing byte addresses.
    fn imm_shift(self, mctx: &MContext<Self>) -> u32 {
        use PatmosInstKind as Ik;

        match self.kind(mctx) {
            Ik::Load { op, .. } => op.access_shift(),
            Ik::Store { op, .. } => op.access_shift(),
            Ik::Br { .. } | Ik::Call { .. } => 2,
            Ik::AluR { .. }
            | Ik::AluI { .. }
            | Ik::Li { .. }
            | Ik::Mul { .. }
            | Ik::Cmp { .. }
            | Ik::Ret { .. }
            | Ik::Nop => 0,
        }
    }
}

pub enum PatmosInstKind {
    AluR {
        op: AluOp,
        rd: PReg,
        rs1: PReg,
        rs2: PReg,
    },
    AluI {
        op: AluOp,
        rd: PReg,
        rs1: PReg,
        imm: Imm,
    },
    Li {
        rd: PReg,
        imm: Imm,
    },
    Mul {
        rd: PReg,
        rs1: PReg,
        rs2: PReg,
    },
    Cmp {
        op: CmpOp,
        pd: PReg,
        rs1: PReg,
        rs2: PReg,
    },
    Load {
        op: LoadOp,
        rd: PReg,
        base: PReg,
        offset: Imm,
    },
    Store {
        op: StoreOp,
        base: PReg,
        offset: Imm,
        rs: PReg,
    },
    /// PC-relative branch, `brnd` if not delayed.
    Br {
        target: Imm,
        delayed: bool,
    },
    /// Function call, `callnd` if not delayed. Writes the return information
    /// into `srb` and `sro`.
    Call {
        target: Imm,
        delayed: bool,
    },
    /// Return through `srb` and `sro`, `retnd` if not delayed.
    Ret {
        delayed: bool,
    },
    /// Empty slot.
    Nop,
}

pub struct DisplayPatmosInst<'a> {
    mctx: &'a MContext<PatmosInst>,
    config: &'a DisplayConfig,
    inst: PatmosInst,
}

impl<'a> DisplayMInst<'a> for PatmosInst {
    type Display = DisplayPatmosInst<'a>;

    fn display(self, mctx: &'a MContext<Self>, config: &'a DisplayConfig) -> Self::Display {
        DisplayPatmosInst {
            mctx,
            config,
            inst: self,
        }
    }
}

impl<'a> DisplayPatmosInst<'a> {
    /// If the immediates of the instruction print as byte addresses.
    fn in_bytes(&self) -> bool {
        match self.config.print_bytes {
            PrintBytes::None => false,
            PrintBytes::Calls => matches!(
                self.inst.kind(self.mctx),
                PatmosInstKind::Call { delayed: true, .. }
            ),
            PrintBytes::All => true,
        }
    }

    fn shifted(&self, value: i64) -> i64 {
        if self.in_bytes() {
            value << self.inst.imm_shift(self.mctx)
        } else {
            value
        }
    }

    fn fmt_imm(&self, f: &mut fmt::Formatter<'_>, imm: &Imm) -> fmt::Result {
        match imm {
            Imm::Value(value) => write!(f, "{}", self.shifted(*value)),
            Imm::Sym(label) => write!(f, "{}", label),
        }
    }

    fn fmt_addr(&self, f: &mut fmt::Formatter<'_>, base: PReg, offset: &Imm) -> fmt::Result {
        write!(f, "[")?;
        if base == regs::zero() {
            self.fmt_imm(f, offset)?;
        } else {
            write!(f, "{}", base)?;
            match offset {
                Imm::Value(0) => {}
                Imm::Value(value) => {
                    let value = self.shifted(*value);
                    let sign = if value < 0 { '-' } else { '+' };
                    write!(f, " {} {}", sign, value.unsigned_abs())?;
                }
                Imm::Sym(label) => write!(f, " + {}", label)?,
            }
        }
        write!(f, "]")
    }
}

impl<'a> fmt::Display for DisplayPatmosInst<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PatmosInstKind as Ik;

        write!(f, "{} ", self.inst.guard(self.mctx))?;

        match self.inst.kind(self.mctx) {
            Ik::AluR { op, rd, rs1, rs2 } => write!(f, "{} {} = {}, {}", op, rd, rs1, rs2),
            Ik::AluI { op, rd, rs1, imm } => {
                write!(f, "{}i {} = {}, ", op, rd, rs1)?;
                self.fmt_imm(f, imm)
            }
            Ik::Li { rd, imm } => {
                write!(f, "li {} = ", rd)?;
                self.fmt_imm(f, imm)
            }
            Ik::Mul { rd, rs1, rs2 } => write!(f, "mul {} = {}, {}", rd, rs1, rs2),
            Ik::Cmp { op, pd, rs1, rs2 } => write!(f, "{} {} = {}, {}", op, pd, rs1, rs2),
            Ik::Load {
                op,
                rd,
                base,
                offset,
            } => {
                write!(f, "{} {} = ", op, rd)?;
                self.fmt_addr(f, *base, offset)
            }
            Ik::Store {
                op,
                base,
                offset,
                rs,
            } => {
                write!(f, "{} ", op)?;
                self.fmt_addr(f, *base, offset)?;
                write!(f, " = {}", rs)
            }
            Ik::Br { target, delayed } => {
                write!(f, "{} ", if *delayed { "br" } else { "brnd" })?;
                self.fmt_imm(f, target)
            }
            Ik::Call { target, delayed } => {
                write!(f, "{} ", if *delayed { "call" } else { "callnd" })?;
                match target {
                    // call targets in bytes are absolute addresses
                    Imm::Value(value) if self.in_bytes() && *delayed => {
                        write!(f, "{:#x}", self.shifted(*value))
                    }
                    Imm::Value(_) | Imm::Sym(_) => self.fmt_imm(f, target),
                }
            }
            Ik::Ret { delayed } => write!(f, "{}", if *delayed { "ret" } else { "retnd" }),
            Ik::Nop => write!(f, "nop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluOp {
    Add,
    Sub,
    Xor,
    Or,
    And,
    /// Register form only.
    Nor,
    Sl,
    Sr,
    Sra,
}

impl AluOp {
    /// If the operation has an immediate form.
    pub fn has_imm_form(&self) -> bool { !matches!(self, AluOp::Nor) }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AluOp::Add => write!(f, "add"),
            AluOp::Sub => write!(f, "sub"),
            AluOp::Xor => write!(f, "xor"),
            AluOp::Or => write!(f, "or"),
            AluOp::And => write!(f, "and"),
            AluOp::Nor => write!(f, "nor"),
            AluOp::Sl => write!(f, "sl"),
            AluOp::Sr => write!(f, "sr"),
            AluOp::Sra => write!(f, "sra"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Le,
    Ult,
    Ule,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "cmpeq"),
            CmpOp::Neq => write!(f, "cmpneq"),
            CmpOp::Lt => write!(f, "cmplt"),
            CmpOp::Le => write!(f, "cmple"),
            CmpOp::Ult => write!(f, "cmpult"),
            CmpOp::Ule => write!(f, "cmpule"),
        }
    }
}

/// Loads through the data cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Lwc,
    Lhc,
    Lbc,
    Lhuc,
    Lbuc,
}

impl LoadOp {
    fn access_shift(&self) -> u32 {
        match self {
            LoadOp::Lwc => 2,
            LoadOp::Lhc | LoadOp::Lhuc => 1,
            LoadOp::Lbc | LoadOp::Lbuc => 0,
        }
    }
}

impl fmt::Display for LoadOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadOp::Lwc => write!(f, "lwc"),
            LoadOp::Lhc => write!(f, "lhc"),
            LoadOp::Lbc => write!(f, "lbc"),
            LoadOp::Lhuc => write!(f, "lhuc"),
            LoadOp::Lbuc => write!(f, "lbuc"),
        }
    }
}

/// Stores through the data cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Swc,
    Shc,
    Sbc,
}

impl StoreOp {
    fn access_shift(&self) -> u32 {
        match self {
            StoreOp::Swc => 2,
            StoreOp::Shc => 1,
            StoreOp::Sbc => 0,
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreOp::Swc => write!(f, "swc"),
            StoreOp::Shc => write!(f, "shc"),
            StoreOp::Sbc => write!(f, "sbc"),
        }
    }
}

impl MInst for PatmosInst {
    fn from_ptr(ptr: BaseArenaPtr<Self::T>) -> Self { Self(ptr) }

    fn ptr(self) -> BaseArenaPtr<Self::T> { self.0 }

    fn uses(self, mctx: &MContext<Self>) -> Vec<PReg> {
        use PatmosInstKind as Ik;

        let mut uses = vec![self.guard(mctx).reg];
        match self.kind(mctx) {
            Ik::AluR { rs1, rs2, .. } | Ik::Mul { rs1, rs2, .. } | Ik::Cmp { rs1, rs2, .. } => {
                uses.extend([*rs1, *rs2])
            }
            Ik::AluI { rs1, .. } => uses.push(*rs1),
            Ik::Load { base, .. } => uses.push(*base),
            Ik::Store { base, rs, .. } => uses.extend([*base, *rs]),
            Ik::Ret { .. } => uses.extend([regs::srb(), regs::sro()]),
            Ik::Li { .. } | Ik::Br { .. } | Ik::Call { .. } | Ik::Nop => {}
        }
        uses.retain(|reg| !reg.is_hardwired());
        uses
    }

    fn defs(self, mctx: &MContext<Self>) -> Vec<PReg> {
        use PatmosInstKind as Ik;

        let mut defs = match self.kind(mctx) {
            Ik::AluR { rd, .. }
            | Ik::AluI { rd, .. }
            | Ik::Li { rd, .. }
            | Ik::Mul { rd, .. }
            | Ik::Load { rd, .. } => vec![*rd],
            Ik::Cmp { pd, .. } => vec![*pd],
            Ik::Call { .. } => vec![regs::srb(), regs::sro()],
            Ik::Store { .. } | Ik::Br { .. } | Ik::Ret { .. } | Ik::Nop => vec![],
        };
        defs.retain(|reg| !reg.is_hardwired());
        defs
    }

    fn result_latency(self, mctx: &MContext<Self>) -> u32 {
        use PatmosInstKind as Ik;

        match self.kind(mctx) {
            Ik::AluR { .. } | Ik::AluI { .. } | Ik::Li { .. } | Ik::Cmp { .. } => 1,
            Ik::Mul { .. } => 3,
            Ik::Load { .. } => 2,
            Ik::Call { .. } => 1,
            Ik::Store { .. } | Ik::Br { .. } | Ik::Ret { .. } | Ik::Nop => 0,
        }
    }

    fn delay_slots(self, mctx: &MContext<Self>) -> u32 {
        use PatmosInstKind as Ik;

        match self.kind(mctx) {
            Ik::Br { delayed: true, .. } => 2,
            Ik::Call { delayed: true, .. } | Ik::Ret { delayed: true } => 3,
            Ik::Br { delayed: false, .. }
            | Ik::Call { delayed: false, .. }
            | Ik::Ret { delayed: false }
            | Ik::AluR { .. }
            | Ik::AluI { .. }
            | Ik::Li { .. }
            | Ik::Mul { .. }
            | Ik::Cmp { .. }
            | Ik::Load { .. }
            | Ik::Store { .. }
            | Ik::Nop => 0,
        }
    }

    fn resource(self, mctx: &MContext<Self>) -> Resource {
        use PatmosInstKind as Ik;

        match self.kind(mctx) {
            Ik::AluR { .. } | Ik::AluI { .. } | Ik::Li { .. } | Ik::Cmp { .. } => Resource::Alu,
            Ik::Mul { .. } => Resource::Mul,
            Ik::Load { .. } | Ik::Store { .. } => Resource::Mem,
            Ik::Br { .. } | Ik::Call { .. } | Ik::Ret { .. } => Resource::Control,
            Ik::Nop => Resource::None,
        }
    }

    fn is_store(self, mctx: &MContext<Self>) -> bool {
        matches!(self.kind(mctx), PatmosInstKind::Store { .. })
    }

    fn is_placeholder(self, mctx: &MContext<Self>) -> bool {
        matches!(self.kind(mctx), PatmosInstKind::Nop)
    }

    fn build_placeholder(mctx: &mut MContext<Self>) -> Self { Self::build_nop(mctx) }
}

impl ArenaPtr for PatmosInst {
    type A = MContext<Self>;
    type T = PatmosInstData;

    fn try_deref(self, arena: &Self::A) -> Option<&Self::T> { ArenaDeref::try_deref(arena, self) }

    fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T> {
        ArenaDeref::try_deref_mut(arena, self)
    }
}
