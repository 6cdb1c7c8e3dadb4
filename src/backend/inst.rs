use std::{fmt, hash::Hash};

use super::{
    context::{DisplayConfig, MContext},
    regs::PReg,
};
use crate::collections::storage::{ArenaAlloc, ArenaDeref, ArenaFree, ArenaPtr, BaseArenaPtr};

/// The issue resource an instruction occupies in a bundle.
///
/// A bundle may hold at most one instruction of each of [Resource::Mem],
/// [Resource::Mul] and [Resource::Control].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Alu,
    Mul,
    Mem,
    Control,
    None,
}

/// A machine instruction handle, as seen by the target-independent backend.
pub trait MInst: ArenaPtr<A = MContext<Self>> + Hash + fmt::Debug {
    fn from_ptr(ptr: BaseArenaPtr<Self::T>) -> Self;

    fn ptr(self) -> BaseArenaPtr<Self::T>;

    /// Registers read by the instruction, including its guard predicate.
    ///
    /// Hard-wired registers are not reported.
    fn uses(self, mctx: &MContext<Self>) -> Vec<PReg>;

    /// Registers written by the instruction.
    ///
    /// Hard-wired registers are not reported.
    fn defs(self, mctx: &MContext<Self>) -> Vec<PReg>;

    /// Cycles between the issue of this instruction and the first issue cycle
    /// at which a reader of its result may issue.
    fn result_latency(self, mctx: &MContext<Self>) -> u32;

    /// Delay slots of a control transfer, zero for everything else.
    fn delay_slots(self, mctx: &MContext<Self>) -> u32;

    fn resource(self, mctx: &MContext<Self>) -> Resource;

    fn is_store(self, mctx: &MContext<Self>) -> bool;

    /// If this is an empty-slot placeholder.
    fn is_placeholder(self, mctx: &MContext<Self>) -> bool;

    /// Allocate a fresh empty-slot placeholder.
    fn build_placeholder(mctx: &mut MContext<Self>) -> Self;

    fn is_control_flow(self, mctx: &MContext<Self>) -> bool {
        self.resource(mctx) == Resource::Control
    }

    fn is_mem_access(self, mctx: &MContext<Self>) -> bool { self.resource(mctx) == Resource::Mem }
}

pub trait DisplayMInst<'a>: MInst {
    type Display: fmt::Display + 'a;

    fn display(self, mctx: &'a MContext<Self>, config: &'a DisplayConfig) -> Self::Display;
}

impl<I> ArenaAlloc<I::T, I> for MContext<I>
where
    I: MInst,
{
    fn alloc_with<F>(&mut self, f: F) -> I
    where
        F: FnOnce(I) -> I::T,
    {
        I::from_ptr(self.insts.alloc_with(|p| f(I::from_ptr(p))))
    }
}

impl<I> ArenaDeref<I::T, I> for MContext<I>
where
    I: MInst,
{
    fn try_deref(&self, ptr: I) -> Option<&I::T> { self.insts.try_deref(ptr.ptr()) }

    fn try_deref_mut(&mut self, ptr: I) -> Option<&mut I::T> { self.insts.try_deref_mut(ptr.ptr()) }
}

impl<I> ArenaFree<I::T, I> for MContext<I>
where
    I: MInst,
{
    fn free(&mut self, ptr: I) { self.insts.free(ptr.ptr()) }
}
