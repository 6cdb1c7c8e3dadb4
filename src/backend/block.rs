use std::hash::Hash;

use super::{
    bundle::Bundle,
    context::MContext,
    func::{MFunc, MLabel},
    inst::MInst,
};
use crate::collections::storage::{ArenaAlloc, ArenaDeref, ArenaFree, ArenaPtr, BaseArenaPtr};

pub struct MBlockData<I> {
    label: MLabel,

    /// Bundles in issue order, one per cycle.
    bundles: Vec<Bundle<I>>,

    parent: Option<MFunc<I>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MBlock<I>(BaseArenaPtr<MBlockData<I>>);

impl<I> Clone for MBlock<I> {
    fn clone(&self) -> Self { *self }
}

impl<I> Copy for MBlock<I> {}

impl<I> Hash for MBlock<I> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.0.hash(state); }
}

impl<I> MBlock<I>
where
    I: MInst,
{
    pub fn new(mctx: &mut MContext<I>, label: impl Into<MLabel>) -> Self {
        mctx.alloc(MBlockData {
            label: label.into(),
            bundles: Vec::new(),
            parent: None,
        })
    }

    pub fn label(self, mctx: &MContext<I>) -> &MLabel { &self.deref(mctx).label }

    pub fn parent(self, mctx: &MContext<I>) -> Option<MFunc<I>> { self.deref(mctx).parent }

    pub(super) fn set_parent(self, mctx: &mut MContext<I>, parent: Option<MFunc<I>>) {
        self.deref_mut(mctx).parent = parent;
    }

    pub fn bundles(self, mctx: &MContext<I>) -> &[Bundle<I>] { &self.deref(mctx).bundles }

    /// Replace the bundles of the block.
    pub fn set_bundles(self, mctx: &mut MContext<I>, bundles: Vec<Bundle<I>>) {
        self.deref_mut(mctx).bundles = bundles;
    }

    /// Append `inst` as a bundle of its own.
    pub fn push_back(self, mctx: &mut MContext<I>, inst: I) {
        self.deref_mut(mctx).bundles.push(Bundle::single(inst));
    }

    pub fn push_bundle(self, mctx: &mut MContext<I>, bundle: Bundle<I>) {
        self.deref_mut(mctx).bundles.push(bundle);
    }

    /// All instructions in issue order.
    pub fn insts(self, mctx: &MContext<I>) -> Vec<I> {
        self.bundles(mctx)
            .iter()
            .flat_map(|bundle| bundle.iter())
            .collect()
    }

    /// The number of instructions, placeholders included.
    pub fn size(self, mctx: &MContext<I>) -> usize {
        self.bundles(mctx).iter().map(Bundle::len).sum()
    }
}

impl<I> ArenaPtr for MBlock<I>
where
    I: MInst,
{
    type A = MContext<I>;
    type T = MBlockData<I>;

    fn try_deref(self, arena: &Self::A) -> Option<&Self::T> { ArenaDeref::try_deref(arena, self) }

    fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T> {
        ArenaDeref::try_deref_mut(arena, self)
    }
}

impl<I> ArenaAlloc<MBlockData<I>, MBlock<I>> for MContext<I>
where
    I: MInst,
{
    fn alloc_with<F>(&mut self, f: F) -> MBlock<I>
    where
        F: FnOnce(MBlock<I>) -> MBlockData<I>,
    {
        MBlock(self.blocks.alloc_with(|p| f(MBlock(p))))
    }
}

impl<I> ArenaDeref<MBlockData<I>, MBlock<I>> for MContext<I>
where
    I: MInst,
{
    fn try_deref(&self, ptr: MBlock<I>) -> Option<&MBlockData<I>> { self.blocks.try_deref(ptr.0) }

    fn try_deref_mut(&mut self, ptr: MBlock<I>) -> Option<&mut MBlockData<I>> {
        self.blocks.try_deref_mut(ptr.0)
    }
}

impl<I> ArenaFree<MBlockData<I>, MBlock<I>> for MContext<I>
where
    I: MInst,
{
    fn free(&mut self, ptr: MBlock<I>) { self.blocks.free(ptr.0) }
}
