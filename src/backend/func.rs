use core::fmt;
use std::hash::Hash;

use super::{block::MBlock, context::MContext, inst::MInst};
use crate::collections::storage::{ArenaAlloc, ArenaDeref, ArenaFree, ArenaPtr, BaseArenaPtr};

#[derive(Debug, Clone)]
pub struct MLabel(String);

impl MLabel {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for MLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl PartialEq for MLabel {
    fn eq(&self, other: &Self) -> bool { self.0 == other.0 }
}

impl Eq for MLabel {}

impl Hash for MLabel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.0.hash(state) }
}

impl<T> From<T> for MLabel
where
    T: AsRef<str>,
{
    fn from(value: T) -> Self { Self(value.as_ref().to_string()) }
}

/// Data of machine function.
pub struct MFuncData<I> {
    self_ptr: MFunc<I>,
    /// The label of the function
    label: MLabel,
    /// Blocks in layout order.
    blocks: Vec<MBlock<I>>,
}

impl<I> MFuncData<I> {
    pub fn self_ptr(&self) -> MFunc<I> { self.self_ptr }
}

#[derive(Debug, PartialEq, Eq)]
pub struct MFunc<I>(BaseArenaPtr<MFuncData<I>>);

impl<I> Clone for MFunc<I> {
    fn clone(&self) -> Self { *self }
}

impl<I> Copy for MFunc<I> {}

impl<I> Hash for MFunc<I> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.0.hash(state) }
}

impl<I> MFunc<I>
where
    I: MInst,
{
    /// Create a function and append it to the context's function list.
    pub fn new(mctx: &mut MContext<I>, label: impl Into<MLabel>) -> Self {
        let func: MFunc<I> = mctx.alloc_with(|self_ptr| MFuncData {
            self_ptr,
            label: label.into(),
            blocks: Vec::new(),
        });
        mctx.funcs_in_order.push(func);
        func
    }

    pub fn label(self, mctx: &MContext<I>) -> &MLabel { &self.deref(mctx).label }

    /// Blocks in layout order.
    pub fn blocks(self, mctx: &MContext<I>) -> &[MBlock<I>] { &self.deref(mctx).blocks }

    /// Append `block` at the end of the layout.
    pub fn push_back(self, mctx: &mut MContext<I>, block: MBlock<I>) {
        block.set_parent(mctx, Some(self));
        self.deref_mut(mctx).blocks.push(block);
    }

    pub fn entry_block(self, mctx: &MContext<I>) -> Option<MBlock<I>> {
        self.blocks(mctx).first().copied()
    }
}

impl<I> ArenaPtr for MFunc<I>
where
    I: MInst,
{
    type A = MContext<I>;
    type T = MFuncData<I>;

    fn try_deref(self, arena: &Self::A) -> Option<&Self::T> { ArenaDeref::try_deref(arena, self) }

    fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T> {
        ArenaDeref::try_deref_mut(arena, self)
    }
}

impl<I> ArenaAlloc<MFuncData<I>, MFunc<I>> for MContext<I>
where
    I: MInst,
{
    fn alloc_with<F>(&mut self, f: F) -> MFunc<I>
    where
        F: FnOnce(MFunc<I>) -> MFuncData<I>,
    {
        MFunc(self.funcs.alloc_with(|p| f(MFunc(p))))
    }
}

impl<I> ArenaDeref<MFuncData<I>, MFunc<I>> for MContext<I>
where
    I: MInst,
{
    fn try_deref(&self, ptr: MFunc<I>) -> Option<&MFuncData<I>> { self.funcs.try_deref(ptr.0) }

    fn try_deref_mut(&mut self, ptr: MFunc<I>) -> Option<&mut MFuncData<I>> {
        self.funcs.try_deref_mut(ptr.0)
    }
}

impl<I> ArenaFree<MFuncData<I>, MFunc<I>> for MContext<I>
where
    I: MInst,
{
    fn free(&mut self, ptr: MFunc<I>) { self.funcs.free(ptr.0) }
}
