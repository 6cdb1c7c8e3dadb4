use std::fmt;

use super::schedule::ScheduleError;

/// The number of instructions issued together in one cycle.
pub const ISSUE_WIDTH: usize = 2;

/// A group of instructions issued in the same cycle.
///
/// Slots are filled from the front; the last occupied slot is the terminal
/// slot, the only one a control-flow instruction may take.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bundle<I> {
    slots: [Option<I>; ISSUE_WIDTH],
    len: usize,
}

impl<I> Default for Bundle<I>
where
    I: Copy,
{
    fn default() -> Self {
        Self {
            slots: [None; ISSUE_WIDTH],
            len: 0,
        }
    }
}

impl<I> Bundle<I>
where
    I: Copy + Eq,
{
    pub fn new() -> Self { Self::default() }

    /// A bundle issuing only `inst`.
    pub fn single(inst: I) -> Self {
        let mut bundle = Self::new();
        bundle.slots[0] = Some(inst);
        bundle.len = 1;
        bundle
    }

    /// Build a bundle from the given instructions, in slot order.
    pub fn from_insts(insts: impl IntoIterator<Item = I>) -> Result<Self, ScheduleError> {
        let mut bundle = Self::new();
        for inst in insts {
            bundle.push(inst)?;
        }
        Ok(bundle)
    }

    /// Append `inst` into the next free slot.
    pub fn push(&mut self, inst: I) -> Result<(), ScheduleError> {
        if self.len == ISSUE_WIDTH {
            return Err(ScheduleError::BundleOverflow { len: self.len + 1 });
        }
        self.slots[self.len] = Some(inst);
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn is_full(&self) -> bool { self.len == ISSUE_WIDTH }

    pub fn get(&self, pos: usize) -> Option<I> { self.slots.get(pos).copied().flatten() }

    pub fn first(&self) -> Option<I> { self.get(0) }

    /// The instruction in the terminal slot.
    pub fn terminal(&self) -> Option<I> { self.len.checked_sub(1).and_then(|pos| self.get(pos)) }

    /// If the instruction at `pos` is issued together with the following one.
    ///
    /// This is the per-instruction bundle bit of the encoding: set on every
    /// slot except the terminal one.
    pub fn is_bundled(&self, pos: usize) -> bool { pos + 1 < self.len }

    pub fn contains(&self, inst: I) -> bool { self.iter().any(|i| i == inst) }

    pub fn iter(&self) -> impl Iterator<Item = I> + '_ { self.slots[..self.len].iter().flatten().copied() }

    /// Keep only the instructions satisfying `f`, preserving slot order.
    pub fn retain<F>(&self, mut f: F) -> Self
    where
        F: FnMut(I) -> bool,
    {
        let mut bundle = Self::new();
        for inst in self.iter().filter(|inst| f(*inst)) {
            bundle.slots[bundle.len] = Some(inst);
            bundle.len += 1;
        }
        bundle
    }
}

impl<I> fmt::Debug for Bundle<I>
where
    I: Copy + Eq + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
