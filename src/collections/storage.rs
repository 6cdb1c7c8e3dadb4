//! Arena storage.
//!
//! Machine instructions, blocks and functions live in arenas owned by the
//! machine context, and everything else refers to them through small `Copy`
//! handles. Bundles are nothing more than short lists of such handles, so
//! reordering a block never moves or clones an instruction.
//!
//! - [ArenaPtr]: a handle that can be dereferenced in its arena.
//! - [ArenaDeref]: dereferencing a handle.
//! - [ArenaAlloc]: allocating a value and getting its handle back.
//! - [ArenaFree]: releasing a slot.
//!
//! A container holding several [BaseArena]s can implement the traits once per
//! handle type with [impl_arena](crate::impl_arena).
//!
//! # Examples
//!
//! ```rust
//! use patsched::collections::storage::*;
//!
//! struct Op {
//!     mnemonic: &'static str,
//!     this: BaseArenaPtr<Op>,
//! }
//!
//! let mut arena = BaseArena::default();
//!
//! let add = arena.alloc_with(|this| Op { mnemonic: "add", this });
//! let nop = arena.alloc_with(|this| Op { mnemonic: "nop", this });
//!
//! assert_eq!(arena.try_deref(add).unwrap().mnemonic, "add");
//! assert!(arena.try_deref(nop).unwrap().this == nop);
//!
//! arena.free(nop);
//! assert!(arena.try_deref(nop).is_none());
//!
//! // freed slots are reused
//! let sub = arena.alloc_with(|this| Op { mnemonic: "sub", this });
//! assert_eq!(sub, nop);
//! ```

use std::{
    collections::VecDeque,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// Dereferencing a handle in an arena-like container.
pub trait ArenaDeref<T, Ptr>
where
    Ptr: ArenaPtr<T = T, A = Self>,
{
    /// Get the value behind `ptr`, or `None` if the slot is vacant or out of
    /// bounds.
    fn try_deref(&self, ptr: Ptr) -> Option<&T>;

    /// Mutable version of [ArenaDeref::try_deref].
    fn try_deref_mut(&mut self, ptr: Ptr) -> Option<&mut T>;
}

/// Allocating values in an arena-like container.
pub trait ArenaAlloc<T, Ptr>: ArenaDeref<T, Ptr>
where
    Ptr: ArenaPtr<T = T, A = Self>,
{
    /// Reserve a slot, hand its handle to `f`, and store what `f` returns.
    ///
    /// Useful for records that keep their own handle.
    fn alloc_with<F>(&mut self, f: F) -> Ptr
    where
        F: FnOnce(Ptr) -> T;

    fn alloc(&mut self, val: T) -> Ptr { self.alloc_with(|_| val) }
}

/// Releasing values in an arena-like container.
pub trait ArenaFree<T, Ptr>: ArenaAlloc<T, Ptr>
where
    Ptr: ArenaPtr<T = T, A = Self>,
{
    /// Free the slot behind `ptr`.
    ///
    /// # Panics
    ///
    /// Panics on double free or on an out-of-bounds handle.
    fn free(&mut self, ptr: Ptr);
}

/// A handle into an arena.
pub trait ArenaPtr: Copy + Sized + Eq {
    /// The value type.
    type T;

    /// The arena type.
    type A: ArenaDeref<Self::T, Self>;

    fn try_deref(self, arena: &Self::A) -> Option<&Self::T>;

    fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T>;

    /// Dereference the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to `arena` or was freed.
    fn deref(self, arena: &Self::A) -> &Self::T {
        self.try_deref(arena).expect("the arena pointer is invalid")
    }

    /// Dereference the handle mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to `arena` or was freed.
    fn deref_mut(self, arena: &mut Self::A) -> &mut Self::T {
        self.try_deref_mut(arena)
            .expect("the arena pointer is invalid")
    }
}

/// A typed index into a [BaseArena].
pub struct BaseArenaPtr<T> {
    id: usize,
    _marker: PhantomData<T>,
}

impl<T> fmt::Debug for BaseArenaPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.id) }
}

impl<T> PartialEq for BaseArenaPtr<T> {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl<T> Eq for BaseArenaPtr<T> {}

impl<T> PartialOrd for BaseArenaPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl<T> Ord for BaseArenaPtr<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.id.cmp(&other.id) }
}

impl<T> Hash for BaseArenaPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

impl<T> From<usize> for BaseArenaPtr<T> {
    fn from(id: usize) -> Self {
        BaseArenaPtr {
            id,
            _marker: PhantomData,
        }
    }
}

#[allow(clippy::non_canonical_clone_impl)]
impl<T> Clone for BaseArenaPtr<T> {
    fn clone(&self) -> Self {
        // do not require `T: Clone`
        BaseArenaPtr {
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> Copy for BaseArenaPtr<T> {}

impl<T> BaseArenaPtr<T> {
    /// The slot index of the handle.
    pub fn id(self) -> usize { self.id }
}

impl<T> ArenaPtr for BaseArenaPtr<T> {
    type A = BaseArena<T>;
    type T = T;

    fn try_deref(self, arena: &BaseArena<T>) -> Option<&T> { arena.try_deref(self) }

    fn try_deref_mut(self, arena: &mut BaseArena<T>) -> Option<&mut T> { arena.try_deref_mut(self) }
}

enum BaseArenaEntry<T> {
    Vacant,
    Occupied(T),
}

/// A vector-backed arena with slot reuse.
pub struct BaseArena<T> {
    pool: Vec<BaseArenaEntry<T>>,
    /// Freed slots, reused in FIFO order.
    free: VecDeque<usize>,
}

impl<T> Default for BaseArena<T> {
    fn default() -> Self {
        BaseArena {
            pool: Vec::new(),
            free: VecDeque::new(),
        }
    }
}

impl<T> ArenaAlloc<T, BaseArenaPtr<T>> for BaseArena<T> {
    fn alloc_with<F>(&mut self, f: F) -> BaseArenaPtr<T>
    where
        F: FnOnce(BaseArenaPtr<T>) -> T,
    {
        let index = if let Some(index) = self.free.pop_front() {
            index
        } else {
            self.pool.push(BaseArenaEntry::Vacant);
            self.pool.len() - 1
        };
        let ptr = BaseArenaPtr::from(index);
        self.pool[index] = BaseArenaEntry::Occupied(f(ptr));
        ptr
    }
}

impl<T> ArenaFree<T, BaseArenaPtr<T>> for BaseArena<T> {
    fn free(&mut self, ptr: BaseArenaPtr<T>) {
        if let BaseArenaEntry::Vacant = self.pool[ptr.id()] {
            panic!("the arena pointer is invalid, double free may occur")
        }
        self.pool[ptr.id()] = BaseArenaEntry::Vacant;
        self.free.push_back(ptr.id());
    }
}

impl<T> ArenaDeref<T, BaseArenaPtr<T>> for BaseArena<T> {
    fn try_deref(&self, ptr: BaseArenaPtr<T>) -> Option<&T> {
        match self.pool.get(ptr.id())? {
            BaseArenaEntry::Vacant => None,
            BaseArenaEntry::Occupied(val) => Some(val),
        }
    }

    fn try_deref_mut(&mut self, ptr: BaseArenaPtr<T>) -> Option<&mut T> {
        match self.pool.get_mut(ptr.id())? {
            BaseArenaEntry::Vacant => None,
            BaseArenaEntry::Occupied(val) => Some(val),
        }
    }
}

impl<T> BaseArena<T> {
    /// Number of occupied slots.
    pub fn len(&self) -> usize { self.pool.len() - self.free.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Iterate over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (BaseArenaPtr<T>, &T)> {
        self.pool
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                BaseArenaEntry::Vacant => None,
                BaseArenaEntry::Occupied(val) => Some((BaseArenaPtr::from(index), val)),
            })
    }
}

/// Implement the arena traits of a wrapper handle `$ptr` (a tuple struct over
/// a [BaseArenaPtr]) for the container `$arena`, whose field `$field` is the
/// backing [BaseArena].
#[macro_export]
macro_rules! impl_arena {
    ($arena:ty, $value:ty, $ptr:path, $field:ident) => {
        impl $crate::collections::storage::ArenaPtr for $ptr {
            type A = $arena;
            type T = $value;

            fn try_deref(self, arena: &Self::A) -> Option<&Self::T> {
                $crate::collections::storage::ArenaDeref::try_deref(arena, self)
            }

            fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T> {
                $crate::collections::storage::ArenaDeref::try_deref_mut(arena, self)
            }
        }

        impl $crate::collections::storage::ArenaAlloc<$value, $ptr> for $arena {
            fn alloc_with<F>(&mut self, f: F) -> $ptr
            where
                F: FnOnce($ptr) -> $value,
            {
                $ptr(self.$field.alloc_with(|ptr| f($ptr(ptr))))
            }
        }

        impl $crate::collections::storage::ArenaDeref<$value, $ptr> for $arena {
            fn try_deref(&self, ptr: $ptr) -> Option<&$value> { self.$field.try_deref(ptr.0) }

            fn try_deref_mut(&mut self, ptr: $ptr) -> Option<&mut $value> {
                self.$field.try_deref_mut(ptr.0)
            }
        }

        impl $crate::collections::storage::ArenaFree<$value, $ptr> for $arena {
            fn free(&mut self, ptr: $ptr) { self.$field.free(ptr.0) }
        }
    };
}
