use core::fmt;

/// The kind of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegKind {
    /// The general purpose register.
    General,
    /// The predicate register, used by guards and compares.
    Predicate,
    /// The special register, e.g., return base/offset.
    Special,
}

/// The physical register.
///
/// Scheduling runs after register allocation, so there is no virtual register
/// at this point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PReg(u8, RegKind);

impl PReg {
    pub const fn new(num: u8, kind: RegKind) -> Self { Self(num, kind) }

    pub const fn num(&self) -> u8 { self.0 }

    pub const fn kind(&self) -> RegKind { self.1 }

    /// Number of architectural registers of the given kind.
    pub const fn count(kind: RegKind) -> u8 {
        match kind {
            RegKind::General => 32,
            RegKind::Predicate => 8,
            RegKind::Special => 16,
        }
    }

    /// If the register is hard-wired, i.e., `r0` (always zero) or `p0`
    /// (always true).
    ///
    /// Reading or writing a hard-wired register never creates a dependence.
    pub const fn is_hardwired(&self) -> bool {
        self.0 == 0 && matches!(self.1, RegKind::General | RegKind::Predicate)
    }
}

impl fmt::Display for PReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            match self.1 {
                RegKind::General => "$r",
                RegKind::Predicate => "$p",
                RegKind::Special => "$s",
            },
            self.0
        )
    }
}
