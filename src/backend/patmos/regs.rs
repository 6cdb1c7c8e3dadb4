use std::str::FromStr;

use crate::backend::regs::{PReg, RegKind};

/// General purpose register `rN`.
pub const fn r(num: u8) -> PReg { PReg::new(num, RegKind::General) }

/// Predicate register `pN`.
pub const fn p(num: u8) -> PReg { PReg::new(num, RegKind::Predicate) }

/// Special register `sN`.
pub const fn s(num: u8) -> PReg { PReg::new(num, RegKind::Special) }

/// The zero register.
pub const fn zero() -> PReg { r(0) }

/// The always-true predicate.
pub const fn ptrue() -> PReg { p(0) }

/// Return base, written by calls.
pub const fn srb() -> PReg { s(7) }

/// Return offset, written by calls.
pub const fn sro() -> PReg { s(8) }

/// Parse a register name, with or without the leading `$`.
///
/// `srb` and `sro` are accepted as aliases of `s7` and `s8`.
pub fn parse(name: &str) -> Option<PReg> {
    let name = name.strip_prefix('$').unwrap_or(name);

    match name {
        "srb" => return Some(srb()),
        "sro" => return Some(sro()),
        _ => {}
    }

    let mut chars = name.chars();
    let kind = match chars.next()? {
        'r' => RegKind::General,
        'p' => RegKind::Predicate,
        's' => RegKind::Special,
        _ => return None,
    };

    let num = u8::from_str(chars.as_str()).ok()?;
    if num >= PReg::count(kind) {
        return None;
    }
    Some(PReg::new(num, kind))
}
