//! # Machine Backend
//!
//! Target-independent machine IR and the bundle scheduler, plus the Patmos
//! target the scheduler is driven with.

pub mod block;
pub mod bundle;
pub mod context;
pub mod func;
pub mod inst;
pub mod patmos;
pub mod regs;
pub mod schedule;

pub use block::MBlock;
pub use bundle::{Bundle, ISSUE_WIDTH};
pub use context::{DisplayConfig, MContext, PrintBytes};
pub use func::{MFunc, MLabel};
pub use inst::{MInst, Resource};
pub use regs::{PReg, RegKind};
