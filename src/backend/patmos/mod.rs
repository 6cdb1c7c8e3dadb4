pub mod inst;
pub mod parse;
pub mod regs;

pub use inst::{AluOp, CmpOp, Guard, Imm, LoadOp, PatmosInst, PatmosInstKind, StoreOp};
pub use parse::{parse, ParseError, ParseErrorKind};
