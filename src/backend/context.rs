use core::fmt;
use std::str::FromStr;

use super::{
    block::MBlockData,
    func::{MFunc, MFuncData},
    inst::{DisplayMInst, MInst},
};
use crate::collections::storage::BaseArena;

/// How immediate operands are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintBytes {
    /// Print immediates as they are encoded.
    #[default]
    None,
    /// Print only call targets as byte addresses.
    Calls,
    /// Print every shifted immediate as a byte address.
    All,
}

impl FromStr for PrintBytes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "calls" => Ok(Self::Calls),
            "all" => Ok(Self::All),
            _ => Err(format!("unknown print-bytes mode: {}", s)),
        }
    }
}

/// Options of the assembly emission.
#[derive(Debug, Clone, Default)]
pub struct DisplayConfig {
    pub print_bytes: PrintBytes,
}

pub struct MContext<I>
where
    I: MInst,
{
    pub(super) insts: BaseArena<I::T>,
    pub(super) blocks: BaseArena<MBlockData<I>>,
    pub(super) funcs: BaseArena<MFuncData<I>>,

    pub(super) funcs_in_order: Vec<MFunc<I>>,
}

impl<I> Default for MContext<I>
where
    I: MInst,
{
    fn default() -> Self {
        Self {
            insts: BaseArena::default(),
            blocks: BaseArena::default(),
            funcs: BaseArena::default(),
            funcs_in_order: Vec::new(),
        }
    }
}

impl<I> fmt::Debug for MContext<I>
where
    I: MInst,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MContext")
            .field("funcs", &self.funcs_in_order)
            .field("insts", &self.insts.len())
            .finish()
    }
}

impl<I> MContext<I>
where
    I: MInst,
{
    pub fn new() -> Self { Self::default() }

    /// Functions in definition order.
    pub fn funcs(&self) -> &[MFunc<I>] { &self.funcs_in_order }

    /// The number of allocated instructions, placeholders included.
    pub fn num_insts(&self) -> usize { self.insts.len() }

    pub fn display<'a>(&'a self, config: &'a DisplayConfig) -> DisplayMContext<'a, I> {
        DisplayMContext { mctx: self, config }
    }
}

pub struct DisplayMContext<'a, I>
where
    I: MInst,
{
    mctx: &'a MContext<I>,
    config: &'a DisplayConfig,
}

impl<'a, I> fmt::Display for DisplayMContext<'a, I>
where
    I: DisplayMInst<'a>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "\t.text")?;
        for &func in self.mctx.funcs() {
            writeln!(f, "\t.globl {}", func.label(self.mctx))?;
            writeln!(f, "\t.type {}, @function", func.label(self.mctx))?;
            writeln!(f, "{}:", func.label(self.mctx))?;

            for &block in func.blocks(self.mctx) {
                // the entry block may share the label of the function
                if block.label(self.mctx) != func.label(self.mctx) {
                    writeln!(f, "{}:", block.label(self.mctx))?;
                }
                for bundle in block.bundles(self.mctx) {
                    let multi = bundle.len() > 1;
                    for (pos, inst) in bundle.iter().enumerate() {
                        // bundle delimiters only for multi-instruction bundles
                        let prefix = if multi && pos == 0 { "{ " } else { "  " };
                        write!(f, "{}{}", prefix, inst.display(self.mctx, self.config))?;
                        if multi && !bundle.is_bundled(pos) {
                            write!(f, " }}")?;
                        }
                        writeln!(f)?;
                    }
                }
            }

            writeln!(f)?;
        }

        Ok(())
    }
}
