//! Bundle scheduling.
//!
//! Each block is rescheduled on its own: the instructions are grouped into
//! bundles of at most [ISSUE_WIDTH](super::bundle::ISSUE_WIDTH) instructions
//! so that no hazard is exposed, padding with placeholders where nothing can
//! issue.

mod latency;
mod legality;
mod list;

use std::{fmt, ops::AddAssign};

pub use latency::{Dependence, LatencyMode, LatencyModel, PlacedSnapshot};
pub use legality::{check_bundle, try_pair, verify_schedule};
pub use list::ListScheduler;
use thiserror::Error;

use super::{
    block::MBlock,
    context::MContext,
    func::MFunc,
    inst::{MInst, Resource},
};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("bundle {index} is outside of the block window of {len} bundles")]
    OutOfWindow { index: usize, len: usize },

    #[error("bundle {producer} does not precede bundle {consumer}")]
    NotInProgramOrder { producer: usize, consumer: usize },

    #[error("bundle of {len} instructions exceeds the issue width")]
    BundleOverflow { len: usize },

    #[error("empty bundle")]
    EmptyBundle,

    #[error("more than one {resource:?} instruction in a bundle")]
    ResourceConflict { resource: Resource },

    #[error("control-flow instruction in non-terminal slot {slot}")]
    IllegalControlSlot { slot: usize },

    #[error("block terminator shares its bundle")]
    TerminatorNotAlone,

    #[error("block terminator is not in the last bundle")]
    TerminatorNotLast,

    #[error(
        "instruction {consumer} issues {actual} cycles after instruction {producer}, {required} required"
    )]
    LatencyViolated {
        producer: usize,
        consumer: usize,
        required: u32,
        actual: i64,
    },

    #[error("instruction {consumer} is not ordered after control-flow instruction {producer}")]
    ControlOrderViolated { producer: usize, consumer: usize },

    #[error("bundle at cycle {cycle} cannot issue before cycle {earliest}")]
    HazardAtCycle { cycle: u32, earliest: u32 },

    #[error("instruction {position} is missing from the schedule")]
    InstructionLost { position: usize },

    #[error("instruction {position} is scheduled more than once")]
    InstructionDuplicated { position: usize },

    #[error("instruction {inst} does not belong to the block")]
    ForeignInstruction { inst: String },

    #[error("no progress possible with {remaining} bundles left")]
    Unschedulable { remaining: usize },

    #[error("in block {label}: {source}")]
    Block {
        label: String,
        source: Box<ScheduleError>,
    },
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Pair independent instructions into the same bundle.
    pub bundle: bool,
    /// Verify every scheduled block before committing it.
    pub verify: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            bundle: true,
            verify: true,
        }
    }
}

/// Counters of a scheduling run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub blocks: usize,
    /// Real instructions, placeholders excluded.
    pub insts: usize,
    pub bundles: usize,
    /// Bundles issuing two real instructions.
    pub dual_issued: usize,
    /// Bundles issuing only placeholders.
    pub empty_slots: usize,
    /// Delay slots owed by the block terminators.
    pub terminator_delay_slots: u32,
}

impl AddAssign for ScheduleStats {
    fn add_assign(&mut self, rhs: Self) {
        self.blocks += rhs.blocks;
        self.insts += rhs.insts;
        self.bundles += rhs.bundles;
        self.dual_issued += rhs.dual_issued;
        self.empty_slots += rhs.empty_slots;
        self.terminator_delay_slots += rhs.terminator_delay_slots;
    }
}

impl fmt::Display for ScheduleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "blocks:                 {}", self.blocks)?;
        writeln!(f, "instructions:           {}", self.insts)?;
        writeln!(f, "bundles:                {}", self.bundles)?;
        writeln!(f, "dual-issued bundles:    {}", self.dual_issued)?;
        writeln!(f, "empty slots:            {}", self.empty_slots)?;
        writeln!(f, "terminator delay slots: {}", self.terminator_delay_slots)
    }
}

/// Schedule one block.
///
/// On error the block is left as it was.
pub fn schedule_block<I>(
    mctx: &mut MContext<I>,
    block: MBlock<I>,
    config: &ScheduleConfig,
) -> Result<ScheduleStats, ScheduleError>
where
    I: MInst,
{
    let result = ListScheduler::new(mctx, config).schedule_block(block);
    result.map_err(|err| ScheduleError::Block {
        label: block.label(mctx).to_string(),
        source: Box::new(err),
    })
}

pub fn schedule_func<I>(
    mctx: &mut MContext<I>,
    func: MFunc<I>,
    config: &ScheduleConfig,
) -> Result<ScheduleStats, ScheduleError>
where
    I: MInst,
{
    let mut stats = ScheduleStats::default();

    let blocks = func.blocks(mctx).to_vec();
    for block in blocks {
        stats += schedule_block(mctx, block, config)?;
    }

    log::debug!(
        "scheduled {}: {} instructions in {} bundles",
        func.label(mctx),
        stats.insts,
        stats.bundles
    );

    Ok(stats)
}

/// Schedule every function of the context.
///
/// Stops at the first block that fails; blocks scheduled before it keep their
/// new schedule.
pub fn schedule<I>(mctx: &mut MContext<I>, config: &ScheduleConfig) -> Result<ScheduleStats, ScheduleError>
where
    I: MInst,
{
    let mut stats = ScheduleStats::default();

    let funcs = mctx.funcs().to_vec();
    for func in funcs {
        stats += schedule_func(mctx, func, config)?;
    }

    Ok(stats)
}
