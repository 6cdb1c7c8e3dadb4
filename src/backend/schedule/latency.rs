//! Latency model.
//!
//! Everything here is a pure function of the machine context and the
//! instructions or bundles passed in: nothing is cached, so the model can be
//! queried against any snapshot of a partially built schedule.

use rustc_hash::FxHashSet;

use super::ScheduleError;
use crate::backend::{bundle::Bundle, context::MContext, inst::MInst};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependence {
    /// Read after write.
    Raw,
    /// Write after read.
    War,
    /// Write after write.
    Waw,
    /// Memory ordering, at least one of the accesses is a store.
    Mem,
    /// One of the instructions transfers control.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMode {
    /// Register, memory and control hazards.
    Data,
    /// Only the delay of a control transfer, regardless of registers.
    ControlOnly,
}

/// Bundles already issued, indexed by issue cycle.
pub struct PlacedSnapshot<'a, I> {
    bundles: &'a [Bundle<I>],
}

impl<'a, I> PlacedSnapshot<'a, I> {
    pub fn new(bundles: &'a [Bundle<I>]) -> Self { Self { bundles } }

    /// The cycle the next bundle would issue in.
    pub fn next_cycle(&self) -> u32 { self.bundles.len() as u32 }
}

pub struct LatencyModel<'a, I>
where
    I: MInst,
{
    mctx: &'a MContext<I>,
}

impl<'a, I> LatencyModel<'a, I>
where
    I: MInst,
{
    pub fn new(mctx: &'a MContext<I>) -> Self { Self { mctx } }

    /// The dependences from `producer` to `consumer`, with `producer` first in
    /// program order.
    ///
    /// Whether the set is empty does not depend on the order of the two
    /// instructions.
    pub fn dependence(&self, producer: I, consumer: I) -> FxHashSet<Dependence> {
        let defs1 = producer.defs(self.mctx);
        let uses1 = producer.uses(self.mctx);

        let defs2 = consumer.defs(self.mctx);
        let uses2 = consumer.uses(self.mctx);

        let mut deps = FxHashSet::default();

        // RAW & WAW
        for def1 in defs1.iter() {
            if uses2.contains(def1) {
                deps.insert(Dependence::Raw);
            }
            if defs2.contains(def1) {
                deps.insert(Dependence::Waw);
            }
        }

        // WAR
        if uses1.iter().any(|use1| defs2.contains(use1)) {
            deps.insert(Dependence::War);
        }

        // MEM & CONTROL
        if producer.is_mem_access(self.mctx)
            && consumer.is_mem_access(self.mctx)
            && (producer.is_store(self.mctx) || consumer.is_store(self.mctx))
        {
            deps.insert(Dependence::Mem);
        }

        if producer.is_control_flow(self.mctx) || consumer.is_control_flow(self.mctx) {
            deps.insert(Dependence::Control);
        }

        deps
    }

    /// The minimum number of cycles `consumer` must issue after `producer`.
    pub fn inst_latency(&self, producer: I, consumer: I, mode: LatencyMode) -> u32 {
        if let LatencyMode::ControlOnly = mode {
            return self.control_delay(producer);
        }

        self.dependence(producer, consumer)
            .into_iter()
            .map(|dep| match dep {
                Dependence::Raw => producer.result_latency(self.mctx),
                Dependence::Waw => {
                    // the later write must not land before the earlier one
                    producer
                        .result_latency(self.mctx)
                        .saturating_sub(consumer.result_latency(self.mctx))
                        + 1
                }
                Dependence::Mem => u32::from(producer.is_store(self.mctx)),
                Dependence::War => 0,
                Dependence::Control => u32::from(producer.is_control_flow(self.mctx)),
            })
            .max()
            .unwrap_or(0)
    }

    /// The latency between two bundles.
    ///
    /// All instructions of a bundle issue in the same cycle, so the latency is
    /// the maximum over the constituent pairs. In [LatencyMode::ControlOnly]
    /// the consumer is not inspected and may be empty.
    pub fn latency(&self, producer: &Bundle<I>, consumer: &Bundle<I>, mode: LatencyMode) -> u32 {
        match mode {
            LatencyMode::ControlOnly => self.control_latency(producer),
            LatencyMode::Data => producer
                .iter()
                .flat_map(|p| consumer.iter().map(move |c| (p, c)))
                .map(|(p, c)| self.inst_latency(p, c, mode))
                .max()
                .unwrap_or(0),
        }
    }

    /// The delay slots required by the control transfers in `producer`.
    pub fn control_latency(&self, producer: &Bundle<I>) -> u32 {
        producer
            .iter()
            .map(|inst| self.control_delay(inst))
            .max()
            .unwrap_or(0)
    }

    /// If any instruction of `consumer` depends on any instruction of
    /// `producer`.
    pub fn depends(&self, producer: &Bundle<I>, consumer: &Bundle<I>) -> bool {
        producer
            .iter()
            .any(|p| consumer.iter().any(|c| !self.dependence(p, c).is_empty()))
    }

    /// Latency between the `producer`-th and the `consumer`-th bundle of the
    /// block window.
    ///
    /// Both indices must be inside the window and the producer must come
    /// first.
    pub fn unit_latency(
        &self,
        window: &[Bundle<I>],
        producer: usize,
        consumer: usize,
        mode: LatencyMode,
    ) -> Result<u32, ScheduleError> {
        for index in [producer, consumer] {
            if index >= window.len() {
                return Err(ScheduleError::OutOfWindow {
                    index,
                    len: window.len(),
                });
            }
        }
        if producer >= consumer {
            return Err(ScheduleError::NotInProgramOrder { producer, consumer });
        }
        Ok(self.latency(&window[producer], &window[consumer], mode))
    }

    /// The earliest cycle `consumer` can issue in without violating a hazard
    /// with any bundle of `snapshot`.
    pub fn earliest_cycle(&self, snapshot: &PlacedSnapshot<I>, consumer: &Bundle<I>) -> u32 {
        snapshot
            .bundles
            .iter()
            .enumerate()
            .filter(|(_, placed)| self.depends(placed, consumer))
            .map(|(cycle, placed)| cycle as u32 + self.latency(placed, consumer, LatencyMode::Data))
            .max()
            .unwrap_or(0)
    }

    fn control_delay(&self, inst: I) -> u32 {
        if inst.is_control_flow(self.mctx) {
            inst.delay_slots(self.mctx)
        } else {
            0
        }
    }
}
