//! List scheduling of a single block.
//!
//! The bundles already present in the block are the scheduling units: they
//! are never split, only reordered and paired. Placeholders left by an
//! earlier run are dropped before scheduling. A block is rescheduled until
//! the schedule stops getting shorter, and a hazard-free block is kept as it
//! is unless it can be shortened, so running the scheduler on its own output
//! changes nothing.

use std::cmp::Reverse;

use rustc_hash::FxHashSet;

use super::{
    latency::{LatencyMode, LatencyModel},
    legality::{check_bundle, try_pair, verify_schedule},
    ScheduleConfig,
    ScheduleError,
    ScheduleStats,
};
use crate::{
    backend::{block::MBlock, bundle::Bundle, context::MContext, inst::MInst},
    collections::storage::ArenaFree,
};

/// Dependences between the units of a block, with the latency owed on each
/// edge.
struct DepGraph {
    succs: Vec<Vec<(usize, u32)>>,
    preds: Vec<Vec<(usize, u32)>>,
}

impl DepGraph {
    fn new(size: usize) -> Self {
        Self {
            succs: vec![Vec::new(); size],
            preds: vec![Vec::new(); size],
        }
    }

    fn add_dep(&mut self, unit1: usize, unit2: usize, latency: u32) {
        self.succs[unit1].push((unit2, latency));
        self.preds[unit2].push((unit1, latency));
    }

    fn preds(&self, unit: usize) -> &[(usize, u32)] { &self.preds[unit] }

    fn succs(&self, unit: usize) -> &[(usize, u32)] { &self.succs[unit] }
}

struct ScheduleState<I> {
    /// The issue cycle of each placed unit.
    cycles: Vec<Option<u32>>,
    /// The output, one bundle per cycle.
    bundles: Vec<Bundle<I>>,
    remaining: usize,
}

impl<I> ScheduleState<I>
where
    I: Copy + Eq,
{
    fn new(size: usize) -> Self {
        Self {
            cycles: vec![None; size],
            bundles: Vec::new(),
            remaining: size,
        }
    }

    fn cycle(&self) -> u32 { self.bundles.len() as u32 }

    fn is_placed(&self, unit: usize) -> bool { self.cycles[unit].is_some() }

    fn place(&mut self, unit: usize, cycle: u32) {
        self.cycles[unit] = Some(cycle);
        self.remaining -= 1;
    }

    /// If every predecessor of `unit` is placed and its latency has elapsed by
    /// `cycle`.
    fn is_ready(&self, graph: &DepGraph, unit: usize, cycle: u32) -> bool {
        !self.is_placed(unit)
            && graph
                .preds(unit)
                .iter()
                .all(|&(pred, latency)| matches!(self.cycles[pred], Some(c) if c + latency <= cycle))
    }

    /// If every predecessor of `unit` is placed, regardless of latencies.
    fn is_unblocked(&self, graph: &DepGraph, unit: usize) -> bool {
        !self.is_placed(unit)
            && graph
                .preds(unit)
                .iter()
                .all(|&(pred, _)| self.is_placed(pred))
    }

    /// The number of unplaced successors waiting only on `unit`.
    fn priority(&self, graph: &DepGraph, unit: usize) -> usize {
        graph
            .succs(unit)
            .iter()
            .filter(|&&(succ, _)| {
                !self.is_placed(succ)
                    && graph
                        .preds(succ)
                        .iter()
                        .all(|&(pred, _)| pred == unit || self.is_placed(pred))
            })
            .count()
    }

    /// Units ready at `cycle`, best first.
    fn ready(&self, graph: &DepGraph, cycle: u32) -> Vec<usize> {
        let mut ready = (0..self.cycles.len())
            .filter(|&unit| self.is_ready(graph, unit, cycle))
            .collect::<Vec<_>>();
        ready.sort_by_key(|&unit| (Reverse(self.priority(graph, unit)), unit));
        ready
    }
}

pub struct ListScheduler<'a, I>
where
    I: MInst,
{
    mctx: &'a mut MContext<I>,
    config: &'a ScheduleConfig,
    /// Placeholders allocated for the block being scheduled.
    placeholders: Vec<I>,
}

impl<'a, I> ListScheduler<'a, I>
where
    I: MInst,
{
    pub fn new(mctx: &'a mut MContext<I>, config: &'a ScheduleConfig) -> Self {
        Self {
            mctx,
            config,
            placeholders: Vec::new(),
        }
    }

    /// Reschedule `block`, replacing its bundles.
    ///
    /// A block that is already free of hazards keeps its bundles unless a
    /// shorter schedule exists. On error the block keeps its bundles.
    /// Placeholders left out of the committed bundles are freed, both those
    /// allocated here and those the block came in with.
    pub fn schedule_block(&mut self, block: MBlock<I>) -> Result<ScheduleStats, ScheduleError> {
        let original = block.bundles(self.mctx).to_vec();

        self.placeholders.clear();
        let result = self.converge(&original);

        // on error the original bundles stay, placeholders included
        let (committed, dropped): (FxHashSet<I>, Vec<I>) = match &result {
            Ok(layout) => {
                let mctx = &*self.mctx;
                let committed: FxHashSet<I> = layout.iter().flat_map(|bundle| bundle.iter()).collect();
                let dropped = original
                    .iter()
                    .flat_map(|bundle| bundle.iter())
                    .filter(|inst| inst.is_placeholder(mctx) && !committed.contains(inst))
                    .collect();
                (committed, dropped)
            }
            Err(_) => (FxHashSet::default(), Vec::new()),
        };
        for placeholder in self.placeholders.drain(..) {
            if !committed.contains(&placeholder) {
                self.mctx.free(placeholder);
            }
        }
        for placeholder in dropped {
            self.mctx.free(placeholder);
        }

        let layout = result?;
        let stats = self.stats(&layout);

        log::debug!(
            "scheduled block {}: {} instructions into {} bundles, {} empty",
            block.label(self.mctx),
            stats.insts,
            stats.bundles,
            stats.empty_slots
        );

        if layout != original {
            block.set_bundles(self.mctx, layout);
        }

        Ok(stats)
    }

    /// Schedule `original` until no shorter schedule is found.
    fn converge(&mut self, original: &[Bundle<I>]) -> Result<Vec<Bundle<I>>, ScheduleError> {
        let units = self.collect_units(original);
        for unit in units.iter() {
            check_bundle(self.mctx, unit)?;
        }

        let input = units
            .iter()
            .flat_map(|unit| unit.iter())
            .collect::<Vec<_>>();
        let terminator = self.terminator_unit(&units).map(|last| units[last]);

        let hazard_free = verify_schedule(self.mctx, &input, terminator.as_ref(), original).is_ok();

        let mut layout = self.list_schedule(&units)?;
        if hazard_free && layout.len() >= original.len() {
            log::trace!("keeping the hazard-free layout");
            layout = original.to_vec();
        } else {
            loop {
                let units = self.collect_units(&layout);
                let next = self.list_schedule(&units)?;
                if next.len() >= layout.len() {
                    break;
                }
                log::trace!("rescheduled into {} bundles", next.len());
                layout = next;
            }
        }

        if self.config.verify {
            verify_schedule(self.mctx, &input, terminator.as_ref(), &layout)?;
        }

        Ok(layout)
    }

    /// The scheduling units of a layout, placeholders stripped.
    fn collect_units(&self, bundles: &[Bundle<I>]) -> Vec<Bundle<I>> {
        let mctx = &*self.mctx;
        bundles
            .iter()
            .map(|bundle| bundle.retain(|inst| !inst.is_placeholder(mctx)))
            .filter(|bundle| !bundle.is_empty())
            .collect()
    }

    /// The index of the last unit if it transfers control.
    fn terminator_unit(&self, units: &[Bundle<I>]) -> Option<usize> {
        let last = units.len().checked_sub(1)?;
        units[last]
            .iter()
            .any(|inst| inst.is_control_flow(self.mctx))
            .then_some(last)
    }

    fn build_graph(&self, units: &[Bundle<I>], terminator: Option<usize>) -> Result<DepGraph, ScheduleError> {
        let model = LatencyModel::new(self.mctx);
        let mut graph = DepGraph::new(units.len());

        for consumer in 0..units.len() {
            for producer in 0..consumer {
                if !model.depends(&units[producer], &units[consumer]) {
                    continue;
                }
                let mut latency = model.unit_latency(units, producer, consumer, LatencyMode::Data)?;
                if terminator == Some(consumer) {
                    // the terminator issues alone, after everything else
                    latency = latency.max(1);
                }
                graph.add_dep(producer, consumer, latency);
            }
        }

        Ok(graph)
    }

    /// One list scheduling pass over `units`.
    fn list_schedule(&mut self, units: &[Bundle<I>]) -> Result<Vec<Bundle<I>>, ScheduleError> {
        let size = units.len();

        let terminator_unit = self.terminator_unit(units);
        let terminator = terminator_unit.and_then(|last| {
            units[last]
                .iter()
                .find(|inst| inst.is_control_flow(self.mctx))
        });

        let graph = self.build_graph(units, terminator_unit)?;
        let mut state = ScheduleState::new(size);

        while state.remaining > 0 {
            let cycle = state.cycle();
            let ready = state.ready(&graph, cycle);

            let Some(&first) = ready.first() else {
                if !(0..size).any(|unit| state.is_unblocked(&graph, unit)) {
                    return Err(ScheduleError::Unschedulable {
                        remaining: state.remaining,
                    });
                }
                let placeholder = I::build_placeholder(self.mctx);
                self.placeholders.push(placeholder);
                state.bundles.push(Bundle::single(placeholder));
                log::trace!("cycle {}: empty", cycle);
                continue;
            };

            state.place(first, cycle);
            let mut bundle = units[first];

            if self.config.bundle && bundle.len() == 1 {
                // zero-latency edges from `first` are satisfied in this cycle
                for candidate in state.ready(&graph, cycle) {
                    if units[candidate].len() != 1 {
                        continue;
                    }
                    let Some(inst) = units[candidate].first() else {
                        continue;
                    };
                    if let Some(pair) = try_pair(self.mctx, &bundle, inst, terminator) {
                        state.place(candidate, cycle);
                        bundle = pair;
                        break;
                    }
                }
            }

            log::trace!("cycle {}: {:?}", cycle, bundle);
            state.bundles.push(bundle);
        }

        Ok(state.bundles)
    }

    fn stats(&self, layout: &[Bundle<I>]) -> ScheduleStats {
        let mctx = &*self.mctx;
        let model = LatencyModel::new(mctx);

        let real = |bundle: &Bundle<I>| bundle.iter().filter(|inst| !inst.is_placeholder(mctx)).count();

        ScheduleStats {
            blocks: 1,
            insts: layout.iter().map(real).sum(),
            bundles: layout.len(),
            dual_issued: layout.iter().filter(|&bundle| real(bundle) == 2).count(),
            empty_slots: layout.iter().filter(|&bundle| real(bundle) == 0).count(),
            terminator_delay_slots: layout
                .last()
                .map_or(0, |last| model.control_latency(last)),
        }
    }
}
