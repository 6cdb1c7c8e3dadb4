//! Bundle legality and schedule verification.

use rustc_hash::FxHashMap;

use super::{
    latency::{Dependence, LatencyMode, LatencyModel, PlacedSnapshot},
    ScheduleError,
};
use crate::backend::{
    bundle::Bundle,
    context::MContext,
    inst::{MInst, Resource},
};

/// Check the slot and resource rules of a single bundle.
///
/// - At most one instruction accesses data memory.
/// - At most one instruction is a multiplication.
/// - At most one instruction transfers control, and only from the terminal
///   slot.
pub fn check_bundle<I>(mctx: &MContext<I>, bundle: &Bundle<I>) -> Result<(), ScheduleError>
where
    I: MInst,
{
    if bundle.is_empty() {
        return Err(ScheduleError::EmptyBundle);
    }

    let mut count_mem = 0;
    let mut count_mul = 0;
    let mut count_control = 0;

    for (slot, inst) in bundle.iter().enumerate() {
        match inst.resource(mctx) {
            Resource::Mem => count_mem += 1,
            Resource::Mul => count_mul += 1,
            Resource::Control => {
                count_control += 1;
                if bundle.is_bundled(slot) {
                    return Err(ScheduleError::IllegalControlSlot { slot });
                }
            }
            Resource::Alu | Resource::None => {}
        }
    }

    for (count, resource) in [
        (count_mem, Resource::Mem),
        (count_mul, Resource::Mul),
        (count_control, Resource::Control),
    ] {
        if count > 1 {
            return Err(ScheduleError::ResourceConflict { resource });
        }
    }

    Ok(())
}

/// Try to add `candidate` to the open bundle `first`.
///
/// Returns the resulting bundle, with a control-flow instruction moved to the
/// terminal slot, or `None` if the pair is not legal. The block terminator
/// never pairs.
pub fn try_pair<I>(
    mctx: &MContext<I>,
    first: &Bundle<I>,
    candidate: I,
    terminator: Option<I>,
) -> Option<Bundle<I>>
where
    I: MInst,
{
    if first.is_full() {
        return None;
    }
    if let Some(terminator) = terminator {
        if candidate == terminator || first.contains(terminator) {
            return None;
        }
    }

    let open_is_control = first
        .terminal()
        .is_some_and(|inst| inst.is_control_flow(mctx));

    let pair = if open_is_control && !candidate.is_control_flow(mctx) {
        Bundle::from_insts(std::iter::once(candidate).chain(first.iter()))
    } else {
        Bundle::from_insts(first.iter().chain(std::iter::once(candidate)))
    }
    .ok()?;

    check_bundle(mctx, &pair).ok()?;
    Some(pair)
}

/// Verify a scheduled block against its input.
///
/// `input` holds the real instructions of the block in program order, and
/// `terminator` the unit ending the block with a control transfer, if any.
/// The terminator unit must issue in the last bundle with nothing added to
/// it. Placeholders in `output` are skipped.
///
/// A bundle issued too early after a bundle it depends on is reported as
/// [ScheduleError::HazardAtCycle]. Hazards between the two slots of a bundle,
/// or between instructions issued against program order, are reported per
/// instruction pair.
pub fn verify_schedule<I>(
    mctx: &MContext<I>,
    input: &[I],
    terminator: Option<&Bundle<I>>,
    output: &[Bundle<I>],
) -> Result<(), ScheduleError>
where
    I: MInst,
{
    let positions: FxHashMap<I, usize> = input
        .iter()
        .enumerate()
        .map(|(pos, &inst)| (inst, pos))
        .collect();

    let terminator = terminator.and_then(|unit| {
        unit.iter()
            .find(|inst| inst.is_control_flow(mctx))
            .map(|inst| (unit, inst))
    });

    let mut cycles: FxHashMap<I, u32> = FxHashMap::default();

    for (cycle, bundle) in output.iter().enumerate() {
        check_bundle(mctx, bundle)?;
        if let Some((unit, inst)) = terminator {
            if bundle.contains(inst) && bundle != unit {
                return Err(ScheduleError::TerminatorNotAlone);
            }
        }

        for inst in bundle.iter() {
            if inst.is_placeholder(mctx) {
                continue;
            }
            let Some(&position) = positions.get(&inst) else {
                return Err(ScheduleError::ForeignInstruction {
                    inst: format!("{:?}", inst),
                });
            };
            if cycles.insert(inst, cycle as u32).is_some() {
                return Err(ScheduleError::InstructionDuplicated { position });
            }
        }
    }

    if let Some(position) = input.iter().position(|inst| !cycles.contains_key(inst)) {
        return Err(ScheduleError::InstructionLost { position });
    }

    if let Some((_, inst)) = terminator {
        if cycles[&inst] as usize + 1 != output.len() {
            return Err(ScheduleError::TerminatorNotLast);
        }
    }

    let model = LatencyModel::new(mctx);

    // every bundle against the bundles issued before it
    for (cycle, bundle) in output.iter().enumerate() {
        let snapshot = PlacedSnapshot::new(&output[..cycle]);
        let earliest = model.earliest_cycle(&snapshot, bundle);
        if earliest > cycle as u32 {
            return Err(ScheduleError::HazardAtCycle {
                cycle: cycle as u32,
                earliest,
            });
        }
    }

    // the remaining hazards are within a bundle or against program order
    for (producer, &x) in input.iter().enumerate() {
        for (consumer, &y) in input.iter().enumerate().skip(producer + 1) {
            let deps = model.dependence(x, y);
            if deps.is_empty() {
                continue;
            }
            let required = model.inst_latency(x, y, LatencyMode::Data);
            let actual = i64::from(cycles[&y]) - i64::from(cycles[&x]);
            if actual < i64::from(required) {
                if deps.contains(&Dependence::Control) {
                    return Err(ScheduleError::ControlOrderViolated { producer, consumer });
                }
                return Err(ScheduleError::LatencyViolated {
                    producer,
                    consumer,
                    required,
                    actual,
                });
            }
        }
    }

    Ok(())
}
