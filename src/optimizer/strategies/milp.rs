//! MILP (Mixed-Integer Linear Programming) block assignment
//!
//! One binary variable per (block, candidate start slot) and one continuous
//! overflow variable per slot:
//!
//! ```text
//! minimise   sum_t overflow[t]
//! subject to sum_s x[b][s] == 1                                  for every block b
//!            overflow[t] >= sum_{b,s running at t} p[b] * x[b][s] - capacity[t]
//!            overflow[t] >= 0
//! ```
//!
//! Candidate starts of a block are `0..=slot_count - slots_needed`, clamped to
//! `0..=0` for blocks longer than the horizon, so the model is always feasible.
//!
//! The deadline is checked while the model is built. With the `highs` feature
//! it is also handed to HiGHS as its time limit, and a solve stopped by that
//! limit is reported as timed out rather than returned. The pure-Rust default
//! backend cannot be interrupted once it starts solving.

use std::time::Instant;

use crate::domain::TimeSlot;
use crate::optimizer::{AssignmentSolver, Block, SolverError};

/// Time left before `deadline`, or `TimedOut` once it has passed.
#[cfg(feature = "optimization")]
fn remaining(started: Instant, deadline: Instant) -> Result<std::time::Duration, SolverError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(SolverError::TimedOut(started.elapsed()))
    } else {
        Ok(left)
    }
}

/// Exact solver backed by `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MilpSolver;

impl MilpSolver {
    pub fn new() -> Self {
        Self
    }

    #[cfg(feature = "optimization")]
    fn solve_milp(
        &self,
        blocks: &[Block],
        slots: &[TimeSlot],
        deadline: Instant,
    ) -> Result<Vec<usize>, SolverError> {
        #[cfg(not(feature = "highs"))]
        use good_lp::default_solver as backend;
        #[cfg(feature = "highs")]
        use good_lp::solvers::highs::highs as backend;
        use good_lp::{
            constraint, variable, Expression, ProblemVariables, ResolutionError, Solution,
            SolverModel, Variable,
        };

        let started = Instant::now();
        remaining(started, deadline)?;

        let slot_count = slots.len();
        let mut problem = ProblemVariables::new();

        let overflow: Vec<Variable> = problem.add_vector(variable().min(0.0), slot_count);
        let starts: Vec<Vec<Variable>> = blocks
            .iter()
            .map(|b| {
                (0..=b.last_start(slot_count))
                    .map(|_| problem.add(variable().binary()))
                    .collect()
            })
            .collect();

        let objective: Expression = overflow.iter().copied().sum();
        let mut model = problem.minimise(objective).using(backend);

        for row in &starts {
            let chosen: Expression = row.iter().copied().sum();
            model = model.with(constraint!(chosen == 1.0));
        }

        for (t, slot) in slots.iter().enumerate() {
            remaining(started, deadline)?;
            let load: Expression = blocks
                .iter()
                .zip(&starts)
                .flat_map(|(block, row)| {
                    row.iter()
                        .enumerate()
                        .filter(move |(s, _)| *s <= t && t < s + block.slots_needed)
                        .map(move |(_, x)| block.power_per_slot * *x)
                })
                .sum();
            model = model.with(constraint!(overflow[t] >= load - slot.capacity_wh));
        }

        #[cfg(feature = "highs")]
        let model = {
            use good_lp::solvers::WithTimeLimit;
            model.with_time_limit(remaining(started, deadline)?.as_secs_f64())
        };
        #[cfg(not(feature = "highs"))]
        remaining(started, deadline)?;

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => SolverError::Infeasible,
            other => SolverError::Failed(other.to_string()),
        })?;

        // HiGHS hands back its incumbent when the time limit stops it
        #[cfg(feature = "highs")]
        if solution.status() != good_lp::solvers::SolutionStatus::Optimal {
            return Err(SolverError::TimedOut(started.elapsed()));
        }

        starts
            .iter()
            .enumerate()
            .map(|(b, row)| {
                row.iter()
                    .position(|x| solution.value(*x) > 0.5)
                    .ok_or_else(|| SolverError::Failed(format!("block {b} has no start slot in solution")))
            })
            .collect()
    }

    #[cfg(not(feature = "optimization"))]
    fn solve_milp(
        &self,
        _blocks: &[Block],
        _slots: &[TimeSlot],
        _deadline: Instant,
    ) -> Result<Vec<usize>, SolverError> {
        Err(SolverError::Unavailable)
    }
}

impl AssignmentSolver for MilpSolver {
    fn name(&self) -> &'static str {
        "milp"
    }

    fn solve(&self, blocks: &[Block], slots: &[TimeSlot], deadline: Instant) -> Result<Vec<usize>, SolverError> {
        if blocks.is_empty() {
            return Ok(Vec::new());
        }
        if slots.is_empty() {
            return Err(SolverError::Infeasible);
        }
        self.solve_milp(blocks, slots, deadline)
    }
}

#[cfg(all(test, feature = "optimization"))]
mod tests {
    use super::*;
    use crate::optimizer::{total_overflow, SlotAssignment};
    use std::time::Duration;

    fn block(id: i64, power_per_slot: f64, slots_needed: usize) -> Block {
        Block {
            id,
            power_per_slot,
            slots_needed,
            start: SlotAssignment::Unassigned,
        }
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    fn placed(blocks: &[Block], starts: &[usize]) -> Vec<crate::optimizer::PlannedBlock> {
        blocks.iter().zip(starts).map(|(b, s)| b.place(*s)).collect()
    }

    #[test]
    fn test_single_block_has_zero_overflow() {
        let slots = vec![TimeSlot::new(100.0); 4];
        let blocks = vec![block(1, 50.0, 2)];
        let starts = MilpSolver.solve(&blocks, &slots, soon()).unwrap();
        assert!(starts[0] <= 2);
        assert!(total_overflow(&placed(&blocks, &starts), &slots).abs() < 1e-6);
    }

    #[test]
    fn test_two_blocks_placed_sequentially() {
        // Only one block fits per slot, so the optimum runs them back to back.
        let slots = vec![TimeSlot::new(100.0); 4];
        let blocks = vec![block(1, 80.0, 2), block(2, 80.0, 2)];
        let starts = MilpSolver.solve(&blocks, &slots, soon()).unwrap();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 2]);
        assert!(total_overflow(&placed(&blocks, &starts), &slots).abs() < 1e-6);
    }

    #[test]
    fn test_unavoidable_overflow_is_minimal() {
        let slots = vec![TimeSlot::new(100.0); 4];
        let blocks = vec![block(1, 80.0, 4), block(2, 80.0, 4)];
        let starts = MilpSolver.solve(&blocks, &slots, soon()).unwrap();
        assert_eq!(starts, vec![0, 0]);
        assert!((total_overflow(&placed(&blocks, &starts), &slots) - 240.0).abs() < 1e-6);
    }

    #[test]
    fn test_avoids_dark_slots() {
        let slots = vec![
            TimeSlot::new(0.0),
            TimeSlot::new(0.0),
            TimeSlot::new(200.0),
            TimeSlot::new(200.0),
        ];
        let blocks = vec![block(1, 100.0, 2)];
        assert_eq!(MilpSolver.solve(&blocks, &slots, soon()).unwrap(), vec![2]);
    }

    #[test]
    fn test_block_longer_than_horizon_is_clamped() {
        let slots = vec![TimeSlot::new(100.0); 2];
        let blocks = vec![block(1, 10.0, 5)];
        assert_eq!(MilpSolver.solve(&blocks, &slots, soon()).unwrap(), vec![0]);
    }

    #[test]
    fn test_passed_deadline_stops_before_solving() {
        let slots = vec![TimeSlot::new(100.0); 96];
        let blocks = vec![block(1, 80.0, 8), block(2, 80.0, 8)];
        let result = MilpSolver.solve(&blocks, &slots, Instant::now());
        assert!(matches!(result, Err(SolverError::TimedOut(_))));
    }
}
