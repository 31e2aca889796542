use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::Display;
use tracing::{debug, error, warn};

use super::{total_overflow, Block, GreedyScheduler, MilpSolver, PlannedBlock, SolverError};
use crate::domain::TimeSlot;

pub const DEFAULT_SOLVER_TIME_LIMIT: Duration = Duration::from_secs(30);

/// How long past its deadline a solver is waited for before its answer is
/// abandoned.
pub const SOLVER_DEADLINE_GRACE: Duration = Duration::from_secs(2);

/// Narrow seam to an exact assignment backend: build a model from the blocks
/// and slots, solve it, and report the start slot chosen for each block (in
/// input order).
///
/// Implementations are blocking; [`BlockScheduler`] runs them on the blocking
/// pool.
pub trait AssignmentSolver: Send + Sync {
    fn name(&self) -> &'static str;
    /// Must stop by `deadline`, answering [`SolverError::TimedOut`]. Only
    /// proven-optimal solutions may be returned as `Ok`.
    fn solve(&self, blocks: &[Block], slots: &[TimeSlot], deadline: Instant) -> Result<Vec<usize>, SolverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ScheduleStrategy {
    Optimal,
    Greedy,
    /// Nothing to place.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSchedule {
    /// Placed blocks, in the order they were submitted.
    pub blocks: Vec<PlannedBlock>,
    pub strategy: ScheduleStrategy,
    pub overflow_wh: f64,
}

/// Assigns start slots to blocks: optimal when the solver delivers in time,
/// greedy otherwise.
#[derive(Clone)]
pub struct BlockScheduler {
    solver: Option<Arc<dyn AssignmentSolver>>,
    time_limit: Duration,
    greedy: GreedyScheduler,
}

impl Default for BlockScheduler {
    fn default() -> Self {
        Self::with_default_solver(DEFAULT_SOLVER_TIME_LIMIT)
    }
}

impl BlockScheduler {
    pub fn new(solver: Option<Arc<dyn AssignmentSolver>>, time_limit: Duration) -> Self {
        Self {
            solver,
            time_limit,
            greedy: GreedyScheduler,
        }
    }

    /// MILP backed scheduler when built with `optimization`, greedy only otherwise.
    pub fn with_default_solver(time_limit: Duration) -> Self {
        let solver: Option<Arc<dyn AssignmentSolver>> = if cfg!(feature = "optimization") {
            Some(Arc::new(MilpSolver::new()) as Arc<dyn AssignmentSolver>)
        } else {
            None
        };
        Self::new(solver, time_limit)
    }

    pub fn greedy_only() -> Self {
        Self::new(None, DEFAULT_SOLVER_TIME_LIMIT)
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub async fn schedule(&self, blocks: Vec<Block>, slots: &[TimeSlot]) -> BlockSchedule {
        if blocks.is_empty() {
            return BlockSchedule {
                blocks: Vec::new(),
                strategy: ScheduleStrategy::Empty,
                overflow_wh: 0.0,
            };
        }

        let (planned, strategy) = match self.solve_optimal(&blocks, slots).await {
            Ok(planned) => (planned, ScheduleStrategy::Optimal),
            Err(SolverError::Unavailable) => {
                debug!("no solver configured, using greedy placement");
                (self.greedy.place(&blocks, slots), ScheduleStrategy::Greedy)
            }
            Err(e) => {
                warn!(error = %e, blocks = blocks.len(), "optimal placement failed, falling back to greedy");
                (self.greedy.place(&blocks, slots), ScheduleStrategy::Greedy)
            }
        };

        let overflow_wh = total_overflow(&planned, slots);
        BlockSchedule {
            blocks: planned,
            strategy,
            overflow_wh,
        }
    }

    async fn solve_optimal(
        &self,
        blocks: &[Block],
        slots: &[TimeSlot],
    ) -> Result<Vec<PlannedBlock>, SolverError> {
        let solver = self.solver.clone().ok_or(SolverError::Unavailable)?;
        let name = solver.name();
        let (model_blocks, model_slots) = (blocks.to_vec(), slots.to_vec());
        let deadline = Instant::now() + self.time_limit;
        let task = tokio::task::spawn_blocking(move || solver.solve(&model_blocks, &model_slots, deadline));

        let starts = match tokio::time::timeout(self.time_limit + SOLVER_DEADLINE_GRACE, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => return Err(SolverError::Failed(join.to_string())),
            Err(_) => {
                error!(solver = name, "solver ignored its deadline, abandoning it");
                return Err(SolverError::TimedOut(self.time_limit));
            }
        };

        if starts.len() != blocks.len() {
            return Err(SolverError::Failed(format!(
                "{name} returned {} start slots for {} blocks",
                starts.len(),
                blocks.len()
            )));
        }
        blocks
            .iter()
            .zip(starts)
            .map(|(block, start)| {
                if start > block.last_start(slots.len()) {
                    Err(SolverError::Failed(format!(
                        "{name} placed block {} at slot {start}, past the horizon",
                        block.id
                    )))
                } else {
                    Ok(block.place(start))
                }
            })
            .collect()
    }
}
