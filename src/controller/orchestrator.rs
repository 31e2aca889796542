use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex as SyncMutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::dispatch::{spawn_dispatch_loop, DispatchReport, DispatchStatus};
use crate::config::Config;
use crate::domain::{
    DeviceId, DeviceRegistry, PlanError, ProductionPlan, Program, ResolvedSchedule, ScheduledProgram,
};
use crate::forecast::ProductionForecaster;
use crate::optimizer::{Block, BlockScheduler};
use crate::repo::{ScheduleStore, StoreError};
use crate::utils::Clock;

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Invalid planning request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shape of a planning horizon: slots of at most a day, at most a week of
/// one-minute slots.
#[derive(Debug, Clone, Validate)]
pub struct PlanRequest {
    pub start_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 1440))]
    pub slot_length_minutes: u32,
    #[validate(range(min = 1, max = 10080))]
    pub slot_count: usize,
}

/// Owns the current production plan and the path to the persisted schedule.
///
/// Every operation touching the schedule store, including a full dispatch
/// pass, runs under one lock, so a record cancelled by a user can never be
/// started afterwards and no record is removed twice. Device calls made while
/// holding the lock are bounded by the start timeout.
pub struct PlanningOrchestrator {
    registry: DeviceRegistry,
    store: Arc<dyn ScheduleStore>,
    forecaster: ProductionForecaster,
    scheduler: BlockScheduler,
    clock: Arc<dyn Clock>,
    default_slot_length_minutes: u32,
    default_slot_count: usize,
    tick: Duration,
    start_timeout: Duration,
    purge_on_start: bool,
    current_plan: RwLock<Option<ProductionPlan>>,
    store_lock: Mutex<()>,
    status: RwLock<DispatchStatus>,
    dispatch_task: SyncMutex<Option<JoinHandle<()>>>,
}

impl PlanningOrchestrator {
    /// Builds an orchestrator from configuration. Nothing runs until [`start`](Self::start).
    pub fn new(
        cfg: &Config,
        registry: DeviceRegistry,
        store: Arc<dyn ScheduleStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut forecaster =
            ProductionForecaster::new(cfg.planner.daylight_window(), cfg.planner.timezone);
        forecaster.plan_name = cfg.planner.plan_name.clone();

        Self {
            registry,
            store,
            forecaster,
            scheduler: BlockScheduler::with_default_solver(cfg.planner.solver_time_limit()),
            clock,
            default_slot_length_minutes: cfg.planner.slot_length_minutes,
            default_slot_count: cfg.planner.slot_count,
            tick: cfg.controller.tick(),
            start_timeout: cfg.controller.start_timeout(),
            purge_on_start: cfg.controller.purge_on_start,
            current_plan: RwLock::new(None),
            store_lock: Mutex::new(()),
            status: RwLock::new(DispatchStatus::default()),
            dispatch_task: SyncMutex::new(None),
        }
    }

    pub fn with_scheduler(mut self, scheduler: BlockScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_start_timeout(mut self, start_timeout: Duration) -> Self {
        self.start_timeout = start_timeout;
        self
    }

    /// Purges schedules left from a previous run and starts the dispatch loop.
    ///
    /// Plans are not persisted, so leftover records would point at a plan
    /// that no longer exists.
    pub async fn start(self) -> Result<Arc<Self>, StoreError> {
        if self.purge_on_start {
            let purged = self.store.clear().await?;
            info!(purged, "purged scheduled programs from previous run");
        }
        let orchestrator = Arc::new(self);
        let handle = spawn_dispatch_loop(&orchestrator, orchestrator.tick);
        *orchestrator.dispatch_task.lock() = Some(handle);
        Ok(orchestrator)
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Forecasts production, places the programs on it and persists one
    /// scheduled record per program. The plan becomes the current plan.
    pub async fn plan_programs(
        &self,
        programs: &[Arc<dyn Program>],
        start_time: DateTime<Utc>,
        slot_length_minutes: u32,
        slot_count: usize,
    ) -> Result<ProductionPlan, PlanningError> {
        let request = PlanRequest {
            start_time,
            slot_length_minutes,
            slot_count,
        };
        request
            .validate()
            .map_err(|e| PlanningError::InvalidRequest(e.to_string()))?;

        let sources = self.registry.energy_sources();
        let plan = self
            .forecaster
            .generate_plan(&sources, start_time, slot_count, slot_length_minutes)
            .await?;

        let records = if programs.is_empty() {
            Vec::new()
        } else {
            let blocks = programs
                .iter()
                .map(|p| Block::from_program(p.as_ref(), slot_length_minutes))
                .collect();
            let schedule = self.scheduler.schedule(blocks, plan.slots()).await;
            info!(
                programs = programs.len(),
                slots = slot_count,
                strategy = %schedule.strategy,
                overflow_wh = schedule.overflow_wh,
                "programs planned"
            );
            programs
                .iter()
                .zip(&schedule.blocks)
                .map(|(program, block)| {
                    ScheduledProgram::new(program.device_id(), program.name(), plan.slot_start(block.start_slot))
                })
                .collect()
        };

        self.persist(&records).await?;
        *self.current_plan.write().await = Some(plan.clone());
        Ok(plan)
    }

    /// [`plan_programs`](Self::plan_programs) with the configured slot length and count.
    pub async fn plan_programs_default(
        &self,
        programs: &[Arc<dyn Program>],
        start_time: DateTime<Utc>,
    ) -> Result<ProductionPlan, PlanningError> {
        self.plan_programs(
            programs,
            start_time,
            self.default_slot_length_minutes,
            self.default_slot_count,
        )
        .await
    }

    /// Stores all records or, on failure, none of them.
    async fn persist(&self, records: &[ScheduledProgram]) -> Result<(), StoreError> {
        let _guard = self.store_lock.lock().await;
        for (i, record) in records.iter().enumerate() {
            if let Err(e) = self.store.add(record).await {
                for stored in &records[..i] {
                    if let Err(rollback) = self.store.remove(stored.id).await {
                        error!(id = %stored.id, error = %rollback, "failed to roll back scheduled program");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn current_plan(&self) -> Option<ProductionPlan> {
        self.current_plan.read().await.clone()
    }

    /// Persisted records that still resolve to a known program.
    pub async fn scheduled_programs(&self) -> Result<Vec<ResolvedSchedule>, StoreError> {
        let records = {
            let _guard = self.store_lock.lock().await;
            self.store.list().await?
        };
        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            match self.resolve(&record).await {
                Some(program) => resolved.push(ResolvedSchedule { record, program }),
                None => debug!(id = %record.id, device_id = record.device_id, "scheduled program no longer resolves"),
            }
        }
        Ok(resolved)
    }

    /// Registry lookup bounded by the start timeout, since listing an
    /// appliance's programs talks to the device.
    async fn resolve(&self, record: &ScheduledProgram) -> Option<Arc<dyn Program>> {
        let lookup = self
            .registry
            .resolve_program(record.device_id, &record.program_name);
        match timeout(self.start_timeout, lookup).await {
            Ok(program) => program,
            Err(_) => {
                warn!(device_id = record.device_id, program = %record.program_name, "device did not list its programs in time");
                None
            }
        }
    }

    pub async fn scheduled_for_device(&self, device_id: DeviceId) -> Result<Vec<ResolvedSchedule>, StoreError> {
        Ok(self
            .scheduled_programs()
            .await?
            .into_iter()
            .filter(|s| s.record.device_id == device_id)
            .collect())
    }

    /// Cancels a scheduled program. Returns whether it was still scheduled.
    pub async fn remove_scheduled_program(&self, id: Uuid) -> Result<bool, StoreError> {
        let _guard = self.store_lock.lock().await;
        let removed = self.store.remove(id).await?;
        if removed {
            info!(%id, "scheduled program removed");
        }
        Ok(removed)
    }

    /// Starts every program whose start time has passed and retires the
    /// records of those that started.
    pub async fn dispatch_due(&self) -> Result<DispatchReport, StoreError> {
        let _guard = self.store_lock.lock().await;
        let now = self.clock.now();
        let due: Vec<ScheduledProgram> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|r| r.is_due(now))
            .collect();

        let mut report = DispatchReport {
            due: due.len(),
            ..DispatchReport::default()
        };
        for record in due {
            let Some(program) = self.resolve(&record).await else {
                warn!(id = %record.id, device_id = record.device_id, program = %record.program_name, "due program cannot be resolved");
                report.unresolved += 1;
                continue;
            };

            let attempt = AssertUnwindSafe(program.start()).catch_unwind();
            match timeout(self.start_timeout, attempt).await {
                Err(_) => {
                    warn!(device_id = record.device_id, program = %record.program_name, timeout_secs = self.start_timeout.as_secs_f64(), "program start timed out, retrying next tick");
                    report.failed += 1;
                }
                Ok(Ok(Ok(true))) => {
                    info!(device_id = record.device_id, program = %record.program_name, "scheduled program started");
                    report.started += 1;
                    if let Err(e) = self.store.remove(record.id).await {
                        error!(id = %record.id, error = %e, "started program but failed to retire its record");
                    }
                }
                Ok(Ok(Ok(false))) => {
                    warn!(device_id = record.device_id, program = %record.program_name, "device refused to start program, retrying next tick");
                    report.failed += 1;
                }
                Ok(Ok(Err(e))) => {
                    warn!(device_id = record.device_id, program = %record.program_name, error = %e, "program start failed, retrying next tick");
                    report.failed += 1;
                }
                Ok(Err(_)) => {
                    error!(device_id = record.device_id, program = %record.program_name, "program start panicked, retrying next tick");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// One dispatch pass with status bookkeeping.
    pub async fn run_dispatch_tick(&self) -> Result<DispatchReport, StoreError> {
        let result = self.dispatch_due().await;
        let outcome = result.as_ref().map(|r| *r).map_err(|e| e.to_string());
        self.status.write().await.record(self.clock.now(), &outcome);
        result
    }

    pub async fn dispatch_status(&self) -> DispatchStatus {
        self.status.read().await.clone()
    }
}

impl Drop for PlanningOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatch_task.get_mut().take() {
            handle.abort();
        }
    }
}
