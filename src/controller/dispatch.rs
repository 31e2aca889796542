use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::PlanningOrchestrator;

/// Outcome of one pass over the due scheduled programs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub due: usize,
    pub started: usize,
    /// Start refused, errored or panicked; the record stays for the next tick.
    pub failed: usize,
    /// Device or program no longer known; the record stays.
    pub unresolved: usize,
}

/// Dispatch loop status tracking
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub error_count: u64,
    pub started_count: u64,
    pub failed_count: u64,
}

impl DispatchStatus {
    pub(crate) fn record(&mut self, now: DateTime<Utc>, outcome: &Result<DispatchReport, String>) {
        self.last_run = Some(now);
        self.run_count += 1;
        match outcome {
            Ok(report) => {
                self.last_success = Some(now);
                self.last_error = None;
                self.started_count += report.started as u64;
                self.failed_count += report.failed as u64;
            }
            Err(e) => {
                self.error_count += 1;
                self.last_error = Some(e.clone());
            }
        }
    }
}

/// Spawns the periodic dispatch task.
///
/// The task only holds a weak reference and ends once the orchestrator is
/// dropped.
pub(crate) fn spawn_dispatch_loop(orchestrator: &Arc<PlanningOrchestrator>, tick: Duration) -> JoinHandle<()> {
    let weak: Weak<PlanningOrchestrator> = Arc::downgrade(orchestrator);
    info!(tick_secs = tick.as_secs_f64(), "starting dispatch loop");
    tokio::spawn(async move {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(orchestrator) = weak.upgrade() else {
                debug!("orchestrator dropped, dispatch loop exiting");
                break;
            };
            match orchestrator.run_dispatch_tick().await {
                Ok(report) if report.due > 0 => {
                    info!(
                        due = report.due,
                        started = report.started,
                        failed = report.failed,
                        unresolved = report.unresolved,
                        "dispatch tick"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "dispatch tick failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accumulates() {
        let mut status = DispatchStatus::default();
        let now = Utc::now();
        status.record(
            now,
            &Ok(DispatchReport {
                due: 3,
                started: 2,
                failed: 1,
                unresolved: 0,
            }),
        );
        status.record(now, &Err("database down".to_string()));

        assert_eq!(status.run_count, 2);
        assert_eq!(status.error_count, 1);
        assert_eq!(status.started_count, 2);
        assert_eq!(status.failed_count, 1);
        assert_eq!(status.last_error.as_deref(), Some("database down"));
        assert_eq!(status.last_success, Some(now));
    }
}
