//! # Appliance Simulation
//!
//! An appliance runs at most one program at a time. While a program runs the
//! appliance's other programs report `Unavailable`; once the run time has
//! elapsed on the clock the appliance is free again.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Appliance, DeviceError, DeviceId, Program, ProgramStatus};
use crate::utils::Clock;

#[derive(Debug)]
struct Run {
    program: String,
    started: DateTime<Utc>,
    run_time: Duration,
}

#[derive(Debug, Default)]
struct ApplianceState {
    running: Option<Run>,
    disabled: bool,
}

pub struct SimulatedAppliance {
    id: DeviceId,
    name: String,
    state: Arc<Mutex<ApplianceState>>,
    clock: Arc<dyn Clock>,
    programs: Mutex<Vec<Arc<SimulatedProgram>>>,
}

impl SimulatedAppliance {
    pub fn new(id: DeviceId, name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            name: name.into(),
            state: Arc::new(Mutex::new(ApplianceState::default())),
            clock,
            programs: Mutex::new(Vec::new()),
        }
    }

    /// Appliance with "Normal", "Eco" and "Intensive" programs of random
    /// consumption and run time. The id picks the profile: a tiny test
    /// device, a washing machine or a heat pump.
    pub fn random(id: DeviceId, clock: Arc<dyn Clock>) -> Self {
        // (Wh range, minutes range)
        const PROFILES: [(&str, (u32, u32), (u32, u32)); 3] = [
            ("Test Appliance", (1, 2), (1, 2)),
            ("Washing Machine", (500, 1500), (60, 120)),
            ("Heat Pump", (5000, 15000), (240, 720)),
        ];
        let (kind, power, run_time) = PROFILES[(id - 1).rem_euclid(3) as usize];
        let appliance = Self::new(id, format!("Simulated {kind} {id}"), clock);
        let mut rng = rand::thread_rng();
        for name in ["Normal", "Eco", "Intensive"] {
            appliance.add_program(
                name,
                f64::from(rng.gen_range(power.0..power.1)),
                rng.gen_range(run_time.0..run_time.1),
            );
        }
        appliance
    }

    /// Adds a program and returns a handle to it.
    pub fn add_program(
        &self,
        name: impl Into<String>,
        power_consumption_wh: f64,
        run_time_minutes: u32,
    ) -> Arc<SimulatedProgram> {
        let program = Arc::new(SimulatedProgram {
            name: name.into(),
            power_consumption_wh,
            run_time_minutes,
            device_id: self.id,
            appliance: self.state.clone(),
            clock: self.clock.clone(),
            reject_starts: AtomicBool::new(false),
            start_count: AtomicUsize::new(0),
        });
        self.programs.lock().push(program.clone());
        program
    }

    pub fn remove_program(&self, name: &str) -> bool {
        let mut programs = self.programs.lock();
        let before = programs.len();
        programs.retain(|p| p.name != name);
        before != programs.len()
    }

    pub fn program(&self, name: &str) -> Option<Arc<SimulatedProgram>> {
        self.programs.lock().iter().find(|p| p.name == name).cloned()
    }

    /// Marks the whole appliance unavailable (door open, offline, ...).
    pub fn set_disabled(&self, disabled: bool) {
        self.state.lock().disabled = disabled;
    }
}

#[async_trait]
impl Appliance for SimulatedAppliance {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn programs(&self) -> Result<Vec<Arc<dyn Program>>, DeviceError> {
        Ok(self
            .programs
            .lock()
            .iter()
            .map(|p| p.clone() as Arc<dyn Program>)
            .collect())
    }
}

pub struct SimulatedProgram {
    name: String,
    power_consumption_wh: f64,
    run_time_minutes: u32,
    device_id: DeviceId,
    appliance: Arc<Mutex<ApplianceState>>,
    clock: Arc<dyn Clock>,
    reject_starts: AtomicBool,
    start_count: AtomicUsize,
}

impl SimulatedProgram {
    /// Makes `start` refuse (return `false`) until cleared.
    pub fn set_reject_starts(&self, reject: bool) {
        self.reject_starts.store(reject, Ordering::SeqCst);
    }

    /// How many times the program has actually been started.
    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    fn run_time(&self) -> Duration {
        Duration::minutes(i64::from(self.run_time_minutes))
    }

    /// Clears a finished run and returns the current status.
    fn refresh(&self, state: &mut ApplianceState) -> ProgramStatus {
        let now = self.clock.now();
        if state
            .running
            .as_ref()
            .is_some_and(|run| now - run.started >= run.run_time)
        {
            state.running = None;
        }
        match &state.running {
            Some(run) if run.program == self.name => ProgramStatus::Running,
            Some(_) => ProgramStatus::Unavailable,
            None if state.disabled => ProgramStatus::Unavailable,
            None => ProgramStatus::Available,
        }
    }
}

#[async_trait]
impl Program for SimulatedProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn power_consumption_wh(&self) -> f64 {
        self.power_consumption_wh
    }

    fn run_time_minutes(&self) -> u32 {
        self.run_time_minutes
    }

    fn device_id(&self) -> DeviceId {
        self.device_id
    }

    async fn status(&self) -> Result<ProgramStatus, DeviceError> {
        let mut state = self.appliance.lock();
        Ok(self.refresh(&mut state))
    }

    async fn remaining_minutes(&self) -> Result<u32, DeviceError> {
        let mut state = self.appliance.lock();
        if self.refresh(&mut state) != ProgramStatus::Running {
            return Ok(0);
        }
        let remaining = match &state.running {
            Some(run) => run.run_time - (self.clock.now() - run.started),
            None => Duration::zero(),
        };
        Ok(remaining.num_minutes().max(0) as u32)
    }

    async fn start(&self) -> Result<bool, DeviceError> {
        if self.reject_starts.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut state = self.appliance.lock();
        if self.refresh(&mut state) != ProgramStatus::Available {
            return Ok(false);
        }
        state.running = Some(Run {
            program: self.name.clone(),
            started: self.clock.now(),
            run_time: self.run_time(),
        });
        self.start_count.fetch_add(1, Ordering::SeqCst);
        debug!(device_id = self.device_id, program = %self.name, "simulated program started");
        Ok(true)
    }

    async fn try_stop(&self) -> Result<bool, DeviceError> {
        let mut state = self.appliance.lock();
        if self.refresh(&mut state) != ProgramStatus::Running {
            return Ok(false);
        }
        state.running = None;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use chrono::TimeZone;

    fn setup() -> (Arc<ManualClock>, SimulatedAppliance) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 21, 9, 0, 0).unwrap(),
        ));
        let appliance = SimulatedAppliance::new(1, "Washer", clock.clone());
        (clock, appliance)
    }

    #[tokio::test]
    async fn test_program_runs_for_its_run_time() {
        let (clock, washer) = setup();
        let eco = washer.add_program("eco", 900.0, 90);

        assert!(eco.start().await.unwrap());
        assert_eq!(eco.status().await.unwrap(), ProgramStatus::Running);
        clock.advance(Duration::minutes(30));
        assert_eq!(eco.remaining_minutes().await.unwrap(), 60);
        assert!(!eco.start().await.unwrap());

        clock.advance(Duration::minutes(60));
        assert_eq!(eco.status().await.unwrap(), ProgramStatus::Available);
        assert_eq!(eco.start_count(), 1);
    }

    #[tokio::test]
    async fn test_one_program_at_a_time() {
        let (_clock, washer) = setup();
        let eco = washer.add_program("eco", 900.0, 90);
        let quick = washer.add_program("quick", 300.0, 30);

        assert!(quick.start().await.unwrap());
        assert_eq!(eco.status().await.unwrap(), ProgramStatus::Unavailable);
        assert!(!eco.start().await.unwrap());
        assert!(quick.try_stop().await.unwrap());
        assert!(eco.start().await.unwrap());
    }

    #[tokio::test]
    async fn test_rejecting_and_disabled_programs() {
        let (_clock, washer) = setup();
        let eco = washer.add_program("eco", 900.0, 90);

        eco.set_reject_starts(true);
        assert!(!eco.start().await.unwrap());
        eco.set_reject_starts(false);

        washer.set_disabled(true);
        assert_eq!(eco.status().await.unwrap(), ProgramStatus::Unavailable);
        assert!(!eco.start().await.unwrap());
        assert_eq!(eco.start_count(), 0);
    }

    #[tokio::test]
    async fn test_random_profiles() {
        let (clock, _) = setup();
        let heat_pump = SimulatedAppliance::random(3, clock.clone());
        let programs = heat_pump.programs().await.unwrap();
        assert_eq!(programs.len(), 3);
        for p in &programs {
            assert!((5000.0..15000.0).contains(&p.power_consumption_wh()));
            assert!((240..720).contains(&p.run_time_minutes()));
            assert_eq!(p.device_id(), 3);
        }
        assert!(SimulatedAppliance::random(4, clock).program("Eco").is_some());
    }

    #[tokio::test]
    async fn test_programs_listing_and_removal() {
        let (_clock, washer) = setup();
        washer.add_program("eco", 900.0, 90);
        washer.add_program("quick", 300.0, 30);
        assert_eq!(washer.programs().await.unwrap().len(), 2);
        assert!(washer.remove_program("eco"));
        assert!(washer.program("eco").is_none());
        assert_eq!(washer.programs().await.unwrap().len(), 1);
    }
}
