use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{DaylightWindow, SolarCurve};
use crate::domain::{checked_slot_start, EnergySource, PlanError, ProductionPlan, TimeSlot};

pub const DEFAULT_PLAN_NAME: &str = "Normal Solar Plan";

/// Builds production plans for a normal solar day from the peak output of
/// the known energy sources.
#[derive(Debug, Clone)]
pub struct ProductionForecaster {
    pub curve: SolarCurve,
    pub window: DaylightWindow,
    /// Zone in which dawn and dusk are interpreted.
    pub timezone: Tz,
    pub plan_name: String,
}

impl Default for ProductionForecaster {
    fn default() -> Self {
        Self {
            curve: SolarCurve::default(),
            window: DaylightWindow::default(),
            timezone: Tz::UTC,
            plan_name: DEFAULT_PLAN_NAME.to_string(),
        }
    }
}

impl ProductionForecaster {
    pub fn new(window: DaylightWindow, timezone: Tz) -> Self {
        Self {
            window,
            timezone,
            ..Self::default()
        }
    }

    /// Sum of the sources' peak outputs.
    ///
    /// A source that fails to answer, or answers with a negative or non-finite
    /// value, contributes nothing to this call.
    pub async fn max_capacity(&self, sources: &[Arc<dyn EnergySource>]) -> f64 {
        let outputs = join_all(sources.iter().map(|s| s.max_power_output())).await;
        sources
            .iter()
            .zip(outputs)
            .map(|(source, output)| match output {
                Ok(w) if w.is_finite() && w >= 0.0 => w,
                Ok(w) => {
                    warn!(device_id = source.id(), output_w = w, "ignoring invalid max power output");
                    0.0
                }
                Err(e) => {
                    warn!(device_id = source.id(), error = %e, "energy source query failed, counting as 0");
                    0.0
                }
            })
            .sum()
    }

    /// Capacity of each slot for a given total peak capacity.
    pub fn slot_capacities(
        &self,
        start_time: DateTime<Utc>,
        slot_count: usize,
        slot_length_minutes: u32,
        max_capacity: f64,
    ) -> Result<Vec<TimeSlot>, PlanError> {
        if checked_slot_start(start_time, slot_length_minutes, slot_count).is_none() {
            return Err(PlanError::HorizonOutOfRange {
                slot_count,
                slot_length_minutes,
            });
        }
        let slot_length = Duration::minutes(i64::from(slot_length_minutes));
        let mut current = start_time;
        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let time_of_day = current.with_timezone(&self.timezone).time();
            let capacity_wh = self
                .window
                .fraction(time_of_day)
                .map(|x| self.curve.weight(x) * max_capacity)
                .unwrap_or(0.0);
            slots.push(TimeSlot::new(capacity_wh));
            // the horizon end was checked above
            current = current.checked_add_signed(slot_length).unwrap_or(current);
        }
        Ok(slots)
    }

    pub async fn generate_plan(
        &self,
        sources: &[Arc<dyn EnergySource>],
        start_time: DateTime<Utc>,
        slot_count: usize,
        slot_length_minutes: u32,
    ) -> Result<ProductionPlan, PlanError> {
        let max_capacity = self.max_capacity(sources).await;
        debug!(sources = sources.len(), max_capacity, "generating production plan");
        let slots = self.slot_capacities(start_time, slot_count, slot_length_minutes, max_capacity)?;
        ProductionPlan::new(self.plan_name.clone(), slots, slot_length_minutes, start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceError, DeviceId};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use mockall::mock;

    mock! {
        pub Source {}
        #[async_trait]
        impl EnergySource for Source {
            fn id(&self) -> DeviceId;
            fn name(&self) -> &str;
            async fn max_power_output(&self) -> Result<f64, DeviceError>;
            async fn current_power_output(&self) -> Result<f64, DeviceError>;
        }
    }

    fn source(id: DeviceId, output: Result<f64, ()>) -> Arc<dyn EnergySource> {
        let mut mock = MockSource::new();
        mock.expect_id().return_const(id);
        mock.expect_name().return_const("panel".to_string());
        mock.expect_max_power_output().returning(move || match output {
            Ok(w) => Ok(w),
            Err(()) => Err(DeviceError::Offline(id)),
        });
        Arc::new(mock)
    }

    fn midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_max_capacity_sums_sources() {
        let forecaster = ProductionForecaster::default();
        let sources = vec![source(1, Ok(1000.0)), source(2, Ok(500.0))];
        assert_eq!(forecaster.max_capacity(&sources).await, 1500.0);
    }

    #[tokio::test]
    async fn test_failing_source_counts_as_zero() {
        let forecaster = ProductionForecaster::default();
        let sources = vec![source(1, Ok(1200.0)), source(2, Err(())), source(3, Ok(f64::NAN))];
        assert_eq!(forecaster.max_capacity(&sources).await, 1200.0);
    }

    #[tokio::test]
    async fn test_plan_is_zero_outside_daylight_and_peaks_midday() {
        let forecaster = ProductionForecaster::default();
        let sources = vec![source(1, Ok(2000.0))];
        let plan = forecaster.generate_plan(&sources, midnight(), 24, 60).await.unwrap();

        assert_eq!(plan.slots().len(), 24);
        assert_eq!(plan.name(), DEFAULT_PLAN_NAME);
        for hour in (0..5).chain(22..24) {
            assert_eq!(plan.slots()[hour].capacity_wh, 0.0, "hour {hour}");
        }
        // 13:00 is the middle of 05:00..21:00
        assert!((plan.slots()[13].capacity_wh - 2000.0).abs() < 1e-9);
        let peak = plan.slots().iter().map(|s| s.capacity_wh).fold(0.0, f64::max);
        assert_eq!(peak, plan.slots()[13].capacity_wh);
        assert!(plan.slots()[5].capacity_wh > 0.0);
    }

    #[tokio::test]
    async fn test_window_follows_timezone() {
        let forecaster = ProductionForecaster::new(DaylightWindow::default(), chrono_tz::Europe::Prague);
        let sources = vec![source(1, Ok(1000.0))];
        // 11:00 UTC on midsummer is 13:00 in Prague
        let plan = forecaster.generate_plan(&sources, midnight(), 24, 60).await.unwrap();
        assert!((plan.slots()[11].capacity_wh - 1000.0).abs() < 1e-9);
        assert_eq!(plan.slots()[20].capacity_wh, 0.0);
    }

    #[tokio::test]
    async fn test_no_sources_gives_flat_zero_plan() {
        let forecaster = ProductionForecaster::default();
        let plan = forecaster.generate_plan(&[], midnight(), 8, 15).await.unwrap();
        assert!(plan.slots().iter().all(|s| s.capacity_wh == 0.0));
        assert_eq!(plan.slot_length_minutes(), 15);
    }

    #[tokio::test]
    async fn test_zero_slots_is_rejected() {
        let forecaster = ProductionForecaster::default();
        let err = forecaster.generate_plan(&[], midnight(), 0, 15).await.unwrap_err();
        assert_eq!(err, PlanError::NoSlots);
    }

    #[tokio::test]
    async fn test_unrepresentable_horizon_is_an_error() {
        let forecaster = ProductionForecaster::default();
        let err = forecaster
            .generate_plan(&[source(1, Ok(1000.0))], midnight(), 100, u32::MAX)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::HorizonOutOfRange {
                slot_count: 100,
                slot_length_minutes: u32::MAX
            }
        );
        assert!(forecaster.slot_capacities(midnight(), usize::MAX, 15, 1.0).is_err());
    }
}
