use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Bell-shaped production profile over the daylight window.
///
/// A Gaussian density normalised by its own peak, so `weight(mean) == 1.0`
/// and every other input yields a value in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarCurve {
    pub mean: f64,
    pub std_dev: f64,
}

impl Default for SolarCurve {
    fn default() -> Self {
        Self {
            mean: 0.5,
            std_dev: 0.17,
        }
    }
}

impl SolarCurve {
    fn density(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.std_dev;
        (-0.5 * z * z).exp() / (self.std_dev * (2.0 * PI).sqrt())
    }

    /// Production weight for `fraction_of_day`, the position inside the
    /// dawn..dusk window (0 = dawn, 1 = dusk).
    pub fn weight(&self, fraction_of_day: f64) -> f64 {
        self.density(fraction_of_day) / self.density(self.mean)
    }
}

/// Dawn and dusk as local times of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaylightWindow {
    pub dawn: NaiveTime,
    pub dusk: NaiveTime,
}

impl Default for DaylightWindow {
    fn default() -> Self {
        Self {
            dawn: NaiveTime::from_hms_opt(5, 0, 0).unwrap_or(NaiveTime::MIN),
            dusk: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl DaylightWindow {
    pub fn new(dawn: NaiveTime, dusk: NaiveTime) -> Self {
        Self { dawn, dusk }
    }

    /// Position of `time_of_day` inside the window, `None` outside it.
    ///
    /// Both ends are inclusive. A window with `dusk <= dawn` contains nothing.
    pub fn fraction(&self, time_of_day: NaiveTime) -> Option<f64> {
        if self.dusk <= self.dawn || time_of_day < self.dawn || time_of_day > self.dusk {
            return None;
        }
        let span = (self.dusk - self.dawn).num_milliseconds() as f64;
        let elapsed = (time_of_day - self.dawn).num_milliseconds() as f64;
        Some(elapsed / span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_peak_is_exactly_one_at_midpoint() {
        let curve = SolarCurve::default();
        assert!((curve.weight(0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_midpoint_is_maximum_over_unit_interval() {
        let curve = SolarCurve::default();
        let peak = curve.weight(0.5);
        for i in 0..=1000 {
            let x = i as f64 / 1000.0;
            let w = curve.weight(x);
            assert!(w <= peak, "weight({x}) = {w} exceeds peak {peak}");
            assert!((0.0..=1.0).contains(&w));
        }
    }

    #[test]
    fn test_curve_is_symmetric() {
        let curve = SolarCurve::default();
        assert!((curve.weight(0.2) - curve.weight(0.8)).abs() < 1e-12);
    }

    #[rstest]
    #[case(4, 59, None)]
    #[case(5, 0, Some(0.0))]
    #[case(13, 0, Some(0.5))]
    #[case(21, 0, Some(1.0))]
    #[case(21, 1, None)]
    fn test_window_fraction(#[case] hour: u32, #[case] minute: u32, #[case] expected: Option<f64>) {
        let window = DaylightWindow::default();
        let t = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        assert_eq!(window.fraction(t), expected);
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let window = DaylightWindow::new(
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
        );
        assert_eq!(window.fraction(NaiveTime::from_hms_opt(12, 0, 0).unwrap()), None);
    }
}
