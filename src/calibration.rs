use crate::classify::classify;
use crate::config::{CalibrationConfig, DetectionConfig};
use crate::error::{Error, Result};
use crate::sample::{CorrectedSample, Sample, StabilizedReading};

/// Linear SOC correction plus the rules for smoothing readings while the
/// HAT is on external power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    factor: f64,
    rise_threshold: f64,
    rise_step: f64,
    drop_tolerance: f64,
}

impl Calibration {
    /// Validate a calibration config. A bad factor is a configuration bug,
    /// so it is rejected instead of falling back to an identity correction.
    pub fn new(config: &CalibrationConfig) -> Result<Self> {
        if !config.factor.is_finite() || config.factor <= 0.0 {
            return Err(Error::Calibration(format!(
                "correction factor must be a positive number, got {}",
                config.factor
            )));
        }
        for (name, value) in [
            ("rise_threshold", config.rise_threshold),
            ("rise_step", config.rise_step),
            ("drop_tolerance", config.drop_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Calibration(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(Self {
            factor: config.factor,
            rise_threshold: config.rise_threshold,
            rise_step: config.rise_step,
            drop_tolerance: config.drop_tolerance,
        })
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Apply the correction factor and clamp to [0, 100].
    pub fn correct(&self, raw_percentage: f64) -> f64 {
        (raw_percentage * self.factor).clamp(0.0, 100.0)
    }

    /// Smooth a corrected percentage against the previous stable value.
    ///
    /// On battery the value passes through and the remembered state is
    /// cleared. While powered, rises above `rise_threshold` advance by at
    /// most `rise_step` per call and drops beyond `drop_tolerance` are held.
    pub fn stabilize(
        &self,
        corrected: f64,
        external_power_present: Option<bool>,
        previous: StableState,
    ) -> (f64, StableState) {
        match external_power_present {
            Some(false) => (corrected, StableState::default()),
            // Power state unreadable this poll: trust the value, keep memory.
            None => (corrected, previous),
            Some(true) => {
                let stable = match previous.value() {
                    None => corrected,
                    Some(prev) => {
                        let delta = corrected - prev;
                        if delta > self.rise_threshold {
                            prev + self.rise_step
                        } else if delta < -self.drop_tolerance {
                            prev
                        } else {
                            corrected
                        }
                    }
                };
                (stable, StableState::new(stable))
            }
        }
    }

    /// Classify and correct a raw sample.
    pub fn apply(&self, sample: Sample, detection: &DetectionConfig) -> CorrectedSample {
        let has_battery = classify(&sample, detection);
        let battery_percentage_corrected = sample
            .battery_percentage_raw
            .filter(|p| p.is_finite())
            .map(|p| self.correct(p));

        CorrectedSample {
            sample,
            battery_percentage_corrected,
            has_battery,
        }
    }

    /// Stabilize a corrected sample, threading the caller's state through.
    /// Without a usable percentage there is nothing to smooth and the state
    /// is left untouched.
    pub fn stabilize_sample(
        &self,
        corrected: CorrectedSample,
        previous: StableState,
    ) -> (StabilizedReading, StableState) {
        let (stable, state) = match corrected.percentage() {
            Some(pct) => {
                let (stable, state) = self.stabilize(pct, corrected.external_power(), previous);
                (Some(stable), state)
            }
            None => (None, previous),
        };

        (
            StabilizedReading {
                corrected,
                battery_percentage_stable: stable,
            },
            state,
        )
    }
}

/// Last stable percentage for one physical unit. Owned by exactly one
/// poller; two pollers holding their own copies for the same HAT will
/// diverge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StableState(Option<f64>);

impl StableState {
    pub fn new(value: f64) -> Self {
        Self(Some(value))
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }
}
