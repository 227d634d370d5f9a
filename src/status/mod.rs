use crate::estimate::{Urgency, format_runtime};
use crate::gauge::{DeviceProfile, HatModel};
use crate::monitor::CycleReport;
use crate::sample::{Sample, StabilizedReading};
use serde::Serialize;

/// Where the Pi is currently drawing power from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    External,
    Battery,
    Unknown,
}

impl PowerSource {
    pub fn of(sample: &Sample) -> Self {
        match sample.external_power_present {
            Some(true) => PowerSource::External,
            Some(false) => PowerSource::Battery,
            None => PowerSource::Unknown,
        }
    }
}

impl std::fmt::Display for PowerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerSource::External => write!(f, "External USB-C"),
            PowerSource::Battery => write!(f, "Battery"),
            PowerSource::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Overall UPS condition, first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsState {
    NoBattery,
    /// Gauge reports more than 100%; seen on some boards while charging.
    OverReporting,
    Charging,
    Critical,
    OnBattery,
    ExternalPower,
    Good,
}

/// Percentage below which the pack is reported as critical.
const CRITICAL_PERCENT: f64 = 20.0;
/// Percentage below which the pack is reported as running down.
const LOW_PERCENT: f64 = 50.0;

impl UpsState {
    pub fn of(reading: &StabilizedReading) -> Self {
        let corrected = &reading.corrected;
        if !corrected.has_battery {
            return UpsState::NoBattery;
        }
        if corrected
            .sample
            .battery_percentage_raw
            .is_some_and(|raw| raw > 100.0)
        {
            return UpsState::OverReporting;
        }
        if corrected.is_charging() == Some(true) {
            return UpsState::Charging;
        }

        let pct = reading
            .battery_percentage_stable
            .or(corrected.battery_percentage_corrected);
        match pct {
            Some(p) if p < CRITICAL_PERCENT => UpsState::Critical,
            Some(p) if p < LOW_PERCENT => UpsState::OnBattery,
            _ if corrected.external_power() == Some(true) => UpsState::ExternalPower,
            _ => UpsState::Good,
        }
    }
}

impl std::fmt::Display for UpsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsState::NoBattery => write!(f, "External Power Only (No Battery)"),
            UpsState::OverReporting => write!(f, "Charging (gauge over-reporting)"),
            UpsState::Charging => write!(f, "Charging"),
            UpsState::Critical => write!(f, "Critical - Low Battery"),
            UpsState::OnBattery => write!(f, "Battery Power"),
            UpsState::ExternalPower => write!(f, "External Power"),
            UpsState::Good => write!(f, "Good"),
        }
    }
}

/// A classified cycle report, as printed by `status` and `runtime`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub model: HatModel,
    pub profile: DeviceProfile,
    pub power_source: PowerSource,
    pub state: UpsState,
    pub urgency: Option<Urgency>,
    pub runtime_display: String,
    #[serde(flatten)]
    pub cycle: CycleReport,
}

impl StatusReport {
    pub fn new(model: HatModel, profile: DeviceProfile, cycle: CycleReport) -> Self {
        Self {
            model,
            profile,
            power_source: PowerSource::of(&cycle.reading.corrected.sample),
            state: UpsState::of(&cycle.reading),
            urgency: cycle.runtime.hours.map(Urgency::from_hours),
            runtime_display: format_runtime(cycle.runtime.hours),
            cycle,
        }
    }

    pub fn prompt(&self) -> String {
        prompt_segment(Some(&self.cycle.reading))
    }
}

/// One-line summary for shell prompts, e.g. "⚡ 87%".
/// `None` means the HAT could not be reached.
pub fn prompt_segment(reading: Option<&StabilizedReading>) -> String {
    let Some(reading) = reading else {
        return "❓ Unknown".to_string();
    };
    let corrected = &reading.corrected;

    let symbol = match (corrected.external_power(), corrected.is_charging()) {
        (Some(true), Some(true)) => "⚡",
        (Some(true), _) => "🔌",
        _ => "🔋",
    };

    let pct = reading
        .battery_percentage_stable
        .or_else(|| corrected.percentage());
    match pct {
        Some(p) => format!("{} {:.0}%", symbol, p),
        None => format!("{} ?%", symbol),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::CorrectedSample;
    use chrono::Utc;

    fn reading(
        raw: Option<f64>,
        corrected: Option<f64>,
        has_battery: bool,
        ext: Option<bool>,
        enabled: Option<bool>,
    ) -> StabilizedReading {
        StabilizedReading {
            corrected: CorrectedSample {
                sample: Sample {
                    battery_voltage: Some(3.9),
                    battery_percentage_raw: raw,
                    external_power_present: ext,
                    charging_enabled: enabled,
                    ..Sample::unavailable(Utc::now())
                },
                battery_percentage_corrected: corrected,
                has_battery,
            },
            battery_percentage_stable: None,
        }
    }

    #[test]
    fn test_power_source() {
        let r = reading(None, None, false, Some(true), None);
        assert_eq!(PowerSource::of(&r.corrected.sample), PowerSource::External);
        let r = reading(None, None, false, None, None);
        assert_eq!(PowerSource::of(&r.corrected.sample), PowerSource::Unknown);
        assert_eq!(PowerSource::Battery.to_string(), "Battery");
    }

    #[test]
    fn test_state_rules() {
        let cases = [
            (reading(Some(38.0), Some(50.4), false, Some(true), Some(true)), UpsState::NoBattery),
            (reading(Some(104.0), Some(100.0), true, Some(true), Some(false)), UpsState::OverReporting),
            (reading(Some(60.0), Some(79.6), true, Some(true), Some(true)), UpsState::Charging),
            (reading(Some(10.0), Some(13.3), true, Some(false), Some(false)), UpsState::Critical),
            (reading(Some(30.0), Some(39.8), true, Some(false), Some(false)), UpsState::OnBattery),
            (reading(Some(70.0), Some(92.9), true, Some(true), Some(false)), UpsState::ExternalPower),
            (reading(Some(70.0), Some(92.9), true, Some(false), Some(false)), UpsState::Good),
        ];
        for (r, expected) in cases {
            assert_eq!(UpsState::of(&r), expected);
        }
    }

    #[test]
    fn test_prompt_segment() {
        assert_eq!(prompt_segment(None), "❓ Unknown");

        let charging = reading(Some(60.0), Some(79.6), true, Some(true), Some(true));
        assert_eq!(prompt_segment(Some(&charging)), "⚡ 80%");

        let mut plugged = reading(Some(70.0), Some(92.9), true, Some(true), Some(false));
        plugged.battery_percentage_stable = Some(91.0);
        assert_eq!(prompt_segment(Some(&plugged)), "🔌 91%");

        let no_battery = reading(Some(38.0), Some(50.4), false, Some(false), None);
        assert_eq!(prompt_segment(Some(&no_battery)), "🔋 ?%");
    }

    #[test]
    fn test_status_report_derives_fields() {
        use crate::estimate::{Method, RuntimeEstimateSet, fuse};

        let mut estimates = RuntimeEstimateSet::default();
        estimates.insert(Method::PowerBased, 0.3125);
        let cycle = CycleReport {
            reading: reading(Some(11.3), Some(15.0), true, Some(false), Some(false)),
            battery_current_ma: None,
            power_watts: None,
            power_draw: None,
            runtime: fuse(&estimates),
            estimates,
            events: Vec::new(),
        };
        let report = StatusReport::new(HatModel::X1206, DeviceProfile::Max17040, cycle);
        assert_eq!(report.power_source, PowerSource::Battery);
        assert_eq!(report.state, UpsState::Critical);
        assert_eq!(report.urgency, Some(Urgency::Critical));
        assert_eq!(report.runtime_display, "18 minutes");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["model"], "X1206");
        assert_eq!(json["state"], "critical");
        assert_eq!(json["has_battery"], true);
        assert_eq!(json["estimates"]["power_based"], 0.3125);
    }
}
