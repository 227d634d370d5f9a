pub mod power_draw;

use crate::config::EstimatorConfig;
use crate::history::HistoryWindow;
use crate::sample::CorrectedSample;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Independent ways of estimating remaining runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    PercentageBased,
    VoltageBased,
    PowerBased,
    Historical,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::PercentageBased,
        Method::VoltageBased,
        Method::PowerBased,
        Method::Historical,
    ];

    /// Confidence weight used when fusing.
    pub fn weight(self) -> f64 {
        match self {
            Method::PercentageBased => 0.2,
            Method::VoltageBased => 0.3,
            Method::PowerBased => 0.3,
            Method::Historical => 0.5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Method::PercentageBased => "Percentage Based",
            Method::VoltageBased => "Voltage Based",
            Method::PowerBased => "Power Based",
            Method::Historical => "Historical",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::PercentageBased => write!(f, "percentage_based"),
            Method::VoltageBased => write!(f, "voltage_based"),
            Method::PowerBased => write!(f, "power_based"),
            Method::Historical => write!(f, "historical"),
        }
    }
}

/// Per-method estimates for one poll, in hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuntimeEstimateSet(BTreeMap<Method, f64>);

impl RuntimeEstimateSet {
    /// Record an estimate. Non-finite or non-positive hours mean the method
    /// had nothing useful to say and are dropped.
    pub fn insert(&mut self, method: Method, hours: f64) {
        if hours.is_finite() && hours > 0.0 {
            self.0.insert(method, hours);
        } else {
            log::debug!("discarding {} estimate of {} hours", method, hours);
        }
    }

    pub fn get(&self, method: Method) -> Option<f64> {
        self.0.get(&method).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Method, f64)> + '_ {
        self.0.iter().map(|(m, h)| (*m, *h))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Confidence-weighted combination of a [`RuntimeEstimateSet`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusedEstimate {
    /// `None` when no method produced a value. Render as "cannot estimate",
    /// never as zero.
    pub hours: Option<f64>,
    pub contributing_methods: BTreeSet<Method>,
}

/// Weighted mean over the methods that produced a value.
pub fn fuse(set: &RuntimeEstimateSet) -> FusedEstimate {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut contributing_methods = BTreeSet::new();

    for (method, hours) in set.iter() {
        if !hours.is_finite() || hours <= 0.0 {
            continue;
        }
        weighted_sum += hours * method.weight();
        total_weight += method.weight();
        contributing_methods.insert(method);
    }

    let hours = (total_weight > 0.0).then(|| weighted_sum / total_weight);
    FusedEstimate {
        hours,
        contributing_methods,
    }
}

/// Runs the four sub-estimators against one corrected sample.
#[derive(Debug, Clone)]
pub struct RuntimeEstimator {
    config: EstimatorConfig,
    sample_interval: Duration,
}

impl RuntimeEstimator {
    /// `sample_interval` is the spacing of history entries, used to turn a
    /// per-entry drain rate into hours.
    pub fn new(config: EstimatorConfig, sample_interval: Duration) -> Self {
        Self {
            config,
            sample_interval,
        }
    }

    fn safe_limit_percent(&self) -> f64 {
        self.config.safe_discharge_limit * 100.0
    }

    pub fn percentage_based(&self, percentage: f64) -> Option<f64> {
        if percentage <= self.safe_limit_percent() {
            return None;
        }
        let usable = percentage - self.safe_limit_percent();
        Some(usable / 100.0 * self.config.nominal_runtime_hours)
    }

    /// Map a cell voltage onto a two-segment Li-ion discharge curve:
    /// steep from cutoff to the knee, shallow from the knee to full.
    pub fn voltage_to_percentage(&self, voltage: f64) -> Option<f64> {
        let c = &self.config;
        if !voltage.is_finite() || voltage <= c.min_voltage {
            return None;
        }
        let pct = if voltage >= c.knee_voltage {
            (voltage - c.min_voltage) / (c.full_voltage - c.min_voltage) * 100.0
        } else {
            (voltage - c.min_voltage) / (c.knee_voltage - c.min_voltage) * c.knee_percent
        };
        Some(pct.clamp(0.0, 100.0))
    }

    pub fn voltage_based(&self, voltage: f64) -> Option<f64> {
        let pct = self.voltage_to_percentage(voltage)?;
        if pct <= self.safe_limit_percent() {
            return None;
        }
        let usable = pct - self.safe_limit_percent();
        Some(usable / 100.0 * self.config.nominal_runtime_hours)
    }

    pub fn power_based(&self, percentage: f64, power_draw_watts: f64) -> Option<f64> {
        if !power_draw_watts.is_finite() || power_draw_watts <= 0.0 {
            return None;
        }
        let usable_wh = self.config.capacity_wh
            * (percentage / 100.0 - self.config.safe_discharge_limit);
        if usable_wh <= 0.0 {
            return None;
        }
        Some(usable_wh / power_draw_watts)
    }

    /// Project remaining time from the average per-entry drop across the
    /// most recent history. Rises and flat steps are ignored.
    pub fn historical(&self, percentage: f64, history: &HistoryWindow) -> Option<f64> {
        let window: Vec<f64> = history
            .recent(self.config.historical_window)
            .filter_map(|s| s.percentage())
            .collect();

        if window.len() < self.config.historical_min_samples.max(2) {
            log::debug!(
                "historical estimate skipped: {} usable entries in window",
                window.len()
            );
            return None;
        }

        let drops: Vec<f64> = window
            .windows(2)
            .map(|pair| pair[0] - pair[1])
            .filter(|drop| *drop > 0.0)
            .collect();
        if drops.is_empty() {
            return None;
        }
        let avg_drop = drops.iter().sum::<f64>() / drops.len() as f64;

        let usable = percentage - self.safe_limit_percent();
        if usable <= 0.0 {
            return None;
        }
        let intervals = usable / avg_drop;
        Some(intervals * self.sample_interval.as_secs_f64() / 3600.0)
    }

    /// Run every sub-estimator whose inputs are available.
    pub fn estimate(
        &self,
        sample: &CorrectedSample,
        power_draw_watts: Option<f64>,
        history: &HistoryWindow,
    ) -> RuntimeEstimateSet {
        let mut set = RuntimeEstimateSet::default();
        if !sample.has_battery {
            return set;
        }

        if let Some(pct) = sample.percentage() {
            if let Some(h) = self.percentage_based(pct) {
                set.insert(Method::PercentageBased, h);
            }
            if let Some(h) = power_draw_watts.and_then(|w| self.power_based(pct, w)) {
                set.insert(Method::PowerBased, h);
            }
            if let Some(h) = self.historical(pct, history) {
                set.insert(Method::Historical, h);
            }
        }
        if let Some(h) = sample.voltage().and_then(|v| self.voltage_based(v)) {
            set.insert(Method::VoltageBased, h);
        }

        set
    }

    pub fn estimate_runtime(
        &self,
        sample: &CorrectedSample,
        power_draw_watts: Option<f64>,
        history: &HistoryWindow,
    ) -> FusedEstimate {
        fuse(&self.estimate(sample, power_draw_watts, history))
    }
}

/// How worried a user should be about the fused estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Ok,
    Notice,
    Warning,
    Critical,
}

impl Urgency {
    pub fn from_hours(hours: f64) -> Self {
        if hours < 0.5 {
            Urgency::Critical
        } else if hours < 1.0 {
            Urgency::Warning
        } else if hours < 2.0 {
            Urgency::Notice
        } else {
            Urgency::Ok
        }
    }

    pub fn message(self) -> Option<&'static str> {
        match self {
            Urgency::Critical => Some("Less than 30 minutes remaining"),
            Urgency::Warning => Some("Less than 1 hour remaining"),
            Urgency::Notice => Some("Less than 2 hours remaining"),
            Urgency::Ok => None,
        }
    }
}

fn usable_hours(hours: Option<f64>) -> Option<f64> {
    hours.filter(|h| h.is_finite() && *h > 0.0)
}

/// Human-readable runtime, e.g. "18 minutes", "2h 15m", "1 days 2 hours".
pub fn format_runtime(hours: Option<f64>) -> String {
    let Some(hours) = usable_hours(hours) else {
        return "Unable to estimate".to_string();
    };

    if hours < 1.0 {
        format!("{} minutes", (hours * 60.0) as u64)
    } else if hours < 24.0 {
        let whole = hours as u64;
        let minutes = ((hours - whole as f64) * 60.0) as u64;
        if minutes > 0 {
            format!("{}h {}m", whole, minutes)
        } else {
            format!("{} hours", whole)
        }
    } else {
        let days = (hours / 24.0) as u64;
        let rest = (hours % 24.0) as u64;
        format!("{} days {} hours", days, rest)
    }
}

/// Short form for shell prompts, e.g. "1h30m remaining".
pub fn format_runtime_compact(hours: Option<f64>) -> String {
    let Some(hours) = usable_hours(hours) else {
        return "Unable to estimate runtime".to_string();
    };

    if hours < 1.0 {
        return format!("{}m remaining", (hours * 60.0) as u64);
    }
    let whole = hours as u64;
    let minutes = ((hours - whole as f64) * 60.0) as u64;
    if minutes > 0 {
        format!("{}h{}m remaining", whole, minutes)
    } else {
        format!("{}h remaining", whole)
    }
}
