use crate::config::EventConfig;
use crate::history::HistoryWindow;
use crate::sample::CorrectedSample;
use serde::Serialize;

/// Something worth telling a human about.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum Event {
    PowerLost,
    PowerRestored,
    ChargingStarted,
    ChargingStopped,
    CriticalBattery(f64),
    LowBattery(f64),
    CriticalLowVoltage(f64),
    OverVoltage(f64),
    /// Battery current in mA (negative while discharging).
    HighDischargeRate(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

impl Event {
    pub fn severity(&self) -> EventSeverity {
        match self {
            Event::PowerRestored | Event::ChargingStarted | Event::ChargingStopped => {
                EventSeverity::Info
            }
            Event::PowerLost
            | Event::LowBattery(_)
            | Event::OverVoltage(_)
            | Event::HighDischargeRate(_) => EventSeverity::Warning,
            Event::CriticalBattery(_) | Event::CriticalLowVoltage(_) => EventSeverity::Critical,
        }
    }

    /// Stable upper-case tag, as used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Event::PowerLost => "EXTERNAL_POWER_LOST",
            Event::PowerRestored => "EXTERNAL_POWER_CONNECTED",
            Event::ChargingStarted => "CHARGING_STARTED",
            Event::ChargingStopped => "CHARGING_STOPPED",
            Event::CriticalBattery(_) => "CRITICAL_BATTERY_LEVEL",
            Event::LowBattery(_) => "LOW_BATTERY_WARNING",
            Event::CriticalLowVoltage(_) => "CRITICAL_LOW_VOLTAGE",
            Event::OverVoltage(_) => "OVER_VOLTAGE_WARNING",
            Event::HighDischargeRate(_) => "HIGH_DISCHARGE_RATE",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::PowerLost => write!(f, "External power lost"),
            Event::PowerRestored => write!(f, "External power restored"),
            Event::ChargingStarted => write!(f, "Charging started"),
            Event::ChargingStopped => write!(f, "Charging stopped"),
            Event::CriticalBattery(pct) => write!(f, "Critical battery level: {:.1}%", pct),
            Event::LowBattery(pct) => write!(f, "Low battery: {:.1}%", pct),
            Event::CriticalLowVoltage(v) => write!(f, "Critical low voltage: {:.2}V", v),
            Event::OverVoltage(v) => write!(f, "Over voltage: {:.2}V", v),
            Event::HighDischargeRate(ma) => write!(f, "High discharge rate: {:.0}mA", ma.abs()),
        }
    }
}

/// Battery current implied by the change in the gauge's SOC between two
/// samples. Negative while discharging. `None` without a usable time delta
/// or a raw percentage on both sides.
///
/// The raw value is used because the calibrated one saturates at 100%.
pub fn estimate_current_ma(
    prev: &CorrectedSample,
    curr: &CorrectedSample,
    capacity_mah: f64,
) -> Option<f64> {
    let dt = (curr.timestamp() - prev.timestamp()).num_milliseconds() as f64 / 1000.0;
    if dt <= 0.0 {
        return None;
    }
    let change = curr.percentage_raw()? - prev.percentage_raw()?;
    let change_mah = change / 100.0 * capacity_mah;
    Some(change_mah / dt * 3600.0)
}

/// Battery current for `curr`. On battery power a measured load current is
/// what the cell supplies; otherwise fall back to the SOC-derived estimate.
pub fn battery_current_ma(
    prev: Option<&CorrectedSample>,
    curr: &CorrectedSample,
    capacity_mah: f64,
) -> Option<f64> {
    if curr.has_battery
        && curr.external_power() == Some(false)
        && let Some(load) = curr.sample.load_current_ma.filter(|ma| ma.is_finite())
    {
        return Some(-load);
    }
    prev.and_then(|prev| estimate_current_ma(prev, curr, capacity_mah))
}

/// Transition between two readings of a tri-state flag. Unknown on either
/// side is not a transition.
fn flipped(prev: Option<bool>, curr: Option<bool>) -> Option<bool> {
    match (prev, curr) {
        (Some(p), Some(c)) if p != c => Some(c),
        _ => None,
    }
}

/// Derives events from one sample and the history preceding it.
#[derive(Debug, Clone, Default)]
pub struct EventDetector {
    config: EventConfig,
}

impl EventDetector {
    pub fn new(config: EventConfig) -> Self {
        Self { config }
    }

    /// Events for `sample`, compared against the newest entry in `history`.
    ///
    /// Power and charging events fire only on a change from the previous
    /// sample; with an empty history they are skipped. Level checks fire on
    /// every call while the condition holds; throttling is the caller's job.
    pub fn detect(
        &self,
        sample: &CorrectedSample,
        history: &HistoryWindow,
        current_ma: Option<f64>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        let c = &self.config;

        if let Some(prev) = history.last() {
            match flipped(prev.external_power(), sample.external_power()) {
                Some(true) => events.push(Event::PowerRestored),
                Some(false) => events.push(Event::PowerLost),
                None => {}
            }
            match flipped(prev.is_charging(), sample.is_charging()) {
                Some(true) => events.push(Event::ChargingStarted),
                Some(false) => events.push(Event::ChargingStopped),
                None => {}
            }
        }

        if let Some(pct) = sample.percentage() {
            if pct < c.critical_percent {
                events.push(Event::CriticalBattery(pct));
            } else if pct < c.low_percent {
                events.push(Event::LowBattery(pct));
            }
        }

        if let Some(v) = sample.voltage() {
            if v < c.critical_voltage {
                events.push(Event::CriticalLowVoltage(v));
            } else if v > c.over_voltage {
                events.push(Event::OverVoltage(v));
            }
        }

        if let Some(ma) = current_ma.filter(|ma| ma.is_finite())
            && ma < c.high_discharge_ma
        {
            events.push(Event::HighDischargeRate(ma));
        }

        events
    }
}
