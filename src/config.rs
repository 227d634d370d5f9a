use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level upswatch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsConfig {
    pub device: DeviceConfig,
    pub calibration: CalibrationConfig,
    pub detection: DetectionConfig,
    pub estimator: EstimatorConfig,
    pub events: EventConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// MAX17040G+ fuel gauge (X1200/X1206 HATs).
    Max17040,
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileKind::Max17040 => write!(f, "max17040"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// I2C bus number (`/dev/i2c-<bus>`).
    pub bus: u8,
    /// 7-bit I2C address of the gauge.
    pub address: u16,
    pub profile: ProfileKind,
    /// 7-bit address of an INA219 on the output rail, on the same bus.
    /// When set, measured load current and power replace the estimates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_monitor_address: Option<u16>,
    /// GPIO line that is high while external power is present.
    pub power_loss_gpio: u32,
    /// GPIO line that is low while charging is enabled.
    pub charging_gpio: u32,
    /// Root that `/dev`, `/sys` and `/proc` are resolved against.
    pub root: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x36,
            profile: ProfileKind::Max17040,
            power_monitor_address: None,
            power_loss_gpio: 6,
            charging_gpio: 16,
            root: PathBuf::from("/"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Multiplier from raw SOC to what the HAT's LEDs report. Batch specific.
    pub factor: f64,
    /// A rise larger than this while powered is rate limited.
    pub rise_threshold: f64,
    /// Maximum rise per poll while powered.
    pub rise_step: f64,
    /// Drops larger than this while powered are held.
    pub drop_tolerance: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            factor: 1.327,
            rise_threshold: 2.0,
            rise_step: 1.0,
            drop_tolerance: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Voltage plateau (inclusive) reported by some gauges with no cell fitted.
    pub no_battery_voltage_min: f64,
    pub no_battery_voltage_max: f64,
    /// SOC plateau (inclusive) paired with the voltage plateau.
    pub no_battery_percent_min: f64,
    pub no_battery_percent_max: f64,
    /// Readings below either floor mean an open circuit.
    pub min_percent: f64,
    pub min_voltage: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            no_battery_voltage_min: 4.19,
            no_battery_voltage_max: 4.21,
            no_battery_percent_min: 36.0,
            no_battery_percent_max: 43.0,
            min_percent: 0.1,
            min_voltage: 2.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub capacity_wh: f64,
    pub capacity_mah: f64,
    /// Fraction of charge that is never used (0.1 = stop at 10%).
    pub safe_discharge_limit: f64,
    /// Runtime of a full pack at typical load.
    pub nominal_runtime_hours: f64,
    /// Cell cutoff voltage.
    pub min_voltage: f64,
    /// Knee of the discharge curve; below it the curve is steep.
    pub knee_voltage: f64,
    /// Percentage at the knee.
    pub knee_percent: f64,
    pub full_voltage: f64,
    /// Number of most recent history entries the drain-rate estimator looks at.
    pub historical_window: usize,
    /// Minimum entries before the drain-rate estimator runs.
    pub historical_min_samples: usize,
    /// Power draw assumed when the system model has no inputs.
    pub fallback_power_watts: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            capacity_wh: 25.0,
            capacity_mah: 5000.0,
            safe_discharge_limit: 0.1,
            nominal_runtime_hours: 2.5,
            min_voltage: 3.0,
            knee_voltage: 3.7,
            knee_percent: 20.0,
            full_voltage: 4.2,
            historical_window: 20,
            historical_min_samples: 10,
            fallback_power_watts: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub critical_percent: f64,
    pub low_percent: f64,
    pub critical_voltage: f64,
    pub over_voltage: f64,
    /// Estimated current (mA, negative = discharging) below which a
    /// high discharge rate is reported.
    pub high_discharge_ma: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            critical_percent: 10.0,
            low_percent: 20.0,
            critical_voltage: 3.0,
            over_voltage: 4.3,
            high_discharge_ma: -2000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between polls. Also the interval the drain-rate estimator assumes.
    pub poll_interval_secs: u64,
    pub history_capacity: usize,
    /// Where `monitor` persists its history window. Empty disables persistence.
    pub history_file: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            history_capacity: 50,
            history_file: PathBuf::from("/run/upswatch/history.json"),
        }
    }
}

const SYSTEM_CONFIG: &str = "/etc/upswatch/config.toml";

/// Parse a TOML file. A missing file is `None`; anything else that goes
/// wrong is an error.
fn read_toml(path: &Path) -> Result<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Config(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
}

/// The user config file (~/.config/upswatch/config.toml), if there is one.
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("upswatch").join("config.toml"))
}

/// Recursively merge two TOML values. Tables are merged key-by-key;
/// all other types in `overlay` replace `base`.
fn merge_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

fn deserialize(value: toml::Value) -> Result<UpsConfig> {
    value
        .try_into()
        .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))
}

/// Load the merged config: system defaults, then user overrides.
/// If `override_path` is provided, use only that file instead, and it must
/// exist. Unparseable files and values of the wrong type are errors; with
/// no config files at all the defaults apply.
pub fn load(override_path: Option<&PathBuf>) -> Result<UpsConfig> {
    if let Some(path) = override_path {
        return match read_toml(path)? {
            Some(value) => deserialize(value),
            None => Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            ))),
        };
    }

    let system = read_toml(Path::new(SYSTEM_CONFIG))?;
    let user = match user_config_path() {
        Some(path) => read_toml(&path)?,
        None => None,
    };

    let merged = match (system, user) {
        (Some(s), Some(u)) => Some(merge_values(s, u)),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    match merged {
        Some(value) => deserialize(value),
        None => {
            log::debug!("no config files found, using defaults");
            Ok(UpsConfig::default())
        }
    }
}
