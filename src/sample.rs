use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw reading from the HAT. Every field the hardware can fail to
/// report is optional; a failed read is `None`, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Cell voltage in volts.
    pub battery_voltage: Option<f64>,
    /// Raw state of charge. Some gauges report values above 100.
    pub battery_percentage_raw: Option<f64>,
    pub external_power_present: Option<bool>,
    pub charging_enabled: Option<bool>,
    /// Load current from an INA219 on the output rail, when one is fitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_current_ma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_power_watts: Option<f64>,
}

impl Sample {
    /// A sample where nothing could be read.
    pub fn unavailable(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            battery_voltage: None,
            battery_percentage_raw: None,
            external_power_present: None,
            charging_enabled: None,
            load_current_ma: None,
            load_power_watts: None,
        }
    }

    /// Charging is only meaningful while external power is present.
    pub fn is_charging(&self) -> Option<bool> {
        match (self.external_power_present, self.charging_enabled) {
            (Some(false), _) => Some(false),
            (Some(true), Some(enabled)) => Some(enabled),
            _ => None,
        }
    }
}

/// A sample after presence classification and calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectedSample {
    #[serde(flatten)]
    pub sample: Sample,
    /// Calibrated SOC in [0, 100]; `None` when the raw SOC was unavailable.
    pub battery_percentage_corrected: Option<f64>,
    pub has_battery: bool,
}

impl CorrectedSample {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.sample.timestamp
    }

    /// Corrected percentage, only when a battery is actually installed.
    pub fn percentage(&self) -> Option<f64> {
        if self.has_battery {
            self.battery_percentage_corrected
        } else {
            None
        }
    }

    /// The gauge's own SOC, only when a battery is actually installed.
    pub fn percentage_raw(&self) -> Option<f64> {
        if self.has_battery {
            self.sample.battery_percentage_raw
        } else {
            None
        }
    }

    /// Cell voltage, only when a battery is actually installed.
    pub fn voltage(&self) -> Option<f64> {
        if self.has_battery {
            self.sample.battery_voltage
        } else {
            None
        }
    }

    pub fn external_power(&self) -> Option<bool> {
        self.sample.external_power_present
    }

    pub fn is_charging(&self) -> Option<bool> {
        self.sample.is_charging()
    }
}

/// A corrected sample plus the percentage smoothed while on external power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizedReading {
    #[serde(flatten)]
    pub corrected: CorrectedSample,
    pub battery_percentage_stable: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ext: Option<bool>, enabled: Option<bool>) -> Sample {
        Sample {
            external_power_present: ext,
            charging_enabled: enabled,
            ..Sample::unavailable(Utc::now())
        }
    }

    #[test]
    fn test_is_charging_requires_external_power() {
        assert_eq!(sample(Some(true), Some(true)).is_charging(), Some(true));
        assert_eq!(sample(Some(true), Some(false)).is_charging(), Some(false));
        assert_eq!(sample(Some(false), Some(true)).is_charging(), Some(false));
        assert_eq!(sample(None, Some(true)).is_charging(), None);
        assert_eq!(sample(Some(true), None).is_charging(), None);
    }

    #[test]
    fn test_percentage_hidden_without_battery() {
        let corrected = CorrectedSample {
            sample: Sample {
                battery_voltage: Some(4.2),
                battery_percentage_raw: Some(38.0),
                ..Sample::unavailable(Utc::now())
            },
            battery_percentage_corrected: Some(50.4),
            has_battery: false,
        };
        assert_eq!(corrected.percentage(), None);
        assert_eq!(corrected.percentage_raw(), None);
        assert_eq!(corrected.voltage(), None);

        let present = CorrectedSample {
            has_battery: true,
            ..corrected
        };
        assert_eq!(present.percentage(), Some(50.4));
        assert_eq!(present.percentage_raw(), Some(38.0));
        assert_eq!(present.voltage(), Some(4.2));
    }

    #[test]
    fn test_serialized_record_has_timestamp_and_percentage() {
        let corrected = CorrectedSample {
            sample: Sample {
                battery_percentage_raw: Some(60.0),
                ..Sample::unavailable(Utc::now())
            },
            battery_percentage_corrected: Some(79.62),
            has_battery: true,
        };
        let json = serde_json::to_value(corrected).unwrap();
        assert!(json.get("timestamp").is_some());
        assert_eq!(json["battery_percentage_corrected"].as_f64(), Some(79.62));
        let back: CorrectedSample = serde_json::from_value(json).unwrap();
        assert_eq!(back.timestamp(), corrected.timestamp());
        assert!(back.has_battery);
        assert_eq!(back.sample.battery_voltage, None);
    }

    #[test]
    fn test_records_without_load_fields_still_parse() {
        let json = serde_json::json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "battery_voltage": 3.9,
            "battery_percentage_raw": 50.0,
            "external_power_present": false,
            "charging_enabled": false,
        });
        let sample: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(sample.load_current_ma, None);
        assert_eq!(sample.load_power_watts, None);
        assert!(serde_json::to_value(sample).unwrap().get("load_power_watts").is_none());
    }
}
