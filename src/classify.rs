use crate::config::DetectionConfig;
use crate::sample::Sample;

/// Decide whether a cell is physically installed.
///
/// Pure function of the sample's voltage and raw SOC, re-run for every
/// sample since a cell can be pulled or fitted between polls. A missing
/// voltage or SOC reading counts as "no battery" so callers never trust
/// a number the gauge did not produce.
pub fn classify(sample: &Sample, config: &DetectionConfig) -> bool {
    let (Some(voltage), Some(percentage)) = (sample.battery_voltage, sample.battery_percentage_raw)
    else {
        return false;
    };

    if !voltage.is_finite() || !percentage.is_finite() {
        return false;
    }

    if is_no_battery_signature(voltage, percentage, config) {
        return false;
    }

    if percentage < config.min_percent || voltage < config.min_voltage {
        return false;
    }

    true
}

/// Fixed voltage/SOC plateau some gauges report with no cell attached.
fn is_no_battery_signature(voltage: f64, percentage: f64, config: &DetectionConfig) -> bool {
    (config.no_battery_voltage_min..=config.no_battery_voltage_max).contains(&voltage)
        && (config.no_battery_percent_min..=config.no_battery_percent_max).contains(&percentage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(voltage: Option<f64>, percentage: Option<f64>) -> Sample {
        Sample {
            battery_voltage: voltage,
            battery_percentage_raw: percentage,
            ..Sample::unavailable(Utc::now())
        }
    }

    fn has_battery(voltage: f64, percentage: f64) -> bool {
        classify(&sample(Some(voltage), Some(percentage)), &DetectionConfig::default())
    }

    #[test]
    fn test_no_battery_signature() {
        assert!(!has_battery(4.20, 38.0));
        assert!(!has_battery(4.19, 36.0));
        assert!(!has_battery(4.21, 43.0));
    }

    #[test]
    fn test_signature_edges_are_inclusive_only() {
        assert!(has_battery(4.20, 35.9));
        assert!(has_battery(4.20, 43.1));
        assert!(has_battery(4.18, 38.0));
        assert!(has_battery(4.22, 38.0));
    }

    #[test]
    fn test_open_circuit_floors() {
        assert!(!has_battery(3.9, 0.05));
        assert!(!has_battery(2.4, 60.0));
        assert!(!has_battery(0.0, 0.0));
        assert!(has_battery(2.5, 0.1));
    }

    #[test]
    fn test_normal_battery() {
        assert!(has_battery(3.85, 62.5));
        assert!(has_battery(4.18, 99.0));
        // Over-reporting gauges are still a battery.
        assert!(has_battery(4.15, 112.0));
    }

    #[test]
    fn test_unavailable_fields_mean_no_battery() {
        let config = DetectionConfig::default();
        assert!(!classify(&sample(None, Some(70.0)), &config));
        assert!(!classify(&sample(Some(3.9), None), &config));
        assert!(!classify(&sample(None, None), &config));
        assert!(!classify(&sample(Some(f64::NAN), Some(70.0)), &config));
    }

    #[test]
    fn test_deterministic() {
        let config = DetectionConfig::default();
        let s = sample(Some(3.72), Some(41.0));
        let first = classify(&s, &config);
        for _ in 0..10 {
            assert_eq!(classify(&s, &config), first);
        }
    }

    #[test]
    fn test_custom_window() {
        let config = DetectionConfig {
            no_battery_voltage_min: 4.10,
            no_battery_voltage_max: 4.12,
            ..DetectionConfig::default()
        };
        assert!(classify(&sample(Some(4.20), Some(38.0)), &config));
        assert!(!classify(&sample(Some(4.11), Some(38.0)), &config));
    }
}
