use crate::config::DeviceConfig;
use crate::sysfs::SysfsRoot;

/// The HAT's two status lines, read through sysfs GPIO.
#[derive(Debug, Clone)]
pub struct PowerPins {
    sysfs: SysfsRoot,
    power_loss_gpio: u32,
    charging_gpio: u32,
}

impl PowerPins {
    pub fn new(sysfs: SysfsRoot, config: &DeviceConfig) -> Self {
        Self {
            sysfs,
            power_loss_gpio: config.power_loss_gpio,
            charging_gpio: config.charging_gpio,
        }
    }

    fn level(&self, pin: u32) -> Option<u8> {
        match self.sysfs.gpio_value(pin) {
            Ok(level) => Some(level),
            Err(e) => {
                log::warn!("gpio{} unreadable: {}", pin, e);
                None
            }
        }
    }

    /// Power-loss line: high while external power is present.
    pub fn external_power(&self) -> Option<bool> {
        self.level(self.power_loss_gpio).map(|l| l == 1)
    }

    /// Charge-control line: low while charging is enabled.
    pub fn charging_enabled(&self) -> Option<bool> {
        self.level(self.charging_gpio).map(|l| l == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn set_gpio(root: &Path, pin: u32, level: &str) {
        let dir = root.join(format!("sys/class/gpio/gpio{}", pin));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("value"), format!("{}\n", level)).unwrap();
    }

    #[test]
    fn test_pin_polarity() {
        let tmp = tempfile::tempdir().unwrap();
        set_gpio(tmp.path(), 6, "1");
        set_gpio(tmp.path(), 16, "0");
        let pins = PowerPins::new(SysfsRoot::new(tmp.path()), &DeviceConfig::default());
        assert_eq!(pins.external_power(), Some(true));
        assert_eq!(pins.charging_enabled(), Some(true));

        set_gpio(tmp.path(), 6, "0");
        set_gpio(tmp.path(), 16, "1");
        assert_eq!(pins.external_power(), Some(false));
        assert_eq!(pins.charging_enabled(), Some(false));
    }

    #[test]
    fn test_unexported_pins_are_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let pins = PowerPins::new(SysfsRoot::new(tmp.path()), &DeviceConfig::default());
        assert_eq!(pins.external_power(), None);
        assert_eq!(pins.charging_enabled(), None);
    }

    #[test]
    fn test_custom_pins() {
        let tmp = tempfile::tempdir().unwrap();
        set_gpio(tmp.path(), 5, "1");
        let config = DeviceConfig {
            power_loss_gpio: 5,
            ..DeviceConfig::default()
        };
        let pins = PowerPins::new(SysfsRoot::new(tmp.path()), &config);
        assert_eq!(pins.external_power(), Some(true));
    }
}
