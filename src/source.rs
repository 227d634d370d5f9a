use crate::config::DeviceConfig;
use crate::error::Result;
use crate::gauge::gpio::PowerPins;
use crate::gauge::i2c::LinuxI2c;
use crate::gauge::ina219::PowerMonitor;
use crate::gauge::{DeviceProfile, Gauge, HatModel, RegisterBus};
use crate::sample::Sample;
use crate::sysfs::SysfsRoot;
use chrono::Utc;

/// Produces one raw sample per call. Implementations own bounding the
/// latency of the underlying hardware access.
pub trait ReadingSource {
    /// Take a reading. Fields that could not be read are `None`; an `Err`
    /// means nothing at all could be read this time.
    fn read(&mut self) -> Result<Sample>;
}

/// Fuel gauge plus status GPIOs of a UPS HAT, and the output rail's
/// power monitor where the board has one.
pub struct HatSource<B: RegisterBus> {
    gauge: Gauge<B>,
    pins: PowerPins,
    power: Option<PowerMonitor<B>>,
}

impl HatSource<LinuxI2c> {
    /// Open the gauge and GPIO lines described by `config`.
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        let root = SysfsRoot::new(config.root.clone());
        let bus = LinuxI2c::open(&root, config.bus, config.address)?;
        let gauge = Gauge::connect(bus, DeviceProfile::from(config.profile))?;
        let mut source = Self::new(gauge, PowerPins::new(root.clone(), config));

        if let Some(address) = config.power_monitor_address {
            let bus = LinuxI2c::open(&root, config.bus, address)?;
            source = source.with_power_monitor(PowerMonitor::connect(bus)?);
        }
        Ok(source)
    }
}

impl<B: RegisterBus> HatSource<B> {
    pub fn new(gauge: Gauge<B>, pins: PowerPins) -> Self {
        Self {
            gauge,
            pins,
            power: None,
        }
    }

    pub fn with_power_monitor(mut self, power: PowerMonitor<B>) -> Self {
        self.power = Some(power);
        self
    }

    pub fn model(&self) -> HatModel {
        self.gauge.model()
    }

    pub fn profile(&self) -> DeviceProfile {
        self.gauge.profile()
    }
}

impl<B: RegisterBus> ReadingSource for HatSource<B> {
    fn read(&mut self) -> Result<Sample> {
        let timestamp = Utc::now();
        let reading = self.gauge.read();
        let load = self
            .power
            .as_mut()
            .map(|power| power.read())
            .unwrap_or_default();
        Ok(Sample {
            timestamp,
            battery_voltage: reading.voltage,
            battery_percentage_raw: reading.percentage,
            external_power_present: self.pins.external_power(),
            charging_enabled: self.pins.charging_enabled(),
            load_current_ma: load.current_ma,
            load_power_watts: load.power_watts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge::{ina219, max17040};
    use crate::gauge::mock::MockBus;
    use std::fs;

    #[test]
    fn test_hat_source_combines_gauge_and_pins() {
        let tmp = tempfile::tempdir().unwrap();
        for (pin, level) in [(6, "0"), (16, "1")] {
            let dir = tmp.path().join(format!("sys/class/gpio/gpio{}", pin));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("value"), level).unwrap();
        }

        let bus = MockBus::with(&[
            (max17040::VERSION, 0x0036),
            (max17040::VCELL, 0xC8A0),
            (max17040::SOC, 0x3200),
        ]);
        let gauge = Gauge::connect(bus, DeviceProfile::Max17040).unwrap();
        let pins = PowerPins::new(SysfsRoot::new(tmp.path()), &DeviceConfig::default());
        let mut source = HatSource::new(gauge, pins);

        assert_eq!(source.model(), HatModel::X1206);
        let sample = source.read().unwrap();
        assert_eq!(sample.battery_percentage_raw, Some(50.0));
        assert_eq!(sample.external_power_present, Some(false));
        assert_eq!(sample.charging_enabled, Some(false));
        assert_eq!(sample.load_current_ma, None);
        assert_eq!(sample.load_power_watts, None);
    }

    #[test]
    fn test_power_monitor_fills_load_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let gauge = Gauge::connect(
            MockBus::with(&[(max17040::VERSION, 0x0036), (max17040::SOC, 0x3200)]),
            DeviceProfile::Max17040,
        )
        .unwrap();
        let power = PowerMonitor::connect(MockBus::with(&[
            (ina219::CURRENT, 12_000),
            (ina219::POWER, 3_000),
        ]))
        .unwrap();
        let pins = PowerPins::new(SysfsRoot::new(tmp.path()), &DeviceConfig::default());
        let mut source = HatSource::new(gauge, pins).with_power_monitor(power);

        let sample = source.read().unwrap();
        assert!((sample.load_current_ma.unwrap() - 1200.0).abs() < 1e-9);
        assert!((sample.load_power_watts.unwrap() - 6.0).abs() < 1e-9);
        // No GPIO tree: both lines unknown.
        assert_eq!(sample.external_power_present, None);
    }

    #[test]
    fn test_open_fails_without_i2c_device() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DeviceConfig {
            root: tmp.path().to_path_buf(),
            power_monitor_address: Some(0x45),
            ..DeviceConfig::default()
        };
        assert!(matches!(
            HatSource::open(&config),
            Err(crate::error::Error::I2c { .. })
        ));
    }
}
