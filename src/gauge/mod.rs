pub mod gpio;
pub mod i2c;
pub mod ina219;

use crate::config::ProfileKind;
use crate::error::Result;
use serde::Serialize;

/// Word-addressed register access. Values come back in the chip's own
/// (big-endian) byte order already assembled into a `u16`.
pub trait RegisterBus {
    fn read_word(&mut self, register: u8) -> Result<u16>;
    fn write_word(&mut self, register: u8, value: u16) -> Result<()>;
}

/// MAX17040G+ registers.
pub mod max17040 {
    pub const VCELL: u8 = 0x02;
    pub const SOC: u8 = 0x04;
    pub const VERSION: u8 = 0x08;
}

/// How to decode a gauge. Chosen once when the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceProfile {
    Max17040,
}

impl From<ProfileKind> for DeviceProfile {
    fn from(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Max17040 => DeviceProfile::Max17040,
        }
    }
}

/// Voltage and SOC as decoded from the registers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GaugeReading {
    pub voltage: Option<f64>,
    pub percentage: Option<f64>,
}

impl DeviceProfile {
    /// VCELL: 12-bit value in the top bits, 1.25mV per LSB.
    pub fn decode_max17040_voltage(raw: u16) -> f64 {
        (raw >> 4) as f64 * 1.25 / 1000.0
    }

    /// SOC: high byte is whole percent, low byte is 1/256ths.
    pub fn decode_max17040_soc(raw: u16) -> f64 {
        raw as f64 / 256.0
    }

    pub fn read(self, bus: &mut impl RegisterBus) -> GaugeReading {
        match self {
            DeviceProfile::Max17040 => GaugeReading {
                voltage: read_logged(bus, max17040::VCELL, "VCELL")
                    .map(Self::decode_max17040_voltage),
                percentage: read_logged(bus, max17040::SOC, "SOC").map(Self::decode_max17040_soc),
            },
        }
    }
}

pub(crate) fn read_logged(bus: &mut impl RegisterBus, register: u8, name: &str) -> Option<u16> {
    match bus.read_word(register) {
        Ok(raw) => {
            log::trace!("{} (0x{:02x}) = 0x{:04x}", name, register, raw);
            Some(raw)
        }
        Err(e) => {
            log::warn!("failed to read {}: {}", name, e);
            None
        }
    }
}

/// HAT variant, identified from the fuel gauge's version register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HatModel {
    X1200,
    X1206,
    #[serde(rename = "X1206 v1.1")]
    X1206V11,
}

impl HatModel {
    pub fn from_version(version: u16) -> Self {
        match version {
            0x0036 => HatModel::X1206,
            // X1200 units can report this too; v1.1 is the common case.
            0x0002 => HatModel::X1206V11,
            _ => HatModel::X1200,
        }
    }
}

impl std::fmt::Display for HatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HatModel::X1200 => write!(f, "X1200"),
            HatModel::X1206 => write!(f, "X1206"),
            HatModel::X1206V11 => write!(f, "X1206 v1.1"),
        }
    }
}

/// An opened gauge: a bus plus the profile used to decode it.
pub struct Gauge<B: RegisterBus> {
    bus: B,
    profile: DeviceProfile,
    model: HatModel,
}

impl<B: RegisterBus> Gauge<B> {
    /// Probe the device once. Failing to talk to it here is an error;
    /// later read failures only degrade individual samples.
    pub fn connect(mut bus: B, profile: DeviceProfile) -> Result<Self> {
        let model = match profile {
            DeviceProfile::Max17040 => {
                let version = bus.read_word(max17040::VERSION)?;
                let model = HatModel::from_version(version);
                log::info!("connected to {} fuel gauge (version 0x{:04x})", model, version);
                model
            }
        };
        Ok(Self {
            bus,
            profile,
            model,
        })
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    pub fn model(&self) -> HatModel {
        self.model
    }

    pub fn read(&mut self) -> GaugeReading {
        self.profile.read(&mut self.bus)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockBus;
    use super::*;

    #[test]
    fn test_decode_max17040() {
        // 0xC8A0 >> 4 = 3210 -> 4.0125V
        assert!((DeviceProfile::decode_max17040_voltage(0xC8A0) - 4.0125).abs() < 1e-9);
        assert_eq!(DeviceProfile::decode_max17040_soc(0x4B80), 75.5);
        assert_eq!(DeviceProfile::decode_max17040_soc(0x0000), 0.0);
    }

    #[test]
    fn test_model_from_version() {
        assert_eq!(HatModel::from_version(0x0036), HatModel::X1206);
        assert_eq!(HatModel::from_version(0x0002), HatModel::X1206V11);
        assert_eq!(HatModel::from_version(0x0003), HatModel::X1200);
        assert_eq!(HatModel::X1206V11.to_string(), "X1206 v1.1");
    }

    #[test]
    fn test_connect_and_read_max17040() {
        let bus = MockBus::with(&[
            (max17040::VERSION, 0x0002),
            (max17040::VCELL, 0xC8A0),
            (max17040::SOC, 0x4B80),
        ]);
        let mut gauge = Gauge::connect(bus, DeviceProfile::Max17040).unwrap();
        assert_eq!(gauge.model(), HatModel::X1206V11);
        let reading = gauge.read();
        assert_eq!(reading.percentage, Some(75.5));
        assert!((reading.voltage.unwrap() - 4.0125).abs() < 1e-9);
    }

    #[test]
    fn test_connect_fails_without_device() {
        assert!(Gauge::connect(MockBus::default(), DeviceProfile::Max17040).is_err());
    }

    #[test]
    fn test_partial_read_is_unavailable_not_zero() {
        let bus = MockBus::with(&[(max17040::VERSION, 0x0036), (max17040::VCELL, 0xC8A0)]);
        let mut gauge = Gauge::connect(bus, DeviceProfile::Max17040).unwrap();
        let reading = gauge.read();
        assert!(reading.voltage.is_some());
        assert_eq!(reading.percentage, None);
    }
}
