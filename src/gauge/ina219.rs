use super::{RegisterBus, read_logged};
use crate::error::Result;

pub const CONFIG: u8 = 0x00;
pub const SHUNT_VOLTAGE: u8 = 0x01;
pub const BUS_VOLTAGE: u8 = 0x02;
pub const POWER: u8 = 0x03;
pub const CURRENT: u8 = 0x04;
pub const CALIBRATION: u8 = 0x05;

/// 32V bus range, 320mV shunt range, 12-bit continuous conversion.
pub const CONFIG_32V_2A: u16 = 0x399F;
/// With a 0.1 ohm shunt: 0.1mA per current LSB and 2mW per power LSB.
pub const CALIBRATION_32V_2A: u16 = 4096;

const CURRENT_LSB_MA: f64 = 0.1;
const POWER_LSB_W: f64 = 0.002;

/// One measurement of the rail the Pi draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerReading {
    pub bus_voltage: Option<f64>,
    /// Positive while the load draws current.
    pub current_ma: Option<f64>,
    pub power_watts: Option<f64>,
}

/// Bus voltage: 13 bits starting at bit 3, 4mV per LSB.
pub fn decode_bus_voltage(raw: u16) -> f64 {
    ((raw >> 3) & 0x1FFF) as f64 * 0.004
}

/// Current is a signed register.
pub fn decode_current_ma(raw: u16) -> f64 {
    raw as i16 as f64 * CURRENT_LSB_MA
}

pub fn decode_power_watts(raw: u16) -> f64 {
    raw as f64 * POWER_LSB_W
}

/// An INA219 on the HAT's output rail, next to the fuel gauge.
pub struct PowerMonitor<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> PowerMonitor<B> {
    /// Configure the chip. Without a calibration value the current and
    /// power registers stay at zero.
    pub fn connect(mut bus: B) -> Result<Self> {
        bus.write_word(CONFIG, CONFIG_32V_2A)?;
        bus.write_word(CALIBRATION, CALIBRATION_32V_2A)?;
        log::info!("connected to INA219 power monitor");
        Ok(Self { bus })
    }

    pub fn read(&mut self) -> PowerReading {
        // A brown-out resets the chip and clears calibration; restore it first.
        if let Err(e) = self.bus.write_word(CALIBRATION, CALIBRATION_32V_2A) {
            log::warn!("failed to restore INA219 calibration: {}", e);
        }
        let reading = PowerReading {
            bus_voltage: read_logged(&mut self.bus, BUS_VOLTAGE, "BUS_VOLTAGE")
                .map(decode_bus_voltage),
            current_ma: read_logged(&mut self.bus, CURRENT, "CURRENT").map(decode_current_ma),
            power_watts: read_logged(&mut self.bus, POWER, "POWER").map(decode_power_watts),
        };
        log::debug!(
            "load: {:?} V, {:?} mA, {:?} W",
            reading.bus_voltage,
            reading.current_ma,
            reading.power_watts
        );
        reading
    }
}
