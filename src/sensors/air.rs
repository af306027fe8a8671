//! Air environment sensor support.
//!
//! Covers combined humidity/temperature/CO2/light sensors. Light
//! intensity spans two registers (high word first) so readings above
//! 65535 lux survive the 16-bit register grid.

use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::SessionConfig;
use crate::modbus::transport::Transport;
use crate::registers::map::{DataType, RegisterField, RegisterMap};
use crate::sensors::session::{SensorReading, SensorSession};
use crate::sensors::{baud_code, field};
use crate::utils::error::SensorError;

/// Air sensor register addresses.
pub mod reg {
    pub const HUMIDITY: u16 = 0x0000;
    pub const TEMPERATURE: u16 = 0x0001;
    pub const CO2: u16 = 0x0002;
    /// High word; the low word follows at 0x0004.
    pub const LIGHT: u16 = 0x0003;

    pub const TEMP_CAL: u16 = 0x0050;
    pub const HUMIDITY_CAL: u16 = 0x0051;
    pub const CO2_CAL: u16 = 0x0052;
    /// High word; the low word follows at 0x0054.
    pub const LIGHT_CAL: u16 = 0x0053;

    pub const DEVICE_ADDRESS: u16 = 0x07D0;
    pub const BAUD_RATE: u16 = 0x07D1;
}

/// Register table for the combined air humidity/temperature/CO2/light sensor.
pub fn air_register_map() -> Arc<RegisterMap> {
    let fields: Vec<RegisterField> = vec![
        field("humidity", reg::HUMIDITY, DataType::Uint16, false, 0.1),
        field("temperature", reg::TEMPERATURE, DataType::Int16, true, 0.1),
        field("co2", reg::CO2, DataType::Uint16, false, 1.0),
        field("light", reg::LIGHT, DataType::Uint32, false, 1.0),
        field("temperature_cal", reg::TEMP_CAL, DataType::Int16, true, 0.1),
        field("humidity_cal", reg::HUMIDITY_CAL, DataType::Uint16, false, 0.1),
        field("co2_cal", reg::CO2_CAL, DataType::Uint16, false, 1.0),
        field("light_cal", reg::LIGHT_CAL, DataType::Uint32, false, 1.0),
        field("device_address", reg::DEVICE_ADDRESS, DataType::Uint16, false, 1.0),
        field("baud_rate_code", reg::BAUD_RATE, DataType::Uint16, false, 1.0),
    ];
    Arc::new(RegisterMap::new(fields).expect("built-in air register map is valid"))
}

/// High-level wrapper around a [`SensorSession`] for air sensors.
pub struct AirSensor {
    session: SensorSession,
}

impl AirSensor {
    pub fn new(
        transport: Box<dyn Transport>,
        unit_id: u8,
        timeout: Duration,
    ) -> Result<Self, SensorError> {
        Ok(Self {
            session: SensorSession::new(transport, air_register_map(), unit_id, timeout)?,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SensorError> {
        Ok(Self {
            session: SensorSession::from_config(config, air_register_map())?,
        })
    }

    pub fn session(&mut self) -> &mut SensorSession {
        &mut self.session
    }

    pub async fn connect(&mut self) -> Result<(), SensorError> {
        self.session.connect().await
    }

    pub async fn disconnect(&mut self) -> Result<(), SensorError> {
        self.session.disconnect().await
    }

    async fn single(&mut self, name: &str) -> Result<f64, SensorError> {
        let reading = self.session.read(&[name]).await?;
        reading
            .get(name)
            .ok_or_else(|| SensorError::UnknownField(name.to_string()))
    }

    /// Relative humidity in percent.
    pub async fn get_humidity(&mut self) -> Result<f64, SensorError> {
        self.single("humidity").await
    }

    /// Air temperature in °C.
    pub async fn get_temperature(&mut self) -> Result<f64, SensorError> {
        self.single("temperature").await
    }

    /// CO2 concentration in ppm.
    pub async fn get_co2(&mut self) -> Result<f64, SensorError> {
        self.single("co2").await
    }

    /// Light intensity in lux (full 0–200000 range).
    pub async fn get_light(&mut self) -> Result<f64, SensorError> {
        self.single("light").await
    }

    /// Humidity, temperature, CO2 and light in one transaction.
    pub async fn get_all(&mut self) -> Result<SensorReading, SensorError> {
        self.session
            .read(&["humidity", "temperature", "co2", "light"])
            .await
    }

    pub async fn calibrate_temperature(&mut self, value: f64) -> Result<(), SensorError> {
        self.session.write("temperature_cal", value).await
    }

    pub async fn calibrate_humidity(&mut self, value: f64) -> Result<(), SensorError> {
        self.session.write("humidity_cal", value).await
    }

    pub async fn calibrate_co2(&mut self, value: f64) -> Result<(), SensorError> {
        self.session.write("co2_cal", value).await
    }

    /// Reassigns the sensor's bus address (takes effect after power cycle).
    pub async fn set_address(&mut self, address: u8) -> Result<(), SensorError> {
        if !(1..=254).contains(&address) {
            return Err(SensorError::ConfigError(format!(
                "address {} outside 1..=254",
                address
            )));
        }
        self.session.write("device_address", address as f64).await
    }

    pub async fn set_baudrate(&mut self, baudrate: u32) -> Result<(), SensorError> {
        let code = baud_code(baudrate).ok_or_else(|| {
            SensorError::ConfigError(format!("unsupported baud rate {}", baudrate))
        })?;
        self.session.write("baud_rate_code", code as f64).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::planner::ReadPlanner;

    #[test]
    fn built_in_map_is_consistent() {
        let map = air_register_map();
        assert_eq!(map.len(), 10);
        let light = map.get("light").unwrap();
        assert_eq!(light.word_count, 2);
        assert_eq!(light.data_type, DataType::Uint32);
    }

    #[test]
    fn measurement_block_plans_as_one_read() {
        // humidity..light span registers 0x0000..=0x0004 contiguously.
        let map = air_register_map();
        let spans: Vec<(u16, u16)> = ["humidity", "temperature", "co2", "light"]
            .iter()
            .map(|name| map.get(name).unwrap().span())
            .collect();
        let plan = ReadPlanner::default().plan(&spans);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].start, 0x0000);
        assert_eq!(plan[0].count, 5);
    }
}
