//! Soil probe support.
//!
//! Combined soil probes expose moisture, temperature, conductivity, pH
//! and NPK nutrient levels as one block of holding registers, plus
//! calibration and device-settings registers further up the table.

use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::SessionConfig;
use crate::modbus::transport::Transport;
use crate::registers::map::{DataType, RegisterField, RegisterMap};
use crate::sensors::session::{SensorReading, SensorSession};
use crate::sensors::{baud_code, field};
use crate::utils::error::SensorError;

/// Soil probe register addresses.
pub mod reg {
    pub const MOISTURE: u16 = 0x0000;
    pub const TEMPERATURE: u16 = 0x0001;
    pub const EC: u16 = 0x0002;
    pub const PH: u16 = 0x0003;
    pub const NITROGEN: u16 = 0x0004;
    pub const PHOSPHORUS: u16 = 0x0005;
    pub const POTASSIUM: u16 = 0x0006;
    pub const SALINITY: u16 = 0x0007;
    pub const TDS: u16 = 0x0008;

    pub const TEMP_CAL: u16 = 0x0050;
    pub const MOISTURE_CAL: u16 = 0x0051;
    pub const EC_CAL: u16 = 0x0052;
    pub const PH_CAL: u16 = 0x0053;

    pub const DEVICE_ADDRESS: u16 = 0x07D0;
    pub const BAUD_RATE: u16 = 0x07D1;
}

/// Register table for the combined soil moisture/temperature/EC/pH/NPK probe.
pub fn soil_register_map() -> Arc<RegisterMap> {
    let fields: Vec<RegisterField> = vec![
        field("moisture", reg::MOISTURE, DataType::Int16, true, 0.1),
        field("temperature", reg::TEMPERATURE, DataType::Int16, true, 0.1),
        field("ec", reg::EC, DataType::Uint16, false, 1.0),
        field("ph", reg::PH, DataType::Uint16, false, 0.1),
        field("nitrogen", reg::NITROGEN, DataType::Uint16, false, 1.0),
        field("phosphorus", reg::PHOSPHORUS, DataType::Uint16, false, 1.0),
        field("potassium", reg::POTASSIUM, DataType::Uint16, false, 1.0),
        field("salinity", reg::SALINITY, DataType::Uint16, false, 1.0),
        field("tds", reg::TDS, DataType::Uint16, false, 1.0),
        field("temperature_cal", reg::TEMP_CAL, DataType::Int16, true, 0.1),
        field("moisture_cal", reg::MOISTURE_CAL, DataType::Int16, true, 0.1),
        field("ec_cal", reg::EC_CAL, DataType::Uint16, false, 1.0),
        field("ph_cal", reg::PH_CAL, DataType::Uint16, false, 0.1),
        field("device_address", reg::DEVICE_ADDRESS, DataType::Uint16, false, 1.0),
        field("baud_rate_code", reg::BAUD_RATE, DataType::Uint16, false, 1.0),
    ];
    Arc::new(RegisterMap::new(fields).expect("built-in soil register map is valid"))
}

/// High-level wrapper around a [`SensorSession`] for soil probes.
pub struct SoilSensor {
    session: SensorSession,
}

impl SoilSensor {
    pub fn new(
        transport: Box<dyn Transport>,
        unit_id: u8,
        timeout: Duration,
    ) -> Result<Self, SensorError> {
        Ok(Self {
            session: SensorSession::new(transport, soil_register_map(), unit_id, timeout)?,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SensorError> {
        Ok(Self {
            session: SensorSession::from_config(config, soil_register_map())?,
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

    /// Volumetric moisture in percent.
    pub async fn get_moisture(&mut self) -> Result<f64, SensorError> {
        self.single("moisture").await
    }

    /// Soil temperature in °C.
    pub async fn get_temperature(&mut self) -> Result<f64, SensorError> {
        self.single("temperature").await
    }

    /// Electrical conductivity in µS/cm.
    pub async fn get_conductivity(&mut self) -> Result<f64, SensorError> {
        self.single("ec").await
    }

    pub async fn get_ph(&mut self) -> Result<f64, SensorError> {
        self.single("ph").await
    }

    /// Moisture, temperature, EC and pH in one transaction.
    pub async fn get_all(&mut self) -> Result<SensorReading, SensorError> {
        self.session
            .read(&["moisture", "temperature", "ec", "ph"])
            .await
    }

    /// Nitrogen, phosphorus and potassium (mg/kg) in one transaction.
    pub async fn get_npk(&mut self) -> Result<SensorReading, SensorError> {
        self.session
            .read(&["nitrogen", "phosphorus", "potassium"])
            .await
    }

    pub async fn calibrate_temperature(&mut self, value: f64) -> Result<(), SensorError> {
        self.session.write("temperature_cal", value).await
    }

    pub async fn calibrate_moisture(&mut self, value: f64) -> Result<(), SensorError> {
        self.session.write("moisture_cal", value).await
    }

    pub async fn calibrate_ec(&mut self, value: f64) -> Result<(), SensorError> {
        self.session.write("ec_cal", value).await
    }

    pub async fn calibrate_ph(&mut self, value: f64) -> Result<(), SensorError> {
        self.session.write("ph_cal", value).await
    }

    /// Reassigns the probe's bus address (takes effect after power cycle).
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
        let map = soil_register_map();
        assert_eq!(map.len(), 15);
        let moisture = map.get("moisture").unwrap();
        assert!(moisture.signed);
        assert_eq!(moisture.address, 0x0000);
    }

    #[test]
    fn measurement_block_plans_as_one_read() {
        let map = soil_register_map();
        let spans: Vec<(u16, u16)> = ["moisture", "temperature", "ec", "ph"]
            .iter()
            .map(|name| map.get(name).unwrap().span())
            .collect();
        let plan = ReadPlanner::default().plan(&spans);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].start, 0x0000);
        assert_eq!(plan[0].count, 4);
    }

    #[test]
    fn npk_block_plans_as_one_read() {
        let map = soil_register_map();
        let spans: Vec<(u16, u16)> = ["nitrogen", "phosphorus", "potassium"]
            .iter()
            .map(|name| map.get(name).unwrap().span())
            .collect();
        let plan = ReadPlanner::default().plan(&spans);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].start, 0x0004);
        assert_eq!(plan[0].count, 3);
    }
}
