//! Sensor session orchestration.
//!
//! A session ties one transport, one register map and one unit id
//! together. A logical read resolves field names against the map, lets
//! the planner batch them into contiguous ranges, drives one Modbus
//! transaction per range in ascending address order and decodes the
//! returned words into scaled engineering values. A read either yields
//! every requested field or fails as a whole; partial results are never
//! handed back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::{json, Value};

use crate::config::settings::SessionConfig;
use crate::modbus::frame::{self, FunctionCode};
use crate::modbus::transport::Transport;
use crate::registers::decode::{decode_field, encode_field};
use crate::registers::map::RegisterMap;
use crate::registers::planner::ReadPlanner;
use crate::utils::error::SensorError;

/// One decoded acquisition from a sensor.
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub unit_id: u8,
    pub timestamp: DateTime<Utc>,
    pub values: HashMap<String, f64>,
}

impl SensorReading {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "unit_id": self.unit_id,
            "timestamp": self.timestamp.to_rfc3339(),
            "values": self.values,
        })
    }
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// A synchronous-per-call Modbus session against one slave device.
///
/// Calls block (in async terms: run to completion) one transaction at a
/// time; the per-transaction timeout means a read planned into N ranges
/// can take up to N times that budget. Sessions sharing one physical bus
/// must be serialized by the caller.
pub struct SensorSession {
    transport: Box<dyn Transport>,
    map: Arc<RegisterMap>,
    unit_id: u8,
    timeout: Duration,
    read_function: FunctionCode,
    planner: ReadPlanner,
    state: SessionState,
}

impl std::fmt::Debug for SensorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSession")
            .field("transport", &"<dyn Transport>")
            .field("map", &self.map)
            .field("unit_id", &self.unit_id)
            .field("timeout", &self.timeout)
            .field("read_function", &self.read_function)
            .field("planner", &self.planner)
            .field("state", &self.state)
            .finish()
    }
}

impl SensorSession {
    pub fn new(
        transport: Box<dyn Transport>,
        map: Arc<RegisterMap>,
        unit_id: u8,
        timeout: Duration,
    ) -> Result<Self, SensorError> {
        if !(1..=254).contains(&unit_id) {
            return Err(SensorError::ConfigError(format!(
                "unit id {} outside 1..=254",
                unit_id
            )));
        }
        Ok(Self {
            transport,
            map,
            unit_id,
            timeout,
            read_function: FunctionCode::ReadHoldingRegisters,
            planner: ReadPlanner::default(),
            state: SessionState::Disconnected,
        })
    }

    /// Builds the session with the transport selected by `config`.
    pub fn from_config(config: &SessionConfig, map: Arc<RegisterMap>) -> Result<Self, SensorError> {
        let transport = config.build_transport()?;
        Self::new(transport, map, config.unit_id, config.timeout())
    }

    /// Switches reads to another read function code (0x04 for devices that
    /// expose their values as input registers).
    pub fn with_read_function(mut self, function: FunctionCode) -> Self {
        self.read_function = function;
        self
    }

    pub fn with_planner(mut self, planner: ReadPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    /// Connects the underlying transport. No-op when already connected.
    pub async fn connect(&mut self) -> Result<(), SensorError> {
        if self.state == SessionState::Connected {
            return Ok(());
        }
        self.transport.connect().await?;
        self.state = SessionState::Connected;
        info!("📡 Session for unit {} connected", self.unit_id);
        Ok(())
    }

    /// Disconnects the underlying transport. No-op when already disconnected.
    pub async fn disconnect(&mut self) -> Result<(), SensorError> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        self.transport.disconnect().await?;
        self.state = SessionState::Disconnected;
        info!("Session for unit {} disconnected", self.unit_id);
        Ok(())
    }

    /// Reads the named fields, batching them into as few transactions as
    /// the planner allows.
    pub async fn read(&mut self, names: &[&str]) -> Result<SensorReading, SensorError> {
        if self.state != SessionState::Connected {
            return Err(SensorError::NotConnected);
        }

        // Resolve everything up front so a typo cannot cost a transaction.
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let field = self
                .map
                .get(name)
                .ok_or_else(|| SensorError::UnknownField((*name).to_string()))?;
            fields.push(field);
        }

        let spans: Vec<(u16, u16)> = fields.iter().map(|f| f.span()).collect();
        let plan = self.planner.plan(&spans);

        let mut values = HashMap::with_capacity(fields.len());
        for range in &plan {
            let request = frame::build_read_request(
                self.unit_id,
                self.read_function,
                range.start,
                range.count,
            );
            debug!(
                "unit {}: reading {} register(s) at 0x{:04X}",
                self.unit_id, range.count, range.start
            );
            let response = self.transport.exchange(&request, self.timeout).await?;
            let words =
                frame::parse_read_response(&response, self.unit_id, self.read_function, range.count)?;

            for field in fields
                .iter()
                .filter(|f| range.contains(f.address, f.word_count as u16))
            {
                let offset = (field.address - range.start) as usize;
                let slice = &words[offset..offset + field.word_count as usize];
                values.insert(field.name.clone(), decode_field(field, slice));
            }
        }

        Ok(SensorReading {
            unit_id: self.unit_id,
            timestamp: Utc::now(),
            values,
        })
    }

    /// Reads every field the register map declares.
    pub async fn read_all(&mut self) -> Result<SensorReading, SensorError> {
        let names: Vec<String> = self.map.fields().iter().map(|f| f.name.clone()).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        self.read(&refs).await
    }

    /// Writes one field in a single transaction (0x06 for one-word fields,
    /// 0x10 for two-word fields). Writes never participate in composite
    /// planning.
    pub async fn write(&mut self, name: &str, value: f64) -> Result<(), SensorError> {
        if self.state != SessionState::Connected {
            return Err(SensorError::NotConnected);
        }
        let field = self
            .map
            .get(name)
            .ok_or_else(|| SensorError::UnknownField(name.to_string()))?
            .clone();

        let words = encode_field(&field, value)?;
        let (request, function) = if words.len() == 1 {
            (
                frame::build_write_single(self.unit_id, field.address, words[0]),
                FunctionCode::WriteSingleRegister,
            )
        } else {
            (
                frame::build_write_multiple(self.unit_id, field.address, &words),
                FunctionCode::WriteMultipleRegisters,
            )
        };
        debug!(
            "unit {}: writing field '{}' at 0x{:04X}",
            self.unit_id, field.name, field.address
        );
        let response = self.transport.exchange(&request, self.timeout).await?;
        frame::parse_write_response(&response, self.unit_id, function)
    }
}
