//! Declarative register tables.
//!
//! A [`RegisterMap`] describes every logical value a sensor type exposes:
//! where it lives, how wide it is, how to reinterpret the raw words and
//! what scale factor turns them into engineering units. Maps are validated
//! once at load time and shared read-only between sessions, so decoding
//! never has to re-check word counts on the hot path.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::SensorError;

/// Wire representation of a mapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint16,
    Int16,
    Float32,
    Uint32,
}

impl DataType {
    /// Registers a value of this type occupies.
    pub fn word_count(self) -> u8 {
        match self {
            DataType::Uint16 | DataType::Int16 => 1,
            DataType::Float32 | DataType::Uint32 => 2,
        }
    }
}

fn default_word_count() -> u8 {
    1
}

fn default_data_type() -> DataType {
    DataType::Uint16
}

fn default_scale() -> f64 {
    1.0
}

/// One logical value in a sensor's register table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterField {
    pub name: String,
    pub address: u16,
    #[serde(default = "default_word_count")]
    pub word_count: u8,
    #[serde(default = "default_data_type")]
    pub data_type: DataType,
    #[serde(default)]
    pub signed: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl RegisterField {
    /// `(address, word_count)` span of this field on the bus.
    pub fn span(&self) -> (u16, u16) {
        (self.address, self.word_count as u16)
    }
}

/// Validated, read-only register table for one sensor type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterMap {
    #[serde(rename = "register")]
    fields: Vec<RegisterField>,
}

impl RegisterMap {
    pub fn new(fields: Vec<RegisterField>) -> Result<Self, SensorError> {
        let map = Self { fields };
        map.validate()?;
        Ok(map)
    }

    /// Loads a sensor definition from a TOML `[[register]]` table list.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SensorError> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SensorError::ConfigError(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SensorError> {
        let map: RegisterMap = toml::from_str(content)
            .map_err(|e| SensorError::ConfigError(format!("invalid register map: {}", e)))?;
        map.validate()?;
        Ok(map)
    }

    fn validate(&self) -> Result<(), SensorError> {
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SensorError::ConfigError(
                    "register field with empty name".to_string(),
                ));
            }
            if self.fields[..i].iter().any(|other| other.name == field.name) {
                return Err(SensorError::ConfigError(format!(
                    "duplicate register field '{}'",
                    field.name
                )));
            }
            if field.word_count != field.data_type.word_count() {
                return Err(SensorError::ConfigError(format!(
                    "field '{}': {:?} occupies {} word(s), map declares {}",
                    field.name,
                    field.data_type,
                    field.data_type.word_count(),
                    field.word_count
                )));
            }
            if field
                .address
                .checked_add(field.word_count as u16 - 1)
                .is_none()
            {
                return Err(SensorError::ConfigError(format!(
                    "field '{}' overruns the register address space",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Looks a field up by name.
    pub fn get(&self, name: &str) -> Option<&RegisterField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[RegisterField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, address: u16, data_type: DataType) -> RegisterField {
        RegisterField {
            name: name.to_string(),
            address,
            word_count: data_type.word_count(),
            data_type,
            signed: false,
            scale: 1.0,
        }
    }

    #[test]
    fn accepts_consistent_map() {
        let map = RegisterMap::new(vec![
            field("moisture", 0x0000, DataType::Int16),
            field("light", 0x0003, DataType::Uint32),
        ])
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("light").unwrap().word_count, 2);
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = RegisterMap::new(vec![
            field("ph", 0x0003, DataType::Uint16),
            field("ph", 0x0004, DataType::Uint16),
        ])
        .unwrap_err();
        assert!(matches!(err, SensorError::ConfigError(_)));
    }

    #[test]
    fn rejects_word_count_type_mismatch() {
        let mut bad = field("temperature", 0x0001, DataType::Float32);
        bad.word_count = 1;
        let err = RegisterMap::new(vec![bad]).unwrap_err();
        assert!(matches!(err, SensorError::ConfigError(_)));
    }

    #[test]
    fn rejects_address_space_overrun() {
        let err = RegisterMap::new(vec![field("light", 0xFFFF, DataType::Uint32)]).unwrap_err();
        assert!(matches!(err, SensorError::ConfigError(_)));
    }

    #[test]
    fn parses_toml_definition() {
        let map = RegisterMap::from_toml_str(
            r#"
            [[register]]
            name = "moisture"
            address = 0x0000
            data_type = "int16"
            signed = true
            scale = 0.1

            [[register]]
            name = "ec"
            address = 0x0002
            "#,
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        let moisture = map.get("moisture").unwrap();
        assert_eq!(moisture.data_type, DataType::Int16);
        assert!(moisture.signed);
        assert!((moisture.scale - 0.1).abs() < f64::EPSILON);
        // Omitted keys fall back to one unsigned, unscaled word.
        let ec = map.get("ec").unwrap();
        assert_eq!(ec.data_type, DataType::Uint16);
        assert_eq!(ec.word_count, 1);
        assert!((ec.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn toml_validation_still_applies() {
        let err = RegisterMap::from_toml_str(
            r#"
            [[register]]
            name = "light"
            address = 0x0003
            data_type = "uint32"
            word_count = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SensorError::ConfigError(_)));
    }
}
