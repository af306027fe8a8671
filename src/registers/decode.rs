//! Raw register word decoding and encoding.
//!
//! Registers arrive as big-endian 16-bit words. One-word fields are plain
//! or two's-complement integers; two-word fields concatenate in
//! big-endian word order into an IEEE-754 single or a 32-bit integer.
//! The scale factor is applied after reinterpretation.

use super::map::{DataType, RegisterField};
use crate::utils::error::SensorError;

/// Reinterprets a field's raw words and applies its scale factor.
///
/// `words` must hold exactly `word_count` registers. Maps are validated at
/// load time, so a mismatch cannot occur for fields obtained from a
/// [`super::map::RegisterMap`].
pub fn decode_field(field: &RegisterField, words: &[u16]) -> f64 {
    debug_assert_eq!(words.len(), field.word_count as usize);

    let raw = match field.data_type {
        DataType::Int16 => words[0] as i16 as f64,
        DataType::Uint16 => {
            if field.signed {
                words[0] as i16 as f64
            } else {
                words[0] as f64
            }
        }
        DataType::Float32 => {
            let bits = ((words[0] as u32) << 16) | words[1] as u32;
            f32::from_bits(bits) as f64
        }
        DataType::Uint32 => {
            let bits = ((words[0] as u32) << 16) | words[1] as u32;
            if field.signed {
                bits as i32 as f64
            } else {
                bits as f64
            }
        }
    };
    raw * field.scale
}

/// Splits an engineering value back into raw register words for a write.
pub fn encode_field(field: &RegisterField, value: f64) -> Result<Vec<u16>, SensorError> {
    if field.scale == 0.0 {
        return Err(SensorError::ConfigError(format!(
            "field '{}' has zero scale",
            field.name
        )));
    }
    let raw = value / field.scale;

    match field.data_type {
        DataType::Float32 => {
            let bits = (raw as f32).to_bits();
            Ok(vec![(bits >> 16) as u16, bits as u16])
        }
        DataType::Uint32 => {
            let raw = raw.round();
            let bits = if field.signed {
                if raw < i32::MIN as f64 || raw > i32::MAX as f64 {
                    return Err(out_of_range(field, value));
                }
                raw as i32 as u32
            } else {
                if raw < 0.0 || raw > u32::MAX as f64 {
                    return Err(out_of_range(field, value));
                }
                raw as u32
            };
            Ok(vec![(bits >> 16) as u16, bits as u16])
        }
        DataType::Int16 | DataType::Uint16 => {
            let raw = raw.round();
            let word = if field.signed || field.data_type == DataType::Int16 {
                if raw < i16::MIN as f64 || raw > i16::MAX as f64 {
                    return Err(out_of_range(field, value));
                }
                raw as i16 as u16
            } else {
                if raw < 0.0 || raw > u16::MAX as f64 {
                    return Err(out_of_range(field, value));
                }
                raw as u16
            };
            Ok(vec![word])
        }
    }
}

fn out_of_range(field: &RegisterField, value: f64) -> SensorError {
    SensorError::ConfigError(format!(
        "value {} out of range for field '{}'",
        value, field.name
    ))
}
