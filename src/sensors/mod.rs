pub mod air;
pub mod session;
pub mod soil;

pub use air::{air_register_map, AirSensor};
pub use session::{SensorReading, SensorSession, SessionState};
pub use soil::{soil_register_map, SoilSensor};

use crate::registers::map::{DataType, RegisterField};

/// Builds a register field with the word count its data type implies.
pub(crate) fn field(
    name: &str,
    address: u16,
    data_type: DataType,
    signed: bool,
    scale: f64,
) -> RegisterField {
    RegisterField {
        name: name.to_string(),
        address,
        word_count: data_type.word_count(),
        data_type,
        signed,
        scale,
    }
}

/// Baud-rate code written to the device settings register (0x07D1).
pub(crate) fn baud_code(baudrate: u32) -> Option<u16> {
    match baudrate {
        2400 => Some(0),
        4800 => Some(1),
        9600 => Some(2),
        19200 => Some(3),
        38400 => Some(4),
        57600 => Some(5),
        115200 => Some(6),
        1200 => Some(7),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_codes_match_device_table() {
        assert_eq!(baud_code(4800), Some(1));
        assert_eq!(baud_code(115200), Some(6));
        assert_eq!(baud_code(1200), Some(7));
        assert_eq!(baud_code(7200), None);
    }
}
