//! Modbus RTU frame construction and parsing.
//!
//! Request frames are `unit id | function | payload | crc16` with the CRC
//! appended low byte first. Responses are validated against the request
//! they answer: unit id, function code, length and CRC all have to line up
//! before any register word is handed to the decoder.

use super::crc::{append_crc, verify_crc};
use crate::utils::error::SensorError;

/// Supported subset of Modbus function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleRegister = 0x06,
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Builds a read request for `count` registers starting at `address`.
pub fn build_read_request(unit_id: u8, function: FunctionCode, address: u16, count: u16) -> Vec<u8> {
    let mut frame = vec![unit_id, function.as_u8()];
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Builds a write-single-register request (function 0x06).
pub fn build_write_single(unit_id: u8, address: u16, value: u16) -> Vec<u8> {
    let mut frame = vec![unit_id, FunctionCode::WriteSingleRegister.as_u8()];
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&value.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Builds a write-multiple-registers request (function 0x10).
pub fn build_write_multiple(unit_id: u8, address: u16, values: &[u16]) -> Vec<u8> {
    let mut frame = vec![unit_id, FunctionCode::WriteMultipleRegisters.as_u8()];
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&(values.len() as u16).to_be_bytes());
    frame.push((values.len() * 2) as u8);
    for value in values {
        frame.extend_from_slice(&value.to_be_bytes());
    }
    append_crc(&mut frame);
    frame
}

/// Shared validation for every response frame: length floor, CRC, unit id,
/// exception flag, function echo.
fn check_header(frame: &[u8], unit_id: u8, function: FunctionCode) -> Result<(), SensorError> {
    if frame.len() < 5 {
        return Err(SensorError::FrameCorrupt(format!(
            "response too short: {} bytes",
            frame.len()
        )));
    }
    if !verify_crc(frame) {
        return Err(SensorError::FrameCorrupt("CRC mismatch".to_string()));
    }
    if frame[0] != unit_id {
        return Err(SensorError::FrameCorrupt(format!(
            "unit id {} does not match request unit {}",
            frame[0], unit_id
        )));
    }
    if frame[1] == function.as_u8() | 0x80 {
        return Err(SensorError::ExceptionResponse(frame[2]));
    }
    if frame[1] != function.as_u8() {
        return Err(SensorError::FrameCorrupt(format!(
            "unexpected function code 0x{:02X}",
            frame[1]
        )));
    }
    Ok(())
}

/// Parses a read response into big-endian register words.
///
/// The response must carry exactly `count` registers; anything else is a
/// corrupt frame, not a short read.
pub fn parse_read_response(
    frame: &[u8],
    unit_id: u8,
    function: FunctionCode,
    count: u16,
) -> Result<Vec<u16>, SensorError> {
    check_header(frame, unit_id, function)?;

    let data_len = 2 * count as usize;
    let expected = 3 + data_len + 2;
    if frame.len() != expected || frame[2] as usize != data_len {
        return Err(SensorError::FrameCorrupt(format!(
            "expected {} bytes for {} registers, got {}",
            expected,
            count,
            frame.len()
        )));
    }

    let words = frame[3..3 + data_len]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(words)
}

/// Validates the echo frame returned for a write request.
pub fn parse_write_response(
    frame: &[u8],
    unit_id: u8,
    function: FunctionCode,
) -> Result<(), SensorError> {
    check_header(frame, unit_id, function)?;

    // Both 0x06 and 0x10 echo address + value/count: 8 bytes total.
    if frame.len() != 8 {
        return Err(SensorError::FrameCorrupt(format!(
            "expected 8-byte write echo, got {}",
            frame.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::crc::append_crc;

    fn read_response(unit_id: u8, function: u8, words: &[u16]) -> Vec<u8> {
        let mut frame = vec![unit_id, function, (words.len() * 2) as u8];
        for word in words {
            frame.extend_from_slice(&word.to_be_bytes());
        }
        append_crc(&mut frame);
        frame
    }

    #[test]
    fn read_request_layout() {
        let frame = build_read_request(0x01, FunctionCode::ReadHoldingRegisters, 0x0000, 0x0001);
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
    }

    #[test]
    fn write_single_layout() {
        let frame = build_write_single(0x01, 0x0053, 0x00EB);
        assert_eq!(frame, vec![0x01, 0x06, 0x00, 0x53, 0x00, 0xEB, 0x39, 0x94]);
    }

    #[test]
    fn write_multiple_layout() {
        let frame = build_write_multiple(0x01, 0x0050, &[0x00EB]);
        assert_eq!(
            frame,
            vec![0x01, 0x10, 0x00, 0x50, 0x00, 0x01, 0x02, 0x00, 0xEB, 0xEA, 0x4F]
        );
    }

    #[test]
    fn round_trip_words() {
        for count in [1u16, 2, 7, 125] {
            let words: Vec<u16> = (0..count).map(|i| 0x0100u16.wrapping_mul(i + 1)).collect();
            let frame = read_response(0x11, 0x03, &words);
            let parsed =
                parse_read_response(&frame, 0x11, FunctionCode::ReadHoldingRegisters, count)
                    .unwrap();
            assert_eq!(parsed, words);
        }
    }

    #[test]
    fn exception_response_surfaces_code() {
        let frame = vec![0x01, 0x83, 0x02, 0xC0, 0xF1];
        let err = parse_read_response(&frame, 0x01, FunctionCode::ReadHoldingRegisters, 1)
            .unwrap_err();
        assert!(matches!(err, SensorError::ExceptionResponse(0x02)));
    }

    #[test]
    fn corrupt_crc_rejected() {
        let mut frame = read_response(0x01, 0x03, &[0x00FA]);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        let err = parse_read_response(&frame, 0x01, FunctionCode::ReadHoldingRegisters, 1)
            .unwrap_err();
        assert!(matches!(err, SensorError::FrameCorrupt(_)));
    }

    #[test]
    fn unit_id_mismatch_rejected() {
        let frame = read_response(0x02, 0x03, &[0x0064]);
        let err = parse_read_response(&frame, 0x01, FunctionCode::ReadHoldingRegisters, 1)
            .unwrap_err();
        assert!(matches!(err, SensorError::FrameCorrupt(_)));
    }

    #[test]
    fn wrong_register_count_rejected() {
        let frame = read_response(0x01, 0x03, &[0x0001, 0x0002]);
        let err = parse_read_response(&frame, 0x01, FunctionCode::ReadHoldingRegisters, 3)
            .unwrap_err();
        assert!(matches!(err, SensorError::FrameCorrupt(_)));
    }

    #[test]
    fn truncated_frame_rejected() {
        let err = parse_read_response(&[0x01, 0x03], 0x01, FunctionCode::ReadHoldingRegisters, 1)
            .unwrap_err();
        assert!(matches!(err, SensorError::FrameCorrupt(_)));
    }

    #[test]
    fn write_echo_accepted() {
        let frame = build_write_single(0x01, 0x0053, 0x00EB);
        parse_write_response(&frame, 0x01, FunctionCode::WriteSingleRegister).unwrap();
    }

    #[test]
    fn write_exception_surfaces_code() {
        let mut frame = vec![0x01, 0x86, 0x03];
        append_crc(&mut frame);
        let err = parse_write_response(&frame, 0x01, FunctionCode::WriteSingleRegister)
            .unwrap_err();
        assert!(matches!(err, SensorError::ExceptionResponse(0x03)));
    }
}
