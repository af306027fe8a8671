pub mod decode;
pub mod map;
pub mod planner;

pub use decode::{decode_field, encode_field};
pub use map::{DataType, RegisterField, RegisterMap};
pub use planner::{ContiguousRange, ReadPlanner, DEFAULT_MAX_REGISTERS};
