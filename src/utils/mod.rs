//! Commonly used utilities like hashing and path handling.

pub mod hash;
pub mod path;

pub use self::hash::{crc16, crc32};
