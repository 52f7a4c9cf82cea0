use std::borrow::Borrow;

use crc::{Crc, CRC_16_ARC, CRC_32_ISO_HDLC};

const CRC16_ALGO: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);
const CRC32_ALGO: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// 32-bit hash of a string, used for resource guids and data file entry ids.
#[inline]
pub fn crc32<T: Borrow<str>>(v: T) -> u32 {
    CRC32_ALGO.checksum(v.borrow().as_bytes())
}

/// 16-bit hash of a string, used for loader type identities.
#[inline]
pub fn crc16<T: Borrow<str>>(v: T) -> u16 {
    CRC16_ALGO.checksum(v.borrow().as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn check_values() {
        assert_eq!(crc32("123456789"), 0xCBF4_3926);
        assert_eq!(crc16("123456789"), 0xBB3D);
    }

    #[test]
    fn owned_and_borrowed() {
        let path = String::from("textures/crate.png");
        assert_eq!(crc32(path.as_str()), crc32(path.clone()));
        assert_ne!(crc32("textures/crate.png"), crc32("textures/crate.bmp"));
    }
}
