//! Provides fixed sample data for use in tests or example binaries.

use crate::frame::PAYLOAD_SIZE;

const fn ramp() -> [u8; PAYLOAD_SIZE] {
    let mut data = [0u8; PAYLOAD_SIZE];
    let mut i = 0;
    while i < PAYLOAD_SIZE {
        data[i] = i as u8;
        i += 1;
    }
    data
}

/// A deterministic sample payload: the byte ramp `0x00, 0x01, ..., 0xFF`.
/// This is the payload the responder stages in the example programs.
pub const RAMP_PAYLOAD: [u8; PAYLOAD_SIZE] = ramp();

/// The [crate::checksum::Policy::Reflected] checksum of [RAMP_PAYLOAD].
//
// Note that any change to the payload requires changing this value as well.
// The [tests::ramp_payload_checksum_valid] test will fail if the checksum
// does not match (and can be used to determine the updated value).
pub const RAMP_PAYLOAD_CHECKSUM_REFLECTED: u32 = 0x2905_8C73;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_payload_covers_every_byte_value() {
        assert_eq!(RAMP_PAYLOAD.len(), 256);
        for (i, &byte) in RAMP_PAYLOAD.iter().enumerate() {
            assert_eq!(byte, i as u8);
        }
    }

    // Ensures that the hardcoded checksum matches the actual data.
    #[test]
    fn ramp_payload_checksum_valid() {
        let calculated = crc32fast::hash(&RAMP_PAYLOAD);
        assert_eq!(
            calculated, RAMP_PAYLOAD_CHECKSUM_REFLECTED,
            "calculated checksum: 0x{calculated:08x} vs. hardcoded: \
             0x{RAMP_PAYLOAD_CHECKSUM_REFLECTED:08x}"
        );
    }
}
