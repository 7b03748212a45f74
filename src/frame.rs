//! The on-wire frame layout shared by both ends of a link: a fixed-size
//! payload, optionally followed by a 4-byte checksum trailer.

use byteorder::{ByteOrder, LittleEndian};

/// The number of payload bytes exchanged per transaction. This is a link-wide
/// constant agreed out-of-band; it is not negotiated at runtime.
pub const PAYLOAD_SIZE: usize = 256;
/// The length of a frame's checksum trailer, in bytes.
pub const TRAILER_SIZE: usize = 4;
/// The maximum size of a frame on the wire (payload plus trailer).
pub const FRAME_SIZE: usize = PAYLOAD_SIZE + TRAILER_SIZE;
/// The byte a sender emits once its staged data is exhausted, so that
/// trailing reads are deterministic rather than leaking undefined memory.
pub const FILLER_BYTE: u8 = 0x00;

// 32-bit hardware checksum units consume the payload a word at a time.
const _: () = assert!(PAYLOAD_SIZE % 4 == 0);

/// Writes `checksum` into the trailer position of `frame`, i.e. its last
/// [TRAILER_SIZE] bytes. The trailer is always transmitted least significant
/// byte first; both ends must agree on this.
pub fn write_trailer(frame: &mut [u8], checksum: u32) {
    let at = frame.len() - TRAILER_SIZE;
    LittleEndian::write_u32(&mut frame[at..], checksum);
}

/// Reads the checksum out of the trailer position of `frame`, i.e. its last
/// [TRAILER_SIZE] bytes.
pub fn read_trailer(frame: &[u8]) -> u32 {
    LittleEndian::read_u32(&frame[frame.len() - TRAILER_SIZE..])
}

/// Returns the payload region of `frame`: everything except the trailer. The
/// trailer bytes are never part of a checksum's input.
pub fn payload(frame: &[u8]) -> &[u8] {
    &frame[..frame.len() - TRAILER_SIZE]
}

#[cfg(test)]
mod tests {
    use super::*;

    // Pins the trailer byte order on the wire: least significant byte first.
    #[test]
    fn trailer_is_little_endian() {
        let mut frame = [0u8; 8];
        write_trailer(&mut frame, 0x2905_8C73);
        assert_eq!(frame[4..], [0x73, 0x8c, 0x05, 0x29]);
        assert_eq!(read_trailer(&frame), 0x2905_8C73);
    }

    #[test]
    fn payload_excludes_trailer() {
        let frame = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(payload(&frame), &[1, 2, 3, 4]);
    }
}
