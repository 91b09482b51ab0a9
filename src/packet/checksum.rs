//! The Internet checksum (RFC 1071) and the TCP pseudo-header that binds a
//! segment's checksum to its IP endpoints.
use std::net::Ipv4Addr;

pub const PSEUDO_HEADER_LEN: usize = 12;

/// One's complement of the one's complement sum of all 16-bit big-endian words.
///
/// An odd trailing byte is treated as if followed by a zero byte.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut chunks = bytes.chunks_exact(2);
    let mut sum: u32 = chunks
        .by_ref()
        .map(|word| u32::from(u16::from_be_bytes([word[0], word[1]])))
        .sum();

    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Builds the 12-byte pseudo-header: source, destination, zero, protocol, length.
pub fn build_pseudo_header(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    protocol: u8,
    segment_length: u16,
) -> [u8; PSEUDO_HEADER_LEN] {
    let mut bytes = [0u8; PSEUDO_HEADER_LEN];
    bytes[0..4].copy_from_slice(&src.octets());
    bytes[4..8].copy_from_slice(&dst.octets());
    bytes[8] = 0;
    bytes[9] = protocol;
    bytes[10..12].copy_from_slice(&segment_length.to_be_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::IPPROTO_TCP;

    #[test]
    fn rfc1071_worked_example() {
        // Sum of these words is 0x2ddf0, folded 0xddf2, complemented 0x220d.
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), 0x220d);
    }

    #[test]
    fn known_ipv4_header() {
        // Classic example header with its checksum field zeroed.
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(checksum(&header), 0xb861);
    }

    #[test]
    fn odd_length_is_zero_padded() {
        assert_eq!(checksum(&[0xab]), checksum(&[0xab, 0x00]));
        assert_eq!(checksum(&[0x12, 0x34, 0x56]), checksum(&[0x12, 0x34, 0x56, 0x00]));
    }

    #[test]
    fn empty_input() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn embedding_the_checksum_verifies_to_zero() {
        let mut data = vec![0x45, 0x00, 0x00, 0x28, 0x12, 0x34, 0x00, 0x00, 0xff, 0x06];
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);

        let sum = checksum(&data);
        data[10..12].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(checksum(&data), 0);
    }

    #[test]
    fn carries_fold_repeatedly() {
        let data = [0xff; 64];
        assert_eq!(checksum(&data), 0x0000);
    }

    #[test]
    fn pseudo_header_layout() {
        let bytes = build_pseudo_header(
            Ipv4Addr::new(192, 168, 1, 2),
            Ipv4Addr::new(8, 8, 8, 8),
            IPPROTO_TCP,
            33,
        );
        assert_eq!(bytes, [192, 168, 1, 2, 8, 8, 8, 8, 0, 6, 0, 33]);
    }
}
