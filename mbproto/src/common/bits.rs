pub(crate) fn num_bytes_for_bits(count: u16) -> usize {
    (count as usize + 7) / 8
}

/// Pack a slice of bits into bytes, first bit in the least significant position of the first byte
pub fn pack_bits(values: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; (values.len() + 7) / 8];
    for (i, value) in values.iter().enumerate() {
        if *value {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack `count` bits from LSB-first packed bytes
///
/// Returns `None` if `bytes` holds fewer than `count` bits
pub fn unpack_bits(bytes: &[u8], count: usize) -> Option<Vec<bool>> {
    if bytes.len() * 8 < count {
        return None;
    }
    Some(
        (0..count)
            .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculates_number_of_bytes_needed_for_count_of_packed_bits() {
        assert_eq!(num_bytes_for_bits(7), 1);
        assert_eq!(num_bytes_for_bits(8), 1);
        assert_eq!(num_bytes_for_bits(9), 2);
        assert_eq!(num_bytes_for_bits(0xFFFF), 8192);
    }

    #[test]
    fn packs_low_order_bits_first() {
        assert_eq!(pack_bits(&[true, true, false]), vec![0x03]);
        assert_eq!(
            pack_bits(&[false, false, false, false, false, false, false, false, true]),
            vec![0x00, 0x01]
        );
        assert!(pack_bits(&[]).is_empty());
    }

    #[test]
    fn unpacks_only_the_requested_count() {
        assert_eq!(unpack_bits(&[0x05], 3), Some(vec![true, false, true]));
        assert_eq!(unpack_bits(&[0x05], 9), None);
    }
}
