/// XORs `buf` with `mask`, cycling through the key every 4 bytes.
///
/// Applying the same key twice restores the input.
#[inline]
pub fn apply_mask(buf: &mut [u8], mask: [u8; 4]) {
    if buf.len() < 8 {
        apply_mask_fallback(buf, mask);
        return;
    }

    let mask_u32 = u32::from_ne_bytes(mask);

    let mut words = buf.chunks_exact_mut(4);

    for word in &mut words {
        let value = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]) ^ mask_u32;

        word.copy_from_slice(&value.to_ne_bytes());
    }

    // The remainder starts on a multiple of 4, so the key restarts at index 0.
    apply_mask_fallback(words.into_remainder(), mask);
}

#[inline(always)]
fn apply_mask_fallback(buf: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_fallback() {
        let masks = [
            [0x00, 0x00, 0x00, 0x00],
            [0xFF, 0xFF, 0xFF, 0xFF],
            [0x12, 0x34, 0x56, 0x78],
            [0x6d, 0xb6, 0xb2, 0x80],
        ];

        for mask in masks {
            for size in 0..=70 {
                let data: Vec<u8> = (0..size).map(|i| (i * 7) as u8).collect();

                let mut expected = data.clone();
                apply_mask_fallback(&mut expected, mask);

                let mut actual = data.clone();
                apply_mask(&mut actual, mask);

                assert_eq!(expected, actual, "mask {mask:?} size {size}");
            }
        }
    }

    #[test]
    fn involution() {
        let mask = [0xAA, 0xBB, 0xCC, 0xDD];
        let original = b"Hello, World! This is a test message with various lengths.";

        let mut data = original.to_vec();
        apply_mask(&mut data, mask);

        assert_ne!(&data[..], &original[..]);

        apply_mask(&mut data, mask);

        assert_eq!(&data[..], &original[..]);
    }

    #[test]
    fn cycles_key() {
        let mask = [0x12, 0x34, 0x56, 0x78];

        let mut data = [0xAB, 0xCD, 0xEF, 0x01, 0x23];
        apply_mask(&mut data, mask);

        assert_eq!(
            data,
            [0xAB ^ 0x12, 0xCD ^ 0x34, 0xEF ^ 0x56, 0x01 ^ 0x78, 0x23 ^ 0x12]
        );
    }

    #[test]
    fn empty() {
        let mut data: [u8; 0] = [];
        apply_mask(&mut data, [1, 2, 3, 4]);
    }
}
