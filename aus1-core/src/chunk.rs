//! Chunked transfer arithmetic shared by both ends of the link.

/// Fixed size of one streamed data chunk, in bytes.
pub const DATA_CHUNK_SIZE: usize = 32;

/// Round `data_size` up to the next multiple of `chunk_size`.
///
/// Streams are clocked in whole chunks; the receive buffer and the physical
/// size reported to the receiver both use this padded length. The legacy
/// implementation computed `size + size % chunk` here, which is not a chunk
/// multiple for most sizes; this rounds up properly.
pub fn padded_len(data_size: usize, chunk_size: usize) -> usize {
    debug_assert!(chunk_size > 0);
    (data_size + chunk_size - 1) / chunk_size * chunk_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_up_to_next_multiple() {
        assert_eq!(padded_len(40, 32), 64);
        assert_eq!(padded_len(1, 32), 32);
        assert_eq!(padded_len(33, 32), 64);
    }

    #[test]
    fn exact_multiple_unchanged() {
        assert_eq!(padded_len(32, 32), 32);
        assert_eq!(padded_len(96, 32), 96);
    }

    #[test]
    fn zero_stays_zero() {
        assert_eq!(padded_len(0, 32), 0);
    }

    #[test]
    fn smallest_multiple_not_below_size() {
        for data_size in 1..=4 * DATA_CHUNK_SIZE {
            let padded = padded_len(data_size, DATA_CHUNK_SIZE);
            assert_eq!(padded % DATA_CHUNK_SIZE, 0);
            assert!(padded >= data_size);
            assert!(padded - data_size < DATA_CHUNK_SIZE);
        }
    }
}
