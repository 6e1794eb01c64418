use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::fs::FsError;
use crate::BLOCK_SIZE;

/// Bits tracked by a single bitmap block.
pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;

/// Allocation state of one tracked entity (data block or inode number).
#[derive(Debug, PartialEq, Eq)]
pub enum State {
    Free,
    Used,
}

/// One block interpreted as a bit vector. Bit `i` lives at byte `i / 8`,
/// bit `i % 8`, least-significant bit first; a set bit means allocated.
///
/// The same machinery tracks both the inode-number space and the data-block
/// space; only the backing block on disk differs.
#[repr(transparent)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy)]
pub struct Bitmap {
    bits: [u8; BLOCK_SIZE],
}

impl Bitmap {
    /// An all-free bitmap.
    pub fn new() -> Self {
        Bitmap::new_zeroed()
    }

    /// Reads a bitmap from a buffer of exactly one block. Passing a slice of
    /// any other size will result in a panic.
    pub fn parse(buf: &[u8]) -> Self {
        assert_eq!(
            buf.len(),
            BLOCK_SIZE,
            "length of buffer to parse must equal block size"
        );
        let mut map = Bitmap::new_zeroed();
        map.as_bytes_mut().copy_from_slice(buf);
        map
    }

    /// The raw block image of this bitmap, suitable for writing to disk.
    pub fn serialize(&self) -> &[u8] {
        self.as_bytes()
    }

    pub fn get(&self, index: usize) -> Result<State, FsError> {
        if index >= BITS_PER_BLOCK {
            return Err(FsError::IndexOutOfRange(index));
        }
        match (self.bits[index / 8] >> (index % 8)) & 1 {
            0 => Ok(State::Free),
            _ => Ok(State::Used),
        }
    }

    /// Marks bit `index` used or free in place.
    ///
    /// # Errors
    ///
    /// An index beyond the block's bit range returns
    /// [`FsError::IndexOutOfRange`].
    pub fn set(&mut self, index: usize, used: bool) -> Result<(), FsError> {
        if index >= BITS_PER_BLOCK {
            return Err(FsError::IndexOutOfRange(index));
        }
        let mask = 1u8 << (index % 8);
        if used {
            self.bits[index / 8] |= mask;
        } else {
            self.bits[index / 8] &= !mask;
        }
        Ok(())
    }

    /// Returns the lowest clear bit, scanning bytes in ascending order and
    /// bits within a byte least-significant first, or `None` when every bit
    /// is set. Always picking the lowest index keeps allocation order
    /// reproducible.
    pub fn find_free(&self) -> Option<usize> {
        self.bits
            .iter()
            .position(|&byte| byte != 0xff)
            .map(|at| at * 8 + (!self.bits[at]).trailing_zeros() as usize)
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Bitmap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_free_bitmap_hands_out_bit_zero() {
        let mut bmp = Bitmap::new();
        assert_eq!(bmp.find_free(), Some(0));

        bmp.set(0, true).unwrap();
        assert_eq!(bmp.find_free(), Some(1));
    }

    #[test]
    fn full_bitmap_has_no_free_bit() {
        let mut bmp = Bitmap::new();
        for i in 0..BITS_PER_BLOCK {
            bmp.set(i, true).unwrap();
        }
        assert_eq!(bmp.find_free(), None);
    }

    #[test]
    fn scan_is_lowest_first_within_a_byte() {
        let mut bmp = Bitmap::new();
        // Occupy bits 0, 1, and 3; the scan must land in the hole at 2.
        bmp.set(0, true).unwrap();
        bmp.set(1, true).unwrap();
        bmp.set(3, true).unwrap();
        assert_eq!(bmp.find_free(), Some(2));
    }

    #[test]
    fn can_toggle_bits_between_free_and_used() {
        let mut bmp = Bitmap::new();

        bmp.set(10, true).unwrap();
        assert_eq!(bmp.get(10).unwrap(), State::Used);

        bmp.set(10, false).unwrap();
        assert_eq!(bmp.get(10).unwrap(), State::Free);
    }

    #[test]
    fn can_set_bits_at_ends_of_bitmap() {
        let mut bmp = Bitmap::new();

        bmp.set(0, true).unwrap();
        bmp.set(BITS_PER_BLOCK - 1, true).unwrap();

        assert_eq!(bmp.get(0).unwrap(), State::Used);
        assert_eq!(bmp.get(BITS_PER_BLOCK - 1).unwrap(), State::Used);
    }

    #[test]
    fn out_of_range_index_is_a_defined_error() {
        let mut bmp = Bitmap::new();
        match bmp.set(BITS_PER_BLOCK, true).unwrap_err() {
            FsError::IndexOutOfRange(index) => assert_eq!(index, BITS_PER_BLOCK),
            other => panic!("unexpected error: {other}"),
        }
        assert!(bmp.get(BITS_PER_BLOCK).is_err());
    }

    #[test]
    fn can_serialize_and_parse_state() {
        let mut bmp = Bitmap::new();
        bmp.set(10, true).unwrap();
        bmp.set(11, true).unwrap();
        bmp.set(12, true).unwrap();

        let read_bmp = Bitmap::parse(bmp.serialize());
        assert_eq!(read_bmp.serialize(), bmp.serialize());
        assert_eq!(read_bmp.find_free(), Some(0));
        assert_eq!(read_bmp.get(11).unwrap(), State::Used);
    }
}
