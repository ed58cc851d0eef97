use crate::error::{FSError, Result};
use crate::layout::{N_BLOCKS, N_INODES};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum State {
    Free,
    Used,
}

/// Which allocation table a bitmap tracks. Selects the number of valid bits and
/// the error reported when the table is exhausted.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Category {
    Inode,
    Block,
}

impl Category {
    pub fn capacity(self) -> usize {
        match self {
            Category::Inode => N_INODES,
            Category::Block => N_BLOCKS,
        }
    }

    fn exhausted(self) -> FSError {
        match self {
            Category::Inode => FSError::NoFreeInode,
            Category::Block => FSError::NoFreeBlock,
        }
    }
}

/// A view over raw allocation bits. Bit `i` is bit `i % 8` (least significant
/// first) of byte `i / 8`, a one marks the item as used.
pub struct Bitmap<B> {
    bytes: B,
    /// The number of items tracked. Bits past this index are never handed out.
    cap: usize,
}

impl<B: AsRef<[u8]>> Bitmap<B> {
    pub fn new(bytes: B, cap: usize) -> Self {
        assert!(
            cap <= bytes.as_ref().len() * 8,
            "Bitmap capacity exceeds backing storage."
        );
        Self { bytes, cap }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn get(&self, index: usize) -> State {
        assert!(index < self.cap, "Bitmap index {} out of range.", index);
        let byte = self.bytes.as_ref()[index / 8];
        match (byte >> (index % 8)) & 0b1 {
            0 => State::Free,
            _ => State::Used,
        }
    }

    /// Index of the first free item, scanning bytes in order and bits from least
    /// significant to most significant within a byte.
    pub fn first_free(&self) -> Option<usize> {
        self.bytes
            .as_ref()
            .iter()
            .enumerate()
            .find(|(_, &byte)| byte != 0xFF)
            .map(|(i, &byte)| i * 8 + (!byte).trailing_zeros() as usize)
            .filter(|&index| index < self.cap)
    }

    pub fn count_used(&self) -> usize {
        (0..self.cap)
            .filter(|&i| self.get(i) == State::Used)
            .count()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Bitmap<B> {
    pub fn set_reserved(&mut self, index: usize) {
        assert!(index < self.cap, "Bitmap index {} out of range.", index);
        self.bytes.as_mut()[index / 8] |= 1 << (index % 8);
    }

    pub fn set_free(&mut self, index: usize) {
        assert!(index < self.cap, "Bitmap index {} out of range.", index);
        self.bytes.as_mut()[index / 8] &= !(1 << (index % 8));
    }

    /// Claims the first free item and returns its index.
    pub fn find_and_set(&mut self) -> Option<usize> {
        let index = self.first_free()?;
        self.set_reserved(index);
        Some(index)
    }
}

/// Claims the lowest free bit of `bitmap` for the given table, marking it used
/// in place. The caller persists the bitmap.
pub fn find_and_set_bit(bitmap: &mut [u8], category: Category) -> Result<usize> {
    Bitmap::new(bitmap, category.capacity())
        .find_and_set()
        .ok_or_else(|| category.exhausted())
}

/// Releases bit `index` of `bitmap`. Releasing a free bit leaves it free.
pub fn clear_bit(bitmap: &mut [u8], index: usize) {
    let cap = bitmap.len() * 8;
    Bitmap::new(bitmap, cap).set_free(index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_read_and_write_values_to_bitmap() {
        let mut bmp = Bitmap::new([0_u8; 2], 16);

        bmp.set_reserved(2);

        assert_eq!(bmp.get(0), State::Free);
        assert_eq!(bmp.get(2), State::Used);
    }

    #[test]
    fn can_set_values_at_ends_of_bitmap() {
        let mut bmp = Bitmap::new([0_u8; 4], 32);

        bmp.set_reserved(0);
        bmp.set_reserved(31);

        assert_eq!(bmp.get(0), State::Used);
        assert_eq!(bmp.get(31), State::Used);
        assert_eq!(bmp.count_used(), 2);
    }

    #[test]
    fn can_toggle_block_between_free_and_used() {
        let mut bmp = Bitmap::new([0xFF_u8; 2], 16);

        bmp.set_free(10);
        assert_eq!(bmp.get(10), State::Free);
        // Neighbours are untouched.
        assert_eq!(bmp.get(9), State::Used);
        assert_eq!(bmp.get(11), State::Used);

        bmp.set_reserved(10);
        assert_eq!(bmp.get(10), State::Used);
    }

    #[test]
    #[should_panic]
    fn index_beyond_capacity_panics() {
        let bmp = Bitmap::new([0_u8; 1], 4);
        bmp.get(4);
    }

    #[test]
    fn finds_lowest_bit_of_first_open_byte() {
        let mut bytes = [0_u8; 16];
        bytes[0] = 0xFF;
        bytes[1] = 0b1010_0111;
        let index = find_and_set_bit(&mut bytes, Category::Block).unwrap();

        assert_eq!(index, 11);
        assert_eq!(bytes[1], 0b1010_1111);
        assert_eq!(bytes[2], 0x00);
    }

    #[test]
    fn reserved_prefix_is_skipped() {
        // Master block, inode table and root directory are blocks 0..=9.
        let mut bytes = [0_u8; 16];
        bytes[0] = 0xFF;
        bytes[1] = 0x03;
        assert_eq!(find_and_set_bit(&mut bytes, Category::Block).unwrap(), 10);
        assert_eq!(find_and_set_bit(&mut bytes, Category::Block).unwrap(), 11);
    }

    #[test]
    fn exhausted_tables_report_their_category() {
        let mut inodes = [0xFF; 7];
        match find_and_set_bit(&mut inodes, Category::Inode) {
            Err(FSError::NoFreeInode) => (),
            other => panic!("unexpected result {:?}", other),
        }

        let mut blocks = [0xFF; 16];
        match find_and_set_bit(&mut blocks, Category::Block) {
            Err(FSError::NoFreeBlock) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn bits_past_capacity_are_never_handed_out() {
        let mut bmp = Bitmap::new([0b0000_0111_u8], 3);
        assert_eq!(bmp.find_and_set(), None);
    }

    #[test]
    fn clear_bit_inverts_allocation() {
        let mut bytes = [0_u8; 7];
        let index = find_and_set_bit(&mut bytes, Category::Inode).unwrap();
        assert_eq!(index, 0);

        clear_bit(&mut bytes, index);
        assert_eq!(bytes, [0; 7]);

        // Clearing twice is harmless.
        clear_bit(&mut bytes, index);
        assert_eq!(bytes, [0; 7]);
    }
}
