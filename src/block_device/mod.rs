//! sdmmc-fatconf - Block Device support
//!
//! Generic code for handling block devices.

mod block;
pub use block::*;

/// Represents a read-only block device - a device which can read blocks (or
/// sectors). Only supports devices which are <= 2 TiB in size.
///
/// A device hands out a borrow of its own sector buffer, so the contents of a
/// block are only valid until the next call to `read_block`. Copy out
/// anything you need before reading again.
pub trait BlockDevice {
    /// The errors that the `BlockDevice` can return. Must be debug formattable.
    type Error: core::fmt::Debug;
    /// Read one block into the device's buffer and borrow it.
    fn read_block(&mut self, block_idx: BlockIdx) -> Result<&Block, Self::Error>;
}

impl<T> BlockDevice for &mut T
where
    T: BlockDevice,
{
    type Error = T::Error;

    fn read_block(&mut self, block_idx: BlockIdx) -> Result<&Block, Self::Error> {
        (**self).read_block(block_idx)
    }
}

/// The errors a `MemoryBlockDevice` can return.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The block lies (partly) past the end of the backing memory.
    OutOfRange(BlockIdx),
}

/// A block device backed by a byte slice, such as a disk image loaded into
/// RAM.
#[derive(Debug)]
pub struct MemoryBlockDevice<'a> {
    memory: &'a [u8],
    buffer: Block,
}

impl<'a> MemoryBlockDevice<'a> {
    pub fn new(memory: &'a [u8]) -> Self {
        Self {
            memory,
            buffer: Block::new(),
        }
    }

    /// Determine how many whole blocks the backing memory holds.
    pub fn num_blocks(&self) -> BlockCount {
        BlockCount((self.memory.len() / Block::LEN) as u32)
    }

    /// Byte range of a block in the backing memory. `None` if the range does
    /// not fit in `usize`, which can happen on 32 bit targets.
    fn block_range(block_idx: BlockIdx) -> Option<core::ops::Range<usize>> {
        let start = (block_idx.0 as usize).checked_mul(Block::LEN)?;
        let end = start.checked_add(Block::LEN)?;
        Some(start..end)
    }
}

impl<'a> BlockDevice for MemoryBlockDevice<'a> {
    type Error = MemoryError;

    fn read_block(&mut self, block_idx: BlockIdx) -> Result<&Block, Self::Error> {
        let memory = self.memory;
        let data = Self::block_range(block_idx)
            .and_then(|range| memory.get(range))
            .ok_or(MemoryError::OutOfRange(block_idx))?;
        self.buffer.contents.copy_from_slice(data);
        Ok(&self.buffer)
    }
}
