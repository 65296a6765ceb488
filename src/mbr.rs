//! sdmmc-fatconf - Master Boot Record
//!
//! Partitioned cards carry a partition table in block 0 instead of a boot
//! sector. Only the table is parsed here; nothing is booted.

use crate::{Block, BlockCount, BlockIdx};

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidMbrSignature(u16),
    InvalidPartitionStatus(u8),
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PartitionType {
    Fat32ChsLba,
    Fat32Lba,
    /// Not a FAT32 marker. The boot sector decides whether the volume can
    /// still be read.
    Other(u8),
}

impl PartitionType {
    /// Marker for a FAT32 partition. What Macosx disk utility (and also SD-Card formatter?)
    /// use.
    const FAT32_CHS_LBA: u8 = 0x0B;
    /// Marker for a FAT32 partition with LBA.
    const FAT32_LBA: u8 = 0x0C;

    pub fn from_u8(value: u8) -> Self {
        match value {
            Self::FAT32_CHS_LBA => Self::Fat32ChsLba,
            Self::FAT32_LBA => Self::Fat32Lba,
            _ => Self::Other(value),
        }
    }
}

/// One 16 byte entry of the partition table.
struct PartitionInfoRaw<'a> {
    data: &'a [u8],
}

impl<'a> PartitionInfoRaw<'a> {
    fn data(&self) -> &[u8] {
        self.data
    }

    define_field!(status, u8, 0);
    define_field!(partition_type, u8, 4);
    define_field!(lba_start, u32, 8);
    define_field!(num_blocks, u32, 12);
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Partition {
    pub ty: PartitionType,
    pub lba_start: BlockCount,
    pub block_count: BlockCount,
}

impl Partition {
    pub(crate) const PARTITION_INFO_LENGTH: usize = 16;

    fn from_info(info: &[u8]) -> Result<Self, Error> {
        let raw = PartitionInfoRaw { data: info };

        let pstatus = raw.status();
        if pstatus != 0x80 && pstatus != 0x00 {
            return Err(Error::InvalidPartitionStatus(pstatus));
        }

        Ok(Partition {
            ty: PartitionType::from_u8(raw.partition_type()),
            lba_start: BlockCount(raw.lba_start()),
            block_count: BlockCount(raw.num_blocks()),
        })
    }

    /// The first block of the partition, where its boot sector lives.
    pub fn first_block(&self) -> BlockIdx {
        BlockIdx(0) + self.lba_start
    }
}

pub struct Mbr;

impl Mbr {
    const FOOTER_START: usize = 510;
    pub const FOOTER_VALUE: u16 = 0xAA55;
    const PARTITION1_START: usize = 446;

    /// Interpret `block` as a Master Boot Record and return the first entry
    /// of its partition table. The other three entries are never used.
    pub fn first_partition(block: &Block) -> Result<Partition, Error> {
        let footer = u16::from_le_bytes([block[Self::FOOTER_START], block[Self::FOOTER_START + 1]]);

        if footer != Self::FOOTER_VALUE {
            return Err(Error::InvalidMbrSignature(footer));
        }

        let start = Self::PARTITION1_START;
        Partition::from_info(&block[start..start + Partition::PARTITION_INFO_LENGTH])
    }
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************
