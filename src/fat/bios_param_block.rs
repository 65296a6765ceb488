use crate::{Block, BlockIdx};

use super::cluster::Cluster;

#[cfg(feature = "log")]
use log::debug;

#[cfg(feature = "defmt-log")]
use defmt::debug;

/// Everything the volume reader needs to know about the volume, derived once
/// from the boot sector.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub fat_size: u32,
    pub root_cluster: Cluster,
    pub hidden_sectors: u32,
    pub total_sectors: u32,
    /// hidden + reserved + (FAT count x FAT size)
    pub first_data_sector: u32,
    pub total_clusters: u32,
    /// Start of the partition the boot sector was found in; 0 on a card with
    /// the file system at block 0.
    pub unused_sectors: u32,
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpbError {
    /// Block buffers are 512 bytes, so nothing else can be read.
    UnsupportedBytesPerSector(u16),
    InvalidSectorsPerCluster(u8),
    /// The FATs and reserved sectors claim more sectors than the volume has.
    SectorCountTooSmall,
    RootClusterLessThanTwo(u32),
}

impl VolumeGeometry {
    /// Derive the geometry from a boot sector. `unused_sectors` is where that
    /// boot sector was found.
    pub fn new(boot_sector: &BootSector, unused_sectors: u32) -> Result<Self, BpbError> {
        let bytes_per_sector = boot_sector.bytes_per_sec();
        if bytes_per_sector as usize != Block::LEN {
            return Err(BpbError::UnsupportedBytesPerSector(bytes_per_sector));
        }

        let sectors_per_cluster = Self::sectors_per_cluster_checked(boot_sector.sec_per_clu())?;

        let fat_size = match boot_sector.fat_sz_16() {
            0 => boot_sector.fat_sz_32(),
            size_16 => size_16 as u32,
        };
        let total_sectors = match boot_sector.tot_sec_16() {
            0 => boot_sector.tot_sec_32(),
            sec_16 => sec_16 as u32,
        };

        let reserved_sectors = boot_sector.rsvd_sec_cnt();
        let num_fats = boot_sector.num_fats();
        let hidden_sectors = boot_sector.hidden_sectors();
        let fats_len = (num_fats as u32)
            .checked_mul(fat_size)
            .ok_or(BpbError::SectorCountTooSmall)?;

        let first_data_sector = hidden_sectors
            .checked_add(reserved_sectors as u32)
            .and_then(|s| s.checked_add(fats_len))
            .ok_or(BpbError::SectorCountTooSmall)?;

        let data_sectors = total_sectors
            .checked_sub(reserved_sectors as u32)
            .and_then(|s| s.checked_sub(fats_len))
            .ok_or(BpbError::SectorCountTooSmall)?;
        let total_clusters = data_sectors / sectors_per_cluster as u32;

        let root_cluster = boot_sector.root_clus();
        if root_cluster < 2 {
            return Err(BpbError::RootClusterLessThanTwo(root_cluster));
        }

        let geometry = VolumeGeometry {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            fat_size,
            root_cluster: Cluster::new(root_cluster),
            hidden_sectors,
            total_sectors,
            first_data_sector,
            total_clusters,
            unused_sectors,
        };
        debug!("Volume geometry: {:?}", geometry);
        Ok(geometry)
    }

    fn sectors_per_cluster_checked(sectors_per_cluster: u8) -> Result<u8, BpbError> {
        match sectors_per_cluster {
            1 | 2 | 4 | 8 | 16 | 32 | 64 | 128 => Ok(sectors_per_cluster),
            _ => Err(BpbError::InvalidSectorsPerCluster(sectors_per_cluster)),
        }
    }

    /// First sector of the root directory.
    pub fn root_dir_sector(&self) -> Option<BlockIdx> {
        self.root_cluster.first_sector(self)
    }
}

/// A boot sector (BIOS Parameter Block) as it sits in the sector buffer.
/// The BS_* and reserved fields are not read.
pub struct BootSector<'a> {
    block: &'a Block,
}

impl<'a> BootSector<'a> {
    /// The two jump instructions a FAT boot sector may start with.
    const JUMP_CODES: [u8; 2] = [0xE9, 0xEB];

    /// Accept `block` as a boot sector if it starts with a jump instruction.
    pub fn new(block: &'a Block) -> Option<Self> {
        if Self::JUMP_CODES.contains(&block[0]) {
            Some(Self { block })
        } else {
            None
        }
    }

    fn data(&self) -> &[u8] {
        &self.block.contents
    }

    define_field!(jump_code, u8, 0);
    define_field!(bytes_per_sec, u16, 11);
    define_field!(sec_per_clu, u8, 13);
    define_field!(rsvd_sec_cnt, u16, 14);
    define_field!(num_fats, u8, 16);
    define_field!(tot_sec_16, u16, 19);
    define_field!(fat_sz_16, u16, 22);
    define_field!(hidden_sectors, u32, 28);
    define_field!(tot_sec_32, u32, 32);

    // FAT32 specific structure
    define_field!(fat_sz_32, u32, 36);
    define_field!(root_clus, u32, 44);
}
