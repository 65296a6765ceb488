//! sdmmc-fatconf - FAT32 volume reader
//!
//! Just enough FAT32 to find a file in the root directory and read its first
//! sector. No long file names, no subdirectories, no cluster chains, no
//! writing.

use crate::{mbr, BlockDevice, BlockIdx};

pub use self::{
    bios_param_block::{BootSector, BpbError, VolumeGeometry},
    cluster::{Cluster, ClusterSectors},
    directory::{Attributes, DirEntry, DirEntryRaw, FilenameError, ShortName},
    file::FileSector,
    root_directory::{scan_sector, SectorScan},
};

pub mod bios_param_block;
pub mod cluster;
pub mod directory;
pub mod file;
pub mod root_directory;

#[cfg(test)]
pub(crate) mod test;

#[cfg(feature = "log")]
use log::debug;

#[cfg(feature = "defmt-log")]
use defmt::debug;

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatError<E> {
    DeviceError(E),
    /// Block 0 is neither a boot sector nor a partition table.
    InvalidMbrSignature(u16),
    InvalidPartitionStatus(u8),
    /// The first partition does not start with a boot sector. Carries the
    /// first byte found there.
    InvalidBootSector(u8),
    Bpb(BpbError),
    Filename(FilenameError),
    FileNotFound,
    /// A cluster number that maps to no data sector.
    InvalidCluster(u32),
}

impl<E> From<BpbError> for FatError<E> {
    fn from(e: BpbError) -> Self {
        Self::Bpb(e)
    }
}

impl<E> From<FilenameError> for FatError<E> {
    fn from(e: FilenameError) -> Self {
        Self::Filename(e)
    }
}

impl<E> From<mbr::Error> for FatError<E> {
    fn from(e: mbr::Error) -> Self {
        match e {
            mbr::Error::InvalidMbrSignature(footer) => Self::InvalidMbrSignature(footer),
            mbr::Error::InvalidPartitionStatus(status) => Self::InvalidPartitionStatus(status),
        }
    }
}

/// A FAT32 volume on a block device. The device's sector buffer is the only
/// buffer there is; the volume keeps nothing but the geometry.
pub struct FatVolume<BD>
where
    BD: BlockDevice,
{
    geometry: VolumeGeometry,
    block_device: BD,
}

impl<BD> core::fmt::Debug for FatVolume<BD>
where
    BD: BlockDevice,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FatVolume")
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl<BD> FatVolume<BD>
where
    BD: BlockDevice,
{
    /// Find the boot sector and derive the volume geometry.
    ///
    /// Block 0 is tried as a boot sector first. If it does not start with a
    /// jump instruction it must be a Master Boot Record, and the first
    /// partition's first block must then be the boot sector.
    pub fn new(mut block_device: BD) -> Result<Self, FatError<BD::Error>> {
        let block = block_device
            .read_block(BlockIdx(0))
            .map_err(FatError::DeviceError)?;

        let at_block_zero = BootSector::new(block).map(|bs| VolumeGeometry::new(&bs, 0));
        let geometry = if let Some(geometry) = at_block_zero {
            geometry?
        } else {
            let partition = mbr::Mbr::first_partition(block)?;
            let first_block = partition.first_block();
            debug!("Boot sector is in partition at block {}", first_block.0);

            let block = block_device
                .read_block(first_block)
                .map_err(FatError::DeviceError)?;
            let boot_sector = BootSector::new(block).ok_or(FatError::InvalidBootSector(block[0]))?;
            VolumeGeometry::new(&boot_sector, first_block.0)?
        };

        Ok(Self {
            geometry,
            block_device,
        })
    }

    pub fn release(self) -> BD {
        self.block_device
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }
}
