use crate::{Block, BlockDevice};

use super::{
    directory::{DirEntry, ShortName},
    FatError, FatVolume,
};

#[cfg(feature = "log")]
use log::{debug, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, warn};

/// The first sector of a file, borrowed from the sector buffer. It is gone
/// as soon as the block device reads again.
///
/// Only one sector is ever read: the cluster chain is not followed, so a file
/// longer than 512 bytes comes back truncated.
#[derive(Debug)]
pub struct FileSector<'a> {
    entry: DirEntry,
    block: &'a Block,
}

impl<'a> FileSector<'a> {
    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    /// The whole sector, including whatever follows the end of the file.
    pub fn data(&self) -> &'a [u8; Block::LEN] {
        &self.block.contents
    }

    /// The bytes that belong to the file, at most one sector of them.
    pub fn contents(&self) -> &'a [u8] {
        let len = (self.entry.file_size() as usize).min(Block::LEN);
        &self.block.contents[..len]
    }

    /// The file is longer than the one sector returned.
    pub fn is_truncated(&self) -> bool {
        self.entry.file_size() as usize > Block::LEN
    }
}

impl<BD> FatVolume<BD>
where
    BD: BlockDevice,
{
    /// Find `name` in the root directory and read the first sector of its
    /// data. The name is checked before any I/O happens.
    pub fn read_file(&mut self, name: &str) -> Result<FileSector<'_>, FatError<BD::Error>> {
        let short_name = ShortName::new(name)?;
        let entry = self.find_root_entry(&short_name)?;

        let cluster = *entry.first_cluster();
        let sector = cluster
            .first_sector(&self.geometry)
            .ok_or(FatError::InvalidCluster(cluster.number()))?;
        debug!(
            "Reading {} bytes of file at cluster {}, sector {}",
            entry.file_size(),
            cluster.number(),
            sector.0
        );

        let block = self
            .block_device
            .read_block(sector)
            .map_err(FatError::DeviceError)?;
        let file = FileSector { entry, block };
        if file.is_truncated() {
            warn!(
                "File is {} bytes, only the first sector is returned",
                entry.file_size()
            );
        }
        Ok(file)
    }
}
