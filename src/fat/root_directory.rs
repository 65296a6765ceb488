use crate::{Block, BlockDevice};

use super::{
    directory::{DirEntry, DirEntryRaw, DirSlot, ShortName},
    FatError, FatVolume,
};

#[cfg(feature = "log")]
use log::trace;

#[cfg(feature = "defmt-log")]
use defmt::trace;

/// The outcome of scanning one directory sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorScan {
    Found(DirEntry),
    /// The end of directory marker was reached.
    End,
    /// Neither a match nor the end marker; the directory continues in the next
    /// sector.
    Continue,
}

/// Look for a plain file named `name` among the 32 byte entries of one
/// directory sector. Entries after the end marker are never looked at.
pub fn scan_sector(block: &Block, name: &ShortName) -> SectorScan {
    for raw in block.chunks_exact(DirEntryRaw::LEN).map(DirEntryRaw::new) {
        match raw.slot() {
            DirSlot::EndOfDirectory => return SectorScan::End,
            DirSlot::Deleted => continue,
            DirSlot::Entry(entry) => {
                if entry.attributes().is_file() && entry.name() == name {
                    return SectorScan::Found(entry);
                }
            }
        }
    }
    SectorScan::Continue
}

impl<BD> FatVolume<BD>
where
    BD: BlockDevice,
{
    /// Search the first cluster of the root directory. The FAT is not
    /// followed, so a root directory longer than one cluster is only
    /// partially searched.
    pub fn find_root_entry(&mut self, name: &ShortName) -> Result<DirEntry, FatError<BD::Error>> {
        let root_cluster = self.geometry.root_cluster;
        let sectors = root_cluster
            .sectors(&self.geometry)
            .ok_or(FatError::InvalidCluster(root_cluster.number()))?;

        for sector in sectors {
            trace!("Scanning root directory sector {}", sector.0);
            let block = self
                .block_device
                .read_block(sector)
                .map_err(FatError::DeviceError)?;
            match scan_sector(block, name) {
                SectorScan::Found(entry) => return Ok(entry),
                SectorScan::End => break,
                SectorScan::Continue => {}
            }
        }

        Err(FatError::FileNotFound)
    }
}
