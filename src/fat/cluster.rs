use crate::BlockIdx;

use super::bios_param_block::VolumeGeometry;

/// A cluster number. Data clusters are numbered from 2.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster(pub(crate) u32);

impl Cluster {
    pub const FIRST_DATA_CLUSTER: u32 = 2;

    pub fn new(cluster_number: u32) -> Self {
        Self(cluster_number)
    }

    /// Join the two 16 bit halves stored in a directory entry.
    pub fn from_halves(high: u16, low: u16) -> Self {
        Self((high as u32) << 16 | low as u32)
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    /// `(cluster - 2) * sectors_per_cluster + first_data_sector`. `None` for
    /// the two reserved cluster numbers, or if the sector does not fit in 32
    /// bits.
    pub fn first_sector(&self, geometry: &VolumeGeometry) -> Option<BlockIdx> {
        let index = self.0.checked_sub(Self::FIRST_DATA_CLUSTER)?;
        index
            .checked_mul(geometry.sectors_per_cluster as u32)?
            .checked_add(geometry.first_data_sector)
            .map(BlockIdx)
    }

    /// Every sector of this cluster, in order.
    pub fn sectors(&self, geometry: &VolumeGeometry) -> Option<ClusterSectors> {
        let first = self.first_sector(geometry)?;
        Some(ClusterSectors {
            next: first,
            remaining: geometry.sectors_per_cluster,
        })
    }
}

/// The sectors of one cluster. The FAT is never consulted, so this stops at
/// the end of the cluster.
#[derive(Debug, Clone)]
pub struct ClusterSectors {
    next: BlockIdx,
    remaining: u8,
}

impl Iterator for ClusterSectors {
    type Item = BlockIdx;

    fn next(&mut self) -> Option<BlockIdx> {
        if self.remaining == 0 {
            return None;
        }
        let sector = self.next;
        self.remaining -= 1;
        self.next = BlockIdx(sector.0.wrapping_add(1));
        Some(sector)
    }
}
