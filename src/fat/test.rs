use crate::{Block, BlockDevice, BlockIdx, MemoryBlockDevice};

use super::{
    bios_param_block::BpbError,
    cluster::Cluster,
    directory::{Attributes, FilenameError, ShortName},
    root_directory::{scan_sector, SectorScan},
    FatError, FatVolume,
};
use hex_literal::hex;

extern crate std;

use std::vec::Vec;

pub(crate) const SECTORS_PER_CLUSTER: u8 = 8;
pub(crate) const RESERVED_SECTORS: u16 = 32;
pub(crate) const NUM_FATS: u8 = 2;
pub(crate) const FAT_SIZE: u32 = 500;
pub(crate) const TOTAL_SECTORS: u32 = 1_000_000;
/// First data sector of a volume at block 0.
pub(crate) const DATA_START: u32 = 1032;

pub(crate) const ARCHIVE: u8 = 0x20;

/// A disk image in memory, with just the sectors a volume reader touches.
pub(crate) struct DiskImage {
    data: Vec<u8>,
}

impl DiskImage {
    pub(crate) fn new(blocks: u32) -> Self {
        Self {
            data: std::vec![0u8; blocks as usize * Block::LEN],
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn write(&mut self, sector: u32, offset: usize, bytes: &[u8]) -> &mut Self {
        let start = sector as usize * Block::LEN + offset;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// A FAT32 boot sector with the standard test geometry at `sector`.
    pub(crate) fn boot_sector(&mut self, sector: u32, hidden_sectors: u32) -> &mut Self {
        // jmp + nop, "MSDOS5.0"
        self.write(sector, 0, &hex!("EB 58 90 4D 53 44 4F 53 35 2E 30"))
            .write(sector, 11, &(Block::LEN as u16).to_le_bytes())
            .write(sector, 13, &[SECTORS_PER_CLUSTER])
            .write(sector, 14, &RESERVED_SECTORS.to_le_bytes())
            .write(sector, 16, &[NUM_FATS])
            .write(sector, 21, &[0xF8])
            .write(sector, 28, &hidden_sectors.to_le_bytes())
            .write(sector, 32, &TOTAL_SECTORS.to_le_bytes())
            .write(sector, 36, &FAT_SIZE.to_le_bytes())
            .write(sector, 44, &2u32.to_le_bytes())
            .write(sector, 510, &hex!("55 AA"))
    }

    /// A partition table with one FAT32 partition starting at `lba_start`.
    pub(crate) fn mbr(&mut self, lba_start: u32) -> &mut Self {
        self.write(0, 446, &[0x80])
            .write(0, 446 + 4, &[0x0C])
            .write(0, 446 + 8, &lba_start.to_le_bytes())
            .write(0, 446 + 12, &TOTAL_SECTORS.to_le_bytes())
            .write(0, 510, &hex!("55 AA"))
    }

    pub(crate) fn dir_entry(
        &mut self,
        sector: u32,
        slot: usize,
        name: &[u8; 11],
        attributes: u8,
        cluster: u32,
        size: u32,
    ) -> &mut Self {
        let offset = slot * 32;
        self.write(sector, offset, name)
            .write(sector, offset + 11, &[attributes])
            .write(sector, offset + 20, &((cluster >> 16) as u16).to_le_bytes())
            .write(sector, offset + 26, &(cluster as u16).to_le_bytes())
            .write(sector, offset + 28, &size.to_le_bytes())
    }
}

/// Passes reads through and remembers which blocks were asked for.
pub(crate) struct Recording<BD> {
    inner: BD,
    pub(crate) reads: Vec<u32>,
}

impl<BD> Recording<BD> {
    pub(crate) fn new(inner: BD) -> Self {
        Self {
            inner,
            reads: Vec::new(),
        }
    }
}

impl<BD> BlockDevice for Recording<BD>
where
    BD: BlockDevice,
{
    type Error = BD::Error;

    fn read_block(&mut self, block_idx: BlockIdx) -> Result<&Block, Self::Error> {
        self.reads.push(block_idx.0);
        self.inner.read_block(block_idx)
    }
}

fn unpartitioned_with_config() -> DiskImage {
    let mut image = DiskImage::new(1100);
    image
        .boot_sector(0, 0)
        .dir_entry(DATA_START, 0, b"LOGGER     ", 0x08, 0, 0)
        .dir_entry(DATA_START, 1, b"\xE5ONFIG  TXT", ARCHIVE, 9, 30)
        .dir_entry(DATA_START, 2, b"CONFIG  TXT", ARCHIVE, 5, 20)
        .write(1056, 0, b"10.0.0.1;80;5;host;\r\n");
    image
}

#[test]
fn geometry_without_partition_table() {
    let image = unpartitioned_with_config();
    let volume = FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap();
    let geometry = volume.geometry();

    assert_eq!(geometry.bytes_per_sector, 512);
    assert_eq!(geometry.sectors_per_cluster, 8);
    assert_eq!(geometry.reserved_sectors, 32);
    assert_eq!(geometry.num_fats, 2);
    assert_eq!(geometry.fat_size, 500);
    assert_eq!(geometry.root_cluster, Cluster(2));
    assert_eq!(geometry.hidden_sectors, 0);
    assert_eq!(geometry.total_sectors, 1_000_000);
    assert_eq!(geometry.first_data_sector, 1032);
    assert_eq!(geometry.total_clusters, (1_000_000 - 32 - 1000) / 8);
    assert_eq!(geometry.unused_sectors, 0);
    assert_eq!(geometry.root_dir_sector(), Some(BlockIdx(1032)));
}

#[test]
fn read_file_returns_first_sector() {
    let image = unpartitioned_with_config();
    let mut device = Recording::new(MemoryBlockDevice::new(image.as_slice()));
    let mut volume = FatVolume::new(&mut device).unwrap();

    let file = volume.read_file("config.txt").unwrap();
    assert_eq!(file.entry().first_cluster(), &Cluster(5));
    assert_eq!(file.entry().file_size(), 20);
    assert_eq!(file.entry().attributes(), &Attributes::ARCHIVE);
    assert_eq!(file.contents(), b"10.0.0.1;80;5;host;\r");
    assert_eq!(&file.data()[..21], b"10.0.0.1;80;5;host;\r\n");
    assert!(!file.is_truncated());

    drop(volume);
    assert_eq!(device.reads, [0, 1032, 1056]);
}

#[test]
fn missing_file_stops_at_end_marker() {
    let mut image = DiskImage::new(1100);
    image
        .boot_sector(0, 0)
        .dir_entry(DATA_START, 0, b"README  TXT", ARCHIVE, 3, 10);
    let mut device = Recording::new(MemoryBlockDevice::new(image.as_slice()));
    let mut volume = FatVolume::new(&mut device).unwrap();

    assert_eq!(
        volume.read_file("config.txt").unwrap_err(),
        FatError::FileNotFound
    );
    drop(volume);
    assert_eq!(device.reads, [0, 1032]);
}

#[test]
fn search_continues_into_next_sector() {
    let mut image = DiskImage::new(1100);
    image.boot_sector(0, 0);
    for slot in 0..16 {
        image.dir_entry(DATA_START, slot, b"OTHER   DAT", ARCHIVE, 3, 10);
    }
    image
        .dir_entry(DATA_START + 1, 0, b"CONFIG  TXT", ARCHIVE, 4, 3)
        .write(DATA_START + 16, 0, b"abc");
    let mut device = Recording::new(MemoryBlockDevice::new(image.as_slice()));
    let mut volume = FatVolume::new(&mut device).unwrap();

    assert_eq!(volume.read_file("CONFIG.TXT").unwrap().contents(), b"abc");
    drop(volume);
    assert_eq!(device.reads, [0, 1032, 1033, 1048]);
}

#[test]
fn search_ends_with_root_cluster() {
    let mut image = DiskImage::new(1100);
    image.boot_sector(0, 0);
    for sector in DATA_START..DATA_START + 8 {
        for slot in 0..16 {
            image.dir_entry(sector, slot, b"OTHER   DAT", ARCHIVE, 3, 10);
        }
    }
    let mut device = Recording::new(MemoryBlockDevice::new(image.as_slice()));
    let mut volume = FatVolume::new(&mut device).unwrap();

    assert_eq!(
        volume.read_file("config.txt").unwrap_err(),
        FatError::FileNotFound
    );
    drop(volume);
    assert_eq!(device.reads, [0, 1032, 1033, 1034, 1035, 1036, 1037, 1038, 1039]);
}

#[test]
fn directories_and_labels_are_not_files() {
    let mut image = DiskImage::new(1100);
    image
        .boot_sector(0, 0)
        .dir_entry(DATA_START, 0, b"CONFIG  TXT", 0x10, 3, 0)
        .dir_entry(DATA_START, 1, b"CONFIG  TXT", 0x08, 0, 0)
        .dir_entry(DATA_START, 2, b"CONFIG  TXT", 0x0F, 0, 0);
    let mut volume = FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap();

    assert_eq!(
        volume.read_file("config.txt").unwrap_err(),
        FatError::FileNotFound
    );
}

#[test]
fn long_file_is_truncated() {
    let mut image = unpartitioned_with_config();
    image.dir_entry(DATA_START, 2, b"CONFIG  TXT", ARCHIVE, 5, 1000);
    let mut volume = FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap();

    let file = volume.read_file("config.txt").unwrap();
    assert!(file.is_truncated());
    assert_eq!(file.contents().len(), 512);
}

#[test]
fn file_at_reserved_cluster() {
    let mut image = unpartitioned_with_config();
    image.dir_entry(DATA_START, 2, b"CONFIG  TXT", ARCHIVE, 0, 0);
    let mut volume = FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap();

    assert_eq!(
        volume.read_file("config.txt").unwrap_err(),
        FatError::InvalidCluster(0)
    );
}

#[test]
fn invalid_name_is_rejected_before_reading() {
    let image = unpartitioned_with_config();
    let mut device = Recording::new(MemoryBlockDevice::new(image.as_slice()));
    let mut volume = FatVolume::new(&mut device).unwrap();

    assert_eq!(
        volume.read_file("configuration.txt").unwrap_err(),
        FatError::Filename(FilenameError::NameTooLong)
    );
    drop(volume);
    assert_eq!(device.reads, [0]);
}

#[test]
fn boot_sector_inside_partition() {
    let mut image = DiskImage::new(3200);
    image
        .mbr(2048)
        .boot_sector(2048, 2048)
        .dir_entry(3080, 0, b"CONFIG  TXT", ARCHIVE, 5, 4)
        .write(3104, 0, b"data");
    let mut device = Recording::new(MemoryBlockDevice::new(image.as_slice()));
    let mut volume = FatVolume::new(&mut device).unwrap();

    assert_eq!(volume.geometry().unused_sectors, 2048);
    assert_eq!(volume.geometry().first_data_sector, 3080);
    assert_eq!(volume.read_file("config.txt").unwrap().contents(), b"data");
    drop(volume);
    assert_eq!(device.reads, [0, 2048, 3080, 3104]);
}

#[test]
fn partition_table_errors() {
    let image = DiskImage::new(8);
    assert_eq!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::InvalidMbrSignature(0)
    );

    let mut image = DiskImage::new(8);
    image.mbr(4);
    assert_eq!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::InvalidBootSector(0)
    );

    let mut image = DiskImage::new(8);
    image.mbr(4).write(0, 446, &[0x7F]);
    assert_eq!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::InvalidPartitionStatus(0x7F)
    );

    let mut image = DiskImage::new(8);
    image.mbr(100);
    assert!(matches!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::DeviceError(_)
    ));
}

#[test]
fn boot_sector_errors() {
    let mut image = DiskImage::new(8);
    image.boot_sector(0, 0).write(0, 11, &1024u16.to_le_bytes());
    assert_eq!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::Bpb(BpbError::UnsupportedBytesPerSector(1024))
    );

    let mut image = DiskImage::new(8);
    image.boot_sector(0, 0).write(0, 13, &[3]);
    assert_eq!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::Bpb(BpbError::InvalidSectorsPerCluster(3))
    );

    let mut image = DiskImage::new(8);
    image.boot_sector(0, 0).write(0, 44, &1u32.to_le_bytes());
    assert_eq!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::Bpb(BpbError::RootClusterLessThanTwo(1))
    );

    let mut image = DiskImage::new(8);
    image.boot_sector(0, 0).write(0, 32, &100u32.to_le_bytes());
    assert_eq!(
        FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap_err(),
        FatError::Bpb(BpbError::SectorCountTooSmall)
    );
}

#[test]
fn cluster_to_sector() {
    let image = unpartitioned_with_config();
    let volume = FatVolume::new(MemoryBlockDevice::new(image.as_slice())).unwrap();
    let geometry = volume.geometry();

    assert_eq!(Cluster(2).first_sector(geometry), Some(BlockIdx(1032)));
    assert_eq!(Cluster(5).first_sector(geometry), Some(BlockIdx(1056)));
    assert_eq!(
        Cluster(100_000).first_sector(geometry),
        Some(BlockIdx(99_998 * 8 + 1032))
    );
    assert_eq!(Cluster(1).first_sector(geometry), None);
    assert_eq!(Cluster(u32::MAX).first_sector(geometry), None);
    assert_eq!(Cluster::from_halves(0x0001, 0x0002), Cluster(0x0001_0002));

    let sectors: Vec<u32> = Cluster(3)
        .sectors(geometry)
        .unwrap()
        .map(|idx| idx.0)
        .collect();
    assert_eq!(sectors, [1040, 1041, 1042, 1043, 1044, 1045, 1046, 1047]);
}

#[test]
fn short_names() {
    assert_eq!(ShortName::new("config.txt").unwrap().as_bytes(), b"CONFIG  TXT");
    assert_eq!(ShortName::new("a.b").unwrap().as_bytes(), b"A       B  ");
    assert_eq!(ShortName::new("readme").unwrap().as_bytes(), b"README     ");
    assert_eq!(ShortName::new("12345678.abc").unwrap().as_bytes(), b"12345678ABC");
    assert_eq!(
        ShortName::new("abcdefghi.txt"),
        Err(FilenameError::NameTooLong)
    );
    assert_eq!(ShortName::new("a.text"), Err(FilenameError::ExtensionTooLong));
    assert_eq!(ShortName::new(""), Err(FilenameError::Empty));
    assert_eq!(ShortName::new(".txt"), Err(FilenameError::Empty));
    assert_eq!(
        ShortName::new("a b.txt"),
        Err(FilenameError::InvalidCharacter(b' '))
    );
    assert_eq!(
        ShortName::new("a.b.c"),
        Err(FilenameError::InvalidCharacter(b'.'))
    );

    let name = ShortName::new("config.txt").unwrap();
    assert_eq!(name.main_name(), b"CONFIG");
    assert_eq!(name.extension(), b"TXT");
    assert_eq!(std::format!("{}", name), "CONFIG.TXT");
    assert_eq!(
        std::format!("{}", ShortName::new("readme").unwrap()),
        "README"
    );
}

#[test]
fn scan_single_sector() {
    let mut image = DiskImage::new(1);
    image
        .dir_entry(0, 0, b"CONFIG  TXT", 0x10, 3, 0)
        .dir_entry(0, 1, b"CONFIG  TXT", ARCHIVE | 0x01, 7, 12);
    let mut device = MemoryBlockDevice::new(image.as_slice());
    let block = device.read_block(BlockIdx(0)).unwrap();
    let name = ShortName::new("config.txt").unwrap();

    match scan_sector(block, &name) {
        SectorScan::Found(entry) => {
            assert_eq!(entry.first_cluster(), &Cluster(7));
            assert!(!entry.is_dir());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        scan_sector(block, &ShortName::new("other").unwrap()),
        SectorScan::End
    );

    let full = Block {
        contents: [b'X'; Block::LEN],
    };
    assert_eq!(
        scan_sector(&full, &ShortName::new("other").unwrap()),
        SectorScan::Continue
    );
}
