use core::convert::TryInto;

use super::cluster::Cluster;

bitflags::bitflags! {
    pub struct Attributes: u8 {
        const READ_ONLY = (1 << 0);
        const HIDDEN = (1 << 1);
        const SYSTEM = (1 << 2);
        const VOLUME_ID = (1 << 3);
        const DIRECTORY = (1 << 4);
        const ARCHIVE = (1 << 5);
    }
}

impl Attributes {
    pub fn is_long_name(&self) -> bool {
        self.contains(Self::READ_ONLY | Self::HIDDEN | Self::SYSTEM | Self::VOLUME_ID)
    }

    pub fn is_dir(&self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    /// A plain file: archive bit set, not a directory, volume label or long
    /// name fragment.
    pub fn is_file(&self) -> bool {
        self.contains(Self::ARCHIVE)
            && !self.is_long_name()
            && !self.intersects(Self::DIRECTORY | Self::VOLUME_ID)
    }
}

/// Reasons a name cannot be turned into an 8.3 short name.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameError {
    /// More than 8 characters before the dot.
    NameTooLong,
    /// More than 3 characters after the dot.
    ExtensionTooLong,
    Empty,
    /// A second dot, a space, a control character or a non-ASCII byte.
    InvalidCharacter(u8),
}

/// A name in the on-disk 8.3 form: base and extension, space padded, upper
/// case.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortName {
    name: [u8; ShortName::LEN],
}

impl ShortName {
    pub const LEN: usize = 11;
    const BASE_LEN: usize = 8;
    const EXTENSION_LEN: usize = 3;
    const PADDING: u8 = b' ';

    /// Convert a user supplied name such as `config.txt` into `CONFIG  TXT`.
    /// Nothing is truncated: a name that does not fit is an error.
    pub fn new(name: &str) -> Result<Self, FilenameError> {
        let bytes = name.as_bytes();
        let (base, extension) = match bytes.iter().position(|&b| b == b'.') {
            Some(dot) => (&bytes[..dot], &bytes[dot + 1..]),
            None => (bytes, &[][..]),
        };

        if base.is_empty() {
            return Err(FilenameError::Empty);
        }
        if base.len() > Self::BASE_LEN {
            return Err(FilenameError::NameTooLong);
        }
        if extension.len() > Self::EXTENSION_LEN {
            return Err(FilenameError::ExtensionTooLong);
        }
        if let Some(&bad) = base
            .iter()
            .chain(extension.iter())
            .find(|&&b| !b.is_ascii_graphic() || b == b'.')
        {
            return Err(FilenameError::InvalidCharacter(bad));
        }

        let mut name = [Self::PADDING; Self::LEN];
        name[..base.len()].copy_from_slice(base);
        name[Self::BASE_LEN..Self::BASE_LEN + extension.len()].copy_from_slice(extension);
        name.make_ascii_uppercase();
        Ok(Self { name })
    }

    pub fn from_raw(name: [u8; ShortName::LEN]) -> Self {
        Self { name }
    }

    pub fn as_bytes(&self) -> &[u8; ShortName::LEN] {
        &self.name
    }

    pub fn main_name(&self) -> &[u8] {
        trim_padding(&self.name[..Self::BASE_LEN])
    }

    pub fn extension(&self) -> &[u8] {
        trim_padding(&self.name[Self::BASE_LEN..])
    }
}

fn trim_padding(mut name: &[u8]) -> &[u8] {
    while let [rest @ .., ShortName::PADDING] = name {
        name = rest;
    }
    name
}

impl core::fmt::Debug for ShortName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ShortName(\"{}\")", self)
    }
}

impl core::fmt::Display for ShortName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for &b in self.main_name() {
            write!(f, "{}", b as char)?;
        }
        if !self.extension().is_empty() {
            f.write_str(".")?;
            for &b in self.extension() {
                write!(f, "{}", b as char)?;
            }
        }
        Ok(())
    }
}

/// A directory entry copied out of the sector buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: ShortName,
    attributes: Attributes,
    file_size: u32,
    first_cluster: Cluster,
}

impl DirEntry {
    pub fn new(raw: &DirEntryRaw) -> Self {
        Self {
            name: ShortName::from_raw(raw.name()),
            attributes: Attributes::from_bits_truncate(raw.attr()),
            file_size: raw.file_size(),
            first_cluster: Cluster::from_halves(raw.fst_clus_hi(), raw.fst_clus_lo()),
        }
    }

    pub fn name(&self) -> &ShortName {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_dir(&self) -> bool {
        self.attributes().is_dir()
    }

    pub fn file_size(&self) -> u32 {
        self.file_size
    }

    pub fn first_cluster(&self) -> &Cluster {
        &self.first_cluster
    }
}

/// What a 32 byte slot of a directory sector holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirSlot {
    /// First name byte 0x00: this and every following slot are unused.
    EndOfDirectory,
    /// First name byte 0xE5: a deleted entry.
    Deleted,
    Entry(DirEntry),
}

#[derive(Debug)]
pub struct DirEntryRaw<'a> {
    data: &'a [u8],
}

impl<'a> DirEntryRaw<'a> {
    pub const LEN: usize = 32;
    const END_OF_DIRECTORY: u8 = 0x00;
    const DELETED: u8 = 0xE5;

    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn data(&self) -> &[u8] {
        self.data
    }

    pub fn name(&self) -> [u8; 11] {
        self.data()[0..11].try_into().expect("Infallible")
    }

    pub fn slot(&self) -> DirSlot {
        match self.data()[0] {
            Self::END_OF_DIRECTORY => DirSlot::EndOfDirectory,
            Self::DELETED => DirSlot::Deleted,
            _ => DirSlot::Entry(DirEntry::new(self)),
        }
    }

    define_field!(attr, u8, 11);
    define_field!(crt_time_tenth, u8, 13);
    define_field!(crt_time, u16, 14);
    define_field!(crt_date, u16, 16);
    define_field!(lst_acc_date, u16, 18);
    define_field!(fst_clus_hi, u16, 20);
    define_field!(wrt_time, u16, 22);
    define_field!(wrt_date, u16, 24);
    define_field!(fst_clus_lo, u16, 26);
    define_field!(file_size, u32, 28);
}
