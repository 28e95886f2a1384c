//! Firmware image sources served over the transfer channel.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::info;

use super::error::TransferError;

/// Which image the device asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    /// `user1.bin`
    First,
    /// `user2.bin`; only older dual-image devices ask for it.
    Second,
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSlot::First => write!(f, "user1"),
            ImageSlot::Second => write!(f, "user2"),
        }
    }
}

/// Anything a firmware image can be streamed from.
pub trait ImageSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ImageSource for T {}

/// An opened firmware image with a known size.
pub struct FirmwareImage {
    name: String,
    size: u64,
    reader: Box<dyn ImageSource>,
}

impl FirmwareImage {
    /// Open an image file; the size comes from its metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let open_err = |source| TransferError::ImageOpen {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_err)?;
        let size = file.metadata().map_err(open_err)?.len();
        info!(path = %path.display(), size, "Opened firmware image");
        Ok(Self {
            name: path.display().to_string(),
            size,
            reader: Box::new(file),
        })
    }

    pub fn from_reader<R: ImageSource + 'static>(
        name: impl Into<String>,
        reader: R,
        size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            reader: Box::new(reader),
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::from_reader(name, Cursor::new(data), size)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Fill `buf` from the current offset. Short only at end of image.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl fmt::Debug for FirmwareImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirmwareImage")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// The image(s) offered to the device for one transfer.
#[derive(Debug)]
pub struct FirmwareImages {
    first: FirmwareImage,
    second: Option<FirmwareImage>,
}

impl FirmwareImages {
    pub fn new(first: FirmwareImage, second: Option<FirmwareImage>) -> Self {
        Self { first, second }
    }

    pub fn single(first: FirmwareImage) -> Self {
        Self::new(first, None)
    }

    pub fn has_second(&self) -> bool {
        self.second.is_some()
    }

    pub fn get(&self, slot: ImageSlot) -> Option<&FirmwareImage> {
        match slot {
            ImageSlot::First => Some(&self.first),
            ImageSlot::Second => self.second.as_ref(),
        }
    }

    pub fn get_mut(&mut self, slot: ImageSlot) -> Option<&mut FirmwareImage> {
        match slot {
            ImageSlot::First => Some(&mut self.first),
            ImageSlot::Second => self.second.as_mut(),
        }
    }
}
