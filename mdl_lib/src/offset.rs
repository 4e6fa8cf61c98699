//! Bounds checked access to structures located by byte offsets.
//!
//! Most data in studio model files is addressed by offsets relative to the start of the file.
//! Some offsets are relative to the structure that stores them instead,
//! like the animation value offsets in [AnimChannels](crate::anim::AnimChannels).
//! An [OffsetReader] tracks the base position for offsets and checks every access
//! against the length of the underlying buffer.
use std::io::{Cursor, Seek, SeekFrom};

use binrw::{BinRead, BinReaderExt};
use log::trace;
use thiserror::Error;

/// A byte range that does not fit in the buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
#[error("range {offset}..{offset}+{size} out of range for length {len}")]
pub struct OutOfRange {
    pub offset: u64,
    pub size: u64,
    pub len: u64,
}

#[derive(Debug, Error)]
pub enum OffsetError {
    #[error("offset out of range")]
    OutOfRange(#[from] OutOfRange),

    #[error("error reading data")]
    Binrw(#[source] binrw::Error),
}

impl From<binrw::Error> for OffsetError {
    fn from(e: binrw::Error) -> Self {
        match out_of_range(&e) {
            Some(range) => Self::OutOfRange(range),
            None => Self::Binrw(e),
        }
    }
}

/// Returns the range if `error` was caused by reading outside the buffer.
///
/// Unexpected end of file errors are reported without a precise range.
pub fn out_of_range(error: &binrw::Error) -> Option<OutOfRange> {
    // Derived parsers wrap errors with context for each field.
    let mut error = error;
    while let binrw::Error::Backtrace(backtrace) = error {
        error = &backtrace.error;
    }

    match error {
        binrw::Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            Some(OutOfRange {
                offset: 0,
                size: 0,
                len: 0,
            })
        }
        e => e.custom_err::<OutOfRange>().copied(),
    }
}

/// Reads values at offsets relative to a base position in a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct OffsetReader<'a> {
    bytes: &'a [u8],
    base: u64,
}

impl<'a> OffsetReader<'a> {
    /// Create a reader with offsets relative to the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, base: 0 }
    }

    /// The length of the entire underlying buffer.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The absolute position that offsets are relative to.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// A reader with offsets relative to `offset` from the current base.
    pub fn relative(&self, offset: u64) -> Result<Self, OutOfRange> {
        let base = self.check(offset, 0)?;
        Ok(Self {
            bytes: self.bytes,
            base,
        })
    }

    /// Check that `size` bytes at `offset` are in range and return the absolute position.
    pub fn check(&self, offset: u64, size: u64) -> Result<u64, OutOfRange> {
        let out_of_range = OutOfRange {
            offset: self.base.saturating_add(offset),
            size,
            len: self.len(),
        };
        let start = self.base.checked_add(offset).ok_or(out_of_range)?;
        let end = start.checked_add(size).ok_or(out_of_range)?;
        if end > self.len() {
            Err(out_of_range)
        } else {
            Ok(start)
        }
    }

    /// The `size` bytes starting at `offset`.
    pub fn bytes(&self, offset: u64, size: u64) -> Result<&'a [u8], OutOfRange> {
        let start = self.check(offset, size)?;
        Ok(&self.bytes[start as usize..(start + size) as usize])
    }

    /// Read a value of type `T` at `offset`.
    pub fn read<T>(&self, offset: u64) -> Result<T, OffsetError>
    where
        for<'b> T: BinRead<Args<'b> = ()>,
    {
        self.read_args(offset, ())
    }

    /// Read a value of type `T` at `offset` with the given arguments.
    pub fn read_args<T, A>(&self, offset: u64, args: A) -> Result<T, OffsetError>
    where
        for<'b> T: BinRead<Args<'b> = A>,
    {
        let start = self.check(offset, 0)?;

        let mut reader = Cursor::new(self.bytes);
        reader
            .seek(SeekFrom::Start(start))
            .map_err(binrw::Error::Io)?;
        trace!("{}: {:?}", std::any::type_name::<T>(), start);

        reader.read_le_args::<T>(args).map_err(Into::into)
    }

    /// Read `count` values of type `T` starting at `offset`.
    pub fn read_vec<T>(&self, offset: u64, count: usize) -> Result<Vec<T>, OffsetError>
    where
        for<'b> T: BinRead<Args<'b> = ()> + 'static,
    {
        // Every element takes at least one byte.
        self.check(offset, count as u64)?;
        self.read_args(
            offset,
            binrw::VecArgs {
                count,
                inner: (),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;

    #[test]
    fn read_relative_offsets() {
        let data = hex!(01000000 02000000 03000000);
        let reader = OffsetReader::new(&data);
        assert_eq!(1u32, reader.read(0).unwrap());
        assert_eq!(3u32, reader.read(8).unwrap());

        let relative = reader.relative(4).unwrap();
        assert_eq!(4, relative.base());
        assert_eq!(2u32, relative.read(0).unwrap());
        assert_eq!(vec![2u32, 3u32], relative.read_vec(0, 2).unwrap());
    }

    #[test]
    fn read_out_of_range() {
        let data = hex!(01000000 02000000);
        let reader = OffsetReader::new(&data);

        assert!(matches!(
            reader.read::<u32>(8),
            Err(OffsetError::OutOfRange(_))
        ));
        assert!(matches!(
            reader.read::<u32>(6),
            Err(OffsetError::OutOfRange(_))
        ));
        assert!(matches!(
            reader.read::<u32>(u64::MAX),
            Err(OffsetError::OutOfRange(_))
        ));
        assert!(matches!(
            reader.read_vec::<u8>(4, 100),
            Err(OffsetError::OutOfRange(_))
        ));
    }

    #[test]
    fn relative_out_of_range() {
        let data = [0u8; 4];
        let reader = OffsetReader::new(&data);
        assert_eq!(
            Err(OutOfRange {
                offset: 5,
                size: 0,
                len: 4
            }),
            reader.relative(5).map(|r| r.base())
        );
    }

    #[test]
    fn bytes_in_range() {
        let data = [1u8, 2, 3, 4];
        let reader = OffsetReader::new(&data);
        assert_eq!(&[2u8, 3], reader.bytes(1, 2).unwrap());
        assert!(reader.bytes(3, 2).is_err());
    }
}
