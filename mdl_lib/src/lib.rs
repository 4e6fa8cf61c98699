//! A library for reading GoldSrc studio model files.
//!
//! Primary `.mdl` files start with `IDST` and contain the skeleton, meshes, sequences
//! and usually textures and animation data.
//! Large models split textures into a `<name>T.mdl` file with the same layout
//! and animation data into numbered `<name>01.mdl` sequence group files starting with `IDSQ`.
//!
//! # Getting Started
//! Only the top level types support reading from files.
//!
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let header = mdl_lib::mdl::StudioHeader::from_file("scientist.mdl")?;
//! println!("{header:#?}");
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! Each structure in the file is represented by a Rust type with derived reading code.
//! Arrays addressed by a count and a byte offset are read eagerly while parsing the header.
//! Large or optional data like vertices, triangle commands, pixels, events, and animation values
//! is stored as raw offsets and read on demand with an [OffsetReader](offset::OffsetReader).
//!
//! All reads are bounds checked against the buffer.
//! Offsets or counts that point outside the buffer produce an error instead of reading garbage.
//! mdl_lib does not validate higher level constraints like bone indices being in range.
//! These checks are performed by higher level libraries like mdl_model.
use std::{
    io::{Cursor, Read, Seek, SeekFrom},
    path::Path,
};

use binrw::{BinRead, BinReaderExt, BinResult, VecArgs};
use log::trace;

use crate::offset::OutOfRange;

pub mod anim;
pub mod error;
pub mod mdl;
pub mod offset;
pub mod seq;

/// The version for both `IDST` and `IDSQ` files.
pub const VERSION: u32 = 10;

fn parse_count32_offset32<T, R>(reader: &mut R, endian: binrw::Endian, _args: ()) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    let count = u32::read_options(reader, endian, ())?;
    let pos = reader.stream_position()?;
    let offset = u32::read_options(reader, endian, ())?;

    if offset == 0 && count != 0 {
        return Err(binrw::Error::AssertFail {
            pos,
            message: format!("unexpected null offset for count {count}"),
        });
    }

    parse_vec(reader, endian, offset as u64, count as usize)
}

/// Read an offset for an array whose count appeared earlier in the struct.
fn parse_offset32_count<T, R>(
    reader: &mut R,
    endian: binrw::Endian,
    (count,): (u32,),
) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    let pos = reader.stream_position()?;
    let offset = u32::read_options(reader, endian, ())?;

    if offset == 0 && count != 0 {
        return Err(binrw::Error::AssertFail {
            pos,
            message: format!("unexpected null offset for count {count}"),
        });
    }

    parse_vec(reader, endian, offset as u64, count as usize)
}

fn parse_vec<T, R>(reader: &mut R, endian: binrw::Endian, offset: u64, count: usize) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    let saved_pos = reader.stream_position()?;

    // Every element takes at least one byte.
    // This rejects huge counts before allocating anything.
    check_range(reader, offset, count as u64)?;

    reader.seek(SeekFrom::Start(offset))?;
    trace!(
        "{}: {:?}",
        std::any::type_name::<Vec<T>>(),
        reader.stream_position()?
    );

    let values = Vec::<T>::read_options(reader, endian, VecArgs { count, inner: () })?;

    reader.seek(SeekFrom::Start(saved_pos))?;

    Ok(values)
}

fn check_range<R: Read + Seek>(reader: &mut R, offset: u64, size: u64) -> BinResult<()> {
    let saved_pos = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(saved_pos))?;

    if offset.checked_add(size).is_none_or(|end| end > len) {
        return Err(binrw::Error::Custom {
            pos: saved_pos,
            err: Box::new(OutOfRange { offset, size, len }),
        });
    }
    Ok(())
}

/// Decode a fixed size NUL padded name.
fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

macro_rules! file_read_impl {
    ($($type_name:path),*) => {
        $(
            impl $type_name {
                pub fn read<R: Read + Seek>(reader: &mut R) -> BinResult<Self> {
                    reader.read_le().map_err(Into::into)
                }

                /// Read from `path` using a fully buffered reader for performance.
                pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, error::ReadFileError> {
                    let mut reader = Cursor::new(std::fs::read(path)?);
                    reader.read_le().map_err(Into::into)
                }

                /// Read from `bytes` using a fully buffered reader for performance.
                pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> BinResult<Self> {
                    Self::read(&mut Cursor::new(bytes))
                }
            }
        )*
    };
}

file_read_impl!(mdl::StudioHeader, seq::SequenceGroupHeader);
