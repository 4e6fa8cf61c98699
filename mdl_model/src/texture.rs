use log::error;
use mdl_lib::{
    mdl::{MASKED_PALETTE_INDEX, PALETTE_SIZE, StudioHeader, TextureDescriptor, TextureFlags},
    offset::{OffsetReader, OutOfRange},
};

use crate::error::DecodeError;

/// A decoded RGBA8 version of a palette texture.
#[derive(Debug, PartialEq, Clone)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub flags: TextureFlags,
    /// Row-major RGBA8 pixels with `width * height * 4` bytes.
    pub image_data: Vec<u8>,
}

impl Texture {
    /// Decode the palette indices and palette for `descriptor` from the file `reader`.
    pub fn from_descriptor(
        descriptor: &TextureDescriptor,
        reader: &OffsetReader,
    ) -> Result<Self, DecodeError> {
        let pixel_count = (descriptor.width as u64)
            .checked_mul(descriptor.height as u64)
            .ok_or(OutOfRange {
                offset: descriptor.data_offset as u64,
                size: u64::MAX,
                len: reader.len(),
            })?;

        // The palette immediately follows the indices.
        let data = reader.bytes(
            descriptor.data_offset as u64,
            pixel_count.saturating_add(PALETTE_SIZE as u64),
        )?;
        let (indices, palette) = data.split_at(pixel_count as usize);

        Ok(Self {
            name: descriptor.name.clone(),
            width: descriptor.width,
            height: descriptor.height,
            flags: descriptor.flags,
            image_data: palette_to_rgba(indices, palette, descriptor.flags.masked()),
        })
    }
}

/// Convert 8-bit `indices` into `palette` to RGBA8.
///
/// If `masked` is `true`, [MASKED_PALETTE_INDEX] is transparent black.
pub fn palette_to_rgba(indices: &[u8], palette: &[u8], masked: bool) -> Vec<u8> {
    indices
        .iter()
        .flat_map(|i| {
            if masked && *i == MASKED_PALETTE_INDEX {
                [0u8; 4]
            } else {
                let offset = *i as usize * 3;
                match palette.get(offset..offset + 3) {
                    Some(rgb) => [rgb[0], rgb[1], rgb[2], 255u8],
                    None => [0, 0, 0, 255],
                }
            }
        })
        .collect()
}

/// Decode the textures for `header`.
///
/// Textures that fail to decode are logged and replaced with `None`.
pub fn load_textures(header: &StudioHeader, reader: &OffsetReader) -> Vec<Option<Texture>> {
    header
        .textures
        .iter()
        .enumerate()
        .map(|(i, descriptor)| {
            Texture::from_descriptor(descriptor, reader)
                .inspect_err(|e| {
                    error!("Error decoding texture {i} {:?}: {e}", descriptor.name)
                })
                .ok()
        })
        .collect()
}
