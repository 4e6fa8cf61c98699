//! Compressed per bone animation data.
//!
//! Each sequence stores [AnimChannels] for every blend and bone in order
//! starting at the sequence's animation offset.
//! Each non zero channel offset points to run length encoded [AnimValues]
//! relative to the start of the [AnimChannels].
use binrw::{BinRead, BinResult};

/// The size in bytes of [AnimChannels].
pub const ANIM_CHANNELS_SIZE: usize = 12;

/// Offsets for the X, Y, Z position and X, Y, Z rotation channels of a bone.
#[derive(Debug, BinRead, PartialEq, Eq, Clone, Copy)]
pub struct AnimChannels {
    /// Offsets relative to the start of this struct or `0` for channels with no animation.
    pub offsets: [u16; 6],
}

/// A run of `total` frames with explicit values for the first `valid` frames.
/// The remaining frames repeat the last valid value.
#[derive(Debug, BinRead, PartialEq, Eq, Clone)]
pub struct AnimSpan {
    pub valid: u8,
    pub total: u8,
    #[br(count = valid)]
    pub values: Vec<i16>,
}

/// The spans for a single channel covering at least the sequence's frame count.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AnimValues {
    pub spans: Vec<AnimSpan>,
}

impl BinRead for AnimValues {
    /// The number of frames to cover.
    type Args<'a> = (u32,);

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        (frame_count,): Self::Args<'_>,
    ) -> BinResult<Self> {
        // There is no terminator, so only read the spans needed for all frames.
        // Single frame sequences still have a span for frame 0.
        let frame_count = frame_count.max(1) as u64;

        let mut spans = Vec::new();
        let mut covered = 0u64;
        while covered < frame_count {
            let span = AnimSpan::read_options(reader, endian, ())?;
            covered += span.total as u64;
            spans.push(span);
        }

        Ok(Self { spans })
    }
}
