//! Animation data in numbered sequence group files like `<name>01.mdl`.
//!
//! A [SequenceGroupHeader] is followed by the [AnimChannels](crate::anim::AnimChannels)
//! and animation values for every sequence that references the group.
//! Animation offsets in sequence descriptions are relative to the start of the file.
use crate::fixed_string;
use binrw::binread;

/// The size in bytes of [SequenceGroupHeader].
pub const SEQUENCE_HEADER_SIZE: usize = 76;

#[binread]
#[derive(Debug, PartialEq, Clone)]
#[br(magic(b"IDSQ"))]
pub struct SequenceGroupHeader {
    #[br(assert(version == crate::VERSION))]
    pub version: u32,

    #[br(map(|x: [u8; 64]| fixed_string(&x)))]
    pub name: String,

    /// The size of the file in bytes.
    pub length: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;

    #[test]
    fn read_sequence_group_header() {
        let mut data = hex!(49445351 0a000000).to_vec();
        let mut name = [0u8; 64];
        name[..10].copy_from_slice(b"scientist1");
        data.extend_from_slice(&name);
        data.extend_from_slice(&hex!(4c000000));

        let header = SequenceGroupHeader::from_bytes(&data).unwrap();
        assert_eq!(
            SequenceGroupHeader {
                version: 10,
                name: "scientist1".to_string(),
                length: 76
            },
            header
        );
        assert_eq!(SEQUENCE_HEADER_SIZE, data.len());
    }

    #[test]
    fn read_sequence_group_header_primary_magic() {
        let mut data = hex!(49445354 0a000000).to_vec();
        data.resize(SEQUENCE_HEADER_SIZE, 0);
        assert!(SequenceGroupHeader::from_bytes(&data).is_err());
    }
}
