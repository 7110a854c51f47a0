//! Radar UART protocol layout
//!
//! Little-endian throughout. A frame is
//! `magic(8) | header fields(32) | TLV records...`, each TLV being
//! `type(u32) | length(u32) | payload(length)`.
//!
//! Encoders live here so every re-encoding of a track list (synthetic
//! sources, the network sink's `tlv` format) shares one layout.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{RawTrack, ERROR_COVARIANCE_LEN};

/// Sync marker at the start of every frame
pub const MAGIC: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Marker plus the eight u32 header fields
pub const FRAME_HEADER_LEN: usize = 40;

/// TLV type + length
pub const TLV_HEADER_LEN: usize = 8;

/// Target list TLV type
pub const TLV_TARGET_LIST: u32 = 1010;

/// One encoded target record
pub const TARGET_RECORD_LEN: usize = 112;

/// Header version written by our encoders (SDK 3.x layout)
pub const DEFAULT_VERSION: u32 = 0x0306_0000;

/// Platform id written by our encoders (xWR6843)
pub const DEFAULT_PLATFORM: u32 = 0x000A_6843;

// Field offsets inside a target record
pub const TARGET_ID_OFFSET: usize = 0;
pub const TARGET_POS_OFFSET: usize = 4;
pub const TARGET_VEL_OFFSET: usize = 16;
pub const TARGET_ACC_OFFSET: usize = 28;
pub const TARGET_EC_OFFSET: usize = 40;
pub const TARGET_GAIN_OFFSET: usize = 104;
pub const TARGET_CONFIDENCE_OFFSET: usize = 108;

/// Fixed frame header following the magic word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub version: u32,
    /// Whole frame length in bytes, magic included
    pub total_packet_length: u32,
    pub platform: u32,
    pub frame_number: u32,
    pub time_cpu_cycles: u32,
    pub num_detected_objects: u32,
    pub num_tlvs: u32,
    pub subframe_number: u32,
}

impl FrameHeader {
    /// Write magic plus header fields
    pub fn put(&self, buf: &mut impl BufMut) {
        buf.put_slice(&MAGIC);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.total_packet_length);
        buf.put_u32_le(self.platform);
        buf.put_u32_le(self.frame_number);
        buf.put_u32_le(self.time_cpu_cycles);
        buf.put_u32_le(self.num_detected_objects);
        buf.put_u32_le(self.num_tlvs);
        buf.put_u32_le(self.subframe_number);
    }
}

/// Write one 112-byte target record
pub fn put_target(buf: &mut impl BufMut, track: &RawTrack) {
    buf.put_u32_le(track.local_id);
    for v in [track.position, track.velocity, track.acceleration] {
        buf.put_f32_le(v.x);
        buf.put_f32_le(v.y);
        buf.put_f32_le(v.z);
    }
    for c in track.error_covariance.iter().take(ERROR_COVARIANCE_LEN) {
        buf.put_f32_le(*c);
    }
    buf.put_f32_le(track.gating_gain);
    buf.put_f32_le(track.confidence);
}

/// Encode a complete frame carrying a single target list TLV.
///
/// An empty track list still produces the TLV with a zero-length payload.
pub fn encode_target_frame(frame_number: u32, tracks: &[RawTrack]) -> Bytes {
    let payload_len = tracks.len() * TARGET_RECORD_LEN;
    let total = FRAME_HEADER_LEN + TLV_HEADER_LEN + payload_len;

    let mut buf = BytesMut::with_capacity(total);
    FrameHeader {
        version: DEFAULT_VERSION,
        total_packet_length: total as u32,
        platform: DEFAULT_PLATFORM,
        frame_number,
        time_cpu_cycles: 0,
        num_detected_objects: tracks.len() as u32,
        num_tlvs: 1,
        subframe_number: 0,
    }
    .put(&mut buf);

    buf.put_u32_le(TLV_TARGET_LIST);
    buf.put_u32_le(payload_len as u32);
    for track in tracks {
        put_target(&mut buf, track);
    }
    buf.freeze()
}
