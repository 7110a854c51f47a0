//! Frame parser
//!
//! Decodes one frame (starting at the sync marker) into its header and the
//! target list carried by TLV type 1010. Other TLV types are skipped by length.

use bytes::Buf;
use contracts::wire::{
    FrameHeader, FRAME_HEADER_LEN, MAGIC, TARGET_RECORD_LEN, TLV_HEADER_LEN, TLV_TARGET_LIST,
};
use contracts::{RawTrack, Vector3, ERROR_COVARIANCE_LEN};

use crate::error::ParseError;

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrame {
    pub header: FrameHeader,

    /// Targets in wire order
    pub tracks: Vec<RawTrack>,

    /// TLVs not walked because a declared length overran the frame
    pub malformed_tlvs: u32,

    /// Target records skipped (non-finite fields or trailing partial record)
    pub skipped_targets: u32,
}

impl ParsedFrame {
    pub fn frame_number(&self) -> u32 {
        self.header.frame_number
    }

    /// Bytes the deframer must consume for this frame
    pub fn total_length(&self) -> usize {
        self.header.total_packet_length as usize
    }
}

/// Decode the fixed header
pub fn parse_header(frame: &[u8]) -> Result<FrameHeader, ParseError> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(ParseError::IncompleteHeader {
            available: frame.len(),
        });
    }
    if frame[..MAGIC.len()] != MAGIC {
        return Err(ParseError::MissingMarker);
    }

    let mut cur = &frame[MAGIC.len()..FRAME_HEADER_LEN];
    Ok(FrameHeader {
        version: cur.get_u32_le(),
        total_packet_length: cur.get_u32_le(),
        platform: cur.get_u32_le(),
        frame_number: cur.get_u32_le(),
        time_cpu_cycles: cur.get_u32_le(),
        num_detected_objects: cur.get_u32_le(),
        num_tlvs: cur.get_u32_le(),
        subframe_number: cur.get_u32_le(),
    })
}

/// Decode one frame starting at `frame[0]`.
///
/// `frame` may extend past the end of this frame; only
/// `total_packet_length` bytes are read.
pub fn parse_frame(frame: &[u8]) -> Result<ParsedFrame, ParseError> {
    let header = parse_header(frame)?;
    let total = header.total_packet_length as usize;

    if total < FRAME_HEADER_LEN {
        return Err(ParseError::MalformedHeader {
            message: format!("total_packet_length {total} shorter than header"),
        });
    }
    if frame.len() < total {
        return Err(ParseError::IncompleteFrame {
            needed: total,
            available: frame.len(),
        });
    }

    let mut parsed = ParsedFrame {
        header,
        tracks: Vec::with_capacity(header.num_detected_objects.min(64) as usize),
        malformed_tlvs: 0,
        skipped_targets: 0,
    };

    let mut body = &frame[FRAME_HEADER_LEN..total];
    for index in 0..header.num_tlvs {
        if body.len() < TLV_HEADER_LEN {
            parsed.malformed_tlvs += header.num_tlvs - index;
            break;
        }
        let tlv_type = body.get_u32_le();
        let tlv_len = body.get_u32_le() as usize;
        if tlv_len > body.len() {
            parsed.malformed_tlvs += header.num_tlvs - index;
            break;
        }

        let (payload, rest) = body.split_at(tlv_len);
        if tlv_type == TLV_TARGET_LIST {
            decode_target_list(payload, &mut parsed);
        }
        body = rest;
    }

    Ok(parsed)
}

fn decode_target_list(payload: &[u8], parsed: &mut ParsedFrame) {
    let mut records = payload.chunks_exact(TARGET_RECORD_LEN);
    for record in &mut records {
        match decode_target(record) {
            Some(track) => parsed.tracks.push(track),
            None => parsed.skipped_targets += 1,
        }
    }
    if !records.remainder().is_empty() {
        parsed.skipped_targets += 1;
    }
}

/// Decode one 112-byte record, `None` if any kinematic field is not finite
fn decode_target(mut record: &[u8]) -> Option<RawTrack> {
    let local_id = record.get_u32_le();
    let position = get_vec3(&mut record);
    let velocity = get_vec3(&mut record);
    let acceleration = get_vec3(&mut record);

    let mut error_covariance = [0.0f32; ERROR_COVARIANCE_LEN];
    for value in error_covariance.iter_mut() {
        *value = record.get_f32_le();
    }
    let gating_gain = record.get_f32_le();
    let confidence = record.get_f32_le();

    let finite = [position, velocity, acceleration]
        .iter()
        .flat_map(|v| v.to_array())
        .chain([confidence])
        .all(f32::is_finite);
    if !finite {
        return None;
    }

    Some(RawTrack {
        local_id,
        position,
        velocity,
        acceleration,
        error_covariance,
        gating_gain,
        confidence,
    })
}

fn get_vec3(buf: &mut &[u8]) -> Vector3 {
    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    let z = buf.get_f32_le();
    Vector3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use contracts::wire::{encode_target_frame, put_target, DEFAULT_PLATFORM, DEFAULT_VERSION};

    fn track(id: u32, seed: f32) -> RawTrack {
        let mut t = RawTrack::new(
            id,
            Vector3::new(seed, seed * 2.0 + 0.1, -seed),
            Vector3::new(0.1 * seed, -0.25, 1e-7),
            Vector3::new(-3.5, seed / 3.0, 0.0),
            1.0 + seed,
            0.5 + seed / 200.0,
        );
        t.error_covariance[5] = seed;
        t
    }

    /// Frame with arbitrary TLVs, `declared_len` overrides a TLV's length field
    fn frame_with_tlvs(tlvs: &[(u32, Vec<u8>, Option<u32>)]) -> Vec<u8> {
        let mut body = BytesMut::new();
        for (ty, payload, declared_len) in tlvs {
            body.put_u32_le(*ty);
            body.put_u32_le(declared_len.unwrap_or(payload.len() as u32));
            body.put_slice(payload);
        }
        let mut buf = BytesMut::new();
        FrameHeader {
            version: DEFAULT_VERSION,
            total_packet_length: (FRAME_HEADER_LEN + body.len()) as u32,
            platform: DEFAULT_PLATFORM,
            frame_number: 3,
            num_tlvs: tlvs.len() as u32,
            ..Default::default()
        }
        .put(&mut buf);
        buf.put_slice(&body);
        buf.to_vec()
    }

    fn target_payload(tracks: &[RawTrack]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for t in tracks {
            put_target(&mut buf, t);
        }
        buf.to_vec()
    }

    #[test]
    fn round_trip_is_bit_identical() {
        for n in [0usize, 1, 7, 50] {
            let tracks: Vec<RawTrack> = (0..n).map(|i| track(i as u32, i as f32 * 0.37)).collect();
            let bytes = encode_target_frame(1234, &tracks);

            let parsed = parse_frame(&bytes).unwrap();
            assert_eq!(parsed.frame_number(), 1234);
            assert_eq!(parsed.total_length(), bytes.len());
            assert_eq!(parsed.tracks.len(), n);
            for (got, want) in parsed.tracks.iter().zip(&tracks) {
                assert_eq!(got.local_id, want.local_id);
                assert_eq!(got.position.x.to_bits(), want.position.x.to_bits());
                assert_eq!(got.velocity.z.to_bits(), want.velocity.z.to_bits());
                assert_eq!(got.acceleration.y.to_bits(), want.acceleration.y.to_bits());
                assert_eq!(got.gating_gain.to_bits(), want.gating_gain.to_bits());
                assert_eq!(got.confidence.to_bits(), want.confidence.to_bits());
                assert_eq!(got, want);
            }
        }
    }

    #[test]
    fn short_header() {
        let bytes = encode_target_frame(1, &[]);
        assert_eq!(
            parse_frame(&bytes[..20]),
            Err(ParseError::IncompleteHeader { available: 20 })
        );
    }

    #[test]
    fn short_frame() {
        let bytes = encode_target_frame(1, &[track(1, 1.0)]);
        let err = parse_frame(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            ParseError::IncompleteFrame {
                needed: bytes.len(),
                available: bytes.len() - 1
            }
        );
        assert!(err.is_incomplete());
    }

    #[test]
    fn total_length_below_header_is_malformed() {
        let mut bytes = encode_target_frame(1, &[]).to_vec();
        bytes[12..16].copy_from_slice(&8u32.to_le_bytes());
        assert!(matches!(
            parse_frame(&bytes),
            Err(ParseError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn unknown_tlvs_are_skipped() {
        let bytes = frame_with_tlvs(&[
            (1020, vec![0xAA; 24], None),
            (TLV_TARGET_LIST, target_payload(&[track(4, 2.0)]), None),
            (1011, vec![1, 2, 3], None),
        ]);
        let parsed = parse_frame(&bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 1);
        assert_eq!(parsed.tracks[0].local_id, 4);
        assert_eq!(parsed.malformed_tlvs, 0);
    }

    #[test]
    fn overrunning_tlv_truncates_walk() {
        let bytes = frame_with_tlvs(&[
            (TLV_TARGET_LIST, target_payload(&[track(1, 1.0)]), None),
            (1020, vec![0; 8], Some(4096)),
            (TLV_TARGET_LIST, target_payload(&[track(2, 2.0)]), None),
        ]);
        let parsed = parse_frame(&bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 1);
        assert_eq!(parsed.tracks[0].local_id, 1);
        assert_eq!(parsed.malformed_tlvs, 2);
    }

    #[test]
    fn trailing_partial_record_is_dropped() {
        let mut payload = target_payload(&[track(1, 1.0), track(2, 2.0)]);
        payload.extend_from_slice(&[0u8; 50]);
        let bytes = frame_with_tlvs(&[(TLV_TARGET_LIST, payload, None)]);
        let parsed = parse_frame(&bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 2);
        assert_eq!(parsed.skipped_targets, 1);
    }

    #[test]
    fn non_finite_record_is_skipped() {
        let mut bad = track(2, 1.0);
        bad.position.y = f32::NAN;
        let bytes = encode_target_frame(9, &[track(1, 1.0), bad, track(3, 3.0)]);
        let parsed = parse_frame(&bytes).unwrap();
        let ids: Vec<u32> = parsed.tracks.iter().map(|t| t.local_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(parsed.skipped_targets, 1);
    }

    #[test]
    fn trailing_bytes_after_frame_are_ignored() {
        let mut bytes = encode_target_frame(5, &[track(1, 1.0)]).to_vec();
        let frame_len = bytes.len();
        bytes.extend_from_slice(&MAGIC);
        let parsed = parse_frame(&bytes).unwrap();
        assert_eq!(parsed.total_length(), frame_len);
    }
}
