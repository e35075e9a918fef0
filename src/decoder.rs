//! TLV packet decoding
//!
//! This module turns one raw BLE notification payload into decoded samples.
//! Decoding is stateless and total: malformed input yields a partial or
//! empty result plus a log line, never a panic. The store handles final
//! chronological ordering and the steps glitch sentinel; output here
//! preserves input record order and raw field values.
//!
//! # Wire format
//!
//! Each sample record is 13 bytes, little-endian:
//!
//! ```text
//! [timestamp: u32] [hr: u16] [spo2: u8] [temp_raw: i16] [steps: u32]
//! ```
//!
//! `temp_raw` is hundredths of a degree Celsius. Records are framed as a
//! sequence of TLV blocks:
//!
//! - `0x10` bulk: `[count: u8]` then `count * 13` back-to-back records
//! - `0x01` single: `[len: u8]` which must be 13, then one record
//! - any other tag: `[len: u8]` then `len` bytes, skipped

use log::debug;

use crate::types::DeviceSample;

/// Bulk sample block tag
pub const TAG_BULK: u8 = 0x10;
/// Single sample block tag
pub const TAG_SINGLE: u8 = 0x01;

const SAMPLE_SIZE: usize = 13;

/// Decode one notification payload into zero or more samples.
///
/// Whenever a read would run past the end of the buffer, decoding stops
/// and returns the samples accumulated so far. A bulk block whose declared
/// count overruns the buffer contributes nothing (strict truncation check).
pub fn decode_packet(data: &[u8]) -> Vec<DeviceSample> {
    if data.is_empty() {
        debug!("decoder: empty packet");
        return Vec::new();
    }

    let mut offset = 0;
    let mut samples = Vec::new();

    while offset < data.len() {
        let tag = data[offset];
        offset += 1;

        match tag {
            TAG_BULK => {
                let Some(&count) = data.get(offset) else {
                    debug!("decoder: bulk count missing");
                    return samples;
                };
                offset += 1;

                let required = count as usize * SAMPLE_SIZE;
                if offset + required > data.len() {
                    debug!(
                        "decoder: bulk payload truncated ({} bytes, need {})",
                        data.len(),
                        offset + required
                    );
                    return samples;
                }

                for i in 0..count as usize {
                    let start = offset + i * SAMPLE_SIZE;
                    if let Some(sample) = decode_sample(&data[start..start + SAMPLE_SIZE]) {
                        samples.push(sample);
                    }
                }
                offset += required;
            }

            TAG_SINGLE => {
                let Some(&len) = data.get(offset) else {
                    debug!("decoder: single length missing");
                    return samples;
                };
                offset += 1;

                let len = len as usize;
                if len != SAMPLE_SIZE {
                    debug!("decoder: unexpected single length {len}");
                    if offset + len <= data.len() {
                        offset += len;
                        continue;
                    }
                    return samples;
                }

                if offset + SAMPLE_SIZE > data.len() {
                    debug!("decoder: single payload truncated");
                    return samples;
                }

                if let Some(sample) = decode_sample(&data[offset..offset + SAMPLE_SIZE]) {
                    samples.push(sample);
                }
                offset += SAMPLE_SIZE;
            }

            unknown => {
                // Forward compatibility: consume a length byte and skip.
                debug!("decoder: skip unknown tag {unknown:#04x}");
                if offset < data.len() {
                    let len = data[offset] as usize;
                    offset += 1;
                    offset += len.min(data.len() - offset);
                }
            }
        }
    }

    samples
}

/// Decode one 13-byte record. `payload` must be exactly [`SAMPLE_SIZE`] long.
fn decode_sample(payload: &[u8]) -> Option<DeviceSample> {
    if payload.len() != SAMPLE_SIZE {
        debug!("decoder: invalid sample payload length {}", payload.len());
        return None;
    }

    let timestamp = u32::from_le_bytes(payload[0..4].try_into().ok()?);
    let hr = u16::from_le_bytes(payload[4..6].try_into().ok()?);
    let spo2 = payload[6];
    let temp_raw = i16::from_le_bytes(payload[7..9].try_into().ok()?);
    let steps = u32::from_le_bytes(payload[9..13].try_into().ok()?);

    Some(DeviceSample {
        timestamp,
        hr,
        spo2,
        skin_temp_c: f64::from(temp_raw) / 100.0,
        steps,
    })
}
