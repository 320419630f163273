//! JPEG segment reconstruction for Tight's embedded JPEG sub-mode.
//!
//! Tight (and TightPNG) servers frequently omit the Huffman (`0xC4`) and
//! Quantization (`0xDB`) table segments on frames after the first, relying on
//! the client to remember the tables from the previous frame. This module
//! scans the marker structure of a rectangle's JPEG payload, splices in the
//! last seen tables immediately after the Start-of-Frame marker when the
//! current frame doesn't carry its own, and hands the reconstructed blob to
//! `jpeg_decoder`.
//!
//! # Marker Parsing
//!
//! - `0xFFD8` (SOI) opens every payload.
//! - `0x01`, `0xD0`-`0xD9` are standalone two-byte markers (no length field).
//! - All other markers carry a 16-bit big-endian length (including the
//!   length field itself, excluding the marker bytes).
//! - `0xDA` (SOS) is special: its length covers only the scan header: the
//!   entropy-coded data that follows has no length prefix and must be
//!   scanned byte-by-byte for the next marker that isn't a byte-stuffed
//!   `0xFF00` or a restart marker (`0xD0`-`0xD7`).

use anyhow::{bail, Result};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;
const DHT: u8 = 0xC4;
const SOF0: u8 = 0xC0;
const SOF2: u8 = 0xC2;

/// Per-connection cache of the last seen Huffman and Quantization table segments.
///
/// Owned by the Tight decoder (shared with TightPNG) so tables persist across
/// rectangles the way the four zlib streams do.
#[derive(Default)]
pub struct JpegTableCache {
    last_dqt: Option<Vec<u8>>,
    last_dht: Option<Vec<u8>>,
}

impl JpegTableCache {
    /// Reconstruct a standalone JPEG blob, re-injecting cached tables when the
    /// frame omits them, and update the cache from whatever tables this frame
    /// does carry.
    pub fn reconstruct(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != SOI {
            bail!("Tight JPEG: payload does not start with SOI marker");
        }

        let mut out = Vec::with_capacity(data.len() + 64);
        out.extend_from_slice(&data[0..2]);
        let mut pos = 2usize;

        let mut sof_seen = false;
        let mut dqt_seen_before_sof = false;
        let mut dht_seen_before_sof = false;

        while pos < data.len() {
            if data[pos] != 0xFF {
                bail!("Tight JPEG: expected marker at offset {}", pos);
            }
            if pos + 1 >= data.len() {
                bail!("Tight JPEG: truncated marker at offset {}", pos);
            }
            let marker = data[pos + 1];

            if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
                out.extend_from_slice(&data[pos..pos + 2]);
                pos += 2;
                continue;
            }

            if marker == EOI {
                out.extend_from_slice(&data[pos..pos + 2]);
                pos += 2;
                break;
            }

            if marker == SOS {
                let (seg_len, header_end) = segment_bounds(data, pos)?;
                let _ = seg_len;
                out.extend_from_slice(&data[pos..header_end]);

                let mut i = header_end;
                while i + 1 < data.len() {
                    if data[i] == 0xFF {
                        let next = data[i + 1];
                        if next != 0x00 && !(0xD0..=0xD7).contains(&next) {
                            break;
                        }
                    }
                    i += 1;
                }
                out.extend_from_slice(&data[header_end..i]);
                pos = i;
                continue;
            }

            let (seg_len, seg_end) = segment_bounds(data, pos)?;
            let _ = seg_len;
            let segment = &data[pos..seg_end];

            match marker {
                DQT => {
                    self.last_dqt = Some(segment.to_vec());
                    if !sof_seen {
                        dqt_seen_before_sof = true;
                    }
                    out.extend_from_slice(segment);
                }
                DHT => {
                    self.last_dht = Some(segment.to_vec());
                    if !sof_seen {
                        dht_seen_before_sof = true;
                    }
                    out.extend_from_slice(segment);
                }
                SOF0 | SOF2 => {
                    out.extend_from_slice(segment);
                    sof_seen = true;
                    if !dqt_seen_before_sof {
                        if let Some(t) = &self.last_dqt {
                            out.extend_from_slice(t);
                        }
                    }
                    if !dht_seen_before_sof {
                        if let Some(t) = &self.last_dht {
                            out.extend_from_slice(t);
                        }
                    }
                }
                _ => {
                    out.extend_from_slice(segment);
                }
            }
            pos = seg_end;
        }

        if !sof_seen {
            bail!("Tight JPEG: payload has no Start-of-Frame segment");
        }

        Ok(out)
    }
}

/// Compute `(length_field_value, segment_end_offset)` for a length-prefixed
/// segment starting at `pos` (pointing at the `0xFF` marker byte).
fn segment_bounds(data: &[u8], pos: usize) -> Result<(usize, usize)> {
    if pos + 4 > data.len() {
        bail!("Tight JPEG: truncated segment length at offset {}", pos);
    }
    let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
    let end = pos + 2 + len;
    if end > data.len() {
        bail!(
            "Tight JPEG: segment at offset {} claims length {} past end of data",
            pos,
            len
        );
    }
    Ok((len, end))
}
