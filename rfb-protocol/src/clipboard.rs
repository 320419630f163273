//! Extended clipboard pseudo-encoding (`PSEUDO_ENCODING_EXTENDED_CLIPBOARD`).
//!
//! `ServerCutText`/`ClientCutText` with a negative length carry a 4-byte
//! flags word plus an action-specific payload instead of Latin-1 text. This
//! module owns the flags bitfield and the zlib-framed Provide payload;
//! `RfbInStream`/`RfbOutStream` framing (the negative-length convention
//! itself) stays in `messages::{client, server}`.

use anyhow::{bail, Context, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Format bits (occupy bits 0-15 of the flags word).
pub const FORMAT_TEXT: u32 = 1 << 0;

/// Action bits (occupy bits 24-31 of the flags word).
pub const ACTION_CAPS: u32 = 1 << 24;
pub const ACTION_REQUEST: u32 = 1 << 25;
pub const ACTION_PEEK: u32 = 1 << 26;
pub const ACTION_NOTIFY: u32 = 1 << 27;
pub const ACTION_PROVIDE: u32 = 1 << 28;

/// Formats/actions this client advertises in its own Caps response.
///
/// We only ever offer the Text format; the action set matches what a
/// minimal client needs to both ask for and serve clipboard text.
pub const CLIENT_ACTIONS: u32 = ACTION_CAPS | ACTION_REQUEST | ACTION_PEEK | ACTION_NOTIFY | ACTION_PROVIDE;
pub const CLIENT_FORMATS: u32 = FORMAT_TEXT;

/// The subaction carried by one extended clipboard message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardMessage {
    /// Server/client capability announcement: per-format byte sizes follow
    /// the flags word (one `i32` per bit set in `formats`), which we don't
    /// need beyond the caps bitmask itself.
    Caps { formats: u32, actions: u32 },
    Request { formats: u32 },
    Peek,
    Notify { formats: u32 },
    Provide { text: String },
}

impl ClipboardMessage {
    /// Parse an incoming extended-clipboard payload (flags + body), as
    /// carried by a negative-length ServerCutText/ClientCutText.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < 4 {
            bail!("extended clipboard payload too short: {} bytes", payload.len());
        }
        let flags = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        let body = &payload[4..];
        let formats = flags & 0x0000_ffff;

        if flags & ACTION_CAPS != 0 {
            // Caps carries one i32 per advertised format; we don't use the
            // sizes so just validate the body is the right shape.
            let expected = formats.count_ones() as usize * 4;
            if body.len() < expected {
                bail!("Caps body shorter than advertised format count");
            }
            return Ok(ClipboardMessage::Caps {
                formats,
                actions: flags & 0xff00_0000,
            });
        }
        if flags & ACTION_PROVIDE != 0 {
            let text = decode_provide_body(body).context("decoding Provide payload")?;
            return Ok(ClipboardMessage::Provide { text });
        }
        if flags & ACTION_REQUEST != 0 {
            return Ok(ClipboardMessage::Request { formats });
        }
        if flags & ACTION_NOTIFY != 0 {
            return Ok(ClipboardMessage::Notify { formats });
        }
        if flags & ACTION_PEEK != 0 {
            return Ok(ClipboardMessage::Peek);
        }
        bail!("extended clipboard message carries no recognized action bit: {:#010x}", flags);
    }

    /// Serialize this message into an extended-clipboard payload (flags +
    /// body) ready to be wrapped in a negative-length ClientCutText.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ClipboardMessage::Caps { formats, actions } => {
                let mut out = (*actions | (formats & 0x0000_ffff)).to_be_bytes().to_vec();
                for bit in 0..16 {
                    if formats & (1 << bit) != 0 {
                        out.extend_from_slice(&0i32.to_be_bytes());
                    }
                }
                out
            }
            ClipboardMessage::Request { formats } => {
                (ACTION_REQUEST | (formats & 0x0000_ffff)).to_be_bytes().to_vec()
            }
            ClipboardMessage::Peek => ACTION_PEEK.to_be_bytes().to_vec(),
            ClipboardMessage::Notify { formats } => {
                (ACTION_NOTIFY | (formats & 0x0000_ffff)).to_be_bytes().to_vec()
            }
            ClipboardMessage::Provide { text } => {
                let mut out = (ACTION_PROVIDE | FORMAT_TEXT).to_be_bytes().to_vec();
                out.extend_from_slice(&encode_provide_body(text));
                out
            }
        }
    }
}

/// zlib-deflate `(u32 length, utf8-text with trailing NUL)` for the Text
/// format, the only format this client advertises in Provide.
fn encode_provide_body(text: &str) -> Vec<u8> {
    let canonical = canonicalize_outgoing(text);
    let mut with_nul = canonical.into_bytes();
    with_nul.push(0);

    let mut inner = (with_nul.len() as u32).to_be_bytes().to_vec();
    inner.extend_from_slice(&with_nul);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&inner).expect("writing to an in-memory Vec cannot fail");
    encoder.finish().expect("flushing an in-memory Vec cannot fail")
}

fn decode_provide_body(body: &[u8]) -> Result<String> {
    let mut decoder = ZlibDecoder::new(body);
    let mut inner = Vec::new();
    decoder.read_to_end(&mut inner).context("inflating Provide payload")?;

    if inner.len() < 4 {
        bail!("Provide payload missing length prefix");
    }
    let length = u32::from_be_bytes(inner[0..4].try_into().unwrap()) as usize;
    let text_bytes = inner.get(4..4 + length).context("Provide length prefix exceeds payload")?;

    let text = String::from_utf8_lossy(text_bytes).to_string();
    let text = text.strip_suffix('\0').unwrap_or(&text);
    Ok(canonicalize_incoming(text))
}

/// `\r\n | \r | \n` → `\n`, the canonical form we hand to the application.
fn canonicalize_incoming(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// The wire format uses CRLF line endings; this client's internal text is
/// always `\n`-terminated, so reverse the canonicalization on the way out.
fn canonicalize_outgoing(text: &str) -> String {
    text.replace('\n', "\r\n")
}
