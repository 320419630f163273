//! Framebuffer state management and decoder registry.
//!
//! This module manages the client's framebuffer and provides a registry of
//! encoding decoders to apply server framebuffer update rectangles.

use crate::errors::RfbClientError;
use anyhow::Result as AnyResult;
use rfb_common::Rect;
use rfb_encodings as enc;
use rfb_encodings::{Decoder, MutablePixelBuffer, RfbInStream};
use rfb_pixelbuffer::{ManagedPixelBuffer, PixelBuffer as _, PixelFormat as LocalPixelFormat};
use rfb_protocol::messages::types::{PixelFormat as ServerPixelFormat, Rectangle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Registry of decoders keyed by encoding type.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<i32, DecoderEntry>,
}

impl DecoderRegistry {
    /// Create a registry with all standard encodings registered.
    pub fn with_standard() -> Self {
        let mut reg = Self::default();
        reg.register(DecoderEntry::Raw(enc::RawDecoder));
        reg.register(DecoderEntry::CopyRect(enc::CopyRectDecoder));
        reg.register(DecoderEntry::RRE(enc::RREDecoder));
        reg.register(DecoderEntry::Hextile(enc::HextileDecoder));
        let tight_decoder = Arc::new(enc::TightDecoder::default());
        reg.register(DecoderEntry::TightPng(tight_decoder.shared_png_decoder()));
        reg.register(DecoderEntry::TightShared(tight_decoder));
        reg.register(DecoderEntry::ZRLE(enc::ZRLEDecoder::default()));
        reg
    }

    /// Register a decoder entry.
    pub(crate) fn register(&mut self, decoder: DecoderEntry) {
        self.decoders.insert(decoder.encoding_type(), decoder);
    }

    /// Get a decoder by encoding type.
    pub(crate) fn get(&self, encoding: i32) -> Option<&DecoderEntry> {
        self.decoders.get(&encoding)
    }
}

/// A concrete decoder entry wrapper for dynamic dispatch over non-object-safe Decoder.
pub(crate) enum DecoderEntry {
    Raw(enc::RawDecoder),
    CopyRect(enc::CopyRectDecoder),
    RRE(enc::RREDecoder),
    Hextile(enc::HextileDecoder),
    Tight(enc::TightDecoder),
    /// Shared Tight decoder (Arc-wrapped to preserve zlib stream state across FBU)
    TightShared(Arc<enc::TightDecoder>),
    /// TightPNG, sharing its companion Tight decoder's zlib/JPEG-table state.
    TightPng(enc::TightPngDecoder),
    ZRLE(enc::ZRLEDecoder),
    /// Shared ZRLE decoder (Arc-wrapped to preserve zlib stream state across FBU)
    ZRLEShared(Arc<enc::ZRLEDecoder>),
}

impl DecoderEntry {
    fn encoding_type(&self) -> i32 {
        match self {
            Self::Raw(d) => d.encoding_type(),
            Self::CopyRect(d) => d.encoding_type(),
            Self::RRE(d) => d.encoding_type(),
            Self::Hextile(d) => d.encoding_type(),
            Self::Tight(d) => d.encoding_type(),
            Self::TightShared(d) => d.encoding_type(),
            Self::TightPng(d) => d.encoding_type(),
            Self::ZRLE(d) => d.encoding_type(),
            Self::ZRLEShared(d) => d.encoding_type(),
        }
    }

    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        pixel_format: &ServerPixelFormat,
        buffer: &mut dyn MutablePixelBuffer,
    ) -> AnyResult<()> {
        match self {
            Self::Raw(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::CopyRect(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::RRE(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::Hextile(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::Tight(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::TightShared(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::TightPng(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::ZRLE(d) => d.decode(stream, rect, pixel_format, buffer).await,
            Self::ZRLEShared(d) => d.decode(stream, rect, pixel_format, buffer).await,
        }
    }
}

/// Framebuffer state and decoder dispatcher.
pub struct Framebuffer {
    /// Local framebuffer buffer in a fixed output pixel format (RGB888).
    buffer: ManagedPixelBuffer,
    /// Server-advertised pixel format (input format for decoders).
    server_pixel_format: ServerPixelFormat,
    /// Decoder registry.
    registry: DecoderRegistry,
    /// Out-of-band events (cursor shape, desktop name/size changes) produced
    /// while applying rectangles, drained by the caller after each update.
    pending_events: Vec<FbEvent>,
}

/// Side effects of applying pseudo-encoding rectangles that the event loop
/// needs to surface to the application as [`crate::messages::ServerEvent`]s.
#[derive(Debug, Clone)]
pub enum FbEvent {
    /// The server resized the desktop (DesktopSize or ExtendedDesktopSize).
    DesktopResized { width: u16, height: u16 },
    /// The server pushed a new pointer/cursor image.
    CursorUpdated(enc::CursorShape),
    /// The server's desktop name changed.
    DesktopName(String),
    /// The server acknowledged the QEMU extended key event pseudo-encoding.
    QemuExtendedKeyEventAck,
    /// The server accepted an ExtendedDesktopSize rectangle (implies
    /// SetDesktopSize support, since the pseudo-encoding is the vehicle for
    /// both the initial resolution list and resize acknowledgements).
    ExtendedDesktopSizeSeen,
}

impl Framebuffer {
    /// Create a new framebuffer with given server pixel format and dimensions.
    ///
    /// The internal buffer uses local RGB888 format for simplicity and broad compatibility.
    pub fn new(width: u16, height: u16, server_pixel_format: ServerPixelFormat) -> Self {
        let local_format = LocalPixelFormat::rgb888();
        let buffer = ManagedPixelBuffer::new(width as u32, height as u32, local_format);
        Self {
            buffer,
            server_pixel_format,
            registry: DecoderRegistry::with_standard(),
            pending_events: Vec::new(),
        }
    }

    /// Returns the current dimensions.
    pub fn size(&self) -> (u16, u16) {
        let (w, h) = self.buffer.dimensions();
        (w as u16, h as u16)
    }

    /// Returns a reference to the underlying buffer.
    pub fn buffer(&self) -> &ManagedPixelBuffer {
        &self.buffer
    }

    /// Returns a mutable reference to the underlying buffer.
    pub fn buffer_mut(&mut self) -> &mut ManagedPixelBuffer {
        &mut self.buffer
    }

    /// Drain events accumulated while applying rectangles (cursor shape,
    /// desktop name/size changes) since the last call.
    pub fn take_pending_events(&mut self) -> Vec<FbEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Apply a single rectangle update from the server.
    pub async fn apply_rectangle<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
    ) -> Result<(), RfbClientError> {
        use rfb_protocol::messages::types::{
            PSEUDO_ENCODING_CURSOR, PSEUDO_ENCODING_DESKTOP_NAME,
            PSEUDO_ENCODING_EXTENDED_DESKTOP_SIZE, PSEUDO_ENCODING_QEMU_EXTENDED_KEY_EVENT,
            PSEUDO_ENCODING_VMWARE_CURSOR, PSEUDO_ENCODING_X_CURSOR,
        };

        match rect.encoding {
            enc::ENCODING_LAST_RECT => {
                // Marker only
                return Ok(());
            }
            enc::ENCODING_DESKTOP_SIZE => {
                // Resize framebuffer
                self.buffer.resize(rect.width as u32, rect.height as u32);
                self.pending_events.push(FbEvent::DesktopResized {
                    width: rect.width,
                    height: rect.height,
                });
                return Ok(());
            }
            PSEUDO_ENCODING_EXTENDED_DESKTOP_SIZE => {
                // Payload: u8 number-of-screens, 3 bytes padding, then per
                // screen: u32 id, u16 x, u16 y, u16 width, u16 height, u32 flags.
                // rect.x carries the reason code, rect.y the status code;
                // rect.width/rect.height carry the new overall framebuffer size.
                let num_screens = stream.read_u8().await.map_err(|e| {
                    RfbClientError::Protocol(format!(
                        "failed to read ExtendedDesktopSize screen count: {e}"
                    ))
                })?;
                stream.skip(3).await.map_err(|e| {
                    RfbClientError::Protocol(format!(
                        "failed to read ExtendedDesktopSize padding: {e}"
                    ))
                })?;
                stream.skip(num_screens as usize * 16).await.map_err(|e| {
                    RfbClientError::Protocol(format!(
                        "failed to read ExtendedDesktopSize screen list: {e}"
                    ))
                })?;
                self.buffer.resize(rect.width as u32, rect.height as u32);
                self.pending_events.push(FbEvent::DesktopResized {
                    width: rect.width,
                    height: rect.height,
                });
                self.pending_events.push(FbEvent::ExtendedDesktopSizeSeen);
                return Ok(());
            }
            PSEUDO_ENCODING_DESKTOP_NAME => {
                let len = stream.read_u32().await.map_err(|e| {
                    RfbClientError::Protocol(format!("failed to read DesktopName length: {e}"))
                })?;
                let mut buf = vec![0u8; len as usize];
                stream.read_bytes(&mut buf).await.map_err(|e| {
                    RfbClientError::Protocol(format!("failed to read DesktopName bytes: {e}"))
                })?;
                let name = String::from_utf8_lossy(&buf).into_owned();
                self.pending_events.push(FbEvent::DesktopName(name));
                return Ok(());
            }
            PSEUDO_ENCODING_CURSOR => {
                let shape = enc::decode_rich_cursor(stream, rect, &self.server_pixel_format)
                    .await
                    .map_err(RfbClientError::Encoding)?;
                self.pending_events.push(FbEvent::CursorUpdated(shape));
                return Ok(());
            }
            PSEUDO_ENCODING_X_CURSOR => {
                let shape = enc::decode_x_cursor(stream, rect)
                    .await
                    .map_err(RfbClientError::Encoding)?;
                self.pending_events.push(FbEvent::CursorUpdated(shape));
                return Ok(());
            }
            PSEUDO_ENCODING_VMWARE_CURSOR => {
                let shape = enc::decode_vmware_cursor(stream, rect)
                    .await
                    .map_err(RfbClientError::Encoding)?;
                self.pending_events.push(FbEvent::CursorUpdated(shape));
                return Ok(());
            }
            PSEUDO_ENCODING_QEMU_EXTENDED_KEY_EVENT => {
                // Acknowledgement only: the rect carries no payload.
                self.pending_events.push(FbEvent::QemuExtendedKeyEventAck);
                return Ok(());
            }
            other => {
                let decoder = self
                    .registry
                    .get(other)
                    .ok_or_else(|| RfbClientError::UnsupportedEncoding(other))?;

                // Log selected decoder variant and rectangle details for debugging
                let decoder_name = match decoder {
                    DecoderEntry::Raw(_) => "Raw",
                    DecoderEntry::CopyRect(_) => "CopyRect",
                    DecoderEntry::RRE(_) => "RRE",
                    DecoderEntry::Hextile(_) => "Hextile",
                    DecoderEntry::Tight(_) => "Tight",
                    DecoderEntry::TightShared(_) => "Tight",
                    DecoderEntry::TightPng(_) => "TightPNG",
                    DecoderEntry::ZRLE(_) => "ZRLE",
                    DecoderEntry::ZRLEShared(_) => "ZRLE",
                };
                tracing::debug!(
                    "Decoder selected: {} (encoding={}) for rect x={}, y={}, w={}, h={}",
                    decoder_name,
                    other,
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height
                );

                let pf = &self.server_pixel_format;
                let buffer: &mut dyn MutablePixelBuffer = &mut self.buffer;

                decoder
                    .decode(stream, rect, pf, buffer)
                    .await
                    .map_err(RfbClientError::Encoding)
            }
        }
    }

    /// Apply an update by streaming from the input (reads header + decodes rectangles).
    pub async fn apply_update_stream<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut RfbInStream<R>,
    ) -> Result<Vec<Rect>, RfbClientError> {
        // FramebufferUpdate header: 1 byte padding + 2 bytes rect count
        stream.skip(1).await.map_err(|e| {
            RfbClientError::Protocol(format!("failed to read FramebufferUpdate padding: {}", e))
        })?;
        let num_raw = stream.read_u16().await.map_err(|e| {
            RfbClientError::Protocol(format!(
                "failed to read FramebufferUpdate rect count: {}",
                e
            ))
        })?;

        // Framing instrumentation: log FBU start with declared rect count
        tracing::debug!(
            target: "rfb_client::framing",
            "FBU start: declared_rects={}, available_buffer_bytes={}",
            num_raw,
            stream.available()
        );

        let mut damage: Vec<Rect> = Vec::new();
        let mut rects_decoded = 0;

        if num_raw == 0xFFFF {
            // Unknown number of rectangles; terminated by LastRect pseudo-encoding
            loop {
                let buffer_before = stream.available();
                let rect = Rectangle::read_from(stream).await.map_err(|e| {
                    RfbClientError::Protocol(format!("failed to read Rectangle header: {}", e))
                })?;
                tracing::info!(
                    "FramebufferUpdate rect: x={}, y={}, w={}, h={}, encoding={}",
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height,
                    rect.encoding
                );
                if rect.encoding == enc::ENCODING_LAST_RECT {
                    tracing::debug!(
                        target: "rfb_client::framing",
                        "FBU rect {}: LastRect marker (end of update)",
                        rects_decoded
                    );
                    // End of this update
                    break;
                }

                tracing::debug!(
                    target: "rfb_client::framing",
                    "FBU rect {}: enc={} rect=[{},{} {}x{}] buffer_before={}",
                    rects_decoded,
                    rect.encoding,
                    rect.x, rect.y, rect.width, rect.height,
                    buffer_before
                );

                self.apply_rectangle(stream, &rect).await?;

                let buffer_after = stream.available();
                tracing::debug!(
                    target: "rfb_client::framing",
                    "FBU rect {}: decoded, buffer_after={}",
                    rects_decoded,
                    buffer_after
                );

                rects_decoded += 1;

                if rect.encoding >= 0 {
                    damage.push(Rect::new(
                        rect.x as i32,
                        rect.y as i32,
                        rect.width as u32,
                        rect.height as u32,
                    ));
                }
            }
        } else {
            let num = num_raw as usize;
            damage.reserve(num);
            for i in 0..num {
                let buffer_before = stream.available();
                let rect = Rectangle::read_from(stream).await.map_err(|e| {
                    RfbClientError::Protocol(format!("failed to read Rectangle header: {}", e))
                })?;
                tracing::info!(
                    "FramebufferUpdate rect: x={}, y={}, w={}, h={}, encoding={}",
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height,
                    rect.encoding
                );

                tracing::debug!(
                    target: "rfb_client::framing",
                    "FBU rect {}/{}: enc={} rect=[{},{} {}x{}] buffer_before={}",
                    i,
                    num,
                    rect.encoding,
                    rect.x, rect.y, rect.width, rect.height,
                    buffer_before
                );

                self.apply_rectangle(stream, &rect).await?;

                let buffer_after = stream.available();
                tracing::debug!(
                    target: "rfb_client::framing",
                    "FBU rect {}/{}: decoded, buffer_after={}",
                    i,
                    num,
                    buffer_after
                );

                rects_decoded += 1;

                if rect.encoding >= 0 {
                    damage.push(Rect::new(
                        rect.x as i32,
                        rect.y as i32,
                        rect.width as u32,
                        rect.height as u32,
                    ));
                }
            }
        }

        // Framing instrumentation: verify rect count matches
        if num_raw != 0xFFFF && rects_decoded != num_raw as usize {
            tracing::warn!(
                target: "rfb_client::framing",
                "FBU end: MISMATCH! declared_rects={} decoded_rects={}",
                num_raw,
                rects_decoded
            );
        } else {
            tracing::debug!(
                target: "rfb_client::framing",
                "FBU end: rects_decoded={} (matches declared count)",
                rects_decoded
            );
        }

        Ok(damage)
    }

    /// Apply multiple rectangles, returning the list of damaged regions for repaint.
    pub async fn apply_update<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut RfbInStream<R>,
        rects: &[Rectangle],
    ) -> Result<Vec<Rect>, RfbClientError> {
        let mut damage = Vec::with_capacity(rects.len());
        for rect in rects {
            tracing::info!(
                "FramebufferUpdate rect: x={}, y={}, w={}, h={}, encoding={}",
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                rect.encoding
            );
            self.apply_rectangle(stream, rect).await?;
            if rect.encoding >= 0 {
                damage.push(Rect::new(
                    rect.x as i32,
                    rect.y as i32,
                    rect.width as u32,
                    rect.height as u32,
                ));
            }
        }
        Ok(damage)
    }

}

#[cfg(test)]
mod pseudo_encoding_tests {
    use super::*;
    use rfb_protocol::messages::types::{
        PSEUDO_ENCODING_CURSOR, PSEUDO_ENCODING_DESKTOP_NAME, PSEUDO_ENCODING_EXTENDED_DESKTOP_SIZE,
        PSEUDO_ENCODING_QEMU_EXTENDED_KEY_EVENT,
    };
    use std::io::Cursor as IoCursor;

    fn pf24() -> ServerPixelFormat {
        ServerPixelFormat {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: 0,
            true_color: 1,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    #[tokio::test]
    async fn desktop_name_rect_updates_pending_events_and_consumes_exactly() {
        let mut fb = Framebuffer::new(4, 4, pf24());
        let mut payload = vec![0, 0, 0, 5];
        payload.extend_from_slice(b"hello");
        payload.push(0xAA); // sentinel byte that must remain unread
        let mut stream = RfbInStream::new(IoCursor::new(payload));
        let rect = Rectangle {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            encoding: PSEUDO_ENCODING_DESKTOP_NAME,
        };
        fb.apply_rectangle(&mut stream, &rect).await.unwrap();
        let events = fb.take_pending_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], FbEvent::DesktopName(name) if name == "hello"));
        assert_eq!(stream.read_u8().await.unwrap(), 0xAA);
    }

    #[tokio::test]
    async fn qemu_extended_key_event_rect_is_a_no_payload_ack() {
        let mut fb = Framebuffer::new(4, 4, pf24());
        let mut stream = RfbInStream::new(IoCursor::new(vec![0xAA]));
        let rect = Rectangle {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            encoding: PSEUDO_ENCODING_QEMU_EXTENDED_KEY_EVENT,
        };
        fb.apply_rectangle(&mut stream, &rect).await.unwrap();
        let events = fb.take_pending_events();
        assert!(matches!(events[0], FbEvent::QemuExtendedKeyEventAck));
        assert_eq!(stream.read_u8().await.unwrap(), 0xAA);
    }

    #[tokio::test]
    async fn extended_desktop_size_rect_resizes_and_skips_screen_list() {
        let mut fb = Framebuffer::new(4, 4, pf24());
        // One screen entry: 16 bytes, then sentinel.
        let mut payload = vec![1u8, 0, 0, 0];
        payload.extend_from_slice(&[0u8; 16]);
        payload.push(0xAA);
        let mut stream = RfbInStream::new(IoCursor::new(payload));
        let rect = Rectangle {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
            encoding: PSEUDO_ENCODING_EXTENDED_DESKTOP_SIZE,
        };
        fb.apply_rectangle(&mut stream, &rect).await.unwrap();
        assert_eq!(fb.size(), (800, 600));
        let events = fb.take_pending_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, FbEvent::DesktopResized { width: 800, height: 600 })));
        assert!(events
            .iter()
            .any(|e| matches!(e, FbEvent::ExtendedDesktopSizeSeen)));
        assert_eq!(stream.read_u8().await.unwrap(), 0xAA);
    }

    #[tokio::test]
    async fn cursor_rect_dispatches_to_cursor_updated_event() {
        let mut fb = Framebuffer::new(4, 4, pf24());
        // 1x1 cursor: one BGRX pixel + one mask byte (opaque), then sentinel.
        let mut payload = vec![0u8, 0, 255, 0]; // red pixel
        payload.push(0b1000_0000); // mask row (1 bit used)
        payload.push(0xAA);
        let mut stream = RfbInStream::new(IoCursor::new(payload));
        let rect = Rectangle {
            x: 3,
            y: 5,
            width: 1,
            height: 1,
            encoding: PSEUDO_ENCODING_CURSOR,
        };
        fb.apply_rectangle(&mut stream, &rect).await.unwrap();
        let events = fb.take_pending_events();
        match &events[0] {
            FbEvent::CursorUpdated(shape) => {
                assert_eq!((shape.hotspot_x, shape.hotspot_y), (3, 5));
                assert_eq!(shape.rgba, vec![255, 0, 0, 255]);
            }
            other => panic!("expected CursorUpdated, got {other:?}"),
        }
        assert_eq!(stream.read_u8().await.unwrap(), 0xAA);
    }
}
