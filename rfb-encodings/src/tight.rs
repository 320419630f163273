//! Tight encoding decoder - JPEG or zlib compression with filtering.
//!
//! Tight (type 7) is the most commonly used VNC encoding in production. It achieves excellent
//! compression ratios through a combination of JPEG for photo-like regions, zlib for other
//! content, palette modes for indexed color, and gradient prediction filtering for better
//! compression of continuous-tone images.
//!
//! # Wire Format
//!
//! ```text
//! +------------------+
//! | compression_ctl  |  1 byte (4 reset bits + 4 compression type bits)
//! +------------------+
//! | [encoding data]  |  Varies by compression type (see below)
//! +------------------+
//! ```
//!
//! # Compression Control Byte
//!
//! Lower 4 bits (0-3): **Zlib stream reset flags** (one bit per stream 0-3).
//! - If bit N is set: reset zlib stream N before decoding this rectangle.
//!
//! Upper 4 bits (4-7): **Compression type**.
//! - `0x08` (FILL): Solid color fill (most efficient for uniform regions)
//! - `0x09` (JPEG): JPEG-compressed image data
//! - `0x00-0x03`: Basic compression using zlib stream 0-3
//!
//! # Compression Types
//!
//! ## Fill Mode (0x08)
//!
//! Single solid color fills the entire rectangle:
//! - If truecolor depth ≥ 24: 3 bytes RGB
//! - Otherwise: `bits_per_pixel / 8` bytes in native format
//!
//! ## JPEG Mode (0x09)
//!
//! JPEG-compressed image:
//! 1. Compact length (1-3 bytes)
//! 2. JPEG data (length bytes)
//! 3. Decode JPEG to RGB8, then convert to pixel format
//!
//! ## Basic Mode (0x00-0x03)
//!
//! Optionally filtered data, optionally zlib-compressed:
//!
//! 1. **If explicit filter flag (0x04) is set in comp_ctl:**
//!    - Read 1 byte filter_id:
//!      - `0x00` (COPY): RGB888 data (3 bytes/pixel)
//!      - `0x01` (PALETTE): Indexed color (2-256 palette entries)
//!      - `0x02` (GRADIENT): Gradient-predicted RGB888
//!
//! 2. **Data reading:**
//!    - If data_size < 12: read uncompressed
//!    - Otherwise: read compact length, then compressed data, decompress with zlib
//!
//! 3. **Filtering:**
//!    - COPY: convert RGB888 or native pixels to buffer format
//!    - PALETTE: expand palette indices to full pixels
//!    - GRADIENT: reconstruct RGB888 using gradient prediction, then convert
//!
//! # Compact Length Encoding
//!
//! Variable-length integer (1-3 bytes):
//! - If byte0 < 0x80: length = byte0
//! - Else: length = (byte0 & 0x7F) | (byte1 << 7)
//!   - If byte1 < 0x80: done
//!   - Else: length |= (byte2 << 14)
//!
//! # Zlib Streams
//!
//! Tight maintains 4 independent zlib decompression streams (stream IDs 0-3).
//! Lower 2 bits of comp_ctl (in basic mode) select which stream to use.
//! Streams preserve history across rectangles until explicitly reset.
//!
//! # Example
//!
//! ```no_run
//! use rfb_encodings::{Decoder, TightDecoder, ENCODING_TIGHT};
//!
//! let decoder = TightDecoder::default();
//! assert_eq!(decoder.encoding_type(), ENCODING_TIGHT);
//! ```

use crate::jpeg::JpegTableCache;
use crate::{Decoder, MutablePixelBuffer, PixelFormat, Rectangle, RfbInStream, ENCODING_TIGHT};
use anyhow::{anyhow, bail, Context, Result};
use flate2::Decompress;
use rfb_common::Rect;
use rfb_protocol::messages::types::PSEUDO_ENCODING_TIGHT_PNG;
use std::io::Cursor;
use std::sync::Mutex;
use tokio::io::AsyncRead;

// Tight compression control flags (upper nibble of comp_ctl)
#[allow(dead_code)]
const TIGHT_EXPLICIT_FILTER: u8 = 0x04;
const TIGHT_FILL: u8 = 0x08;
const TIGHT_JPEG: u8 = 0x09;
const TIGHT_PNG: u8 = 0x0A;
const TIGHT_MAX_SUBENCODING_TIGHT: u8 = 0x09;

// Tight filter types (for basic compression with explicit filter)
const TIGHT_FILTER_COPY: u8 = 0x00;
const TIGHT_FILTER_PALETTE: u8 = 0x01;
const TIGHT_FILTER_GRADIENT: u8 = 0x02;

// Tight encoding limits
const TIGHT_MAX_WIDTH: u16 = 2048;
const TIGHT_MIN_TO_COMPRESS: usize = 12;

/// Decoder for Tight encoding.
///
/// This is the most sophisticated and widely-used VNC encoding. It combines JPEG compression
/// for photo-like regions, zlib for other content, palette modes for indexed colors, and
/// gradient prediction for continuous-tone images. Tight achieves excellent compression
/// ratios while maintaining reasonable decoding speed.
///
/// # Zlib Streams
///
/// Maintains 4 independent zlib decompression streams (IDs 0-3) that preserve history
/// across rectangles. The compression control byte indicates which stream to use and
/// when to reset streams.
///
/// # Example
///
/// ```no_run
/// # use rfb_encodings::{Decoder, TightDecoder, ENCODING_TIGHT};
/// let decoder = TightDecoder::default();
/// assert_eq!(decoder.encoding_type(), ENCODING_TIGHT);
/// ```
pub struct TightDecoder {
    core: std::sync::Arc<TightCore>,
}

impl Default for TightDecoder {
    fn default() -> Self {
        Self {
            core: std::sync::Arc::new(TightCore::default()),
        }
    }
}

impl TightDecoder {
    /// Create a TightPNG decoder that shares this decoder's four zlib
    /// streams and JPEG table cache.
    ///
    /// A connection negotiating TightPNG still uses plain Tight encoding
    /// numbers for Fill and Jpeg rectangles; both decoders must observe the
    /// same stream-reset control bits and table cache to stay in sync.
    pub fn shared_png_decoder(&self) -> TightPngDecoder {
        TightPngDecoder {
            core: self.core.clone(),
        }
    }
}

/// TightPNG (pseudo-encoding -260): identical wire format to Tight except
/// Basic (zlib) compression is illegal and the PNG control code is legal.
pub struct TightPngDecoder {
    core: std::sync::Arc<TightCore>,
}

impl Default for TightPngDecoder {
    fn default() -> Self {
        Self {
            core: std::sync::Arc::new(TightCore::default()),
        }
    }
}

/// Shared mutable state for Tight/TightPNG decoding: four zlib streams and
/// the JPEG Huffman/Quantization table cache.
struct TightCore {
    /// Four independent zlib decompression streams (None = not yet initialized).
    /// Streams preserve dictionary across rectangles until explicitly reset.
    /// Uses Mutex for thread-safe interior mutability since decode() takes &self.
    zlib_streams: Mutex<[Option<Decompress>; 4]>,
    /// Cache of the last seen JPEG Huffman/Quantization tables (shared across
    /// Tight's Jpeg sub-mode rectangles on this connection).
    jpeg_tables: Mutex<JpegTableCache>,
}

impl Default for TightCore {
    fn default() -> Self {
        Self {
            zlib_streams: Mutex::new([None, None, None, None]),
            jpeg_tables: Mutex::new(JpegTableCache::default()),
        }
    }
}

impl TightCore {
    /// Read a Tight compact length value (1-3 bytes).
    ///
    /// Returns the decoded length as a usize.
    async fn read_compact_length<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> Result<usize> {
        let b0 = stream
            .read_u8()
            .await
            .context("Failed to read compact length byte 0")?;

        if (b0 & 0x80) == 0 {
            return Ok(b0 as usize);
        }

        let b1 = stream
            .read_u8()
            .await
            .context("Failed to read compact length byte 1")?;
        let mut length = ((b0 & 0x7F) as usize) | ((b1 as usize) << 7);

        if (b1 & 0x80) == 0 {
            return Ok(length);
        }

        let b2 = stream
            .read_u8()
            .await
            .context("Failed to read compact length byte 2")?;
        length |= (b2 as usize) << 14;

        Ok(length)
    }

    /// Decompress zlib-compressed data using the specified stream.
    ///
    /// # Arguments
    /// * `stream_id` - Zlib stream ID (0-3)
    /// * `compressed_data` - The compressed bytes
    /// * `expected_size` - Expected decompressed size
    ///
    /// # Returns
    /// Decompressed data as Vec<u8>
    fn decompress_zlib(
        &self,
        stream_id: usize,
        compressed_data: &[u8],
        expected_size: usize,
    ) -> Result<Vec<u8>> {
        let mut streams = self.zlib_streams.lock().unwrap();

        // Initialize stream on first use
        if streams[stream_id].is_none() {
            streams[stream_id] = Some(Decompress::new(true));
        }

        let decompressor = streams[stream_id]
            .as_mut()
            .expect("Zlib stream should be initialized");

        let mut output = vec![0u8; expected_size];
        let before_out = decompressor.total_out();

        decompressor
            .decompress(compressed_data, &mut output, flate2::FlushDecompress::Sync)
            .with_context(|| {
                format!(
                    "Tight: zlib decompression failed for stream {} (in={}, expected_out={})",
                    stream_id,
                    compressed_data.len(),
                    expected_size
                )
            })?;

        let output_size = (decompressor.total_out() - before_out) as usize;
        if output_size != expected_size {
            bail!(
                "Tight: zlib stream {} produced {} bytes but expected {}",
                stream_id,
                output_size,
                expected_size
            );
        }

        output.truncate(output_size);
        Ok(output)
    }

    /// Apply COPY filter: convert RGB888 or native pixels to buffer format.
    fn filter_copy(
        &self,
        data: &[u8],
        rect: &Rectangle,
        pixel_format: &PixelFormat,
        buffer: &mut dyn MutablePixelBuffer,
        rgb888_mode: bool,
    ) -> Result<()> {
        let width = rect.width as usize;
        let height = rect.height as usize;
        let dest_rect = Rect::new(rect.x as i32, rect.y as i32, width as u32, height as u32);

        if rgb888_mode {
            // Data is RGB888 (3 bytes/pixel) - need to convert to buffer's format
            // For now, use image_rect which handles conversion
            // Create temporary buffer in BGRA format for image_rect
            let bytes_per_pixel = (pixel_format.bits_per_pixel / 8) as usize;
            let expected_size = width * height * 3;
            if data.len() < expected_size {
                bail!(
                    "Tight COPY RGB888: insufficient data ({} < {})",
                    data.len(),
                    expected_size
                );
            }

            // Convert RGB888 to target pixel format
            let mut converted = vec![0u8; width * height * bytes_per_pixel];
            for y in 0..height {
                for x in 0..width {
                    let src_idx = (y * width + x) * 3;
                    let dst_idx = (y * width + x) * bytes_per_pixel;
                    let r = data[src_idx];
                    let g = data[src_idx + 1];
                    let b = data[src_idx + 2];

                    // Pack into pixel format
                    self.pack_rgb_to_pixel(
                        r,
                        g,
                        b,
                        pixel_format,
                        &mut converted[dst_idx..dst_idx + bytes_per_pixel],
                    )?;
                }
            }

            buffer.image_rect(dest_rect, &converted, width)?;
        } else {
            // Data is in native pixel format - direct copy
            buffer.image_rect(dest_rect, data, width)?;
        }

        Ok(())
    }

    /// Apply PALETTE filter: expand palette indices to pixels.
    async fn filter_palette<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        pixel_format: &PixelFormat,
        buffer: &mut dyn MutablePixelBuffer,
        data: &[u8],
    ) -> Result<()> {
        // Read palette size (1 byte: count - 1)
        let pal_size_minus_one = stream
            .read_u8()
            .await
            .context("Failed to read Tight palette size")?;
        let palette_size = (pal_size_minus_one as usize) + 1;

        if !(2..=256).contains(&palette_size) {
            bail!(
                "Tight PALETTE: invalid palette size {} (must be 2-256)",
                palette_size
            );
        }

        // Read palette colors as RGB888 (3 bytes each)
        let mut palette_rgb = vec![0u8; palette_size * 3];
        stream
            .read_bytes(&mut palette_rgb)
            .await
            .context("Failed to read Tight palette RGB data")?;

        // Convert palette to pixel format
        let bytes_per_pixel = (pixel_format.bits_per_pixel / 8) as usize;
        let mut palette_pixels = vec![0u8; palette_size * bytes_per_pixel];
        for i in 0..palette_size {
            let r = palette_rgb[i * 3];
            let g = palette_rgb[i * 3 + 1];
            let b = palette_rgb[i * 3 + 2];
            self.pack_rgb_to_pixel(
                r,
                g,
                b,
                pixel_format,
                &mut palette_pixels[i * bytes_per_pixel..(i + 1) * bytes_per_pixel],
            )?;
        }

        let width = rect.width as usize;
        let height = rect.height as usize;

        // Decode indices and expand to pixels
        let mut pixels = vec![0u8; width * height * bytes_per_pixel];

        if palette_size == 2 {
            // 1-bit indices (packed 8 per byte, MSB first)
            let mut data_idx = 0;
            for y in 0..height {
                let mut x = 0;
                while x < width {
                    if data_idx >= data.len() {
                        bail!("Tight PALETTE 2-color: unexpected end of index data");
                    }
                    let bits = data[data_idx];
                    data_idx += 1;

                    for bit in (0..8).rev() {
                        if x >= width {
                            break;
                        }
                        let pal_idx = ((bits >> bit) & 1) as usize;
                        let pixel_start = (y * width + x) * bytes_per_pixel;
                        pixels[pixel_start..pixel_start + bytes_per_pixel].copy_from_slice(
                            &palette_pixels
                                [pal_idx * bytes_per_pixel..(pal_idx + 1) * bytes_per_pixel],
                        );
                        x += 1;
                    }
                }
            }
        } else {
            // 8-bit indices (1 byte per pixel)
            for y in 0..height {
                for x in 0..width {
                    let data_idx = y * width + x;
                    if data_idx >= data.len() {
                        bail!("Tight PALETTE: unexpected end of index data");
                    }
                    let pal_idx = data[data_idx] as usize;
                    if pal_idx >= palette_size {
                        bail!(
                            "Tight PALETTE: index {} out of range (palette size {})",
                            pal_idx,
                            palette_size
                        );
                    }
                    let pixel_start = (y * width + x) * bytes_per_pixel;
                    pixels[pixel_start..pixel_start + bytes_per_pixel].copy_from_slice(
                        &palette_pixels[pal_idx * bytes_per_pixel..(pal_idx + 1) * bytes_per_pixel],
                    );
                }
            }
        }

        // Write to buffer
        let dest_rect = Rect::new(rect.x as i32, rect.y as i32, width as u32, height as u32);
        buffer.image_rect(dest_rect, &pixels, width)?;

        Ok(())
    }

    /// GradientFilter is not implemented; reject it unconditionally.
    fn reject_gradient_filter() -> Result<()> {
        bail!("Tight: GradientFilter is unimplemented")
    }

    /// Pack RGB888 values into the target pixel format.
    fn pack_rgb_to_pixel(
        &self,
        r: u8,
        g: u8,
        b: u8,
        pf: &PixelFormat,
        out: &mut [u8],
    ) -> Result<()> {
        let bytes_per_pixel = (pf.bits_per_pixel / 8) as usize;
        if out.len() < bytes_per_pixel {
            bail!("Output buffer too small for pixel");
        }

        // Scale RGB values to fit format bit depths
        let r_val = (r as u32) * (pf.red_max as u32) / 255;
        let g_val = (g as u32) * (pf.green_max as u32) / 255;
        let b_val = (b as u32) * (pf.blue_max as u32) / 255;

        // Pack into pixel value
        let pixel = (r_val << pf.red_shift) | (g_val << pf.green_shift) | (b_val << pf.blue_shift);

        // Write to output in correct endianness
        match bytes_per_pixel {
            1 => out[0] = pixel as u8,
            2 => {
                if pf.big_endian != 0 {
                    out[0..2].copy_from_slice(&(pixel as u16).to_be_bytes());
                } else {
                    out[0..2].copy_from_slice(&(pixel as u16).to_le_bytes());
                }
            }
            4 => {
                if pf.big_endian != 0 {
                    out[0..4].copy_from_slice(&pixel.to_be_bytes());
                } else {
                    out[0..4].copy_from_slice(&pixel.to_le_bytes());
                }
            }
            _ => bail!("Unsupported bytes_per_pixel: {}", bytes_per_pixel),
        }

        Ok(())
    }
}

impl Decoder for TightDecoder {
    fn encoding_type(&self) -> i32 {
        ENCODING_TIGHT
    }

    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        pixel_format: &PixelFormat,
        buffer: &mut dyn MutablePixelBuffer,
    ) -> Result<()> {
        self.core
            .decode_rect(stream, rect, pixel_format, buffer, false)
            .await
    }
}

impl Decoder for TightPngDecoder {
    fn encoding_type(&self) -> i32 {
        PSEUDO_ENCODING_TIGHT_PNG
    }

    async fn decode<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        pixel_format: &PixelFormat,
        buffer: &mut dyn MutablePixelBuffer,
    ) -> Result<()> {
        self.core
            .decode_rect(stream, rect, pixel_format, buffer, true)
            .await
    }
}

impl TightCore {
    /// Decode one rectangle. `png_mode` selects TightPNG semantics: Basic
    /// (zlib) compression becomes illegal and the Png control code becomes legal.
    async fn decode_rect<R: AsyncRead + Unpin>(
        &self,
        stream: &mut RfbInStream<R>,
        rect: &Rectangle,
        pixel_format: &PixelFormat,
        buffer: &mut dyn MutablePixelBuffer,
        png_mode: bool,
    ) -> Result<()> {
        let buffer_before = stream.available();
        tracing::debug!(
            target: "rfb_encodings::framing",
            "Tight decode start: rect=[{},{} {}x{}] buffer_before={}",
            rect.x, rect.y, rect.width, rect.height,
            buffer_before
        );

        // Empty rectangle - nothing to decode
        if rect.width == 0 || rect.height == 0 {
            tracing::debug!(
                target: "rfb_encodings::framing",
                "Tight decode end: empty rectangle, bytes_consumed=0, buffer_after={}",
                stream.available()
            );
            return Ok(());
        }

        // Check width limit
        if rect.width > TIGHT_MAX_WIDTH {
            bail!(
                "Tight: rectangle too wide ({} > {} max)",
                rect.width,
                TIGHT_MAX_WIDTH
            );
        }

        // Read compression control byte
        let comp_ctl = stream.read_u8().await.with_context(|| {
            format!(
                "Failed to read Tight compression control at ({}, {})",
                rect.x, rect.y
            )
        })?;

        // Handle stream resets (lower 4 bits)
        {
            let mut streams = self.zlib_streams.lock().unwrap();
            for i in 0..4 {
                if (comp_ctl & (1 << i)) != 0 {
                    tracing::debug!(
                        "Tight: reset zlib stream {} requested (comp_ctl={:#04x})",
                        i, comp_ctl
                    );
                    streams[i] = None; // Reset stream
                }
            }
        }

        // Determine compression type (upper 4 bits)
        let comp_type = comp_ctl >> 4;
        
        tracing::debug!(
            "Tight: comp_ctl={:#04x} comp_type={:#x} reset_bits={:#x}",
            comp_ctl, comp_type, comp_ctl & 0x0F
        );

        // Handle FILL mode
        if comp_type == TIGHT_FILL {
            let bytes_per_pixel = (pixel_format.bits_per_pixel / 8) as usize;
            let mut pixel_data = vec![0u8; bytes_per_pixel];

            // For truecolor depth >= 24, read 3 bytes RGB
            if pixel_format.depth >= 24 && pixel_format.true_color != 0 {
                let mut rgb = [0u8; 3];
                stream
                    .read_bytes(&mut rgb)
                    .await
                    .context("Failed to read Tight FILL RGB data")?;
                self.pack_rgb_to_pixel(rgb[0], rgb[1], rgb[2], pixel_format, &mut pixel_data)?;
            } else {
                stream
                    .read_bytes(&mut pixel_data)
                    .await
                    .context("Failed to read Tight FILL pixel data")?;
            }

            // Fill rectangle with solid color
            let fill_rect = Rect::new(
                rect.x as i32,
                rect.y as i32,
                rect.width as u32,
                rect.height as u32,
            );
            buffer
                .fill_rect(fill_rect, &pixel_data)
                .context("Failed to fill Tight FILL rectangle")?;

            let buffer_after = stream.available();
            tracing::debug!(
                target: "rfb_encodings::framing",
                "Tight decode end (FILL): bytes_consumed={}, buffer_after={}",
                buffer_before.saturating_sub(buffer_after),
                buffer_after
            );
            return Ok(());
        }

        // Handle JPEG mode
        if comp_type == TIGHT_JPEG {
            let jpeg_len = Self::read_compact_length(stream).await?;
            let mut jpeg_data = vec![0u8; jpeg_len];
            stream
                .read_bytes(&mut jpeg_data)
                .await
                .with_context(|| format!("Failed to read {} bytes of Tight JPEG data", jpeg_len))?;

            let reconstructed = {
                let mut tables = self.jpeg_tables.lock().unwrap();
                tables
                    .reconstruct(&jpeg_data)
                    .context("Failed to reconstruct Tight JPEG tables")?
            };

            // Decode JPEG
            let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(&reconstructed));
            let pixels = decoder
                .decode()
                .context("Failed to decode Tight JPEG data")?;
            let metadata = decoder
                .info()
                .ok_or_else(|| anyhow!("JPEG decoder missing metadata"))?;

            // Validate dimensions
            if metadata.width != rect.width || metadata.height != rect.height {
                bail!(
                    "Tight JPEG: dimension mismatch (JPEG {}x{} vs rect {}x{})",
                    metadata.width,
                    metadata.height,
                    rect.width,
                    rect.height
                );
            }

            // Convert RGB to pixel format
            let width = rect.width as usize;
            let height = rect.height as usize;
            let bytes_per_pixel = (pixel_format.bits_per_pixel / 8) as usize;
            let mut converted = vec![0u8; width * height * bytes_per_pixel];

            for y in 0..height {
                for x in 0..width {
                    let src_idx = (y * width + x) * 3;
                    let dst_idx = (y * width + x) * bytes_per_pixel;
                    let r = pixels[src_idx];
                    let g = pixels[src_idx + 1];
                    let b = pixels[src_idx + 2];
                    self.pack_rgb_to_pixel(
                        r,
                        g,
                        b,
                        pixel_format,
                        &mut converted[dst_idx..dst_idx + bytes_per_pixel],
                    )?;
                }
            }

            let dest_rect = Rect::new(rect.x as i32, rect.y as i32, width as u32, height as u32);
            buffer.image_rect(dest_rect, &converted, width)?;

            let buffer_after = stream.available();
            tracing::debug!(
                target: "rfb_encodings::framing",
                "Tight decode end (JPEG): bytes_consumed={}, buffer_after={}",
                buffer_before.saturating_sub(buffer_after),
                buffer_after
            );
            return Ok(());
        }

        // Handle PNG mode (TightPNG only)
        if comp_type == TIGHT_PNG {
            if !png_mode {
                bail!("Tight: Png control code is illegal in plain Tight encoding");
            }
            let png_len = Self::read_compact_length(stream).await?;
            let mut png_data = vec![0u8; png_len];
            stream
                .read_bytes(&mut png_data)
                .await
                .with_context(|| format!("Failed to read {} bytes of TightPNG data", png_len))?;

            let image = image::load_from_memory(&png_data)
                .context("Failed to decode TightPNG data")?
                .to_rgb8();

            if image.width() != rect.width as u32 || image.height() != rect.height as u32 {
                bail!(
                    "TightPNG: dimension mismatch (PNG {}x{} vs rect {}x{})",
                    image.width(),
                    image.height(),
                    rect.width,
                    rect.height
                );
            }

            let width = rect.width as usize;
            let height = rect.height as usize;
            let bytes_per_pixel = (pixel_format.bits_per_pixel / 8) as usize;
            let mut converted = vec![0u8; width * height * bytes_per_pixel];

            for (i, px) in image.pixels().enumerate() {
                let dst_idx = i * bytes_per_pixel;
                self.pack_rgb_to_pixel(
                    px[0],
                    px[1],
                    px[2],
                    pixel_format,
                    &mut converted[dst_idx..dst_idx + bytes_per_pixel],
                )?;
            }

            let dest_rect = Rect::new(rect.x as i32, rect.y as i32, width as u32, height as u32);
            buffer.image_rect(dest_rect, &converted, width)?;

            let buffer_after = stream.available();
            tracing::debug!(
                target: "rfb_encodings::framing",
                "Tight decode end (PNG): bytes_consumed={}, buffer_after={}",
                buffer_before.saturating_sub(buffer_after),
                buffer_after
            );
            return Ok(());
        }

        // Validate compression type for BASIC mode
        if png_mode {
            bail!(
                "TightPNG: Basic (zlib) compression is illegal, got compression type {}",
                comp_type
            );
        }
        if comp_type > TIGHT_MAX_SUBENCODING_TIGHT {
            bail!(
                "Tight: invalid compression type {} (max {})",
                comp_type,
                TIGHT_MAX_SUBENCODING_TIGHT
            );
        }

        // Handle BASIC mode (zlib-compressed with optional filter)
        let stream_id = (comp_ctl >> 4) & 0x03;
        // Explicit filter is bit 2 of upper nibble (bit 6 of comp_ctl)
        let explicit_filter = (comp_ctl & 0x40) != 0;

        let width = rect.width as usize;
        let height = rect.height as usize;
        let bytes_per_pixel = (pixel_format.bits_per_pixel / 8) as usize;

        // Determine filter and data size
        // For BASIC mode without explicit filter, data is RGB888 (3 bpp)
        let rgb888_implicit = !explicit_filter;  // Track if RGB888 format is implicit
        let (filter_type, data_size, use_palette) = if explicit_filter {
            let filter_id = stream
                .read_u8()
                .await
                .context("Failed to read Tight filter ID")?;

            match filter_id {
                TIGHT_FILTER_COPY => {
                    // RGB888 format (3 bytes/pixel)
                    (filter_id, width * height * 3, false)
                }
                TIGHT_FILTER_PALETTE => {
                    // Palette mode - size determined after reading palette
                    (filter_id, 0, true)
                }
                TIGHT_FILTER_GRADIENT => {
                    Self::reject_gradient_filter()?;
                    unreachable!()
                }
                _ => bail!("Tight: invalid filter type {}", filter_id),
            }
        } else {
            // No explicit filter - implicit COPY in RGB888 format (3 bytes/pixel)
            // Tight protocol: BASIC mode without filter bit always uses RGB888,
            // regardless of negotiated pixel format
            let data_size = width * height * 3;  // Always RGB888
            tracing::debug!(
                "Tight BASIC (no filter/RGB888): width={} height={} data_size={}",
                width, height, data_size
            );
            (TIGHT_FILTER_COPY, data_size, false)  // Not palette mode
        };

        // Special handling for palette mode
        if use_palette {
            // For palette, we need to read the palette first to determine data size
            // This is handled inside filter_palette
            // For now, read the data based on palette size

            // Peek palette size to calculate data size
            let pal_size_byte = stream
                .read_u8()
                .await
                .context("Failed to read palette size for data calculation")?;
            let palette_size = (pal_size_byte as usize) + 1;

            // Calculate index data size
            let index_data_size = if palette_size == 2 {
                height * width.div_ceil(8) // 1 bit per pixel, packed
            } else {
                width * height // 1 byte per pixel
            };

            // Account for palette RGB data
            let palette_rgb_size = palette_size * 3;
            let total_data_size = index_data_size;

            // Read or decompress data
            let data = if total_data_size < TIGHT_MIN_TO_COMPRESS {
                let mut d = vec![0u8; total_data_size];
                stream
                    .read_bytes(&mut d)
                    .await
                    .context("Failed to read uncompressed Tight palette index data")?;
                d
            } else {
                let compressed_len = Self::read_compact_length(stream).await?;
                let mut compressed = vec![0u8; compressed_len];
                stream
                    .read_bytes(&mut compressed)
                    .await
                    .context("Failed to read compressed Tight palette index data")?;
                self.decompress_zlib(stream_id as usize, &compressed, total_data_size)?
            };

            // Create a temporary stream with palette size byte + RGB data + index data
            let mut temp_data = vec![pal_size_byte];
            // We need to read the palette RGB data too
            let mut palette_rgb = vec![0u8; palette_rgb_size];
            stream
                .read_bytes(&mut palette_rgb)
                .await
                .context("Failed to read palette RGB")?;
            temp_data.extend_from_slice(&palette_rgb);

            let cursor = Cursor::new(temp_data);
            let mut temp_stream = RfbInStream::new(cursor);

            let result = self
                .filter_palette(&mut temp_stream, rect, pixel_format, buffer, &data)
                .await;

            let buffer_after = stream.available();
            tracing::debug!(
                target: "rfb_encodings::framing",
                "Tight decode end (PALETTE): bytes_consumed={}, buffer_after={}",
                buffer_before.saturating_sub(buffer_after),
                buffer_after
            );
            return result;
        }

        // Read or decompress data
        let data = if data_size < TIGHT_MIN_TO_COMPRESS {
            let mut d = vec![0u8; data_size];
            stream.read_bytes(&mut d).await.with_context(|| {
                format!(
                    "Failed to read {} bytes of uncompressed Tight data",
                    data_size
                )
            })?;
            d
        } else {
            let compressed_len = Self::read_compact_length(stream).await?;
            tracing::debug!(
                "Tight: reading {} compressed bytes for {} uncompressed bytes (stream_id={})",
                compressed_len, data_size, stream_id
            );
            let mut compressed = vec![0u8; compressed_len];
            stream.read_bytes(&mut compressed).await.with_context(|| {
                format!(
                    "Failed to read {} bytes of compressed Tight data",
                    compressed_len
                )
            })?;
            tracing::debug!("Tight: decompressing {} bytes", compressed_len);
            self.decompress_zlib(stream_id as usize, &compressed, data_size)?
        };

        // Apply filter
        match filter_type {
            TIGHT_FILTER_COPY => {
                // RGB888 mode if explicit filter OR implicit (no filter byte in BASIC mode)
                let rgb888_mode = explicit_filter || rgb888_implicit;
                self.filter_copy(&data, rect, pixel_format, buffer, rgb888_mode)?;
            }
            _ => bail!("Unexpected filter type {} in non-palette path", filter_type),
        }

        let buffer_after = stream.available();
        tracing::debug!(
            target: "rfb_encodings::framing",
            "Tight decode end (BASIC): filter_type={}, bytes_consumed={}, buffer_after={}",
            filter_type,
            buffer_before.saturating_sub(buffer_after),
            buffer_after
        );

        Ok(())
    }
}
