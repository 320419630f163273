//! Cursor-shape pseudo-encodings: RichCursor, XCursor, and VMware cursor.
//!
//! These are not framebuffer rectangles in the usual sense — the server uses
//! them to push a new pointer image to the client instead of drawing pixels.
//! The wire data still arrives as the payload of a `FramebufferUpdate`
//! rectangle, so decoding them exactly (no over- or under-read) matters just
//! as much as it does for the pixel-carrying encodings in this crate.
//!
//! Wire formats are from the RFB protocol specification (RFC 6143 §7.7.2,
//! §7.7.3); VMware's cursor pseudo-encoding is a vendor extension with only
//! the "alpha cursor" sub-type decoded here, since the monochrome sub-type's
//! exact scanline padding is not pinned down by any source in this workspace.

use crate::{PixelFormat, Rectangle, RfbInStream};
use anyhow::{bail, Result};
use tokio::io::AsyncRead;

/// A decoded cursor image: straight (non-premultiplied) RGBA pixels plus hotspot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorShape {
    pub width: u16,
    pub height: u16,
    pub hotspot_x: u16,
    pub hotspot_y: u16,
    /// `width * height * 4` bytes, RGBA, row-major.
    pub rgba: Vec<u8>,
}

fn bits_per_row(width: u16) -> usize {
    (width as usize + 7) / 8
}

/// Expand a pixel-format-encoded color buffer into RGBA, mirroring the Raw
/// decoder's depth-8/depth-24 handling (`raw.rs`) since cursor pixel data uses
/// the same per-pixel encoding as framebuffer rectangles.
fn expand_pixel(pixel_format: &PixelFormat, raw: &[u8]) -> [u8; 3] {
    if pixel_format.bits_per_pixel == 8 {
        let b = raw[0];
        let scale = |v: u8| (v as u32 * 255 / 3) as u8;
        [scale(b & 0x3), scale((b >> 2) & 0x3), scale((b >> 4) & 0x3)]
    } else {
        // BGRX on the wire, as with Raw at depth 24.
        [raw[2], raw[1], raw[0]]
    }
}

/// Decode the RichCursor pseudo-encoding (-239): pixel data in the negotiated
/// pixel format, followed by a row-major bitmask (MSB-first, 1 = opaque).
pub async fn decode_rich_cursor<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
    rect: &Rectangle,
    pixel_format: &PixelFormat,
) -> Result<CursorShape> {
    let width = rect.width;
    let height = rect.height;
    let bpp = (pixel_format.bits_per_pixel / 8).max(1) as usize;

    let mut rgba = vec![0u8; width as usize * height as usize * 4];

    if width > 0 && height > 0 {
        let mut pixel_buf = vec![0u8; width as usize * height as usize * bpp];
        stream.read_bytes(&mut pixel_buf).await?;

        let mask_row_bytes = bits_per_row(width);
        let mut mask = vec![0u8; mask_row_bytes * height as usize];
        stream.read_bytes(&mut mask).await?;

        for y in 0..height as usize {
            for x in 0..width as usize {
                let px_off = (y * width as usize + x) * bpp;
                let [r, g, b] = expand_pixel(pixel_format, &pixel_buf[px_off..px_off + bpp]);
                let mask_byte = mask[y * mask_row_bytes + x / 8];
                let opaque = (mask_byte >> (7 - (x % 8))) & 1 != 0;
                let out = (y * width as usize + x) * 4;
                rgba[out] = r;
                rgba[out + 1] = g;
                rgba[out + 2] = b;
                rgba[out + 3] = if opaque { 255 } else { 0 };
            }
        }
    }

    Ok(CursorShape {
        width,
        height,
        hotspot_x: rect.x,
        hotspot_y: rect.y,
        rgba,
    })
}

/// Decode the XCursor pseudo-encoding (-240): a 2-color bitmap (foreground /
/// background RGB) plus a separate visibility mask, both row-major MSB-first.
pub async fn decode_x_cursor<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
    rect: &Rectangle,
) -> Result<CursorShape> {
    let width = rect.width;
    let height = rect.height;

    let mut rgba = vec![0u8; width as usize * height as usize * 4];

    if width > 0 && height > 0 {
        let mut primary = [0u8; 3];
        stream.read_bytes(&mut primary).await?;
        let mut secondary = [0u8; 3];
        stream.read_bytes(&mut secondary).await?;

        let row_bytes = bits_per_row(width);
        let mut bitmap = vec![0u8; row_bytes * height as usize];
        stream.read_bytes(&mut bitmap).await?;
        let mut mask = vec![0u8; row_bytes * height as usize];
        stream.read_bytes(&mut mask).await?;

        for y in 0..height as usize {
            for x in 0..width as usize {
                let byte_idx = y * row_bytes + x / 8;
                let bit = 7 - (x % 8);
                let fg = (bitmap[byte_idx] >> bit) & 1 != 0;
                let visible = (mask[byte_idx] >> bit) & 1 != 0;
                let color = if fg { &primary } else { &secondary };
                let out = (y * width as usize + x) * 4;
                rgba[out] = color[0];
                rgba[out + 1] = color[1];
                rgba[out + 2] = color[2];
                rgba[out + 3] = if visible { 255 } else { 0 };
            }
        }
    }

    Ok(CursorShape {
        width,
        height,
        hotspot_x: rect.x,
        hotspot_y: rect.y,
        rgba,
    })
}

/// VMware cursor pseudo-encoding sub-type tag. Only the alpha-cursor sub-type
/// (straight RGBA, one byte order away from Raw at depth 24) is decoded;
/// the monochrome and-xor sub-type is rejected as unsupported rather than
/// guessed at, since a wrong guess here would desync every rectangle after it.
const VMWARE_CURSOR_TYPE_ALPHA: u8 = 0;

/// Decode the VMware cursor pseudo-encoding (`0x574d5664`).
pub async fn decode_vmware_cursor<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
    rect: &Rectangle,
) -> Result<CursorShape> {
    let cursor_type = stream.read_u8().await?;
    stream.skip(1).await?; // padding

    if cursor_type != VMWARE_CURSOR_TYPE_ALPHA {
        bail!(
            "unsupported VMware cursor sub-type {} (only the alpha-cursor sub-type is decoded)",
            cursor_type
        );
    }

    let width = rect.width;
    let height = rect.height;
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    if width > 0 && height > 0 {
        stream.read_bytes(&mut rgba).await?;
    }

    Ok(CursorShape {
        width,
        height,
        hotspot_x: rect.x,
        hotspot_y: rect.y,
        rgba,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;
    use std::io::Cursor;

    fn pf24() -> PixelFormat {
        PixelFormat {
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
    async fn rich_cursor_2x1_fully_opaque() {
        // Two BGRX pixels: red, green. Mask byte 0b1100_0000 -> both opaque.
        let mut data = vec![0u8, 0, 255, 0, /* red */ 0, 255, 0, 0 /* green */];
        data.push(0b1100_0000);
        let mut stream = RfbInStream::new(Cursor::new(data));
        let rect = Rectangle {
            x: 1,
            y: 2,
            width: 2,
            height: 1,
            encoding: -239,
        };
        let shape = decode_rich_cursor(&mut stream, &rect, &pf24()).await.unwrap();
        assert_eq!(shape.hotspot_x, 1);
        assert_eq!(shape.hotspot_y, 2);
        assert_eq!(shape.rgba, vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[tokio::test]
    async fn rich_cursor_zero_size_consumes_nothing() {
        let mut stream = RfbInStream::new(Cursor::new(Vec::<u8>::new()));
        let rect = Rectangle {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            encoding: -239,
        };
        let shape = decode_rich_cursor(&mut stream, &rect, &pf24()).await.unwrap();
        assert!(shape.rgba.is_empty());
    }

    #[tokio::test]
    async fn x_cursor_checkerboard() {
        let mut data = vec![255u8, 0, 0]; // primary (fg) = red
        data.extend_from_slice(&[0, 255, 0]); // secondary (bg) = green
        data.push(0b1000_0000); // bitmap: first pixel fg
        data.push(0b1000_0000); // mask: first pixel visible, second not
        let mut stream = RfbInStream::new(Cursor::new(data));
        let rect = Rectangle {
            x: 0,
            y: 0,
            width: 2,
            height: 1,
            encoding: -240,
        };
        let shape = decode_x_cursor(&mut stream, &rect).await.unwrap();
        assert_eq!(&shape.rgba[0..4], &[255, 0, 0, 255]);
        assert_eq!(&shape.rgba[4..8], &[0, 255, 0, 0]);
    }

    #[tokio::test]
    async fn vmware_cursor_rejects_unknown_subtype() {
        let mut stream = RfbInStream::new(Cursor::new(vec![1u8, 0]));
        let rect = Rectangle {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            encoding: 0x574d5664u32 as i32,
        };
        assert!(decode_vmware_cursor(&mut stream, &rect).await.is_err());
    }
}
