//! Core RFB protocol types.
//!
//! This module defines fundamental types used throughout the RFB protocol:
//! - [`PixelFormat`] - Describes pixel format (bit depths, color channels, endianness)
//! - [`Rectangle`] - Rectangle header with encoding type
//! - Encoding constants for different compression/encoding schemes

use crate::io::{RfbInStream, RfbOutStream};
use tokio::io::{AsyncRead, AsyncWrite};

/// RFB pixel format specification.
///
/// Describes how pixels are encoded in the framebuffer, including:
/// - Bits per pixel and color depth
/// - RGB channel sizes and bit positions
/// - Byte order (big/little endian)
///
/// # Wire Format
///
/// PixelFormat is 16 bytes on the wire:
/// - 1 byte: bits_per_pixel
/// - 1 byte: depth
/// - 1 byte: big_endian (0 or 1)
/// - 1 byte: true_color (0 or 1)
/// - 2 bytes: red_max
/// - 2 bytes: green_max
/// - 2 bytes: blue_max
/// - 1 byte: red_shift
/// - 1 byte: green_shift
/// - 1 byte: blue_shift
/// - 3 bytes: padding (must be zero)
///
/// # Examples
///
/// ```
/// use rfb_protocol::messages::types::PixelFormat;
///
/// // Standard 32-bit RGB format
/// let pf = PixelFormat {
///     bits_per_pixel: 32,
///     depth: 24,
///     big_endian: 0,
///     true_color: 1,
///     red_max: 255,
///     green_max: 255,
///     blue_max: 255,
///     red_shift: 16,
///     green_shift: 8,
///     blue_shift: 0,
/// };
///
/// assert_eq!(pf.bytes_per_pixel(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: u8, // Boolean: must be 0 or 1
    pub true_color: u8, // Boolean: must be 0 or 1
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// Calculate bytes per pixel (1, 2, 3, or 4).
    ///
    /// # Examples
    ///
    /// ```
    /// # use rfb_protocol::messages::types::PixelFormat;
    /// let pf = PixelFormat {
    ///     bits_per_pixel: 32,
    ///     depth: 24,
    ///     big_endian: 0,
    ///     true_color: 1,
    ///     red_max: 255, green_max: 255, blue_max: 255,
    ///     red_shift: 16, green_shift: 8, blue_shift: 0,
    /// };
    /// assert_eq!(pf.bytes_per_pixel(), 4);
    /// ```
    pub fn bytes_per_pixel(&self) -> u8 {
        self.bits_per_pixel.div_ceil(8)
    }

    /// Read a PixelFormat from an RFB input stream.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - EOF is reached before all 16 bytes are read
    /// - Boolean fields (big_endian, true_color) are not 0 or 1
    /// - Padding bytes are not zero
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        let bits_per_pixel = stream.read_u8().await?;
        let depth = stream.read_u8().await?;
        let big_endian = stream.read_u8().await?;
        let true_color = stream.read_u8().await?;

        // Validate booleans strictly
        if big_endian > 1 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("big_endian must be 0 or 1, got {}", big_endian),
            ));
        }
        if true_color > 1 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("true_color must be 0 or 1, got {}", true_color),
            ));
        }

        let red_max = stream.read_u16().await?;
        let green_max = stream.read_u16().await?;
        let blue_max = stream.read_u16().await?;
        let red_shift = stream.read_u8().await?;
        let green_shift = stream.read_u8().await?;
        let blue_shift = stream.read_u8().await?;

        // Read and validate padding (3 bytes, must be zero)
        let mut padding = [0u8; 3];
        stream.read_bytes(&mut padding).await?;
        if padding != [0, 0, 0] {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("padding must be zero, got {:?}", padding),
            ));
        }

        Ok(Self {
            bits_per_pixel,
            depth,
            big_endian,
            true_color,
            red_max,
            green_max,
            blue_max,
            red_shift,
            green_shift,
            blue_shift,
        })
    }

    /// Write this PixelFormat to an RFB output stream.
    ///
    /// # Errors
    ///
    /// Returns an error if boolean fields are not 0 or 1.
    pub fn write_to<W: AsyncWrite + Unpin>(
        &self,
        stream: &mut RfbOutStream<W>,
    ) -> std::io::Result<()> {
        // Validate booleans before writing
        if self.big_endian > 1 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("big_endian must be 0 or 1, got {}", self.big_endian),
            ));
        }
        if self.true_color > 1 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("true_color must be 0 or 1, got {}", self.true_color),
            ));
        }

        stream.write_u8(self.bits_per_pixel);
        stream.write_u8(self.depth);
        stream.write_u8(self.big_endian);
        stream.write_u8(self.true_color);
        stream.write_u16(self.red_max);
        stream.write_u16(self.green_max);
        stream.write_u16(self.blue_max);
        stream.write_u8(self.red_shift);
        stream.write_u8(self.green_shift);
        stream.write_u8(self.blue_shift);
        // 3 bytes padding (must be zero)
        stream.write_u8(0);
        stream.write_u8(0);
        stream.write_u8(0);

        Ok(())
    }
}

/// Rectangle header for framebuffer updates.
///
/// Describes a rectangular region of the screen along with the encoding
/// type used for its pixel data.
///
/// # Wire Format
///
/// Rectangle header is 12 bytes:
/// - 2 bytes: x position
/// - 2 bytes: y position
/// - 2 bytes: width
/// - 2 bytes: height
/// - 4 bytes: encoding type (signed i32)
///
/// # Note
///
/// The Rectangle struct only contains the header. The actual pixel data
/// follows and must be parsed according to the encoding type by separate
/// decoder implementations (Phase 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: i32,
}

impl Rectangle {
    /// Read a Rectangle header from an RFB input stream.
    ///
    /// **Note**: This only reads the 12-byte header. The encoding-specific
    /// pixel data that follows must be handled separately.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            x: stream.read_u16().await?,
            y: stream.read_u16().await?,
            width: stream.read_u16().await?,
            height: stream.read_u16().await?,
            encoding: stream.read_i32().await?,
        })
    }

    /// Write a Rectangle header to an RFB output stream.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u16(self.x);
        stream.write_u16(self.y);
        stream.write_u16(self.width);
        stream.write_u16(self.height);
        stream.write_i32(self.encoding);
    }
}

//
// Encoding type constants
//

/// Raw encoding - uncompressed pixel data.
pub const ENCODING_RAW: i32 = 0;

/// CopyRect encoding - copy from another screen region.
pub const ENCODING_COPYRECT: i32 = 1;

/// RRE (Rise-and-Run-length Encoding).
pub const ENCODING_RRE: i32 = 2;

/// Hextile encoding - 16x16 tile-based compression.
pub const ENCODING_HEXTILE: i32 = 5;

/// Tight encoding - JPEG and zlib compression.
pub const ENCODING_TIGHT: i32 = 7;

/// ZRLE (Zlib Run-Length Encoding).
pub const ENCODING_ZRLE: i32 = 16;

//
// Pseudo-encodings
//
// Sent in `SetEncodings` alongside real encodings to negotiate optional
// capabilities. Never appear as the `encoding` field of a rectangle the
// client receives, with the sole exception of the ones explicitly handled
// inline in the FramebufferUpdate rectangle loop (DesktopSize, LastRect,
// Cursor, ExtendedDesktopSize, QEMUExtendedKeyEvent, VMwareCursor).
//

/// Lowest quality-level pseudo-encoding; add 0-9 to pick a level.
pub const PSEUDO_ENCODING_QUALITY_LEVEL_0: i32 = -32;

/// Highest-numbered (lowest-priority) desktop size convention.
pub const PSEUDO_ENCODING_DESKTOP_SIZE: i32 = -223;

/// Sentinel ending a variable-length rectangle list within one FramebufferUpdate.
pub const PSEUDO_ENCODING_LAST_RECT: i32 = -224;

/// XCursor pseudo-encoding (bitmap cursor, two-color).
pub const PSEUDO_ENCODING_X_CURSOR: i32 = -240;

/// RichCursor pseudo-encoding (full-color cursor with alpha mask).
pub const PSEUDO_ENCODING_CURSOR: i32 = -239;

/// Lowest-numbered compress-level pseudo-encoding; add 0-9 to pick a level.
pub const PSEUDO_ENCODING_COMPRESS_LEVEL_0: i32 = -256;

/// TightPNG pseudo-encoding: Tight framing with PNG payloads instead of Tight's own codecs.
pub const PSEUDO_ENCODING_TIGHT_PNG: i32 = -260;

/// QEMU extended key event pseudo-encoding (advertise/accept `QEMUExtendedKeyEvent`).
pub const PSEUDO_ENCODING_QEMU_EXTENDED_KEY_EVENT: i32 = -258;

/// Desktop name pseudo-encoding.
pub const PSEUDO_ENCODING_DESKTOP_NAME: i32 = -307;

/// Extended desktop size pseudo-encoding (adds screen layout to the resize message).
pub const PSEUDO_ENCODING_EXTENDED_DESKTOP_SIZE: i32 = -308;

/// XVP extension pseudo-encoding.
pub const PSEUDO_ENCODING_XVP: i32 = -309;

/// Server Fence / Client Fence pseudo-encoding.
pub const PSEUDO_ENCODING_FENCE: i32 = -312;

/// Continuous updates pseudo-encoding.
pub const PSEUDO_ENCODING_CONTINUOUS_UPDATES: i32 = -313;

/// VMware-specific cursor pseudo-encoding.
pub const PSEUDO_ENCODING_VMWARE_CURSOR: i32 = 0x574d5664;

/// Extended clipboard pseudo-encoding.
pub const PSEUDO_ENCODING_EXTENDED_CLIPBOARD: i32 = 0xC0A1_E5CEu32 as i32;

//
// Security type constants
//
// These are the single-byte values offered in the `Security` phase of the
// handshake (RFB >= 3.7) or sent as the low byte of the `authScheme` u32
// (RFB 3.3). `Plain` is not in this list: it is only ever reached as a
// VeNCrypt subtype (a 4-byte value, see `VENCRYPT_SUBTYPE_PLAIN`), ridden
// by the same username/password wire layout as the top-level schemes below.

/// No security - no authentication required.
pub const SECURITY_TYPE_NONE: u8 = 1;

/// VNC authentication - DES challenge-response with password.
pub const SECURITY_TYPE_VNC_AUTH: u8 = 2;

/// RA2 - RSA key exchange plus AES-EAX transport encryption (legacy, unused by this client).
pub const SECURITY_TYPE_RA2: u8 = 5;

/// RA2ne - RA2 "new" variant: RSA key exchange, AES-EAX transport, username/password auth.
pub const SECURITY_TYPE_RA2NE: u8 = 6;

/// Tight - tunnel capability negotiation followed by a sub-authentication scheme.
pub const SECURITY_TYPE_TIGHT: u8 = 16;

/// VeNCrypt - TLS/plain sub-negotiation wrapper.
pub const SECURITY_TYPE_VENCRYPT: u8 = 19;

/// XVP - extension for host power control; authenticates via VNCAuth after a credential preamble.
pub const SECURITY_TYPE_XVP: u8 = 22;

/// Apple Remote Desktop - Diffie-Hellman key agreement, AES-ECB credential encryption.
pub const SECURITY_TYPE_ARD: u8 = 30;

/// MSLogonII (UltraVNC) - Diffie-Hellman key agreement, DES-CBC credential encryption.
pub const SECURITY_TYPE_MS_LOGON_II: u8 = 113;

/// Tight sub-authentication capability code: no authentication.
pub const TIGHT_AUTH_NONE: u32 = 1;

/// Tight sub-authentication capability code: standard VNC authentication.
pub const TIGHT_AUTH_VNC: u32 = 2;

/// Tight sub-authentication capability code: Unix login (username + password, UTF-8).
pub const TIGHT_AUTH_UNIX_LOGON: u32 = 129;

/// Tight tunnel capability code: no tunneling (the only one this client implements).
pub const TIGHT_TUNNEL_NONE: u32 = 0;

/// VeNCrypt version this client implements (major.minor as sent on the wire: two bytes).
pub const VENCRYPT_VERSION_MAJOR: u8 = 0;

/// VeNCrypt version this client implements (major.minor as sent on the wire: two bytes).
pub const VENCRYPT_VERSION_MINOR: u8 = 2;

/// VeNCrypt subtype: plain username/password, no TLS.
pub const VENCRYPT_SUBTYPE_PLAIN: u32 = 256;

/// VeNCrypt subtype: anonymous TLS, no further authentication.
pub const VENCRYPT_SUBTYPE_TLS_NONE: u32 = 257;

/// VeNCrypt subtype: anonymous TLS followed by VNC authentication.
pub const VENCRYPT_SUBTYPE_TLS_VNC: u32 = 258;

/// VeNCrypt subtype: anonymous TLS followed by plain username/password.
pub const VENCRYPT_SUBTYPE_TLS_PLAIN: u32 = 259;

/// VeNCrypt subtype: X.509-authenticated TLS, no further authentication.
pub const VENCRYPT_SUBTYPE_X509_NONE: u32 = 260;

/// VeNCrypt subtype: X.509-authenticated TLS followed by VNC authentication.
pub const VENCRYPT_SUBTYPE_X509_VNC: u32 = 261;

/// VeNCrypt subtype: X.509-authenticated TLS followed by plain username/password.
pub const VENCRYPT_SUBTYPE_X509_PLAIN: u32 = 262;
