//! Application-facing message types for communication between the client and application.

use bytes::Bytes;
use rfb_common::Rect;
use rfb_protocol::messages::PixelFormat;

/// Events sent from the VNC client to the application.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Successfully connected to the server.
    Connected {
        /// Framebuffer width in pixels.
        width: u16,
        /// Framebuffer height in pixels.
        height: u16,
        /// Server name/description.
        name: String,
        /// Negotiated pixel format.
        pixel_format: PixelFormat,
    },

    /// Framebuffer has been updated.
    ///
    /// The `damage` vector contains all rectangles that were updated.
    /// The application should redraw these regions.
    FramebufferUpdated {
        /// List of rectangles that were updated.
        damage: Vec<Rect>,
    },

    /// Desktop size changed.
    ///
    /// This can happen if the server's screen resolution changes.
    DesktopResized {
        /// New width in pixels.
        width: u16,
        /// New height in pixels.
        height: u16,
    },

    /// Server pushed a new pointer/cursor image (RichCursor, XCursor, or
    /// the VMware cursor pseudo-encoding's alpha sub-type).
    CursorUpdated {
        /// Decoded cursor shape (straight RGBA pixels plus hotspot).
        shape: rfb_encodings::CursorShape,
    },

    /// The server's desktop name changed (initial ServerInit name, or a
    /// later DesktopName pseudo-encoding rectangle).
    DesktopName {
        /// New desktop name.
        name: String,
    },

    /// Server sent a bell notification.
    Bell,

    /// Server sent clipboard/cut text data.
    ServerCutText {
        /// Clipboard data (typically UTF-8 text).
        text: Bytes,
    },

    /// A server host key was accepted on a trust-on-first-use basis during
    /// a key-exchange security handshake (RA2ne, ARD, MSLogonII).
    ServerVerification {
        /// Key kind, e.g. `"RSA"`.
        key_type: String,
        /// Raw public key bytes as presented on the wire.
        public_key: Bytes,
    },

    /// Authentication or security negotiation failed; the connection is
    /// about to close. `status` is the server's `SecurityResult` status
    /// code when one was read (always nonzero here).
    SecurityFailure {
        /// Server-provided status code, if a SecurityResult was read.
        status: Option<u32>,
        /// Server-provided reason text, if any (RFB 3.8 SecurityReason).
        reason: Option<String>,
    },

    /// Server-advertised protocol capabilities became known or changed.
    Capabilities {
        /// Server sent `ServerFence` at least once.
        fence: bool,
        /// Server acknowledged `EnableContinuousUpdates`.
        continuous_updates: bool,
        /// Server accepted a `SetDesktopSize` request.
        set_desktop_size: bool,
        /// Server echoed the QEMU extended key event pseudo-encoding.
        qemu_extended_key_event: bool,
    },

    /// Connection has been closed (gracefully or due to error).
    ConnectionClosed,

    /// An error occurred.
    ///
    /// After this event, the client may attempt to reconnect (if configured)
    /// or shut down.
    Error {
        /// The error message.
        message: String,
    },
}

/// Commands sent from the application to the VNC client.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Request a framebuffer update.
    RequestUpdate {
        /// If true, only send updates for changed regions.
        /// If false, send the entire specified rectangle.
        incremental: bool,
        /// Rectangle to update. If None, update the entire screen.
        rect: Option<Rect>,
    },

    /// Send pointer (mouse) event.
    Pointer {
        /// X coordinate in pixels.
        x: u16,
        /// Y coordinate in pixels.
        y: u16,
        /// Button mask (bit 0 = left, bit 1 = middle, bit 2 = right).
        buttons: u8,
    },

    /// Send keyboard event.
    Key {
        /// X11 keysym value.
        key: u32,
        /// True if key was pressed, false if released.
        down: bool,
    },

    /// Send clipboard/cut text to server.
    ClientCutText {
        /// Text data to send (typically UTF-8).
        text: Bytes,
    },

    /// Send an XVP operation (e.g. shutdown/reboot/reset) to the server.
    Xvp {
        /// XVP extension version (always 1 in practice).
        version: u8,
        /// Operation code (1=shutdown, 2=reboot, 3=reset).
        op: u8,
    },

    /// Request the server resize the remote desktop.
    SetDesktopSize {
        /// Requested width in pixels.
        width: u16,
        /// Requested height in pixels.
        height: u16,
    },

    /// Close the connection.
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ServerEvent>();
    }

    #[test]
    fn test_client_command_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ClientCommand>();
    }

    #[test]
    fn test_client_command_clone() {
        let cmd = ClientCommand::Key {
            key: 0x61,
            down: true,
        };
        let cmd2 = cmd.clone();
        assert!(matches!(
            cmd2,
            ClientCommand::Key {
                key: 0x61,
                down: true
            }
        ));
    }
}
