//! AES-EAX framing adapters for the RA2ne security type.
//!
//! [`rfb_protocol::handshake::Ra2Ciphers`] documents the invariant these exist to
//! enforce: once RA2ne finishes its key exchange, every byte from ClientInit onward
//! must be wrapped in an AES-EAX frame. [`Ra2Reader`]/[`Ra2Writer`] make that invariant
//! structural by sitting between the transport and the buffered RFB streams, so nothing
//! downstream ever sees or produces unwrapped bytes.
//!
//! [`RfbOutStream::flush`](rfb_protocol::io::RfbOutStream::flush) issues exactly one
//! `write_all` per flush, so [`Ra2Writer::poll_write`] can safely treat each call's
//! buffer as one complete message and encrypt it as a single frame.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use rfb_protocol::ra2::Ra2Cipher;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

enum ReadPhase {
    Length,
    Frame(u16),
}

/// Decrypts an RA2-framed byte stream into plaintext as it is read.
pub struct Ra2Reader<R> {
    inner: R,
    cipher: Ra2Cipher,
    phase: ReadPhase,
    staging: Vec<u8>,
    filled: usize,
    plaintext: Vec<u8>,
    plaintext_pos: usize,
}

impl<R: AsyncRead + Unpin> Ra2Reader<R> {
    /// Wraps `inner`, decrypting with `cipher` (the server-to-client direction).
    pub fn new(inner: R, cipher: Ra2Cipher) -> Self {
        Self {
            inner,
            cipher,
            phase: ReadPhase::Length,
            staging: vec![0u8; 2],
            filled: 0,
            plaintext: Vec::new(),
            plaintext_pos: 0,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Ra2Reader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.plaintext_pos < this.plaintext.len() {
                let available = &this.plaintext[this.plaintext_pos..];
                let n = available.len().min(buf.remaining());
                buf.put_slice(&available[..n]);
                this.plaintext_pos += n;
                return Poll::Ready(Ok(()));
            }

            while this.filled < this.staging.len() {
                let mut read_buf = ReadBuf::new(&mut this.staging[this.filled..]);
                match Pin::new(&mut this.inner).poll_read(cx, &mut read_buf) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Ready(Ok(())) => {
                        let n = read_buf.filled().len();
                        if n == 0 {
                            return Poll::Ready(Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed mid-frame while reading RA2 stream",
                            )));
                        }
                        this.filled += n;
                    }
                }
            }

            match this.phase {
                ReadPhase::Length => {
                    let len = u16::from_be_bytes([this.staging[0], this.staging[1]]);
                    this.phase = ReadPhase::Frame(len);
                    this.staging = vec![0u8; len as usize + 16];
                    this.filled = 0;
                }
                ReadPhase::Frame(len) => {
                    let plaintext = match this.cipher.decrypt(len, &this.staging) {
                        Ok(p) => p,
                        Err(e) => return Poll::Ready(Err(e)),
                    };
                    this.plaintext = plaintext;
                    this.plaintext_pos = 0;
                    this.phase = ReadPhase::Length;
                    this.staging = vec![0u8; 2];
                    this.filled = 0;
                }
            }
        }
    }
}

/// Encrypts each logical write as one RA2 frame and forwards it to the transport.
///
/// Assumes each `poll_write` call carries one complete message, which holds for every
/// caller in this crate: [`RfbOutStream`](rfb_protocol::io::RfbOutStream) only ever
/// issues one `write_all` per `flush`.
pub struct Ra2Writer<W> {
    inner: W,
    cipher: Ra2Cipher,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<W: AsyncWrite + Unpin> Ra2Writer<W> {
    /// Wraps `inner`, encrypting with `cipher` (the client-to-server direction).
    pub fn new(inner: W, cipher: Ra2Cipher) -> Self {
        Self {
            inner,
            cipher,
            pending: Vec::new(),
            pending_pos: 0,
        }
    }

    fn drain_pending(&mut self, inner: Pin<&mut W>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut inner = inner;
        while self.pending_pos < self.pending.len() {
            match inner.as_mut().poll_write(cx, &self.pending[self.pending_pos..]) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(0)) => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "transport accepted zero bytes writing an RA2 frame",
                    )));
                }
                Poll::Ready(Ok(n)) => self.pending_pos += n,
            }
        }
        self.pending.clear();
        self.pending_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for Ra2Writer<W> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if !this.pending.is_empty() {
            match this.drain_pending(Pin::new(&mut this.inner), cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(())) => {}
            }
        }

        let frame = match this.cipher.encrypt(buf) {
            Ok(f) => f,
            Err(e) => return Poll::Ready(Err(e)),
        };
        this.pending = frame;
        this.pending_pos = 0;

        match this.drain_pending(Pin::new(&mut this.inner), cx) {
            Poll::Pending => Poll::Ready(Ok(buf.len())),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => Poll::Ready(Ok(buf.len())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.pending.is_empty() {
            match this.drain_pending(Pin::new(&mut this.inner), cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(())) => {}
            }
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
