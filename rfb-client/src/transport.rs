//! Transport layer (TCP and TLS) for VNC connections.
//!
//! Two transports exist because VeNCrypt supports two very different ways of getting
//! to TLS: a server may demand TLS from the very first byte ("tunnel" mode, selected by
//! [`TlsConfig`] before we ever speak RFB), or the RFB handshake itself may pick a
//! VeNCrypt subtype that asks the client to rewrap the plain connection mid-handshake
//! (see [`crate::connection::establish`]). Both end up as the same [`Transport`] enum so
//! the rest of the client never has to care which one happened.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use once_cell::sync::Lazy;
use rfb_protocol::socket::TcpSocket;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::errors::RfbClientError;

/// Installs `ring` as the process-wide rustls crypto provider on first use.
/// Idempotent: a later install by another part of the process is simply ignored.
static CRYPTO_PROVIDER: Lazy<()> = Lazy::new(|| {
    let _ = rustls::crypto::ring::default_provider().install_default();
});

/// A boxed, independently pollable read half produced by [`Transport::split`].
pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
/// A boxed, independently pollable write half produced by [`Transport::split`].
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// TLS parameters for [`Transport::connect_tls`].
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    server_name: Option<String>,
    danger_accept_invalid_certs: bool,
}

impl TlsConfig {
    /// Creates a config that verifies the server certificate against the native trust
    /// store, using the connection hostname for SNI/certificate name checking.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the name used for SNI and certificate verification (useful when
    /// connecting by IP address to a host with a DNS-based certificate).
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Disables certificate verification entirely. Dangerous: only for testing
    /// against servers with self-signed or otherwise unverifiable certificates.
    #[must_use]
    pub fn disable_verification(mut self) -> Self {
        self.danger_accept_invalid_certs = true;
        self
    }
}

/// A connected RFB transport: either a bare TCP stream or one already wrapped in TLS.
pub enum Transport {
    /// Plain TCP, including connections later rewrapped in TLS mid-handshake via
    /// VeNCrypt (see [`crate::connection::establish`]); that rewrap produces a `Tls`
    /// variant from a fresh [`Transport`], it does not mutate this one in place.
    Tcp(TcpSocket),
    /// TLS established before any RFB bytes were exchanged ("tunnel" mode).
    Tls(Box<TlsStream<TcpSocket>>),
}

impl Transport {
    /// Connects a plain TCP transport.
    pub async fn connect_tcp(host: &str, port: u16) -> Result<Self, RfbClientError> {
        let socket = TcpSocket::connect(host, port)
            .await
            .map_err(|e| RfbClientError::ConnectionFailed(e.to_string()))?;
        Ok(Self::Tcp(socket))
    }

    /// Connects a TCP transport and immediately performs a TLS client handshake over
    /// it, before any RFB version bytes are exchanged.
    pub async fn connect_tls(host: &str, port: u16, tls: TlsConfig) -> Result<Self, RfbClientError> {
        let socket = TcpSocket::connect(host, port)
            .await
            .map_err(|e| RfbClientError::ConnectionFailed(e.to_string()))?;
        let stream = wrap_tls(socket, host, &tls).await?;
        Ok(Self::Tls(Box::new(stream)))
    }

    /// Rewraps an already-connected TCP transport in TLS. Used mid-handshake when
    /// VeNCrypt negotiates a TLS subtype: the version and security-type bytes were
    /// exchanged in the clear, but everything from the TLS handshake onward is not.
    ///
    /// # Panics
    ///
    /// Panics if called on a [`Transport::Tls`] value; VeNCrypt TLS subtypes are only
    /// reachable over a transport that started out as plain TCP.
    pub async fn upgrade_to_tls(self, host: &str, tls: &TlsConfig) -> Result<Self, RfbClientError> {
        let socket = match self {
            Self::Tcp(socket) => socket,
            Self::Tls(_) => panic!("upgrade_to_tls called on a transport that is already TLS"),
        };
        let stream = wrap_tls(socket, host, tls).await?;
        Ok(Self::Tls(Box::new(stream)))
    }

    /// Splits the transport into boxed, independently pollable halves.
    #[must_use]
    pub fn split(self) -> (BoxedReader, BoxedWriter) {
        let (read_half, write_half) = tokio::io::split(self);
        (Box::new(read_half), Box::new(write_half))
    }
}

async fn wrap_tls(socket: TcpSocket, host: &str, tls: &TlsConfig) -> Result<TlsStream<TcpSocket>, RfbClientError> {
    Lazy::force(&CRYPTO_PROVIDER);

    let mut root_store = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        tracing::warn!("failed to load a native root certificate: {err}");
    }
    for cert in native.certs {
        let _ = root_store.add(cert);
    }

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if tls.danger_accept_invalid_certs {
        tracing::warn!("TLS certificate verification disabled for this connection");
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerifier));
    }

    let connector = TlsConnector::from(Arc::new(config));
    let name = tls.server_name.clone().unwrap_or_else(|| host.to_string());
    let server_name = ServerName::try_from(name.clone())
        .map_err(|e| RfbClientError::TlsError(format!("invalid server name {name}: {e}")))?
        .to_owned();

    connector
        .connect(server_name, socket)
        .await
        .map_err(|e| RfbClientError::TlsError(format!("TLS handshake failed: {e}")))
}

impl AsyncRead for Transport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Accepts any server certificate. Only used when [`TlsConfig::disable_verification`]
/// has been set.
#[derive(Debug)]
struct NoCertVerifier;

impl rustls::client::danger::ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
