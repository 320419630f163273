//! High-level connection management and handshake.
//!
//! Establishes a transport (TCP or TLS), performs the RFB version and security
//! handshakes, sends ClientInit, and reads ServerInit. Returns buffered RFB
//! input/output streams ready for normal operation.

use crate::{
    config::{Config, SecurityConfig},
    errors::RfbClientError,
    messages::ServerEvent,
    ra2_stream::{Ra2Reader, Ra2Writer},
    transport::{self, BoxedReader, BoxedWriter, Transport},
};
use bytes::Bytes;
use rfb_protocol::handshake::{
    negotiate_security, negotiate_version, post_tls_authenticate, send_client_init, HandshakeEvent,
    NegotiatedVersion, SecurityNegotiation, SecurityOutcome,
};
use rfb_protocol::io::{RfbInStream, RfbOutStream};
use rfb_protocol::messages::ServerInit;

/// Connected RFB session components.
pub struct Connection {
    /// Buffered input stream for reading RFB data.
    pub input: RfbInStream<BoxedReader>,
    /// Buffered output stream for writing RFB data.
    pub output: RfbOutStream<BoxedWriter>,
    /// Negotiated protocol version.
    pub version: NegotiatedVersion,
    /// Initial server parameters (framebuffer size, pixel format, name).
    pub server_init: ServerInit,
}

impl Connection {
    /// Returns the negotiated framebuffer width and height.
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        (
            self.server_init.framebuffer_width,
            self.server_init.framebuffer_height,
        )
    }
}

/// Establish a new RFB connection using the given configuration.
///
/// Steps:
/// 1) Create transport (TCP, or TLS if `security.tls.enabled` selects tunnel mode)
/// 2) Split into read/write halves and wrap with `RfbInStream`/`RfbOutStream`
/// 3) Negotiate version (answering an UltraVNC repeater probe if one appears)
/// 4) Negotiate security; if VeNCrypt chose a TLS subtype, rewrap the transport in TLS
///    mid-handshake and finish authenticating over it
/// 5) Send ClientInit (shared per configuration)
/// 6) Read ServerInit
/// 7) If RA2ne was negotiated, wrap the streams in AES-EAX framing for all further
///    traffic, per [`rfb_protocol::handshake::Ra2Ciphers`]
pub async fn establish(
    config: &Config,
    events: &flume::Sender<ServerEvent>,
) -> Result<Connection, RfbClientError> {
    let host = config.connection.host.clone();
    let port = config.connection.port;

    let transport = if use_tls(&config.security) {
        Transport::connect_tls(&host, port, to_transport_tls_config(&config.security)).await?
    } else {
        Transport::connect_tcp(&host, port).await?
    };

    let (read_half, write_half) = tokio::io::split(transport);
    let mut input = RfbInStream::new(read_half);
    let mut output = RfbOutStream::new(write_half);

    let version = negotiate_version(&mut input, &mut output, &config.connection.repeater_id)
        .await
        .map_err(|e| RfbClientError::Handshake(format!("version negotiation failed: {e}")))?;

    let credentials = config.connection.credentials();

    let negotiation = negotiate_security(&mut input, &mut output, version, &credentials)
        .await
        .map_err(|e| {
            emit_security_failure(events, &e);
            RfbClientError::Security(format!("security negotiation failed: {e}"))
        })?;

    let outcome = match negotiation {
        SecurityNegotiation::Complete(outcome) => outcome,
        SecurityNegotiation::VeNCryptTlsRequired { subtype } => {
            let transport = input.into_inner().unsplit(output.into_inner());
            let tls_cfg = to_transport_tls_config(&config.security);
            let transport = transport.upgrade_to_tls(&host, &tls_cfg).await?;

            let (read_half, write_half) = tokio::io::split(transport);
            input = RfbInStream::new(read_half);
            output = RfbOutStream::new(write_half);

            match post_tls_authenticate(subtype, &mut input, &mut output, version, &credentials)
                .await
                .map_err(|e| {
                    emit_security_failure(events, &e);
                    RfbClientError::Security(format!("VeNCrypt TLS authentication failed: {e}"))
                })?
            {
                SecurityNegotiation::Complete(outcome) => outcome,
                SecurityNegotiation::VeNCryptTlsRequired { .. } => {
                    return Err(RfbClientError::Security(
                        "server asked for a second TLS upgrade after VeNCrypt authentication completed".to_string(),
                    ));
                }
            }
        }
    };

    emit_handshake_events(events, &outcome);

    send_client_init(&mut output, config.connection.shared)
        .await
        .map_err(|e| RfbClientError::Protocol(format!("failed to send ClientInit: {e}")))?;

    let server_init = ServerInit::read_from(&mut input)
        .await
        .map_err(|e| RfbClientError::Protocol(format!("failed to read ServerInit: {e}")))?;

    let (input, output) = wrap_ra2(input, output, outcome);

    Ok(Connection {
        input,
        output,
        version,
        server_init,
    })
}

/// Wraps the post-handshake streams in AES-EAX framing when RA2ne was negotiated;
/// otherwise just boxes them so the `Connection` type doesn't depend on the
/// transport's concrete shape.
fn wrap_ra2(
    input: RfbInStream<tokio::io::ReadHalf<Transport>>,
    output: RfbOutStream<tokio::io::WriteHalf<Transport>>,
    outcome: SecurityOutcome,
) -> (RfbInStream<BoxedReader>, RfbOutStream<BoxedWriter>) {
    let read_half = input.into_inner();
    let write_half = output.into_inner();

    match outcome.ra2 {
        Some(ra2) => {
            let boxed_input: BoxedReader = Box::new(Ra2Reader::new(read_half, ra2.server_to_client));
            let boxed_output: BoxedWriter = Box::new(Ra2Writer::new(write_half, ra2.client_to_server));
            (RfbInStream::new(boxed_input), RfbOutStream::new(boxed_output))
        }
        None => {
            let boxed_input: BoxedReader = Box::new(read_half);
            let boxed_output: BoxedWriter = Box::new(write_half);
            (RfbInStream::new(boxed_input), RfbOutStream::new(boxed_output))
        }
    }
}

fn emit_handshake_events(events: &flume::Sender<ServerEvent>, outcome: &SecurityOutcome) {
    for event in &outcome.events {
        match event {
            HandshakeEvent::ServerVerification { key_type, public_key } => {
                tracing::info!(
                    "accepted {} server key on trust-on-first-use basis ({} bytes, not pinned)",
                    key_type,
                    public_key.len()
                );
                let _ = events.send(ServerEvent::ServerVerification {
                    key_type: (*key_type).to_string(),
                    public_key: Bytes::copy_from_slice(public_key),
                });
            }
        }
    }
}

/// Surface an authentication failure as a `securityfailure` event before the
/// caller turns it into a terminating `RfbClientError`. The handshake layer
/// reports failures as formatted `io::Error`s rather than a structured status
/// code, so `status` is left unset here; `reason` carries the message text.
fn emit_security_failure(events: &flume::Sender<ServerEvent>, error: &std::io::Error) {
    let _ = events.send(ServerEvent::SecurityFailure {
        status: None,
        reason: Some(error.to_string()),
    });
}

fn use_tls(security: &SecurityConfig) -> bool {
    match &security.tls {
        Some(t) => t.enabled,
        None => false,
    }
}

fn to_transport_tls_config(security: &SecurityConfig) -> transport::TlsConfig {
    let mut cfg = transport::TlsConfig::new();
    if let Some(tls) = &security.tls {
        if let Some(name) = &tls.server_name {
            cfg = cfg.server_name(name.clone());
        }
        if tls.danger_accept_invalid_certs {
            cfg = cfg.disable_verification();
        }
        // Custom CA files (tls.ca_file) are not yet threaded through; connections
        // needing a private CA should use danger_accept_invalid_certs or a system
        // trust store update instead.
    }
    cfg
}
