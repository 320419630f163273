//! Event loop coordination: read loop, write loop, and reconnection logic.

use crate::{
    config::Config,
    connection,
    errors::RfbClientError,
    framebuffer::{FbEvent, Framebuffer},
    messages::{ClientCommand, ServerEvent},
    protocol,
    FramebufferHandle,
};
use rfb_protocol::messages::server::FramebufferUpdate;
use std::sync::Arc;
use tokio::select;
use tokio::task::JoinHandle;

/// Spawn the client event loop.
///
/// This establishes a connection, creates the framebuffer, and starts read/write loops.
/// Returns both the join handle and the shared framebuffer handle.
pub async fn spawn(
    config: Config,
    commands: flume::Receiver<ClientCommand>,
    events: flume::Sender<ServerEvent>,
) -> Result<(JoinHandle<()>, FramebufferHandle), RfbClientError> {
    // Establish connection and get streams + server init
    let conn = connection::establish(&config, &events).await?;
    let width = conn.server_init.framebuffer_width;
    let height = conn.server_init.framebuffer_height;
    let name = conn.server_init.name.clone();
    let pixel_format = conn.server_init.pixel_format.clone();

    // Initialize shared framebuffer with the server's pixel format.
    let framebuffer = Arc::new(tokio::sync::Mutex::new(Framebuffer::new(
        width,
        height,
        pixel_format.clone(),
    )));
    let framebuffer_handle = framebuffer.clone();

    // Notify application of successful connection
    let _ = events.send(ServerEvent::Connected {
        width,
        height,
        name,
        pixel_format: pixel_format.clone(),
    });

    // Split streams for loops (they are already buffered types)
    let mut input = conn.input; // RfbInStream<...>
    let mut output = conn.output; // RfbOutStream<...>

    // Capture config values needed in the spawned task
    let encodings = config.effective_encodings();
    let fb_width = width;
    let fb_height = height;
    let view_only = config.security.view_only;

    // Spawn a task to run the main loop (read + write via select)
    let handle = tokio::spawn(async move {
        // Periodic incremental update requester (best-effort)
        let mut periodic = tokio::time::interval(std::time::Duration::from_millis(250));
        let mut capabilities = Capabilities::default();

        // Send initial protocol messages from within the task
        // 1) SetPixelFormat to 32bpp true-color little-endian RGB888 (like C++ viewer)
        let desired_pf = rfb_protocol::messages::types::PixelFormat {
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
        };
        if let Err(e) = protocol::write_set_pixel_format(&mut output, desired_pf).await {
            tracing::error!("Failed to send SetPixelFormat: {}", e);
            return;
        }

        // 2) SetEncodings
        tracing::info!("Sending SetEncodings: {:?}", encodings);
        if let Err(e) = protocol::write_set_encodings(&mut output, encodings).await {
            tracing::error!("Failed to send SetEncodings: {}", e);
            return;
        }

        // 3) Request initial full framebuffer update
        tracing::info!("Requesting initial framebuffer update: {}x{}", fb_width, fb_height);
        if let Err(e) = protocol::write_framebuffer_update_request(&mut output, false, 0, 0, fb_width, fb_height).await {
            tracing::error!("Failed to send FramebufferUpdateRequest: {}", e);
            return;
        }

        tracing::info!("Event loop task started, entering main loop");
        // Use async recv to avoid blocking
        let mut iteration = 0u64;
        loop {
            if iteration % 100 == 1 {
                tracing::debug!("Event loop iteration {}", iteration);
            }
            select! {
                // Prefer reading server messages to keep buffers flowing
                res = protocol::read_message_type(&mut input) => {
                    match res {
                        Ok(msg_type) => {
                            tracing::debug!("Server message type: {}", msg_type);
                            match msg_type {
                                0 => {
                                    // FramebufferUpdate: pipeline next incremental request, then stream-decode
                                    tracing::debug!("Pipelining incremental FramebufferUpdateRequest");
                                    let _ = protocol::write_framebuffer_update_request(&mut output, true, 0, 0, fb_width, fb_height).await;
                                    let (damage, side_effects) = {
                                        let mut fb = framebuffer.lock().await;
                                        let damage = match fb.apply_update_stream(&mut input).await {
                                            Ok(d) => d,
                                            Err(e) => {
                                                let _ = events.send(ServerEvent::Error { message: e.to_string() });
                                                let _ = events.send(ServerEvent::ConnectionClosed);
                                                break;
                                            }
                                        };
                                        (damage, fb.take_pending_events())
                                    };
                                    if !damage.is_empty() {
                                        let _ = events.send(ServerEvent::FramebufferUpdated { damage });
                                    }
                                    dispatch_fb_events(&events, &mut capabilities, side_effects);
                                }
                                1 => {
                                    // SetColorMapEntries - currently ignored
                                    // We still need to consume the payload to stay in sync
                                    let _ = rfb_protocol::messages::server::SetColorMapEntries::read_from(&mut input).await;
                                }
                                2 => {
                                    let _ = events.send(ServerEvent::Bell);
                                }
                                3 => {
                                    use rfb_protocol::messages::server::ServerCutTextMessage;
                                    match ServerCutTextMessage::read_from(&mut input).await {
                                        Ok(ServerCutTextMessage::Text(text)) => {
                                            use bytes::Bytes;
                                            let _ = events.send(ServerEvent::ServerCutText { text: Bytes::from(text) });
                                        }
                                        Ok(ServerCutTextMessage::Extended(payload)) => {
                                            use rfb_protocol::clipboard::{ClipboardMessage, CLIENT_ACTIONS, CLIENT_FORMATS};
                                            match ClipboardMessage::decode(&payload) {
                                                Ok(ClipboardMessage::Caps { .. }) => {
                                                    let reply = ClipboardMessage::Caps {
                                                        formats: CLIENT_FORMATS,
                                                        actions: CLIENT_ACTIONS,
                                                    };
                                                    let _ = protocol::write_client_cut_text_extended(&mut output, reply.encode()).await;
                                                }
                                                Ok(ClipboardMessage::Provide { text }) => {
                                                    use bytes::Bytes;
                                                    let _ = events.send(ServerEvent::ServerCutText { text: Bytes::from(text) });
                                                }
                                                Ok(ClipboardMessage::Request { .. }) | Ok(ClipboardMessage::Peek) => {
                                                    // We hold no server-side clipboard cache to serve from yet.
                                                }
                                                Ok(ClipboardMessage::Notify { .. }) => {
                                                    let reply = ClipboardMessage::Request { formats: CLIENT_FORMATS };
                                                    let _ = protocol::write_client_cut_text_extended(&mut output, reply.encode()).await;
                                                }
                                                Err(e) => {
                                                    tracing::debug!("Ignoring malformed extended clipboard message: {}", e);
                                                }
                                            }
                                        }
                                        Err(e) => {
                                            tracing::debug!("Failed to read ServerCutText: {}", e);
                                        }
                                    }
                                }
                                150 => {
                                    // EndOfContinuousUpdates (server->client). No payload.
                                    capabilities.continuous_updates = true;
                                    emit_capabilities(&events, &capabilities);
                                }
                                248 => {
                                    // ServerFence: read padding(3), flags(u32), len(u8), payload[len].
                                    // If the Request bit (1<<31) is set, echo back with only
                                    // BlockBefore|BlockAfter bits (the bits this client actually honors).
                                    const FENCE_FLAG_REQUEST: u32 = 1 << 31;
                                    const FENCE_FLAG_BLOCK_BEFORE: u32 = 1 << 0;
                                    const FENCE_FLAG_BLOCK_AFTER: u32 = 1 << 1;

                                    capabilities.fence = true;
                                    emit_capabilities(&events, &capabilities);

                                    let _ = input.skip(3).await;
                                    if let Ok(flags) = input.read_u32().await {
                                        if let Ok(len) = input.read_u8().await {
                                            let mut buf = vec![0u8; len as usize];
                                            let _ = input.read_bytes(&mut buf).await;
                                            if flags & FENCE_FLAG_REQUEST != 0 {
                                                let reply_flags = flags & (FENCE_FLAG_BLOCK_BEFORE | FENCE_FLAG_BLOCK_AFTER);
                                                let _ = protocol::write_client_fence(&mut output, reply_flags, buf).await;
                                            }
                                        }
                                    }
                                }
                                250 => {
                                    let _ = input.skip(1).await;
                                    if let (Ok(version), Ok(op)) = (input.read_u8().await, input.read_u8().await) {
                                        tracing::debug!("ServerXVP version={} op={}", version, op);
                                    }
                                }
                                _ => {
                                    // Unknown or unsupported server message: ignore to keep connection alive
                                    tracing::debug!("Ignoring unsupported server message type: {}", msg_type);
                                }
                            }
                        }
                        Err(e) => {
                            // Report and exit on error (fail-fast)
                            let _ = events.send(ServerEvent::Error { message: e.to_string() });
                            let _ = events.send(ServerEvent::ConnectionClosed);
                            break;
                        }
                    }
                }

                cmd = commands.recv_async() => {
                    match cmd {
                        Ok(command) => {
                            if let Err(e) = handle_command(&mut output, &events, command, view_only).await {
                                let _ = events.send(ServerEvent::Error { message: e.to_string() });
                                let _ = events.send(ServerEvent::ConnectionClosed);
                                break;
                            }
                        }
                        Err(_) => {
                            // Command channel closed by application
                            let _ = events.send(ServerEvent::ConnectionClosed);
                            break;
                        }
                    }
                }

                _ = periodic.tick() => {
                    tracing::debug!("Periodic incremental FramebufferUpdateRequest");
                    let _ = protocol::write_framebuffer_update_request(&mut output, true, 0, 0, fb_width, fb_height).await;
                }
            }
        }
    });

    Ok((handle, framebuffer_handle))
}

/// Server capability flags inferred from messages actually observed on the
/// wire, per §3's `supportsFence`/`supportsContinuousUpdates`/
/// `enabledContinuousUpdates`/`supportsSetDesktopSize`/
/// `qemuExtKeyEventSupported` data model. There is no single negotiation
/// message for these; each becomes known opportunistically the first time
/// the server exercises the corresponding pseudo-encoding or message type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Capabilities {
    fence: bool,
    continuous_updates: bool,
    set_desktop_size: bool,
    qemu_extended_key_event: bool,
}

fn emit_capabilities(events: &flume::Sender<ServerEvent>, caps: &Capabilities) {
    let _ = events.send(ServerEvent::Capabilities {
        fence: caps.fence,
        continuous_updates: caps.continuous_updates,
        set_desktop_size: caps.set_desktop_size,
        qemu_extended_key_event: caps.qemu_extended_key_event,
    });
}

/// Translate side effects collected while decoding a FramebufferUpdate's
/// rectangles into application-facing events, updating capability flags
/// along the way.
fn dispatch_fb_events(
    events: &flume::Sender<ServerEvent>,
    capabilities: &mut Capabilities,
    side_effects: Vec<FbEvent>,
) {
    let mut capabilities_changed = false;
    for effect in side_effects {
        match effect {
            FbEvent::DesktopResized { width, height } => {
                let _ = events.send(ServerEvent::DesktopResized { width, height });
            }
            FbEvent::CursorUpdated(shape) => {
                let _ = events.send(ServerEvent::CursorUpdated { shape });
            }
            FbEvent::DesktopName(name) => {
                let _ = events.send(ServerEvent::DesktopName { name });
            }
            FbEvent::QemuExtendedKeyEventAck => {
                capabilities_changed |= !capabilities.qemu_extended_key_event;
                capabilities.qemu_extended_key_event = true;
            }
            FbEvent::ExtendedDesktopSizeSeen => {
                capabilities_changed |= !capabilities.set_desktop_size;
                capabilities.set_desktop_size = true;
            }
        }
    }
    if capabilities_changed {
        emit_capabilities(events, capabilities);
    }
}

async fn handle_framebuffer_update<R: tokio::io::AsyncRead + Unpin>(
    framebuffer: &FramebufferHandle,
    input: &mut rfb_protocol::io::RfbInStream<R>,
    update: FramebufferUpdate,
    events: &flume::Sender<ServerEvent>,
) -> Result<(), RfbClientError> {
    // Apply all rectangles using decoders
    let damage = {
        let mut fb = framebuffer.lock().await;
        fb.apply_update(input, &update.rectangles).await?
    };
    if !damage.is_empty() {
        let _ = events.send(ServerEvent::FramebufferUpdated { damage });
    }
    Ok(())
}

async fn handle_command<W: tokio::io::AsyncWrite + Unpin>(
    output: &mut rfb_protocol::io::RfbOutStream<W>,
    events: &flume::Sender<ServerEvent>,
    command: ClientCommand,
    view_only: bool,
) -> Result<(), RfbClientError> {
    match command {
        ClientCommand::RequestUpdate { incremental, rect } => {
            let (x, y, w, h) = match rect {
                Some(r) => (r.x as u16, r.y as u16, r.width as u16, r.height as u16),
                None => (0, 0, u16::MAX, u16::MAX),
            };
            protocol::write_framebuffer_update_request(output, incremental, x, y, w, h).await?;
        }
        ClientCommand::Pointer { x, y, buttons } => {
            if view_only {
                tracing::trace!("dropping pointer event: view-only mode");
            } else {
                protocol::write_pointer_event(output, buttons, x, y).await?;
            }
        }
        ClientCommand::Key { key, down } => {
            if view_only {
                tracing::trace!("dropping key event: view-only mode");
            } else {
                protocol::write_key_event(output, key, down).await?;
            }
        }
        ClientCommand::ClientCutText { text } => {
            if view_only {
                tracing::trace!("dropping clipboard event: view-only mode");
            } else {
                let s = String::from_utf8_lossy(&text).to_string();
                protocol::write_client_cut_text(output, &s).await?;
            }
        }
        ClientCommand::Xvp { version, op } => {
            if view_only {
                tracing::trace!("dropping XVP command: view-only mode");
            } else {
                protocol::write_client_xvp(output, version, op).await?;
            }
        }
        ClientCommand::SetDesktopSize { width, height } => {
            if view_only {
                tracing::trace!("dropping desktop resize request: view-only mode");
            } else {
                protocol::write_set_desktop_size(output, width, height).await?;
            }
        }
        ClientCommand::Close => {
            // Graceful shutdown: notify and return error to break loop
            let _ = events.send(ServerEvent::ConnectionClosed);
            return Err(RfbClientError::ConnectionClosed);
        }
    }
    Ok(())
}
