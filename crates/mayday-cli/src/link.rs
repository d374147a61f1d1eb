//! TCP gateway link
//!
//! Implements the transport trait over a TCP connection to a mesh gateway
//! speaking newline-delimited JSON frames. The gateway announces the local
//! node's identity and minimum transmit spacing in a hello frame, then
//! relays mesh packets and position reports in both directions.
//!
//! The connection task owns the socket. On disconnect it pushes a LinkDown
//! event and retries in the background; sends issued while disconnected fail
//! immediately and are not queued; the broadcast scheduler retries on its
//! next cycle anyway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mayday_core::channel::{Event, EventSender};
use mayday_core::geo::GeoLocation;
use mayday_core::transport::Transport;
use mayday_core::types::{NodeId, Timestamp};
use mayday_core::MaydayError;

use crate::error::{CliError, Result};

/// How long to wait for the gateway's hello frame
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between reconnection attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Wire Frames
// ----------------------------------------------------------------------------

/// Newline-delimited JSON frames exchanged with the gateway
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
enum GatewayFrame {
    /// First frame after connect: local node facts
    Hello { node: u32, min_send_spacing_ms: u64 },
    /// Mesh packet in either direction; payload is hex-encoded bytes
    Packet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<u32>,
        port: u16,
        payload: String,
    },
    /// Position report from some node on the mesh
    Position {
        from: u32,
        latitude: f64,
        longitude: f64,
    },
    /// Update of the local node's position and battery
    NodeInfo {
        #[serde(default)]
        latitude: Option<f64>,
        #[serde(default)]
        longitude: Option<f64>,
        #[serde(default)]
        battery: Option<u8>,
    },
}

// ----------------------------------------------------------------------------
// Link State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LinkInfo {
    node: NodeId,
    min_send_spacing: Duration,
    position: Option<GeoLocation>,
    battery: Option<u8>,
}

/// Transport implementation over a TCP mesh gateway
pub struct TcpLink {
    outbound_tx: mpsc::Sender<GatewayFrame>,
    info: Arc<Mutex<LinkInfo>>,
    connected: Arc<AtomicBool>,
}

impl TcpLink {
    /// Connect to the gateway and wait for its hello frame. The returned
    /// link pushes inbound traffic into `events` and reconnects on its own
    /// after a drop.
    pub async fn connect(addr: &str, events: EventSender) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| CliError::Gateway(format!("connect to {addr}: {e}")))?;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let hello = read_hello(&mut reader).await?;
        let info = Arc::new(Mutex::new(hello));
        info!(
            node = %info.lock().unwrap().node,
            "connected to mesh gateway at {addr}"
        );

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_connection(
            addr.to_string(),
            reader,
            writer,
            outbound_rx,
            events,
            Arc::clone(&info),
            Arc::clone(&connected),
        ));

        Ok(Arc::new(Self {
            outbound_tx,
            info,
            connected,
        }))
    }

    async fn send_frame(&self, frame: GatewayFrame) -> mayday_core::Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MaydayError::transport_unavailable("link is down"));
        }
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| MaydayError::transport_unavailable("connection task stopped"))
    }
}

#[async_trait]
impl Transport for TcpLink {
    async fn broadcast(&self, port: u16, payload: &[u8]) -> mayday_core::Result<()> {
        self.send_frame(GatewayFrame::Packet {
            from: None,
            to: None,
            port,
            payload: hex::encode(payload),
        })
        .await
    }

    async fn send_to(&self, dest: NodeId, port: u16, payload: &[u8]) -> mayday_core::Result<()> {
        self.send_frame(GatewayFrame::Packet {
            from: None,
            to: Some(dest.as_u32()),
            port,
            payload: hex::encode(payload),
        })
        .await
    }

    fn min_send_spacing(&self) -> Duration {
        self.info.lock().unwrap().min_send_spacing
    }

    fn local_node(&self) -> NodeId {
        self.info.lock().unwrap().node
    }

    fn local_position(&self) -> Option<GeoLocation> {
        self.info.lock().unwrap().position
    }

    fn battery_level(&self) -> Option<u8> {
        self.info.lock().unwrap().battery
    }
}

// ----------------------------------------------------------------------------
// Connection Task
// ----------------------------------------------------------------------------

async fn read_hello(reader: &mut BufReader<OwnedReadHalf>) -> Result<LinkInfo> {
    let mut line = String::new();
    let read = tokio::time::timeout(HELLO_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| CliError::Gateway("timed out waiting for gateway hello".into()))?
        .map_err(|e| CliError::Gateway(format!("reading gateway hello: {e}")))?;
    if read == 0 {
        return Err(CliError::Gateway("gateway closed the connection".into()));
    }

    match serde_json::from_str(line.trim()) {
        Ok(GatewayFrame::Hello {
            node,
            min_send_spacing_ms,
        }) => Ok(LinkInfo {
            node: NodeId::new(node),
            min_send_spacing: Duration::from_millis(min_send_spacing_ms),
            position: None,
            battery: None,
        }),
        Ok(other) => Err(CliError::Gateway(format!(
            "expected hello frame, got {other:?}"
        ))),
        Err(e) => Err(CliError::Gateway(format!("malformed hello frame: {e}"))),
    }
}

async fn run_connection(
    addr: String,
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<GatewayFrame>,
    events: EventSender,
    info: Arc<Mutex<LinkInfo>>,
    connected: Arc<AtomicBool>,
) {
    let _ = events.send(Event::LinkUp).await;

    'link: loop {
        let mut line = String::new();
        tokio::select! {
            read = reader.read_line(&mut line) => {
                match read {
                    Ok(0) => {
                        warn!("gateway closed the connection");
                    }
                    Ok(_) => {
                        handle_inbound(line.trim(), &events, &info).await;
                        continue 'link;
                    }
                    Err(e) => {
                        warn!("gateway read error: {e}");
                    }
                }
            }
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else {
                    debug!("link dropped, closing connection task");
                    return;
                };
                match write_frame(&mut writer, &frame).await {
                    Ok(()) => continue 'link,
                    Err(e) => warn!("gateway write error: {e}"),
                }
            }
        }

        // Either side of the socket failed: drop the link and reconnect
        connected.store(false, Ordering::SeqCst);
        let _ = events.send(Event::LinkDown).await;

        loop {
            tokio::time::sleep(RECONNECT_DELAY).await;
            // Frames queued while down are dropped, not sent late; this also
            // detects every link handle being gone
            match outbound_rx.try_recv() {
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("link dropped while reconnecting");
                    return;
                }
                _ => {}
            }
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    let (new_reader, new_writer) = stream.into_split();
                    let mut new_reader = BufReader::new(new_reader);
                    match read_hello(&mut new_reader).await {
                        Ok(fresh) => {
                            info!(node = %fresh.node, "reconnected to mesh gateway");
                            *info.lock().unwrap() = fresh;
                            reader = new_reader;
                            writer = new_writer;
                            connected.store(true, Ordering::SeqCst);
                            let _ = events.send(Event::LinkUp).await;
                            continue 'link;
                        }
                        Err(e) => warn!("gateway handshake failed: {e}"),
                    }
                }
                Err(e) => debug!("reconnect to {addr} failed: {e}"),
            }
        }
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &GatewayFrame) -> std::io::Result<()> {
    let mut body = serde_json::to_vec(frame)?;
    body.push(b'\n');
    writer.write_all(&body).await
}

async fn handle_inbound(line: &str, events: &EventSender, info: &Arc<Mutex<LinkInfo>>) {
    if line.is_empty() {
        return;
    }

    let frame: GatewayFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("dropping malformed gateway frame: {e}");
            return;
        }
    };

    match frame {
        GatewayFrame::Packet {
            from: Some(from),
            port,
            payload,
            ..
        } => match hex::decode(&payload) {
            Ok(payload) => {
                let _ = events
                    .send(Event::PacketReceived {
                        from: NodeId::new(from),
                        port,
                        payload,
                        received_at: Timestamp::now(),
                    })
                    .await;
            }
            Err(e) => warn!("dropping packet frame with bad hex payload: {e}"),
        },
        GatewayFrame::Packet { from: None, .. } => {
            warn!("dropping inbound packet frame without a sender");
        }
        GatewayFrame::Position {
            from,
            latitude,
            longitude,
        } => match GeoLocation::new(latitude, longitude) {
            Ok(location) => {
                let _ = events
                    .send(Event::PositionReceived {
                        from: NodeId::new(from),
                        location,
                        received_at: Timestamp::now(),
                    })
                    .await;
            }
            Err(e) => warn!("dropping position frame: {e}"),
        },
        GatewayFrame::NodeInfo {
            latitude,
            longitude,
            battery,
        } => {
            let mut info = info.lock().unwrap();
            if let (Some(lat), Some(lon)) = (latitude, longitude) {
                match GeoLocation::new(lat, lon) {
                    Ok(location) => info.position = Some(location),
                    Err(e) => warn!("ignoring node info position: {e}"),
                }
            }
            if battery.is_some() {
                info.battery = battery;
            }
        }
        GatewayFrame::Hello {
            node,
            min_send_spacing_ms,
        } => {
            // Gateways may re-announce mid-connection (e.g. radio reset)
            let mut info = info.lock().unwrap();
            info.node = NodeId::new(node);
            info.min_send_spacing = Duration::from_millis(min_send_spacing_ms);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = GatewayFrame::Packet {
            from: Some(7),
            to: None,
            port: 256,
            payload: hex::encode(b"hello"),
        };
        let line = serde_json::to_string(&frame).unwrap();
        match serde_json::from_str(&line).unwrap() {
            GatewayFrame::Packet { from, port, payload, .. } => {
                assert_eq!(from, Some(7));
                assert_eq!(port, 256);
                assert_eq!(hex::decode(payload).unwrap(), b"hello");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_outbound_packet_omits_empty_fields() {
        let frame = GatewayFrame::Packet {
            from: None,
            to: None,
            port: 256,
            payload: "00".into(),
        };
        let line = serde_json::to_string(&frame).unwrap();
        assert!(!line.contains("from"));
        assert!(!line.contains("to"));
    }
}
