//! UdpTransport - IP multicast on a LAN
//!
//! Every device on the segment joins one multicast group and hears every
//! other device directly, so messages are not echoed on the transport being
//! followed unless configured. Datagrams are read by a background tokio task
//! into a bounded channel and decoded on the engine thread when drained.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use bytes::Bytes;
use contracts::{
    DeviceId, Milliseconds, SyncMessage, Transport, TransportKind, TransportStatus, UdpConfig,
};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::backoff::ReconnectBackoff;
use crate::error::TransportError;
use crate::schedule::SendSchedule;

/// Datagrams buffered between the receive task and the engine.
const INBOUND_CAPACITY: usize = 256;

/// Largest datagram read; anything longer is truncated and still decoded.
const RECV_BUFFER_LEN: usize = 2048;

#[derive(Debug)]
enum Inbound {
    Datagram { payload: Bytes, from: SocketAddr },
    Failed(String),
}

#[derive(Debug)]
struct Link {
    socket: Arc<UdpSocket>,
    inbound: Receiver<Inbound>,
    task: JoinHandle<()>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug)]
struct UdpState {
    status: TransportStatus,
    schedule: SendSchedule,
    backoff: ReconnectBackoff,
    link: Option<Link>,
}

/// Multicast UDP transport.
#[derive(Debug)]
pub struct UdpTransport {
    config: UdpConfig,
    label: String,
    runtime: Handle,
    state: Mutex<UdpState>,
}

impl UdpTransport {
    /// Create a transport whose socket tasks run on `runtime`.
    ///
    /// The socket is opened lazily on the first engine call, so creation never
    /// fails.
    pub fn new(config: UdpConfig, runtime: Handle) -> Self {
        let label = config.label();
        Self {
            state: Mutex::new(UdpState {
                status: TransportStatus::Initializing,
                schedule: SendSchedule::new(config.min_send_interval_ms),
                backoff: ReconnectBackoff::default(),
                link: None,
            }),
            config,
            label,
            runtime,
        }
    }

    /// Create a transport on the current tokio runtime.
    pub fn on_current_runtime(config: UdpConfig) -> Result<Self, TransportError> {
        let runtime = Handle::try_current().map_err(|e| TransportError::NoRuntime(e.to_string()))?;
        Ok(Self::new(config, runtime))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, UdpState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, state: &mut UdpState, status: TransportStatus, now: Milliseconds) {
        if state.status != status {
            info!(now, transport = %self.label, from = %state.status, to = %status, "transport status changed");
            state.status = status;
            observability::record_transport_status(&self.label, status);
        }
    }

    /// Open the socket if the connection is down and backoff allows it.
    fn check_status(&self, state: &mut UdpState, now: Milliseconds) {
        match state.status {
            TransportStatus::Connected => {}
            TransportStatus::ConnectionFailed | TransportStatus::Disconnected
                if !state.backoff.ready(now) => {}
            _ => self.connect(state, now),
        }
    }

    fn connect(&self, state: &mut UdpState, now: Milliseconds) {
        self.set_status(state, TransportStatus::Connecting, now);
        match self.open() {
            Ok(link) => {
                info!(
                    transport = %self.label,
                    group = %self.config.group(),
                    interface = %self.config.interface,
                    "joined multicast group"
                );
                state.link = Some(link);
                state.backoff.succeeded();
                self.set_status(state, TransportStatus::Connected, now);
            }
            Err(err) => {
                warn!(transport = %self.label, error = %err, retry_in_ms = state.backoff.current_delay(), "udp connection failed");
                self.fail(state, now);
            }
        }
    }

    fn fail(&self, state: &mut UdpState, now: Milliseconds) {
        state.link = None;
        state.backoff.failed(now);
        self.set_status(state, TransportStatus::ConnectionFailed, now);
    }

    #[instrument(name = "udp_transport_open", skip(self), fields(transport = %self.label))]
    fn open(&self) -> Result<Link, TransportError> {
        let port = self.config.port;
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::bind(port, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::bind(port, e))?;
        #[cfg(unix)]
        socket
            .set_reuse_port(true)
            .map_err(|e| TransportError::bind(port, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::bind(port, e))?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket
            .bind(&bind_addr.into())
            .map_err(|e| TransportError::bind(port, e))?;

        let group = self.config.multicast_addr;
        let interface = self.config.interface;
        socket
            .join_multicast_v4(&group, &interface)
            .map_err(|source| TransportError::JoinMulticast {
                group,
                interface,
                source,
            })?;
        socket.set_multicast_loop_v4(false)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = {
            let _guard = self.runtime.enter();
            Arc::new(UdpSocket::from_std(std_socket)?)
        };

        let (tx, rx) = bounded(INBOUND_CAPACITY);
        let task = self
            .runtime
            .spawn(receive_loop(Arc::clone(&socket), tx, self.label.clone()));

        Ok(Link {
            socket,
            inbound: rx,
            task,
        })
    }

    fn send(&self, state: &mut UdpState, now: Milliseconds) {
        let Some(link) = state.link.as_ref() else {
            return;
        };
        let Some(message) = state.schedule.poll(now) else {
            return;
        };

        let payload = wire_codec::encode(&message, now);
        let target = SocketAddr::V4(self.config.group());
        match link.socket.try_send_to(&payload, target) {
            Ok(sent) => {
                trace!(transport = %self.label, bytes = sent, message = %message, "sent");
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!(transport = %self.label, "socket busy, skipping send");
            }
            Err(e) => {
                warn!(transport = %self.label, error = %e, "udp send failed");
                self.fail(state, now);
            }
        }
    }
}

impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn status(&self) -> TransportStatus {
        self.lock().status
    }

    fn local_device_id(&self) -> Option<DeviceId> {
        None
    }

    fn set_message_to_send(&self, message: &SyncMessage, _now: Milliseconds) {
        self.lock().schedule.set(message);
    }

    fn disable_sending(&self, _now: Milliseconds) {
        self.lock().schedule.disable();
    }

    fn trigger_send_asap(&self, now: Milliseconds) {
        let mut state = self.lock();
        state.schedule.trigger_asap();
        if state.status.is_connected() {
            self.send(&mut state, now);
        }
    }

    fn received_messages(&self, now: Milliseconds) -> Vec<SyncMessage> {
        let mut state = self.lock();
        self.check_status(&mut state, now);

        let mut messages = Vec::new();
        let mut failure = None;
        if let Some(link) = state.link.as_ref() {
            loop {
                match link.inbound.try_recv() {
                    Ok(Inbound::Datagram { payload, from }) => {
                        match wire_codec::decode(&payload, now) {
                            Ok(mut message) => {
                                message.receipt_details = from.to_string();
                                trace!(transport = %self.label, message = %message, "received");
                                messages.push(message);
                            }
                            Err(err) => {
                                debug!(transport = %self.label, %from, error = %err, "dropping malformed datagram");
                                observability::record_message_dropped("malformed");
                            }
                        }
                    }
                    Ok(Inbound::Failed(reason)) => {
                        failure = Some(reason);
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Closed) => {
                        failure = Some("receive task stopped".to_string());
                        break;
                    }
                }
            }
        }

        if let Some(reason) = failure {
            warn!(transport = %self.label, reason = %reason, "udp receive failed");
            self.fail(&mut state, now);
        }
        messages
    }

    fn should_echo(&self) -> bool {
        self.config.echo
    }

    fn run_loop(&self, now: Milliseconds) {
        let mut state = self.lock();
        self.check_status(&mut state, now);
        if state.status.is_connected() {
            self.send(&mut state, now);
        }
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, tx: Sender<Inbound>, label: String) {
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let datagram = Inbound::Datagram {
                    payload: Bytes::copy_from_slice(&buf[..len]),
                    from,
                };
                match tx.try_send(datagram) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(transport = %label, "inbound queue full, dropping datagram");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            Err(e) => {
                let _ = tx.try_send(Inbound::Failed(e.to_string()));
                break;
            }
        }
    }
    debug!(transport = %label, "udp receive task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> UdpConfig {
        UdpConfig {
            port,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_starts_initializing() {
        let transport = UdpTransport::on_current_runtime(config(46_699)).unwrap();
        assert_eq!(transport.status(), TransportStatus::Initializing);
        assert_eq!(transport.kind(), TransportKind::Udp);
        assert!(transport.local_device_id().is_none());
        assert!(!transport.should_echo());
        assert_eq!(transport.label(), "udp://224.0.0.169:46699");
    }

    #[test]
    fn test_requires_runtime() {
        let result = UdpTransport::on_current_runtime(config(46_698));
        assert!(matches!(result, Err(TransportError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_drain_never_blocks() {
        let transport = UdpTransport::on_current_runtime(config(46_697)).unwrap();
        // Connection may or may not succeed in a sandbox; either way the call
        // returns without blocking and leaves a settled status.
        let messages = transport.received_messages(1_000);
        assert!(messages.is_empty());
        assert!(matches!(
            transport.status(),
            TransportStatus::Connected | TransportStatus::ConnectionFailed
        ));
    }

    #[tokio::test]
    async fn test_failed_connection_waits_for_backoff() {
        let transport = UdpTransport::on_current_runtime(config(46_696)).unwrap();
        {
            let mut state = transport.lock();
            transport.fail(&mut state, 1_000);
        }
        transport.run_loop(1_500);
        assert_eq!(transport.status(), TransportStatus::ConnectionFailed);
    }
}
