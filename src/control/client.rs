//! ZeroMQ request/reply channel to the enforcement process.
//!
//! The enforcement process serves a REP socket, so the channel is a REQ
//! socket and keeps strict alternation: every request is followed by exactly
//! one reply before the next request may be sent. A REQ socket whose exchange
//! failed is stuck mid-cycle, so it is closed and reopened on the next connect.

use std::time::Duration;

use super::ControllerConfig;
use crate::common::error::{ChannelError, ChannelErrorKind, Result};

/// Synchronous request/reply transport used by the MAC program controller.
pub trait RequestReply {
    /// Establish the connection. Calling it again while connected is a no-op.
    fn connect(&mut self) -> Result<()>;

    /// Send one message and block until its reply arrives.
    ///
    /// Fails with `Error::Channel` on transport failure; there is no retry.
    fn send_and_receive(&mut self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Close the connection if one is open.
    fn release(&mut self);

    fn is_connected(&self) -> bool;
}

fn millis(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

/// Lazily connected REQ socket, one per controller.
pub struct ControlChannel {
    endpoint: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    socket: Option<zmq::Socket>,
    context: zmq::Context,
}

impl ControlChannel {
    /// `endpoint` is a ZeroMQ address such as `tcp://127.0.0.1:1217`.
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
            request_timeout,
            socket: None,
            context: zmq::Context::new(),
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.control_endpoint(), config.connect_timeout(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn open(&self) -> std::result::Result<zmq::Socket, ChannelError> {
        let socket = self
            .context
            .socket(zmq::REQ)
            .map_err(|e| ChannelError::from_zmq("create REQ socket", e))?;
        let configure = |socket: &zmq::Socket| -> std::result::Result<(), zmq::Error> {
            // Pending requests are discarded on close instead of blocking context shutdown.
            socket.set_linger(0)?;
            socket.set_connect_timeout(millis(self.connect_timeout))?;
            socket.set_sndtimeo(millis(self.request_timeout))?;
            socket.set_rcvtimeo(millis(self.request_timeout))
        };
        configure(&socket).map_err(|e| ChannelError::from_zmq("configure socket", e))?;
        socket
            .connect(&self.endpoint)
            .map_err(|e| ChannelError::from_zmq(&format!("connect to {}", self.endpoint), e))?;
        Ok(socket)
    }
}

impl RequestReply for ControlChannel {
    fn connect(&mut self) -> Result<()> {
        if self.socket.is_none() {
            log::debug!("Connecting control channel to {}", self.endpoint);
            self.socket = Some(self.open()?);
            log::info!("Control channel connected to {}", self.endpoint);
        }
        Ok(())
    }

    fn send_and_receive(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ChannelError::new(ChannelErrorKind::Io, "control channel is not connected"))?;

        let exchange = socket
            .send(payload, 0)
            .map_err(|e| ChannelError::from_zmq("send request", e))
            .and_then(|_| socket.recv_bytes(0).map_err(|e| ChannelError::from_zmq("receive reply", e)));

        match exchange {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.socket = None;
                log::warn!("Control channel to {} dropped: {}", self.endpoint, e);
                Err(e.into())
            }
        }
    }

    fn release(&mut self) {
        if self.socket.take().is_some() {
            log::info!("Control channel to {} released", self.endpoint);
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Error;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn channel_to(endpoint: &str, request_timeout: Duration) -> ControlChannel {
        ControlChannel::new(endpoint, Duration::from_secs(1), request_timeout)
    }

    /// REP peer replying `ACK:<request>` to `count` requests.
    fn spawn_ack_server(count: usize) -> (String, thread::JoinHandle<Vec<Vec<u8>>>) {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::REP).unwrap();
        socket.bind("tcp://127.0.0.1:*").unwrap();
        let endpoint = socket.get_last_endpoint().unwrap().unwrap();
        let handle = thread::spawn(move || {
            let _context = context;
            let mut received = Vec::new();
            for _ in 0..count {
                let request = socket.recv_bytes(0).unwrap();
                let mut reply = b"ACK:".to_vec();
                reply.extend_from_slice(&request);
                socket.send(reply, 0).unwrap();
                received.push(request);
            }
            received
        });
        (endpoint, handle)
    }

    fn unused_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("tcp://{}", listener.local_addr().unwrap())
    }

    #[test]
    fn test_request_reply_alternation_over_one_socket() {
        let (endpoint, server) = spawn_ack_server(3);
        let mut channel = channel_to(&endpoint, Duration::from_secs(2));
        assert!(!channel.is_connected());

        channel.connect().unwrap();
        channel.connect().unwrap();
        assert!(channel.is_connected());

        assert_eq!(channel.send_and_receive(b"1,04:F0:21:17:36:68,0").unwrap(), b"ACK:1,04:F0:21:17:36:68,0".to_vec());
        assert_eq!(channel.send_and_receive(b"").unwrap(), b"ACK:".to_vec());
        assert_eq!(channel.send_and_receive(b"TERMINATE").unwrap(), b"ACK:TERMINATE".to_vec());

        channel.release();
        assert!(!channel.is_connected());
        assert_eq!(
            server.join().unwrap(),
            vec![b"1,04:F0:21:17:36:68,0".to_vec(), Vec::new(), b"TERMINATE".to_vec()]
        );
    }

    #[test]
    fn test_payload_bytes_are_not_framed() {
        let (endpoint, server) = spawn_ack_server(1);
        let mut channel = channel_to(&endpoint, Duration::from_secs(2));
        channel.connect().unwrap();
        assert_eq!(channel.send_and_receive(b"a\nb").unwrap(), b"ACK:a\nb".to_vec());
        assert_eq!(server.join().unwrap(), vec![b"a\nb".to_vec()]);
    }

    #[test]
    fn test_speaks_zmtp_on_the_wire() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("tcp://{}", listener.local_addr().unwrap());
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut signature = [0u8; 10];
            stream.read_exact(&mut signature).unwrap();
            signature
        });

        let mut channel = channel_to(&endpoint, Duration::from_millis(200));
        channel.connect().unwrap();
        // The raw listener never completes the handshake, so no reply arrives.
        assert!(channel.send_and_receive(b"TERMINATE").is_err());

        let signature = peer.join().unwrap();
        assert_eq!(signature[0], 0xFF);
        assert_eq!(signature[9], 0x7F);
    }

    #[test]
    fn test_send_without_connect_fails() {
        let mut channel = channel_to(&unused_endpoint(), Duration::from_secs(1));
        assert!(matches!(channel.send_and_receive(b"x"), Err(Error::Channel(_))));
    }

    #[test]
    fn test_reply_timeout_drops_socket() {
        let mut channel = channel_to(&unused_endpoint(), Duration::from_millis(100));
        channel.connect().unwrap();
        match channel.send_and_receive(b"0,FF:FF:FF:FF:FF:FF,255") {
            Err(Error::Channel(err)) => assert_eq!(err.kind, ChannelErrorKind::Timeout),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_reconnect_after_timeout_reaches_new_peer() {
        let (endpoint, server) = spawn_ack_server(1);
        let mut channel = channel_to(&unused_endpoint(), Duration::from_millis(100));
        channel.connect().unwrap();
        assert!(channel.send_and_receive(b"lost").is_err());

        channel.endpoint = endpoint;
        channel.connect().unwrap();
        assert_eq!(channel.send_and_receive(b"again").unwrap(), b"ACK:again".to_vec());
        server.join().unwrap();
    }
}
