//! Where packets go once the application decides to send them.
//!
//! The application only sees the [`Transport`] trait. [`MemorySink`] keeps everything in process (it
//! plays the role of the receiving node); [`UdpTransport`] and [`TcpTransport`] write to real sockets.

use crate::error::TransportError;
use crate::structs::*;

use std::cell::RefCell;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::rc::Rc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Connected,
    /// The outcome will be notified later through the application's connection handlers
    Pending,
}

pub trait Transport {
    fn bind(&mut self) -> Result<(), TransportError>;
    fn connect(&mut self, remote: SocketAddr) -> Result<ConnectStatus, TransportError>;
    /// Returns whether the packet was handed over
    fn send(&mut self, packet: &Packet) -> bool;
    fn close(&mut self);
}

/// Builds the transport of an application on its first start
pub type TransportFactory = Box<dyn FnMut(L4Proto, SocketAddr) -> Box<dyn Transport>>;

// Memory transport

/// How the in-memory receiver answers connection requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehavior {
    #[default]
    Accept,
    /// Wait for `MemorySink::establish`
    Defer,
    Refuse,
}

#[derive(Debug, Default)]
struct SinkState {
    behavior: ConnectBehavior,
    established: bool,
    binds: u32,
    connects: u32,
    closes: u32,
    received: Vec<Packet>,
}

/// In-process packet receiver shared by every transport it creates
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Rc<RefCell<SinkState>>);

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: ConnectBehavior) -> Self {
        let sink = Self::default();
        sink.0.borrow_mut().behavior = behavior;
        sink
    }

    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            sink: self.clone(),
            remote: None,
            closed: false,
        }
    }

    pub fn factory(&self) -> TransportFactory {
        let sink = self.clone();
        Box::new(move |_: L4Proto, _: SocketAddr| -> Box<dyn Transport> {
            Box::new(sink.transport())
        })
    }

    /// Complete a deferred connection
    pub fn establish(&self) {
        self.0.borrow_mut().established = true;
    }

    pub fn is_established(&self) -> bool {
        self.0.borrow().established
    }

    pub fn received(&self) -> Vec<Packet> {
        self.0.borrow().received.clone()
    }

    pub fn received_count(&self) -> usize {
        self.0.borrow().received.len()
    }

    pub fn binds(&self) -> u32 {
        self.0.borrow().binds
    }

    pub fn connects(&self) -> u32 {
        self.0.borrow().connects
    }

    pub fn closes(&self) -> u32 {
        self.0.borrow().closes
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    sink: MemorySink,
    remote: Option<SocketAddr>,
    closed: bool,
}

impl MemoryTransport {
    /// Address given to the last connection request
    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }
}

impl Transport for MemoryTransport {
    fn bind(&mut self) -> Result<(), TransportError> {
        self.sink.0.borrow_mut().binds += 1;
        Ok(())
    }

    fn connect(&mut self, remote: SocketAddr) -> Result<ConnectStatus, TransportError> {
        let mut state = self.sink.0.borrow_mut();
        state.connects += 1;
        self.remote = Some(remote);
        match state.behavior {
            ConnectBehavior::Accept => {
                state.established = true;
                Ok(ConnectStatus::Connected)
            }
            ConnectBehavior::Defer => Ok(ConnectStatus::Pending),
            ConnectBehavior::Refuse => Err(TransportError::Refused(remote)),
        }
    }

    fn send(&mut self, packet: &Packet) -> bool {
        let mut state = self.sink.0.borrow_mut();
        if self.closed || !state.established {
            return false;
        }
        state.received.push(packet.clone());
        true
    }

    fn close(&mut self) {
        let mut state = self.sink.0.borrow_mut();
        state.closes += 1;
        state.established = false;
        self.closed = true;
    }
}

// Socket transports

/// Sends each packet as one datagram of `size` zero bytes
#[derive(Debug)]
pub struct UdpTransport {
    local: SocketAddr,
    socket: Option<UdpSocket>,
    buffer: Vec<u8>,
}

impl UdpTransport {
    /// The local socket uses the address family of `remote`
    pub fn new(remote: SocketAddr) -> Self {
        let local = if remote.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        UdpTransport {
            local,
            socket: None,
            buffer: vec![],
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl Transport for UdpTransport {
    fn bind(&mut self) -> Result<(), TransportError> {
        self.socket = Some(UdpSocket::bind(self.local)?);
        Ok(())
    }

    fn connect(&mut self, remote: SocketAddr) -> Result<ConnectStatus, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        socket.connect(remote)?;
        Ok(ConnectStatus::Connected)
    }

    fn send(&mut self, packet: &Packet) -> bool {
        let Some(socket) = self.socket.as_ref() else {
            return false;
        };
        self.buffer.resize(packet.size as usize, 0);
        match socket.send(&self.buffer) {
            Ok(_) => true,
            Err(e) => {
                log::trace!("UDP send failed: {e}");
                false
            }
        }
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

/// Writes `size` zero bytes per packet on a TCP stream
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    buffer: Vec<u8>,
}

impl Transport for TcpTransport {
    fn bind(&mut self) -> Result<(), TransportError> {
        // the local port is chosen by the OS at connection time
        Ok(())
    }

    fn connect(&mut self, remote: SocketAddr) -> Result<ConnectStatus, TransportError> {
        let stream = TcpStream::connect_timeout(&remote, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(ConnectStatus::Connected)
    }

    fn send(&mut self, packet: &Packet) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        self.buffer.resize(packet.size as usize, 0);
        match stream.write_all(&self.buffer) {
            Ok(()) => true,
            Err(e) => {
                log::trace!("TCP send failed: {e}");
                false
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Transports backed by real sockets
pub fn socket_factory() -> TransportFactory {
    Box::new(|proto: L4Proto, remote: SocketAddr| -> Box<dyn Transport> {
        match proto {
            L4Proto::UDP => Box::new(UdpTransport::new(remote)),
            L4Proto::TCP => Box::new(TcpTransport::default()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    fn packet(size: u32) -> Packet {
        Packet {
            seq: 0,
            size,
            timestamp: Duration::ZERO,
            active_bursts: 1,
        }
    }

    fn remote() -> SocketAddr {
        "10.1.1.2:9".parse().unwrap()
    }

    #[test]
    fn memory_accept() {
        let sink = MemorySink::new();
        let mut t = sink.transport();
        t.bind().unwrap();
        assert_eq!(t.connect(remote()).unwrap(), ConnectStatus::Connected);
        assert!(t.send(&packet(10)));
        t.close();
        assert!(!t.send(&packet(10)));
        assert_eq!(sink.received_count(), 1);
        assert_eq!((sink.binds(), sink.connects(), sink.closes()), (1, 1, 1));
    }

    #[test]
    fn memory_defer_then_establish() {
        let sink = MemorySink::with_behavior(ConnectBehavior::Defer);
        let mut t = sink.transport();
        assert_eq!(t.connect(remote()).unwrap(), ConnectStatus::Pending);
        assert!(!t.send(&packet(10)));
        sink.establish();
        assert!(t.send(&packet(10)));
    }

    #[test]
    fn memory_refuse() {
        let sink = MemorySink::with_behavior(ConnectBehavior::Refuse);
        let mut t = sink.transport();
        assert!(matches!(
            t.connect(remote()),
            Err(TransportError::Refused(_))
        ));
        assert!(!t.send(&packet(10)));
    }

    #[test]
    fn udp_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut t = UdpTransport::new(receiver.local_addr().unwrap());
        t.bind().unwrap();
        t.connect(receiver.local_addr().unwrap()).unwrap();
        assert!(t.send(&packet(100)));
        let mut buf = [0xffu8; 2048];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(n, 100);
        assert!(buf[..n].iter().all(|b| *b == 0));
        t.close();
        assert!(!t.send(&packet(100)));
    }

    #[test]
    fn tcp_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut t = TcpTransport::default();
        t.bind().unwrap();
        t.connect(listener.local_addr().unwrap()).unwrap();
        assert!(t.send(&packet(64)));
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 64];
        stream.read_exact(&mut buf).unwrap();
        t.close();
        assert!(!t.send(&packet(64)));
    }
}
