//! Datagram transport - the receive endpoint behind the handler.
//!
//! The handler only sees `DatagramTransport` and `TransportBinder`, so the
//! socket backend can be swapped (or made to fail) without touching the
//! receive loop. `UdpTransport` uses the standard library socket, which
//! selects the platform implementation at build time.

use std::io;
use std::net::{SocketAddr, UdpSocket};

/// A non-blocking source of datagrams.
pub trait DatagramTransport: Send {
    /// Read one datagram into `buf`.
    ///
    /// Returns `Ok(None)` when nothing is waiting; never blocks.
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// Address the endpoint is bound to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Creates bound transports on demand.
pub trait TransportBinder: Send + Sync {
    fn bind(&self, addr: SocketAddr) -> io::Result<Box<dyn DatagramTransport>>;
}

/// Non-blocking UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind and switch the socket to non-blocking mode.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }
}

impl DatagramTransport for UdpTransport {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((len, _peer)) => Ok(Some(len)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Binds [`UdpTransport`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct UdpBinder;

impl TransportBinder for UdpBinder {
    fn bind(&self, addr: SocketAddr) -> io::Result<Box<dyn DatagramTransport>> {
        Ok(Box::new(UdpTransport::bind(addr)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_empty_socket_does_not_block() {
        let mut transport = UdpTransport::bind(loopback()).unwrap();
        let mut buf = [0u8; 64];
        let start = Instant::now();
        assert!(transport.try_recv(&mut buf).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_receives_datagram() {
        let mut transport = UdpBinder.bind(loopback()).unwrap();
        let target = transport.local_addr().unwrap();

        let sender = UdpSocket::bind(loopback()).unwrap();
        sender.send_to(b"AAPL,1,1,BUY", target).unwrap();

        let mut buf = [0u8; 64];
        let deadline = Instant::now() + Duration::from_secs(2);
        let len = loop {
            if let Some(len) = transport.try_recv(&mut buf).unwrap() {
                break len;
            }
            assert!(Instant::now() < deadline, "datagram never arrived");
            std::thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(&buf[..len], b"AAPL,1,1,BUY");
    }

    #[test]
    fn test_port_in_use_fails() {
        let first = UdpTransport::bind(loopback()).unwrap();
        let taken = first.local_addr().unwrap();
        assert!(UdpTransport::bind(taken).is_err());
    }
}
