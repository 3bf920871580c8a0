//! TCP stream transport.

use std::io::IoSlice;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, trace};

use crate::config::TransportConfig;
use crate::error::{Error, Result, TransportError};
use crate::transport::{self, Transport};

#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    options: TransportConfig,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(options: TransportConfig) -> Self {
        Self {
            stream: None,
            options,
        }
    }

    /// Connect to one resolved address and apply socket options. Any option
    /// that cannot be set fails the attempt.
    fn connect_one(&self, addr: &SocketAddr) -> std::result::Result<TcpStream, TransportError> {
        let stream = match self.options.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| {
            trace!(%addr, error = %e, "connect attempt failed");
            if transport::is_local_exhaustion(&e) {
                TransportError::SocketCreateFailure
            } else {
                TransportError::SocketConnectFailure
            }
        })?;

        stream
            .set_nodelay(true)
            .and_then(|()| stream.set_read_timeout(self.options.read_timeout()))
            .and_then(|()| stream.set_write_timeout(self.options.write_timeout()))
            .map_err(|_| TransportError::SocketConnectFailure)?;
        Ok(stream)
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        // A reconnect drops the previous stream.
        self.stream = None;

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| {
                debug!(host, error = %e, "dns resolution failed");
                TransportError::DnsFailure
            })?
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::DnsFailure.into());
        }

        let mut last = TransportError::SocketConnectFailure;
        for addr in &addrs {
            match self.connect_one(addr) {
                Ok(stream) => {
                    debug!(%addr, "tcp connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last = e,
            }
        }
        Err(Error::Transport(last))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        transport::stream_read(self.stream.as_mut(), buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        transport::stream_write(self.stream.as_mut(), buf)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> Result<usize> {
        transport::stream_write_vectored(self.stream.as_mut(), bufs)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(stream) => {
                debug!("tcp close");
                transport::shutdown_result(stream.shutdown(Shutdown::Both))
            }
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn setup_test_server<F>(server_logic: F) -> (SocketAddr, thread::JoinHandle<()>)
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let local_addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                server_logic(stream);
            }
        });

        (local_addr, handle)
    }

    /// A port on loopback with nothing listening.
    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn construction_is_disconnected() {
        let transport = TcpTransport::new();
        assert!(!transport.is_connected());
    }

    #[test]
    fn connect_sets_nodelay() {
        let (addr, server) = setup_test_server(|_stream| {});
        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();
        assert!(transport.stream.as_ref().unwrap().nodelay().unwrap());
        server.join().unwrap();
    }

    #[test]
    fn connect_by_hostname_tries_resolved_addresses() {
        let (addr, server) = setup_test_server(|_stream| {});
        let mut transport = TcpTransport::new();
        // "localhost" may resolve to ::1 first; the IPv4 candidate must still win.
        transport.connect("localhost", addr.port()).unwrap();
        assert!(transport.is_connected());
        server.join().unwrap();
    }

    #[test]
    fn write_then_read_round_trip() {
        let (tx, rx) = mpsc::channel();
        let (addr, server) = setup_test_server(move |mut stream| {
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            tx.send(buf.to_vec()).unwrap();
            stream.write_all(b"world").unwrap();
        });

        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();
        assert_eq!(transport.write(b"hello").unwrap(), 5);

        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        while got.len() < 5 {
            let n = transport.read(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"world");
        assert_eq!(rx.recv().unwrap(), b"hello");
        server.join().unwrap();
    }

    #[test]
    fn vectored_write_arrives_contiguous() {
        let (tx, rx) = mpsc::channel();
        let (addr, server) = setup_test_server(move |mut stream| {
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            tx.send(received).unwrap();
        });

        let mut tcp = TcpTransport::new();
        tcp.connect(&addr.ip().to_string(), addr.port()).unwrap();
        let mut bufs = [IoSlice::new(b"head\r\n\r\n"), IoSlice::new(b"body")];
        transport::write_all_vectored(&mut tcp, &mut bufs).unwrap();
        tcp.close().unwrap();

        assert_eq!(rx.recv().unwrap(), b"head\r\n\r\nbody");
        server.join().unwrap();
    }

    #[test]
    fn read_after_peer_shutdown_is_connection_closed() {
        let (addr, server) = setup_test_server(|_stream| {});
        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();
        server.join().unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(
            transport.read(&mut buf).unwrap_err(),
            Error::Transport(TransportError::ConnectionClosed)
        );
    }

    #[test]
    fn close_is_idempotent() {
        let (addr, server) = setup_test_server(|_stream| {});
        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();
        assert!(transport.close().is_ok());
        assert!(transport.close().is_ok());
        assert!(!transport.is_connected());
        server.join().unwrap();
    }

    #[test]
    fn close_without_connect_succeeds() {
        assert!(TcpTransport::new().close().is_ok());
    }

    #[test]
    fn connect_refused_is_socket_connect_failure() {
        let mut transport = TcpTransport::new();
        let result = transport.connect("127.0.0.1", closed_port());
        assert_eq!(
            result.unwrap_err(),
            Error::Transport(TransportError::SocketConnectFailure)
        );
    }

    #[test]
    fn unresolvable_host_is_dns_failure() {
        let mut transport = TcpTransport::new();
        let result = transport.connect("this-is-not-a-real-domain.invalid", 80);
        assert_eq!(result.unwrap_err(), Error::Transport(TransportError::DnsFailure));
    }

    #[test]
    fn read_timeout_surfaces_as_read_failure() {
        let (addr, server) = setup_test_server(|stream| {
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });
        let mut transport = TcpTransport::with_config(TransportConfig {
            read_timeout_ms: Some(50),
            ..TransportConfig::default()
        });
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(
            transport.read(&mut buf).unwrap_err(),
            Error::Transport(TransportError::SocketReadFailure)
        );
        server.join().unwrap();
    }

    #[test]
    fn io_on_unconnected_transport_fails() {
        let mut transport = TcpTransport::new();
        let mut buf = [0u8; 4];
        assert_eq!(
            transport.read(&mut buf).unwrap_err(),
            Error::Transport(TransportError::SocketReadFailure)
        );
        assert_eq!(
            transport.write(b"x").unwrap_err(),
            Error::Transport(TransportError::SocketWriteFailure)
        );
    }
}
