//! Unix-domain stream socket transport. `connect` takes a socket path as the
//! host and ignores the port.

use std::io::{self, IoSlice};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::transport::{self, Transport};

#[derive(Debug, Default)]
pub struct UnixTransport {
    stream: Option<UnixStream>,
    options: TransportConfig,
}

impl UnixTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(options: TransportConfig) -> Self {
        Self {
            stream: None,
            options,
        }
    }
}

fn classify_connect_error(err: &io::Error) -> TransportError {
    if transport::is_local_exhaustion(err) {
        TransportError::SocketCreateFailure
    } else {
        TransportError::SocketConnectFailure
    }
}

impl Transport for UnixTransport {
    fn connect(&mut self, path: &str, _port: u16) -> Result<()> {
        self.stream = None;

        let stream = UnixStream::connect(path).map_err(|e| {
            debug!(path, error = %e, "unix connect failed");
            classify_connect_error(&e)
        })?;
        stream
            .set_read_timeout(self.options.read_timeout())
            .and_then(|()| stream.set_write_timeout(self.options.write_timeout()))
            .map_err(|_| TransportError::SocketConnectFailure)?;

        debug!(path, "unix connected");
        self.stream = Some(stream);
        Ok(())
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
                debug!("unix close");
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
    use crate::error::Error;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    static TEST_COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn socket_path() -> String {
        let count = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        format!("/tmp/rawhttp_unix_test_{}_{}", std::process::id(), count)
    }

    fn setup_unix_test_server<F>(server_logic: F) -> (String, thread::JoinHandle<()>)
    where
        F: FnOnce(UnixStream) + Send + 'static,
    {
        let path = socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();
        let path_for_thread = path.clone();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                server_logic(stream);
            }
            let _ = std::fs::remove_file(&path_for_thread);
        });

        (path, handle)
    }

    #[test]
    fn construction_is_disconnected() {
        assert!(!UnixTransport::new().is_connected());
    }

    #[test]
    fn write_then_read_round_trip() {
        let (tx, rx) = mpsc::channel();
        let (path, server) = setup_unix_test_server(move |mut stream| {
            let mut buf = [0u8; 10];
            stream.read_exact(&mut buf).unwrap();
            tx.send(buf.to_vec()).unwrap();
            stream.write_all(b"hello back").unwrap();
        });

        let mut transport = UnixTransport::new();
        transport.connect(&path, 0).unwrap();
        assert_eq!(transport.write(b"hello unix").unwrap(), 10);

        let mut buf = [0u8; 32];
        let mut got = Vec::new();
        while got.len() < 10 {
            let n = transport.read(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"hello back");
        assert_eq!(rx.recv().unwrap(), b"hello unix");
        server.join().unwrap();
    }

    #[test]
    fn vectored_write_arrives_contiguous() {
        let (tx, rx) = mpsc::channel();
        let (path, server) = setup_unix_test_server(move |mut stream| {
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            tx.send(received).unwrap();
        });

        let mut unix = UnixTransport::new();
        unix.connect(&path, 0).unwrap();
        let n = unix
            .write_vectored(&[IoSlice::new(b"abc"), IoSlice::new(b"def")])
            .unwrap();
        assert_eq!(n, 6);
        unix.close().unwrap();

        assert_eq!(rx.recv().unwrap(), b"abcdef");
        server.join().unwrap();
    }

    #[test]
    fn read_after_peer_shutdown_is_connection_closed() {
        let (path, server) = setup_unix_test_server(|_stream| {});
        let mut transport = UnixTransport::new();
        transport.connect(&path, 0).unwrap();
        server.join().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(
            transport.read(&mut buf).unwrap_err(),
            Error::Transport(TransportError::ConnectionClosed)
        );
    }

    #[test]
    fn close_is_idempotent() {
        let (path, server) = setup_unix_test_server(|_stream| {});
        let mut transport = UnixTransport::new();
        transport.connect(&path, 0).unwrap();
        assert!(transport.close().is_ok());
        assert!(transport.close().is_ok());
        server.join().unwrap();
    }

    #[test]
    fn missing_socket_path_is_connect_failure() {
        let mut transport = UnixTransport::new();
        let result = transport.connect("/tmp/rawhttp_no_such_socket_here", 0);
        assert_eq!(
            result.unwrap_err(),
            Error::Transport(TransportError::SocketConnectFailure)
        );
    }
}
