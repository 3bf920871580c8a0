//! In-memory doubles for exercising the protocol engine without sockets.
//!
//! Available to this crate's unit tests and, through the `test-util`
//! feature, to integration tests and downstream crates.

use std::collections::VecDeque;
use std::io::IoSlice;

use crate::buffer::{AllocFailure, BufferAllocator, SystemAllocator};
use crate::error::{Result, TransportError};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadStep {
    Data(Vec<u8>),
    Closed,
    Fail(TransportError),
}

/// A transport that replays scripted reads and records every write.
///
/// Each `Data` step is delivered by one or more `read` calls; a read never
/// spans two steps, so chunk boundaries are exactly where the script puts
/// them. Once the script runs out the peer looks closed.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    reads: VecDeque<ReadStep>,
    written: Vec<u8>,
    write_calls: usize,
    vectored_calls: usize,
    close_calls: usize,
    max_write: Option<usize>,
    connected: bool,
    connects: Vec<(String, u16)>,
}

impl ScriptedTransport {
    /// Not connected; `connect` must be called before any IO succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Queue `bytes` as a single read step.
    pub fn respond(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.push_response(bytes);
        self
    }

    /// Queue `bytes` split at the given offsets. Offsets outside the data or
    /// producing empty chunks are ignored.
    pub fn respond_split(mut self, bytes: impl AsRef<[u8]>, cuts: &[usize]) -> Self {
        let bytes = bytes.as_ref();
        let mut start = 0;
        for &cut in cuts {
            if cut > start && cut < bytes.len() {
                self.reads.push_back(ReadStep::Data(bytes[start..cut].to_vec()));
                start = cut;
            }
        }
        if start < bytes.len() {
            self.reads.push_back(ReadStep::Data(bytes[start..].to_vec()));
        }
        self
    }

    pub fn then_close(mut self) -> Self {
        self.reads.push_back(ReadStep::Closed);
        self
    }

    pub fn then_fail(mut self, err: TransportError) -> Self {
        self.reads.push_back(ReadStep::Fail(err));
        self
    }

    /// Cap every write (plain or vectored) at `n` bytes.
    pub fn max_write(mut self, n: usize) -> Self {
        self.max_write = Some(n);
        self
    }

    pub fn push_response(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        if !bytes.is_empty() {
            self.reads.push_back(ReadStep::Data(bytes.to_vec()));
        }
    }

    /// Drop every read step not yet consumed.
    pub fn discard_pending(&mut self) {
        self.reads.clear();
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    pub fn vectored_calls(&self) -> usize {
        self.vectored_calls
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls
    }

    pub fn connects(&self) -> &[(String, u16)] {
        &self.connects
    }

    fn accept(&self, len: usize) -> usize {
        self.max_write.map_or(len, |cap| len.min(cap))
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.connects.push((host.to_string(), port));
        self.connected = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.connected {
            return Err(TransportError::SocketReadFailure.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        match self.reads.pop_front() {
            None => Err(TransportError::ConnectionClosed.into()),
            Some(ReadStep::Closed) => {
                self.reads.push_front(ReadStep::Closed);
                Err(TransportError::ConnectionClosed.into())
            }
            Some(ReadStep::Fail(err)) => Err(err.into()),
            Some(ReadStep::Data(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.reads.push_front(ReadStep::Data(chunk.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.connected {
            return Err(TransportError::SocketWriteFailure.into());
        }
        self.write_calls += 1;
        let n = self.accept(buf.len());
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> Result<usize> {
        if !self.connected {
            return Err(TransportError::SocketWriteFailure.into());
        }
        self.vectored_calls += 1;
        let mut budget = self.accept(bufs.iter().map(|b| b.len()).sum());
        let mut total = 0;
        for buf in bufs {
            let n = buf.len().min(budget);
            self.written.extend_from_slice(&buf[..n]);
            total += n;
            budget -= n;
            if budget == 0 {
                break;
            }
        }
        Ok(total)
    }

    fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Grants the first `grants` reservations, then refuses every one after.
#[derive(Debug)]
pub struct FailingAllocator {
    grants: usize,
}

impl FailingAllocator {
    pub fn after(grants: usize) -> Self {
        Self { grants }
    }
}

impl BufferAllocator for FailingAllocator {
    fn reserve(&mut self, storage: &mut Vec<u8>, additional: usize) -> std::result::Result<(), AllocFailure> {
        if self.grants == 0 {
            return Err(AllocFailure {
                requested: storage.len() + additional,
            });
        }
        self.grants -= 1;
        SystemAllocator.reserve(storage, additional)
    }
}
