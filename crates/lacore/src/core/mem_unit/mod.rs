//! Memory unit: Request Tracker and Read/Write Pipes.
//!
//! With `C` channels configured, channels `0..C-1` each carry one read pipe
//! and channel `C-1` carries the write pipe. A request's continuation names
//! the pipe its response belongs to; [`Pipes::route`] hands it over.

/// Element-to-request grouping.
pub mod plan;
/// Borrowed timing and atomic access bundles.
pub mod ports;
/// Read Pipe.
pub mod read_pipe;
/// Request Tracker.
pub mod tracker;
/// Write Pipe.
pub mod write_pipe;

pub use ports::{AtomicMem, Issue, MemPorts};
pub use read_pipe::ReadPipe;
pub use tracker::{Completed, Continuation, OutstandingRequest, ReqId, RequestSpec, RequestTracker};
pub use write_pipe::WritePipe;

use crate::common::Fault;
use crate::config::MemUnitConfig;

/// Event carried by the simulation queue.
#[derive(Debug)]
pub enum MemEvent {
    /// A memory access finished; `result` holds read data or the fault.
    Response {
        /// Request the response belongs to.
        id: ReqId,
        /// Bytes read (empty for writes) or the access fault.
        result: Result<Vec<u8>, Fault>,
    },
}

/// The pipes of one hardware thread.
#[derive(Debug)]
pub struct Pipes {
    /// Read pipes, one per read channel.
    pub readers: Vec<ReadPipe>,
    /// The write pipe on the last channel.
    pub writer: WritePipe,
}

impl Pipes {
    /// Builds the pipes for a validated memory-unit configuration.
    pub fn new(config: &MemUnitConfig) -> Self {
        let reads = config.read_pipes();
        Self {
            readers: (0..reads)
                .map(|i| ReadPipe::new(i, i, config.coalesce))
                .collect(),
            writer: WritePipe::new(reads, config.coalesce),
        }
    }

    /// Delivers a completed request to the pipe its continuation names.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Protocol`] if the continuation names a missing pipe.
    pub fn route(&mut self, completed: Completed) -> Result<(), Fault> {
        match completed.request.continuation {
            Continuation::ReadElements { pipe, first, count } => {
                let reader = self.readers.get_mut(pipe).ok_or_else(|| {
                    Fault::protocol(format!("response for missing read pipe {pipe}"))
                })?;
                reader.on_response(first, count, completed.result);
            }
            Continuation::WriteElements { count, .. } => {
                self.writer.on_ack(count, completed.result);
            }
        }
        Ok(())
    }

    /// Lets every pipe issue what it can this cycle.
    ///
    /// # Errors
    ///
    /// Fatal faults only.
    pub fn tick(&mut self, ports: &mut MemPorts<'_>) -> Result<(), Fault> {
        for reader in &mut self.readers {
            reader.tick(ports)?;
        }
        self.writer.tick(ports)
    }

    /// Cancels every stream.
    pub fn cancel_all(&mut self) {
        self.readers.iter_mut().for_each(ReadPipe::cancel);
        self.writer.cancel();
    }

    /// Forgets every stream; used after the tracker discarded their requests.
    pub fn abandon_all(&mut self) {
        self.readers.iter_mut().for_each(ReadPipe::abandon);
        self.writer.abandon();
    }

    /// Returns `true` when no pipe has a request in flight.
    pub fn is_quiescent(&self) -> bool {
        self.readers.iter().all(|r| r.inflight() == 0) && self.writer.inflight() == 0
    }
}
