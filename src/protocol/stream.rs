//! Tor stream endpoints
//!
//! A `TorStream` carries one application byte stream over a circuit. The
//! circuit pushes decrypted RELAY_DATA payloads in through
//! [`TorStream::on_data_received`]; application threads call
//! [`TorStream::send`] and [`TorStream::recv`].
//!
//! Integrates with `flow_control::StreamFlowControl` for SENDME window
//! management (500-cell initial window, 50-cell SENDME increments).
//!
//! ## Locking
//!
//! Each stream has its own mutex and condition variable. No stream lock is
//! held while calling into the circuit or a listener, so either may call back
//! into the stream.

use super::cell::{EndReason, RelayCommand, MAX_PAYLOAD};
use super::fifo::ByteFifo;
use super::flow_control::StreamFlowControl;
use crate::error::{Result, TorError};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

/// Default receive buffer capacity in bytes
pub const DEFAULT_RECV_CAPACITY: usize = 4096;

/// What a stream needs from its owning circuit
pub trait CircuitHandle: Send + Sync {
    /// Encrypt and transmit one relay cell
    ///
    /// `payload` is `None` for commands without a body (stream SENDME).
    fn send_relay(
        &self,
        payload: Option<&[u8]>,
        command: RelayCommand,
        is_control: bool,
        stream_id: u16,
    ) -> Result<()>;

    /// Drop `stream_id` from the circuit's stream table
    fn remove_stream(&self, stream_id: u16);
}

/// Push notifications to whatever bridges a stream to an application
pub trait StreamListener: Send + Sync {
    fn data_arrived(&self, _stream: &TorStream) {}
    fn connected(&self, _stream: &TorStream) {}
    fn disconnected(&self, _stream: &TorStream) {}
    fn failure(&self, _stream: &TorStream) {}
}

/// Stream lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// BEGIN sent, waiting for CONNECTED
    Connecting,
    /// Open for data
    Ready,
    /// Closed by either side; terminal
    Destroyed,
}

/// Per-stream counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub cells_sent: u64,
    pub cells_received: u64,
    pub sendmes_sent: u64,
}

struct StreamInner {
    state: StreamState,
    recv: ByteFifo,
    flow_control: StreamFlowControl,
    stats: StreamStats,
}

/// One stream on a circuit
pub struct TorStream {
    /// Stream ID (unique within the circuit)
    stream_id: u16,

    /// The circuit this stream uses (not owned)
    circuit: Weak<dyn CircuitHandle>,

    listener: Option<Arc<dyn StreamListener>>,

    inner: Mutex<StreamInner>,

    /// Signalled on every state change and data arrival
    changed: Condvar,

    /// Keeps the chunks of one `send` call contiguous, and END after them
    send_lock: Mutex<()>,
}

impl TorStream {
    /// Create a stream in the `Connecting` state
    pub fn new(
        stream_id: u16,
        circuit: Weak<dyn CircuitHandle>,
        listener: Option<Arc<dyn StreamListener>>,
    ) -> Self {
        Self::with_capacity(stream_id, circuit, listener, DEFAULT_RECV_CAPACITY)
    }

    /// Create a stream with a receive buffer sized for `recv_capacity` bytes
    pub fn with_capacity(
        stream_id: u16,
        circuit: Weak<dyn CircuitHandle>,
        listener: Option<Arc<dyn StreamListener>>,
        recv_capacity: usize,
    ) -> Self {
        Self {
            stream_id,
            circuit,
            listener,
            inner: Mutex::new(StreamInner {
                state: StreamState::Connecting,
                recv: ByteFifo::with_capacity(recv_capacity),
                flow_control: StreamFlowControl::new(stream_id),
                stats: StreamStats::default(),
            }),
            changed: Condvar::new(),
            send_lock: Mutex::new(()),
        }
    }

    /// Get the stream ID
    pub fn stream_id(&self) -> u16 {
        self.stream_id
    }

    pub fn state(&self) -> StreamState {
        self.snapshot().state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == StreamState::Destroyed
    }

    /// Current deliver window (cells the relay may still send us)
    pub fn deliver_window(&self) -> i32 {
        self.snapshot().flow_control.deliver_window
    }

    /// Bytes received but not yet read
    pub fn buffered_len(&self) -> usize {
        self.snapshot().recv.len()
    }

    pub fn stats(&self) -> StreamStats {
        self.snapshot().stats.clone()
    }

    /// Send bytes down this stream
    ///
    /// Data is split into RELAY_DATA cells of at most 498 bytes, sent in order.
    /// If the stream is closed from the circuit side part way through, the
    /// remaining chunks are dropped and [`TorError::StreamDestroyed`] returned.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let _sending = self.send_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.lock()?.state == StreamState::Destroyed {
            return Err(TorError::StreamDestroyed);
        }
        let circuit = self.circuit()?;

        for chunk in data.chunks(MAX_PAYLOAD) {
            if self.lock()?.state == StreamState::Destroyed {
                return Err(TorError::StreamDestroyed);
            }
            circuit.send_relay(Some(chunk), RelayCommand::Data, false, self.stream_id)?;

            let mut inner = self.lock()?;
            inner.stats.cells_sent += 1;
            inner.stats.bytes_sent += chunk.len() as u64;
        }

        log::debug!(
            "Stream {}: sent {} bytes in {} cells",
            self.stream_id,
            data.len(),
            data.len().div_ceil(MAX_PAYLOAD)
        );
        Ok(())
    }

    /// Get received data from this stream
    ///
    /// Returns up to `max_bytes` bytes in arrival order. With `block` set and
    /// nothing buffered, waits until data arrives or the stream is destroyed.
    /// A non-blocking call on an empty live stream returns an empty vector.
    ///
    /// Fails with [`TorError::StreamDestroyed`] once the stream is destroyed
    /// and its buffer drained.
    pub fn recv(&self, max_bytes: usize, block: bool) -> Result<Vec<u8>> {
        let mut inner = self.lock()?;
        loop {
            if !inner.recv.is_empty() {
                return Ok(inner.recv.get(max_bytes));
            }
            if inner.state == StreamState::Destroyed {
                return Err(TorError::StreamDestroyed);
            }
            if !block {
                return Ok(Vec::new());
            }
            inner = self.wait(inner)?;
        }
    }

    /// Block until the stream reaches `desired`
    ///
    /// Fails with [`TorError::StreamDestroyed`] if the stream is destroyed
    /// while waiting for any other state.
    pub fn wait_for_state(&self, desired: StreamState) -> Result<()> {
        let mut inner = self.lock()?;
        loop {
            if inner.state == desired {
                return Ok(());
            }
            if inner.state == StreamState::Destroyed {
                return Err(TorError::StreamDestroyed);
            }
            inner = self.wait(inner)?;
        }
    }

    /// Close the stream by sending RELAY_END (reason DONE)
    ///
    /// Only the first call has any effect. Waits for an in-progress `send`
    /// to finish, so END is never followed by DATA.
    pub fn destroy(&self) -> Result<()> {
        let _sending = self.send_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.transition(StreamState::Destroyed)? {
            return Ok(());
        }

        log::info!("Closing stream {}", self.stream_id);

        let Some(circuit) = self.circuit.upgrade() else {
            log::debug!("Stream {}: circuit already gone", self.stream_id);
            return Ok(());
        };

        let sent = circuit.send_relay(
            Some(&[EndReason::Done as u8]),
            RelayCommand::End,
            false,
            self.stream_id,
        );
        circuit.remove_stream(self.stream_id);
        sent
    }

    /// Accept a RELAY_DATA payload for this stream (called by the circuit)
    ///
    /// Fails with [`TorError::StreamDestroyed`] once the stream is destroyed;
    /// the payload is discarded without touching the window.
    pub fn on_data_received(&self, data: &[u8]) -> Result<()> {
        let sendme_due = {
            let mut inner = self.lock()?;
            if inner.state == StreamState::Destroyed {
                return Err(TorError::StreamDestroyed);
            }
            let sendme_due = inner.flow_control.on_receive_data();
            inner.recv.put(data);
            inner.stats.cells_received += 1;
            inner.stats.bytes_received += data.len() as u64;
            if sendme_due {
                inner.stats.sendmes_sent += 1;
            }
            sendme_due
        };
        self.changed.notify_all();

        let sendme = if sendme_due {
            self.circuit()
                .and_then(|c| c.send_relay(None, RelayCommand::Sendme, false, self.stream_id))
        } else {
            Ok(())
        };

        if let Some(listener) = &self.listener {
            listener.data_arrived(self);
        }
        sendme
    }

    /// The circuit received RELAY_CONNECTED for this stream
    pub fn notify_connect(&self) -> Result<()> {
        if !self.transition(StreamState::Ready)? {
            log::warn!(
                "Stream {}: CONNECTED after stream was destroyed",
                self.stream_id
            );
            return Ok(());
        }
        log::info!("Stream {} connected", self.stream_id);
        if let Some(listener) = &self.listener {
            listener.connected(self);
        }
        Ok(())
    }

    /// The stream was closed from the circuit side (END, or circuit teardown)
    pub fn notify_disconnect(&self) -> Result<()> {
        if self.transition(StreamState::Destroyed)? {
            log::info!("Stream {} disconnected", self.stream_id);
            if let Some(listener) = &self.listener {
                listener.disconnected(self);
            }
        }
        Ok(())
    }

    /// The stream failed (e.g. END with an error reason before CONNECTED)
    pub fn notify_failure(&self, reason: EndReason) -> Result<()> {
        if self.transition(StreamState::Destroyed)? {
            log::warn!("Stream {} failed: {}", self.stream_id, reason.name());
            if let Some(listener) = &self.listener {
                listener.failure(self);
            }
        }
        Ok(())
    }

    /// Move to `next` and wake waiters. Returns `false` if already destroyed.
    fn transition(&self, next: StreamState) -> Result<bool> {
        {
            let mut inner = self.lock()?;
            if inner.state == StreamState::Destroyed {
                return Ok(false);
            }
            inner.state = next;
        }
        self.changed.notify_all();
        Ok(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StreamInner>> {
        self.inner
            .lock()
            .map_err(|_| TorError::Internal(format!("stream {} lock poisoned", self.stream_id)))
    }

    /// Read-only view that tolerates a poisoned lock
    fn snapshot(&self) -> MutexGuard<'_, StreamInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, StreamInner>) -> Result<MutexGuard<'a, StreamInner>> {
        self.changed.wait(guard).map_err(|_| {
            TorError::Interrupted(format!("wait on stream {} abandoned", self.stream_id))
        })
    }

    fn circuit(&self) -> Result<Arc<dyn CircuitHandle>> {
        self.circuit.upgrade().ok_or_else(|| {
            TorError::CircuitClosed(format!("circuit for stream {} is gone", self.stream_id))
        })
    }
}

impl fmt::Debug for TorStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TorStream")
            .field("stream_id", &self.stream_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for TorStream {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if inner.state != StreamState::Destroyed {
            log::warn!("Stream {} dropped without being destroyed", self.stream_id);
        }
    }
}

#[cfg(test)]
impl TorStream {
    /// Poison the stream lock the way a panicking lock holder would
    pub(crate) fn poison(self: &Arc<Self>) {
        let stream = Arc::clone(self);
        let _ = std::thread::spawn(move || {
            let _guard = stream.inner.lock();
            panic!("panic while holding stream {} lock", stream.stream_id);
        })
        .join();
    }
}
