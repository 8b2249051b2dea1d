//! Per-circuit stream registry
//!
//! Each circuit owns one `StreamTable`. It hands out stream IDs, enforces the
//! per-circuit stream limit and routes incoming stream cells to the right
//! [`TorStream`].
//!
//! Stream failures are isolated: an END on one stream never touches the
//! others. Only [`StreamTable::disconnect_all`] (circuit teardown) closes
//! every stream at once.

use super::cell::EndReason;
use super::stream::{CircuitHandle, StreamListener, TorStream, DEFAULT_RECV_CAPACITY};
use crate::error::{Result, TorError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Configuration for a circuit's stream table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum concurrent streams per circuit
    pub max_streams: u16,
    /// Initial receive buffer size per stream, in bytes
    pub recv_buffer_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_streams: 500,
            recv_buffer_capacity: DEFAULT_RECV_CAPACITY,
        }
    }
}

/// Statistics about a stream table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamTableStats {
    /// Total streams opened
    pub streams_opened: u64,
    /// Total streams closed (any reason)
    pub streams_closed: u64,
    /// Streams ended with an error reason
    pub stream_failures: u64,
    /// Cells dropped because their stream was unknown
    pub unknown_stream_cells: u64,
}

struct TableInner {
    streams: HashMap<u16, Arc<TorStream>>,
    next_stream_id: u16,
    stats: StreamTableStats,
}

/// Streams open on one circuit
pub struct StreamTable {
    inner: Mutex<TableInner>,
    config: StreamConfig,
}

impl StreamTable {
    /// Create a table with the default config
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                streams: HashMap::new(),
                next_stream_id: 1, // Stream IDs start at 1
                stats: StreamTableStats::default(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Register a new stream in the `Connecting` state
    ///
    /// The caller is responsible for sending RELAY_BEGIN with the returned
    /// stream's ID.
    pub fn open(
        &self,
        circuit: Weak<dyn CircuitHandle>,
        listener: Option<Arc<dyn StreamListener>>,
    ) -> Result<Arc<TorStream>> {
        let mut inner = self.lock();

        if inner.streams.len() >= usize::from(self.config.max_streams) {
            return Err(TorError::ResourceExhausted(format!(
                "Too many streams (max {})",
                self.config.max_streams
            )));
        }

        let stream_id = allocate_stream_id(&mut inner)?;
        let stream = Arc::new(TorStream::with_capacity(
            stream_id,
            circuit,
            listener,
            self.config.recv_buffer_capacity,
        ));
        inner.streams.insert(stream_id, Arc::clone(&stream));
        inner.stats.streams_opened += 1;

        log::info!("Opened stream {} ({} active)", stream_id, inner.streams.len());
        Ok(stream)
    }

    /// Remove a stream from the table (does not notify it)
    pub fn remove(&self, stream_id: u16) -> Option<Arc<TorStream>> {
        let mut inner = self.lock();
        let removed = inner.streams.remove(&stream_id);
        if removed.is_some() {
            inner.stats.streams_closed += 1;
        }
        removed
    }

    pub fn get(&self, stream_id: u16) -> Option<Arc<TorStream>> {
        self.lock().streams.get(&stream_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().streams.is_empty()
    }

    /// IDs of all registered streams, ascending
    pub fn stream_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.lock().streams.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn stats(&self) -> StreamTableStats {
        self.lock().stats.clone()
    }

    /// Route a RELAY_DATA payload to its stream
    ///
    /// Returns `Ok(false)` if no such stream is registered, or if it was
    /// destroyed before the payload reached it.
    pub fn deliver_data(&self, stream_id: u16, data: &[u8]) -> Result<bool> {
        let Some(stream) = self.lookup(stream_id) else {
            return Ok(false);
        };
        match stream.on_data_received(data) {
            Ok(()) => Ok(true),
            Err(TorError::StreamDestroyed) => {
                log::debug!("Dropping DATA for closing stream {}", stream_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Route RELAY_CONNECTED to its stream
    pub fn deliver_connected(&self, stream_id: u16) -> Result<bool> {
        let Some(stream) = self.lookup(stream_id) else {
            return Ok(false);
        };
        stream.notify_connect()?;
        Ok(true)
    }

    /// Route RELAY_END to its stream; the stream leaves the table
    pub fn deliver_end(&self, stream_id: u16, reason: EndReason) -> Result<bool> {
        let stream = {
            let mut inner = self.lock();
            match inner.streams.remove(&stream_id) {
                Some(stream) => {
                    inner.stats.streams_closed += 1;
                    if reason != EndReason::Done {
                        inner.stats.stream_failures += 1;
                    }
                    stream
                }
                None => {
                    inner.stats.unknown_stream_cells += 1;
                    log::warn!("END ({}) for unknown stream {}", reason.name(), stream_id);
                    return Ok(false);
                }
            }
        };

        if reason == EndReason::Done {
            stream.notify_disconnect()?;
        } else {
            stream.notify_failure(reason)?;
        }
        Ok(true)
    }

    /// Owning circuit is gone: disconnect every stream and empty the table
    ///
    /// Returns the number of streams disconnected. Every stream is notified
    /// even if some fail; the first failure is returned.
    pub fn disconnect_all(&self) -> Result<usize> {
        let streams: Vec<Arc<TorStream>> = {
            let mut inner = self.lock();
            let drained: Vec<_> = inner.streams.drain().map(|(_, s)| s).collect();
            inner.stats.streams_closed += drained.len() as u64;
            drained
        };

        let mut first_error = None;
        for stream in &streams {
            if let Err(e) = stream.notify_disconnect() {
                log::warn!("Stream {}: disconnect failed: {}", stream.stream_id(), e);
                first_error.get_or_insert(e);
            }
        }

        log::info!("Disconnected all {} streams", streams.len());
        match first_error {
            Some(e) => Err(e),
            None => Ok(streams.len()),
        }
    }

    fn lookup(&self, stream_id: u16) -> Option<Arc<TorStream>> {
        let mut inner = self.lock();
        let stream = inner.streams.get(&stream_id).cloned();
        if stream.is_none() {
            inner.stats.unknown_stream_cells += 1;
            log::warn!("Cell for unknown stream {}, ignoring", stream_id);
        }
        stream
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocate the next free stream ID
fn allocate_stream_id(inner: &mut TableInner) -> Result<u16> {
    let start = inner.next_stream_id;
    loop {
        let id = inner.next_stream_id;
        inner.next_stream_id = inner.next_stream_id.wrapping_add(1);
        if inner.next_stream_id == 0 {
            inner.next_stream_id = 1; // Skip 0
        }

        if !inner.streams.contains_key(&id) {
            return Ok(id);
        }

        // Wrapped all the way around
        if inner.next_stream_id == start {
            return Err(TorError::ResourceExhausted(
                "No stream IDs available".into(),
            ));
        }
    }
}
