//! Tor SENDME Flow Control (stream level)
//!
//! ## How It Works:
//!
//! 1. **Window:** Each stream starts with a deliver window of 500 cells
//! 2. **Decrement:** Every RELAY_DATA cell received costs one cell of window
//! 3. **SENDME:** Once the window is down to 450, send a stream SENDME
//! 4. **Increment:** Sending a SENDME adds 50 cells back to the window
//!
//! The window is replenished additively, never reset, so the count stays in
//! step with the exit relay's package window for the same stream.
//!
//! Circuit-level windows are the circuit's business and are not tracked here.

/// Stream-level receive (deliver) window
#[derive(Debug, Clone)]
pub struct StreamFlowControl {
    /// Cells we may still receive before the relay must stop sending
    pub deliver_window: i32,

    /// Stream ID this flow control belongs to
    pub stream_id: u16,
}

impl StreamFlowControl {
    /// Initial stream window size (500 cells)
    pub const INITIAL_WINDOW: i32 = 500;

    /// Window increment per SENDME (50 cells)
    pub const WINDOW_INCREMENT: i32 = 50;

    /// Send a SENDME once the window is at or below this mark
    pub const SENDME_THRESHOLD: i32 = Self::INITIAL_WINDOW - Self::WINDOW_INCREMENT;

    /// Create new stream flow control
    pub fn new(stream_id: u16) -> Self {
        Self {
            deliver_window: Self::INITIAL_WINDOW,
            stream_id,
        }
    }

    /// Account for one received DATA cell
    ///
    /// Returns `true` if a SENDME must be sent now; the window has already been
    /// credited with the increment in that case.
    pub fn on_receive_data(&mut self) -> bool {
        self.deliver_window -= 1;

        if self.deliver_window <= Self::SENDME_THRESHOLD {
            self.deliver_window += Self::WINDOW_INCREMENT;
            log::debug!(
                "Stream {} deliver window low, sending SENDME (window now {})",
                self.stream_id,
                self.deliver_window
            );
            return true;
        }

        false
    }
}
