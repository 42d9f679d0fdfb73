//! Panel input: byte stream → frames → input event queue.
//!
//! The panel sends length-prefixed frames over a byte stream. A reader
//! thread forwards raw chunks; the control loop reassembles frames and
//! queues the decoded button events in arrival order.

use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use desk_common::consts::INPUT_QUEUE_CAPACITY;
use desk_common::input::InputEvent;
use desk_common::panel::{MIN_FRAME_LENGTH, PanelMessage, decode_frame};
use heapless::Deque;
use tracing::{debug, info, trace, warn};

// ─── Event Queue ────────────────────────────────────────────────────

/// Fixed-capacity FIFO of pending input events.
#[derive(Debug, Default)]
pub struct EventQueue {
    queue: Deque<InputEvent, INPUT_QUEUE_CAPACITY>,
    dropped: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. When full the new event is dropped.
    pub fn push(&mut self, event: InputEvent) -> bool {
        match self.queue.push_back(event) {
            Ok(()) => true,
            Err(event) => {
                self.dropped += 1;
                warn!(%event, dropped = self.dropped, "Input queue full, event dropped");
                false
            }
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<InputEvent> {
        self.queue.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

// ─── Frame Reassembly ───────────────────────────────────────────────

/// Reassembles panel frames from arbitrary stream chunks.
#[derive(Debug, Default)]
pub struct PanelReceiver {
    buf: heapless::Vec<u8, 256>,
    frames: u64,
    rejected: u64,
}

impl PanelReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(accepted, rejected)` frame counts.
    pub fn counters(&self) -> (u64, u64) {
        (self.frames, self.rejected)
    }

    /// Consume stream bytes, queueing decoded events. Returns events queued.
    pub fn feed(&mut self, bytes: &[u8], queue: &mut EventQueue) -> usize {
        let mut queued = 0;
        for &b in bytes {
            if self.buf.is_empty() && usize::from(b) < MIN_FRAME_LENGTH {
                trace!(byte = b, "Skipping byte outside frame");
                continue;
            }
            // Declared length is at most 255, so the buffer never fills.
            let _ = self.buf.push(b);
            if self.buf.len() == usize::from(self.buf[0]) {
                queued += self.complete_frame(queue);
                self.buf.clear();
            }
        }
        queued
    }

    fn complete_frame(&mut self, queue: &mut EventQueue) -> usize {
        match decode_frame(&self.buf) {
            Ok(PanelMessage::Buttons(events)) => {
                self.frames += 1;
                let mut queued = 0;
                for event in events {
                    debug!(%event, "Panel input");
                    if queue.push(event) {
                        queued += 1;
                    }
                }
                queued
            }
            Ok(PanelMessage::Encoder { id, state }) => {
                self.frames += 1;
                debug!(id, state, "Panel encoder");
                0
            }
            Err(e) => {
                self.rejected += 1;
                warn!(error = %e, "Panel frame discarded");
                0
            }
        }
    }
}

// ─── Sources ────────────────────────────────────────────────────────

/// Anything that delivers panel events to the control loop.
pub trait PanelSource: Send {
    /// Move all available input into `queue` without blocking.
    fn poll(&mut self, queue: &mut EventQueue) -> usize;
}

/// Panel bytes read from a stream on a background thread.
pub struct StreamPanel {
    rx: Receiver<Vec<u8>>,
    receiver: PanelReceiver,
    closed: bool,
}

impl StreamPanel {
    /// Spawn a reader thread over `reader`.
    pub fn spawn<R: Read + Send + 'static>(name: &str, mut reader: R) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let source = name.to_owned();
        thread::Builder::new()
            .name("panel-reader".into())
            .spawn(move || {
                let mut chunk = [0u8; 64];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => {
                            info!(source, "Panel stream closed");
                            break;
                        }
                        Ok(n) => {
                            if tx.send(chunk[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            warn!(source, error = %e, "Panel read failed");
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            rx,
            receiver: PanelReceiver::new(),
            closed: false,
        })
    }

    /// Read from `path`, or stdin when `None`.
    pub fn open(path: Option<&Path>) -> io::Result<Self> {
        match path {
            Some(p) => {
                let file = std::fs::File::open(p)?;
                info!(path = %p.display(), "Panel input from file");
                Self::spawn(&p.display().to_string(), file)
            }
            None => {
                info!("Panel input from stdin");
                Self::spawn("stdin", io::stdin())
            }
        }
    }

    pub fn receiver(&self) -> &PanelReceiver {
        &self.receiver
    }
}

impl PanelSource for StreamPanel {
    fn poll(&mut self, queue: &mut EventQueue) -> usize {
        let mut queued = 0;
        while !self.closed {
            match self.rx.try_recv() {
                Ok(bytes) => queued += self.receiver.feed(&bytes, queue),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Panel reader finished");
                    self.closed = true;
                }
            }
        }
        queued
    }
}
