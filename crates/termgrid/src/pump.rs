#![forbid(unsafe_code)]

//! The event pump.
//!
//! Three long-running pieces feed the screen's event queue:
//!
//! - a **reader** thread doing blocking reads from the terminal and
//!   handing chunks to the pump;
//! - a **resize watcher** thread turning SIGWINCH into coalesced
//!   notifications;
//! - the **pump** thread proper, which multiplexes chunk arrival, the
//!   quiet-time deadline, resize notifications, and shutdown over a
//!   single channel, drives the input parser, and queues events.
//!
//! The quiet-time deadline is what turns a lone ESC byte into an Escape
//! key press: while bytes sit unresolved in the parse buffer, the pump
//! waits at most [`QUIET_TIME`] for more before telling the parser to
//! force a resolution.

use std::io::Read;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use termgrid_core::input::{InputBuffer, InputParser};
use termgrid_core::Event;

use crate::screen::Shared;

/// How long an ambiguous byte prefix may sit unresolved.
pub(crate) const QUIET_TIME: Duration = Duration::from_millis(50);

/// Largest single read from the terminal.
pub(crate) const READ_CHUNK: usize = 4096;

/// Bound on the event queue and on the chunk channel.
pub(crate) const QUEUE_DEPTH: usize = 10;

/// Messages multiplexed into the pump.
#[derive(Debug)]
pub(crate) enum PumpMsg {
    /// A chunk of input bytes arrived.
    Chunk(Vec<u8>),
    /// The window size may have changed.
    Winch,
    /// Shut down.
    Quit,
}

/// Spawn the blocking reader.
///
/// Read failures (end-of-stream included) surface as a single
/// [`Event::Error`] and end the thread; the pump keeps running so queued
/// events still drain.
pub(crate) fn spawn_reader(
    mut input: Box<dyn Read + Send>,
    pump_tx: SyncSender<PumpMsg>,
    ev_tx: SyncSender<Event>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match input.read(&mut chunk) {
                Ok(0) => {
                    let _ = ev_tx.try_send(Event::Error {
                        cause: "input stream closed".into(),
                    });
                    return;
                }
                Ok(n) => {
                    if pump_tx.send(PumpMsg::Chunk(chunk[..n].to_vec())).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "input read failed; stopping reader");
                    let _ = ev_tx.try_send(Event::Error {
                        cause: err.to_string(),
                    });
                    return;
                }
            }
        }
    })
}

/// Owns the SIGWINCH watcher thread; dropping it stops the watcher.
#[cfg(unix)]
#[derive(Debug)]
pub(crate) struct WinchGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl WinchGuard {
    /// Start forwarding SIGWINCH to the pump.
    ///
    /// Notifications coalesce: the pump queries the authoritative size
    /// when it handles one, so a single pending message is enough.
    pub(crate) fn new(pump_tx: SyncSender<PumpMsg>) -> std::io::Result<Self> {
        use signal_hook::consts::signal::SIGWINCH;
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGWINCH]).map_err(std::io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for _ in signals.forever() {
                let _ = pump_tx.try_send(PumpMsg::Winch);
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for WinchGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The pump loop. Runs until a quit message, channel closure, or the
/// shared quit flag.
pub(crate) fn run_pump(
    shared: Arc<Shared>,
    rx: Receiver<PumpMsg>,
    mut parser: InputParser,
    ev_tx: SyncSender<Event>,
) {
    let mut buf = InputBuffer::new();
    let mut keyexpire = Instant::now();

    loop {
        if shared.quitting() {
            return;
        }

        let msg = if buf.is_empty() {
            match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => return,
            }
        } else {
            let wait = keyexpire.saturating_duration_since(Instant::now());
            match rx.recv_timeout(wait) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        };

        match msg {
            Some(PumpMsg::Quit) => return,
            Some(PumpMsg::Chunk(chunk)) => {
                buf.extend(&chunk);
                keyexpire = Instant::now() + QUIET_TIME;
                let events = parser.scan(&mut buf, false);
                if !post_events(&ev_tx, events) {
                    return;
                }
            }
            Some(PumpMsg::Winch) => {
                if let Some((w, h)) = shared.handle_resize() {
                    parser.set_screen_size(w, h);
                }
            }
            None => {
                // Quiet time ran out with bytes still pending: force the
                // parser to resolve what it has.
                if Instant::now() >= keyexpire && !buf.is_empty() {
                    let events = parser.scan(&mut buf, true);
                    if !post_events(&ev_tx, events) {
                        return;
                    }
                }
            }
        }
    }
}

/// Queue parsed events.
///
/// Mouse events are dropped rather than letting a slow consumer stall
/// input; everything else blocks. Returns false once the consumer side
/// is gone.
fn post_events(ev_tx: &SyncSender<Event>, events: Vec<Event>) -> bool {
    for ev in events {
        match ev {
            Event::Mouse(_) => match ev_tx.try_send(ev) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("event queue full; mouse event dropped");
                }
                Err(TrySendError::Disconnected(_)) => return false,
            },
            other => {
                if ev_tx.send(other).is_err() {
                    return false;
                }
            }
        }
    }
    true
}
