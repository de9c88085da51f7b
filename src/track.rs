//! Per-track playback threads
//!
//! Each track owns one channel of one shared port and runs its own OS
//! thread. The thread blocks on a private unbounded queue, plays each queued
//! pattern with relative timing, and posts one completion message per fully
//! played pattern. Stopping is a sentinel in the same queue, so anything
//! enqueued before the stop drains first.

use crate::error::OrchestraError;
use crate::orchestra::OrchestraMessage;
use crate::pattern::Pattern;
use crate::port::SharedSink;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Emitted once per pattern fully played, identifying the finishing track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub track: usize,
}

/// Commands consumed by the playback thread. `Stop` shares the queue with
/// patterns so FIFO ordering guarantees a graceful drain.
enum TrackCommand {
    Play(Arc<Pattern>),
    Stop,
}

/// Handle to one track's playback thread.
pub struct TrackPlayer {
    track: usize,
    channel: u8,
    commands: Sender<TrackCommand>,
    handle: Option<JoinHandle<()>>,
}

impl TrackPlayer {
    /// Spawn the playback thread for `track` on `channel` of `port`.
    ///
    /// Completion messages go to `completions`, the orchestra's shared
    /// queue. The thread starts immediately but blocks until the first
    /// pattern is enqueued.
    pub fn spawn(
        track: usize,
        channel: u8,
        port: SharedSink,
        completions: Sender<OrchestraMessage>,
    ) -> Result<Self, OrchestraError> {
        if channel as usize >= crate::port::CHANNELS_PER_PORT {
            return Err(OrchestraError::Configuration(format!(
                "channel number must be between 0 and 15 ({channel} given)"
            )));
        }

        let (commands, queue) = std::sync::mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("track-{track}"))
            .spawn(move || playback_loop(track, channel, port, queue, completions))?;

        Ok(Self {
            track,
            channel,
            commands,
            handle: Some(handle),
        })
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Append a pattern to the track's pending queue. Never blocks; the
    /// queue is unbounded.
    pub fn enqueue(&self, pattern: Arc<Pattern>) {
        // A send failure means the thread already exited (stop or port
        // failure); the pattern is silently dropped either way.
        let _ = self.commands.send(TrackCommand::Play(pattern));
    }

    /// Request orderly shutdown. Idempotent; patterns enqueued before this
    /// call still play to completion.
    pub fn stop(&self) {
        let _ = self.commands.send(TrackCommand::Stop);
    }

    /// Wait for the playback thread to terminate.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Plays queued patterns until a `Stop` sentinel or a port failure.
///
/// Timing is wall-clock and relative: each event waits exactly its delta
/// after the previous event, with no drift correction against a pattern
/// anchor, so scheduling jitter accumulates per event but resets with every
/// pattern.
fn playback_loop(
    track: usize,
    channel: u8,
    port: SharedSink,
    queue: Receiver<TrackCommand>,
    completions: Sender<OrchestraMessage>,
) {
    while let Ok(command) = queue.recv() {
        match command {
            TrackCommand::Play(pattern) => {
                for timed in pattern.events() {
                    thread::sleep(timed.delta);
                    let bytes = timed.event.with_channel(channel).to_bytes();
                    let result = {
                        let mut sink = port.lock().unwrap_or_else(PoisonError::into_inner);
                        sink.send(&bytes)
                    };
                    if let Err(e) = result {
                        error!("Track {} stopping after send failure: {}", track, e);
                        return;
                    }
                }
                let completed = OrchestraMessage::Completed(CompletionEvent { track });
                if completions.send(completed).is_err() {
                    // Orchestra is gone; nothing left to schedule for.
                    debug!("Track {} exiting: completion queue closed", track);
                    return;
                }
            }
            TrackCommand::Stop => {
                let result = {
                    let mut sink = port.lock().unwrap_or_else(PoisonError::into_inner);
                    sink.reset()
                };
                if let Err(e) = result {
                    warn!("Track {} failed to reset its port on stop: {}", track, e);
                }
                return;
            }
        }
    }
}
