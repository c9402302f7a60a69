use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Index of the frame to draw next, wrapping at the end of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackCursor {
    index: usize,
    len: usize,
}

impl PlaybackCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self) {
        self.index += 1;
        if self.index >= self.len {
            self.index = 0;
        }
    }
}

/// Redraws the loop at a fixed cadence until stopped or dropped
pub struct PlaybackDriver {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl PlaybackDriver {
    pub fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    /// Start (or restart from the first frame) calling `on_frame` with the
    /// current frame index once per period. The first call comes one period
    /// after starting. `on_frame` runs on the blocking pool, so it may draw
    /// and write files.
    pub fn start<F>(&mut self, frame_count: usize, mut on_frame: F)
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.stop();

        if frame_count == 0 {
            warn!("playback not started: loop has no frames");
            return;
        }

        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut cursor = PlaybackCursor::new(frame_count);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let index = cursor.index();
                let drawn = tokio::task::spawn_blocking(move || {
                    on_frame(index);
                    on_frame
                })
                .await;
                on_frame = match drawn {
                    Ok(on_frame) => on_frame,
                    Err(e) => {
                        error!("playback halted: frame {} callback failed: {}", index, e);
                        return;
                    }
                };
                cursor.advance();
            }
        }));

        debug!("playback started: {} frames every {:?}", frame_count, period);
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("playback stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
