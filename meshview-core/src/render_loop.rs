/// Frame pacing and statistics for the always-on render loop
use std::time::{Duration, Instant};

/// Owned by a viewer session; frames are only produced while it is running.
#[derive(Debug)]
pub struct RenderLoop {
    running: bool,
    frame_interval: Duration,
    frame_count: u64,
    fps: f32,
    sample_start: Instant,
    sample_frames: u32,
}

impl RenderLoop {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            running: false,
            frame_interval,
            frame_count: 0,
            fps: 0.0,
            sample_start: Instant::now(),
            sample_frames: 0,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
        self.sample_start = Instant::now();
        self.sample_frames = 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Count a presented frame and refresh the FPS estimate once per second.
    pub fn record_frame(&mut self) {
        self.frame_count += 1;
        self.sample_frames += 1;

        let elapsed = self.sample_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.sample_frames as f32 / elapsed.as_secs_f32();
            self.sample_frames = 0;
            self.sample_start = Instant::now();
        }
    }

    /// Time left in the current frame slot, given when the frame started.
    pub fn remaining(&self, frame_start: Instant) -> Duration {
        self.frame_interval.saturating_sub(frame_start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop() {
        let mut render_loop = RenderLoop::new(Duration::from_millis(33));
        assert!(!render_loop.is_running());
        render_loop.start();
        assert!(render_loop.is_running());
        render_loop.record_frame();
        render_loop.record_frame();
        assert_eq!(render_loop.frame_count(), 2);
        render_loop.stop();
        assert!(!render_loop.is_running());
    }

    #[test]
    fn test_remaining_never_negative() {
        let render_loop = RenderLoop::new(Duration::from_millis(1));
        let start = Instant::now() - Duration::from_millis(50);
        assert_eq!(render_loop.remaining(start), Duration::ZERO);
    }
}
