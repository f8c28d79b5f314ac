use std::{collections::VecDeque, time::Instant};

// Delta times are filtered over _this many_ frames.
const DT_FILTER_WIDTH: usize = 20;
/// Simulation step is never longer than this, even after a hitch
const MAX_INITIAL_DT: f32 = 1.0 / 60.0;

pub type FrameIdx = u64;

/// Heavily inspired by:
/// - https://github.com/EmbarkStudios/kajiya/blob/main/crates/lib/kajiya-simple/src/main_loop.rs#L329
/// - https://github.com/kayru/imgv/blob/main/src/main.rs#L918
pub struct AppTimer {
  frame_idx: FrameIdx,
  /// Provide fake `delta time` for  _this many_ initial frames.
  /// Smooths out simulation etc. at the start.
  fake_dt_for_initial_frames: i32,
  last_frame_start: Instant,
  delta_time: f32,
  /// Circular buffer for delta times
  dt_queue: VecDeque<f32>,
}

impl AppTimer {
  pub fn new() -> Self {
    Self {
      frame_idx: 0,
      fake_dt_for_initial_frames: 2 * (DT_FILTER_WIDTH as i32),
      last_frame_start: Instant::now(),
      delta_time: 0.0,
      dt_queue: VecDeque::with_capacity(DT_FILTER_WIDTH),
    }
  }

  /// Frames started so far
  pub fn frame_idx(&self) -> FrameIdx {
    self.frame_idx
  }

  /// @return delta time in seconds
  pub fn mark_start_frame(&mut self) -> f32 {
    let now = Instant::now();
    let dt_duration = now - self.last_frame_start;
    self.last_frame_start = now;
    self.push_frame_time(dt_duration.as_secs_f32())
  }

  fn push_frame_time(&mut self, dt_raw: f32) -> f32 {
    self.frame_idx = self.frame_idx.wrapping_add(1);

    let delta_time = if self.fake_dt_for_initial_frames >= 0 {
      self.fake_dt_for_initial_frames -= 1;
      dt_raw.min(MAX_INITIAL_DT)
    } else {
      while self.dt_queue.len() >= DT_FILTER_WIDTH {
        self.dt_queue.pop_front();
      }
      self.dt_queue.push_back(dt_raw);

      self.calc_average_frame_time()
    };

    self.delta_time = delta_time;
    self.delta_time
  }

  fn calc_average_frame_time(&self) -> f32 {
    let sum = self.dt_queue.iter().copied().sum::<f32>();
    let count = self.dt_queue.len();
    sum / (count as f32)
  }

  pub fn delta_time_ms(&self) -> f32 {
    self.delta_time * 1000.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn initial_frames_are_clamped() {
    let mut timer = AppTimer::new();
    assert_eq!(timer.push_frame_time(0.5), MAX_INITIAL_DT);
    assert_eq!(timer.push_frame_time(0.001), 0.001);
    assert_eq!(timer.frame_idx(), 2);
  }

  #[test]
  fn steady_state_is_averaged() {
    let mut timer = AppTimer::new();
    for _ in 0..(2 * DT_FILTER_WIDTH + 1) {
      timer.push_frame_time(0.01);
    }
    // fills the whole filter window with 0.03
    for _ in 0..DT_FILTER_WIDTH {
      timer.push_frame_time(0.03);
    }
    assert!((timer.delta_time_ms() - 30.0).abs() < 1e-3);

    let dt = timer.push_frame_time(0.23);
    let expected = (0.03 * (DT_FILTER_WIDTH - 1) as f32 + 0.23) / DT_FILTER_WIDTH as f32;
    assert!((dt - expected).abs() < 1e-6);
  }
}
