use ash;
use ash::vk;
use glam::Vec3;

use crate::utils::color_hex_to_vec;
use crate::vk_utils::{clear_color, clear_depth};

pub use self::{camera::*, shadows::*, simulation::*};

pub mod camera;
pub mod shadows;
pub mod simulation;

pub struct Config {
  /// Validation layers, debug labels and extra queue waits each frame
  pub graphics_debugging: bool,
  pub vsync: bool,
  // window
  pub window_width: f64,
  pub window_height: f64,
  /// Also the number of frames in flight. Surface capabilities may clamp it.
  pub swapchain_image_count: u32,
  // clear colors
  pub clear_color: Vec3,
  pub clear_depth: f32,
  // scene-related
  pub camera: CameraConfig,
  pub shadows: ShadowsConfig,
  pub simulation: SimulationConfig,
}

impl Config {
  pub fn new() -> Config {
    Config {
      graphics_debugging: cfg!(debug_assertions),
      vsync: true,
      // window
      window_width: 640f64,
      window_height: 480f64,
      swapchain_image_count: 5,
      // clear colors
      clear_color: color_hex_to_vec(101, 129, 140),
      clear_depth: 1.0,
      // scene
      camera: CameraConfig::default(),
      shadows: ShadowsConfig::default(),
      simulation: SimulationConfig::default(),
    }
  }

  pub fn window_size(&self) -> vk::Extent2D {
    vk::Extent2D {
      width: self.window_width as _,
      height: self.window_height as _,
    }
  }

  pub fn clear_color(&self) -> vk::ClearValue {
    let cc = self.clear_color;
    clear_color([cc[0], cc[1], cc[2], 1f32])
  }

  pub fn clear_depth_stencil(&self) -> vk::ClearValue {
    clear_depth(self.clear_depth)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_clear_color() {
    let cfg = Config::new();
    let value = cfg.clear_color();
    let rgba = unsafe { value.color.float32 };
    assert!((rgba[0] - 101.0 / 255.0).abs() < 1e-6);
    assert!((rgba[1] - 129.0 / 255.0).abs() < 1e-6);
    assert!((rgba[2] - 140.0 / 255.0).abs() < 1e-6);
    assert_eq!(rgba[3], 1.0);
  }

  #[test]
  fn default_window_size() {
    let size = Config::new().window_size();
    assert_eq!((size.width, size.height), (640, 480));
  }
}
