use ash::vk;
use glam::{vec3, Vec3};

use crate::utils::spherical_to_cartesian_dgr;

pub struct ShadowLightProjection {
  pub left: f32,
  pub right: f32,
  pub top: f32,
  pub bottom: f32,
  pub near: f32,
  pub far: f32,
}

pub struct ShadowSourceCfg {
  /// horizontal [dgr]
  pub pos_phi: f32,
  /// verical [dgr]
  pub pos_theta: f32,
  pub pos_distance: f32, // verify with projection box below!!!
  pub look_at_target: Vec3,
  pub projection: ShadowLightProjection,
}

impl ShadowSourceCfg {
  pub fn position(&self) -> Vec3 {
    self.look_at_target
      + spherical_to_cartesian_dgr(self.pos_phi, self.pos_theta, self.pos_distance)
  }
}

impl Default for ShadowSourceCfg {
  fn default() -> Self {
    let proj_box_side = ShadowsConfig::SHADOWS_ORTHO_SIZE;
    Self {
      pos_phi: 60.0,
      pos_theta: 35.0,
      pos_distance: 12.0,
      look_at_target: vec3(0.0, 1.5, 0.0),
      projection: ShadowLightProjection {
        left: -proj_box_side,
        right: proj_box_side,
        top: proj_box_side,
        bottom: -proj_box_side,
        near: 0.1,
        far: 30.0,
      },
    }
  }
}

/// Shared by the shadow and opacity passes, both render from the light's point of view
pub struct ShadowsConfig {
  pub shadowmap_width: u32,
  pub shadowmap_height: u32,
  /// Added to each fragment's depth
  pub depth_bias_constant: f32,
  pub depth_bias_clamp: f32,
  /// Scaled by fragment's depth slope
  pub depth_bias_slope: f32,
  pub shadow_source: ShadowSourceCfg,
}

/// Arguments of `cmd_set_depth_bias`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DepthBias {
  pub constant: f32,
  pub clamp: f32,
  pub slope: f32,
}

impl ShadowsConfig {
  pub const SHADOWS_ORTHO_SIZE: f32 = 4.0;

  pub fn depth_bias(&self) -> DepthBias {
    DepthBias {
      constant: self.depth_bias_constant,
      clamp: self.depth_bias_clamp,
      slope: self.depth_bias_slope,
    }
  }

  pub fn shadowmap_size(&self) -> vk::Extent2D {
    vk::Extent2D {
      width: self.shadowmap_width,
      height: self.shadowmap_height,
    }
  }
}

impl Default for ShadowsConfig {
  fn default() -> Self {
    Self {
      shadowmap_width: 1080,
      shadowmap_height: 720,
      depth_bias_constant: 1.25,
      depth_bias_clamp: 0.0,
      depth_bias_slope: 1.75,
      shadow_source: ShadowSourceCfg::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn light_is_placed_around_target() {
    let cfg = ShadowSourceCfg::default();
    let dist = cfg.position().distance(cfg.look_at_target);
    assert!((dist - cfg.pos_distance).abs() < 1e-4);
  }

  #[test]
  fn depth_bias_comes_from_config() {
    let cfg = ShadowsConfig {
      depth_bias_constant: 2.0,
      depth_bias_slope: 3.0,
      ..ShadowsConfig::default()
    };
    let bias = cfg.depth_bias();
    assert_eq!(bias.constant, 2.0);
    assert_eq!(bias.slope, 3.0);
    assert_eq!(bias.clamp, 0.0);
  }
}
