use glam::{vec3, Vec3};

pub struct SimulationConfig {
  /// Strands grown on each hair group's scalp
  pub strands_per_group: usize,
  /// Distance between strand root and tip, at rest
  pub strand_length: f32,
  /// Added to the scalp normal to get the growth direction. Result is not normalized.
  pub strand_direction_bias: Vec3,
  pub initial_velocity: Vec3,
  /// Same seed, same hair
  pub root_sampling_seed: u64,
  /// Scalp is the upper part of this sphere
  pub scalp_center: Vec3,
  pub scalp_radius: f32,
  /// Only triangles with normal.y above this grow hair
  pub scalp_min_normal_y: f32,
  /// Collider translation per frame (at 60 FPS) while a WASDQE key is held
  pub collider_move_speed: f32,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      strands_per_group: 1000,
      strand_length: 2.5,
      strand_direction_bias: vec3(0.05, 5.0, -2.0),
      initial_velocity: vec3(0.0, 0.0, -1.0),
      root_sampling_seed: 8,
      scalp_center: vec3(0.0, 2.7, 0.1),
      scalp_radius: 0.95,
      scalp_min_normal_y: 0.35,
      collider_move_speed: 0.0006,
    }
  }
}
