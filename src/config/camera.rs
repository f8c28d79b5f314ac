use glam::{vec3, Vec3};

/// Orbit camera around `target`
pub struct CameraConfig {
  pub target: Vec3,
  pub orbit_radius: f32,
  pub min_orbit_radius: f32,
  pub max_orbit_radius: f32,
  pub fov_dgr: f32,
  pub z_near: f32,
  pub z_far: f32,
  /// Degrees per pixel of mouse drag
  pub rotate_sensitivity: f32,
  /// Orbit radius change per pixel of mouse drag
  pub zoom_sensitivity: f32,
}

impl Default for CameraConfig {
  fn default() -> Self {
    Self {
      target: vec3(0.0, 1.0, 0.0),
      orbit_radius: 10.0,
      min_orbit_radius: 1.0,
      max_orbit_radius: 50.0,
      fov_dgr: 45.0,
      z_near: 0.1,
      z_far: 50.0,
      rotate_sensitivity: 0.5,
      zoom_sensitivity: 0.05,
    }
  }
}
