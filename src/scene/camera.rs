use ash::vk;
use glam::{Mat4, Vec3};
use log::info;

use crate::config::{CameraConfig, ShadowSourceCfg};
use crate::vk_ctx::VkCtx;
use crate::vk_utils::{VkBuffer, VkMemoryResource};

/// Data for the `CameraUBO` uniform block
#[derive(Copy, Clone, Debug)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct CameraUBO {
  pub view: Mat4,
  pub proj: Mat4,
}
unsafe impl bytemuck::Zeroable for CameraUBO {}
unsafe impl bytemuck::Pod for CameraUBO {}

/// View+projection matrices and their persistently mapped GPU copy.
pub struct Camera {
  pub view: Mat4,
  pub proj: Mat4,
  pub buffer: VkBuffer,
}

impl Camera {
  pub fn new(vk_ctx: &VkCtx, name: &str, view: Mat4, proj: Mat4) -> anyhow::Result<Self> {
    let buffer = vk_ctx.create_uniform_buffer_for_all_queues(
      format!("{}.camera_ubo", name),
      std::mem::size_of::<CameraUBO>(),
    )?;
    let camera = Self { view, proj, buffer };
    camera.write_to_gpu()?;
    Ok(camera)
  }

  pub fn write_to_gpu(&self) -> anyhow::Result<()> {
    let data = CameraUBO {
      view: self.view,
      proj: self.proj,
    };
    self.buffer.write_to_mapped(bytemuck::bytes_of(&data))
  }

  pub unsafe fn destroy(&mut self, allocator: &vma::Allocator) {
    self.buffer.delete(allocator);
  }
}

/// Vulkan has Y pointing down in clip space
fn flip_y(mut proj: Mat4) -> Mat4 {
  proj.y_axis.y *= -1.0;
  proj
}

pub fn perspective_matrix(cfg: &CameraConfig, viewport: vk::Extent2D) -> Mat4 {
  let aspect_ratio = viewport.width as f32 / viewport.height.max(1) as f32;
  flip_y(Mat4::perspective_rh(
    cfg.fov_dgr.to_radians(),
    aspect_ratio,
    cfg.z_near,
    cfg.z_far,
  ))
}

/// Directional light, all rays are parallel
pub fn light_matrices(cfg: &ShadowSourceCfg) -> (Mat4, Mat4) {
  let view = Mat4::look_at_rh(cfg.position(), cfg.look_at_target, Vec3::Y);
  let p = &cfg.projection;
  let proj = flip_y(Mat4::orthographic_rh(
    p.left, p.right, p.bottom, p.top, p.near, p.far,
  ));
  (view, proj)
}

/// Position on a sphere around the target. Angles in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OrbitState {
  /// around Y axis
  pub theta: f32,
  /// around (rotated) X axis
  pub phi: f32,
  pub radius: f32,
}

impl OrbitState {
  pub fn rotate(&mut self, d_theta: f32, d_phi: f32) {
    self.theta += d_theta;
    self.phi += d_phi;
  }

  pub fn zoom(&mut self, delta: f32, min_radius: f32, max_radius: f32) {
    self.radius = (self.radius - delta).clamp(min_radius, max_radius);
  }

  pub fn camera_to_world(&self, target: Vec3) -> Mat4 {
    Mat4::from_translation(target)
      * Mat4::from_rotation_y(self.theta.to_radians())
      * Mat4::from_rotation_x(self.phi.to_radians())
      * Mat4::from_translation(Vec3::new(0.0, 0.0, self.radius))
  }

  pub fn view_matrix(&self, target: Vec3) -> Mat4 {
    self.camera_to_world(target).inverse()
  }

  pub fn position(&self, target: Vec3) -> Vec3 {
    self.camera_to_world(target).w_axis.truncate()
  }
}

/// Viewer camera controlled with the mouse
pub struct OrbitCamera {
  pub orbit: OrbitState,
  pub camera: Camera,
  target: Vec3,
  min_radius: f32,
  max_radius: f32,
  rotate_sensitivity: f32,
  zoom_sensitivity: f32,
}

impl OrbitCamera {
  pub fn new(vk_ctx: &VkCtx, cfg: &CameraConfig) -> anyhow::Result<Self> {
    let orbit = OrbitState {
      theta: 0.0,
      phi: 0.0,
      radius: cfg.orbit_radius,
    };
    let view = orbit.view_matrix(cfg.target);
    let proj = perspective_matrix(cfg, vk_ctx.swapchain.size);
    let camera = Camera::new(vk_ctx, "viewer", view, proj)?;

    Ok(Self {
      orbit,
      camera,
      target: cfg.target,
      min_radius: cfg.min_orbit_radius,
      max_radius: cfg.max_orbit_radius,
      rotate_sensitivity: cfg.rotate_sensitivity,
      zoom_sensitivity: cfg.zoom_sensitivity,
    })
  }

  /// Mouse drag deltas in pixels: `(previous - current)`
  pub fn update_orbit(&mut self, dx: f32, dy: f32, dz: f32) -> anyhow::Result<()> {
    self
      .orbit
      .rotate(dx * self.rotate_sensitivity, dy * self.rotate_sensitivity);
    self
      .orbit
      .zoom(dz * self.zoom_sensitivity, self.min_radius, self.max_radius);
    self.camera.view = self.orbit.view_matrix(self.target);
    self.camera.write_to_gpu()
  }

  pub fn on_resize(&mut self, cfg: &CameraConfig, viewport: vk::Extent2D) -> anyhow::Result<()> {
    self.camera.proj = perspective_matrix(cfg, viewport);
    self.camera.write_to_gpu()
  }
}

pub struct SceneCameras {
  pub viewer: OrbitCamera,
  /// Shadow and opacity passes render from here
  pub light: Camera,
}

impl SceneCameras {
  pub fn new(
    vk_ctx: &VkCtx,
    camera_cfg: &CameraConfig,
    light_cfg: &ShadowSourceCfg,
  ) -> anyhow::Result<Self> {
    info!("Creating SceneCameras");
    let viewer = OrbitCamera::new(vk_ctx, camera_cfg)?;
    let (light_view, light_proj) = light_matrices(light_cfg);
    let light = Camera::new(vk_ctx, "light", light_view, light_proj)?;
    Ok(Self { viewer, light })
  }

  pub unsafe fn destroy(&mut self, allocator: &vma::Allocator) {
    self.viewer.camera.destroy(allocator);
    self.light.destroy(allocator);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::{vec3, vec4};

  fn initial_orbit() -> OrbitState {
    OrbitState {
      theta: 0.0,
      phi: 0.0,
      radius: 10.0,
    }
  }

  #[test]
  fn initial_view_looks_at_target() {
    let target = vec3(0.0, 1.0, 0.0);
    let view = initial_orbit().view_matrix(target);
    let expected = Mat4::look_at_rh(vec3(0.0, 1.0, 10.0), target, Vec3::Y);
    assert!(view.abs_diff_eq(expected, 1e-5));
  }

  #[test]
  fn orbit_keeps_distance_to_target() {
    let target = vec3(0.0, 1.0, 0.0);
    let mut orbit = initial_orbit();
    orbit.rotate(37.0, -20.0);
    let pos = orbit.position(target);
    assert!((pos.distance(target) - 10.0).abs() < 1e-4);
  }

  #[test]
  fn zoom_is_clamped() {
    let mut orbit = initial_orbit();
    orbit.zoom(100.0, 1.0, 50.0);
    assert_eq!(orbit.radius, 1.0);
    orbit.zoom(-100.0, 1.0, 50.0);
    assert_eq!(orbit.radius, 50.0);
    orbit.zoom(10.0, 1.0, 50.0);
    assert_eq!(orbit.radius, 40.0);
  }

  #[test]
  fn projection_flips_y() {
    let cfg = CameraConfig::default();
    let proj = perspective_matrix(
      &cfg,
      vk::Extent2D {
        width: 640,
        height: 480,
      },
    );
    // point above the camera axis ends up with negative clip y
    let clip = proj * vec4(0.0, 1.0, -5.0, 1.0);
    assert!(clip.y < 0.0);
  }

  #[test]
  fn light_looks_at_target() {
    let cfg = ShadowSourceCfg::default();
    let (view, proj) = light_matrices(&cfg);
    let clip = proj * view * cfg.look_at_target.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
    assert!(ndc.z > 0.0 && ndc.z < 1.0);
  }
}
