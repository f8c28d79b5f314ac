use ash::vk;
use glam::Mat4;

/// Data for the `ModelTransformUBO` uniform block
#[derive(Copy, Clone, Debug)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct ModelTransformUBO {
  pub model_matrix: Mat4,
  /// For normals. Handles non-uniform scale.
  pub inv_trans_model_matrix: Mat4,
}
unsafe impl bytemuck::Zeroable for ModelTransformUBO {}
unsafe impl bytemuck::Pod for ModelTransformUBO {}

/// Model matrix of anything drawable. The GPU copy lives either in
/// object's own buffer or in a slot of a shared one.
#[derive(Copy, Clone, Debug)]
pub struct TransformUniform {
  pub model_matrix: Mat4,
}

impl TransformUniform {
  pub fn new(model_matrix: Mat4) -> Self {
    Self { model_matrix }
  }

  pub fn ubo_data(&self) -> ModelTransformUBO {
    ModelTransformUBO {
      model_matrix: self.model_matrix,
      inv_trans_model_matrix: self.model_matrix.inverse().transpose(),
    }
  }
}

pub trait TransformedDrawable {
  fn name(&self) -> &str;

  fn transform(&self) -> &TransformUniform;

  /// Binds own vertex (and index) buffers and records the draw.
  /// Pipeline and descriptor sets must already be bound.
  unsafe fn cmd_draw(&self, device: &ash::Device, command_buffer: vk::CommandBuffer);
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::{vec3, Vec3};

  #[test]
  fn normal_matrix_handles_non_uniform_scale() {
    let t = TransformUniform::new(Mat4::from_scale(vec3(2.0, 1.0, 1.0)));
    let ubo = t.ubo_data();
    // normal of plane x = y stays perpendicular to it after transform
    let tangent = ubo.model_matrix.transform_vector3(vec3(1.0, 1.0, 0.0));
    let normal = ubo
      .inv_trans_model_matrix
      .transform_vector3(vec3(1.0, -1.0, 0.0));
    assert!(tangent.dot(normal).abs() < 1e-6);
    assert_ne!(normal.normalize(), Vec3::new(1.0, -1.0, 0.0).normalize());
  }
}
