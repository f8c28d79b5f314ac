use ash::vk;
use glam::{Mat4, Vec3};
use log::{info, trace};

use crate::config::Config;
use crate::utils::vec3_to_pretty_str;
use crate::vk_ctx::VkCtx;
use crate::vk_utils::{VkBuffer, VkMemoryPreference, VkMemoryResource};

use super::{
  grow_strands, Collider, Grid, HairGroup, MeshData, Model, ModelTransformUBO, COLLIDER_PRESETS,
  TEST_SPHERE_COLLIDER,
};

/// Data for the `TimeUBO` uniform block. Both in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct Time {
  pub delta_time: f32,
  pub total_time: f32,
}
unsafe impl bytemuck::Zeroable for Time {}
unsafe impl bytemuck::Pod for Time {}

impl Time {
  pub fn advance(&mut self, delta_time: f32) {
    self.delta_time = delta_time;
    self.total_time += delta_time;
  }
}

pub struct Scene {
  pub models: Vec<Model>,
  pub hair_groups: Vec<HairGroup>,
  pub colliders: Vec<Collider>,
  /// `Collider[]`, persistently mapped
  pub colliders_buffer: VkBuffer,
  pub grid: Grid,
  pub time: Time,
  /// `Time`, persistently mapped
  pub time_buffer: VkBuffer,
  /// One `ModelTransformUBO` per model, `model_transform_stride` apart.
  /// Persistently mapped.
  pub model_transforms_buffer: VkBuffer,
  pub model_transform_stride: vk::DeviceSize,
}

impl Scene {
  pub fn new(vk_ctx: &VkCtx, config: &Config) -> anyhow::Result<Self> {
    info!("Creating Scene");
    let sim_cfg = &config.simulation;

    let colliders: Vec<Collider> = COLLIDER_PRESETS.iter().map(|p| p.create()).collect();
    let colliders_buffer = vk_ctx.create_uniform_buffer_for_all_queues(
      "Scene.colliders".to_string(),
      colliders.len() * std::mem::size_of::<Collider>(),
    )?;

    // models
    let head = Model::new(
      vk_ctx,
      "head",
      &MeshData::uv_sphere(sim_cfg.scalp_radius, 16, 32),
      Mat4::from_translation(sim_cfg.scalp_center),
      0,
    )?;
    let test_sphere = Model::new(
      vk_ctx,
      "test_sphere",
      &MeshData::uv_sphere(1.0, 16, 32),
      colliders[TEST_SPHERE_COLLIDER].transform,
      1,
    )?
    .with_collider(TEST_SPHERE_COLLIDER);
    let models = vec![head, test_sphere];

    let model_transform_stride = vk_ctx.device.aligned_ubo_size::<ModelTransformUBO>();
    let model_transforms_buffer = vk_ctx.create_buffer_empty(
      "Scene.model_transforms".to_string(),
      (model_transform_stride as usize) * models.len().max(1),
      vk::BufferUsageFlags::UNIFORM_BUFFER,
      VkMemoryPreference::GpuMappable,
    )?;

    // hair
    let strands = grow_strands(sim_cfg, sim_cfg.strands_per_group);
    let hair_groups = vec![HairGroup::new(vk_ctx, "hair", &strands, Mat4::IDENTITY)?];

    let time_buffer = vk_ctx.create_uniform_buffer_for_all_queues(
      "Scene.time".to_string(),
      std::mem::size_of::<Time>(),
    )?;

    let scene = Self {
      models,
      hair_groups,
      colliders,
      colliders_buffer,
      grid: Grid::new(vk_ctx)?,
      time: Time::default(),
      time_buffer,
      model_transforms_buffer,
      model_transform_stride,
    };

    scene.write_colliders_to_gpu()?;
    scene.write_model_transforms_to_gpu()?;
    scene.write_time_to_gpu()?;
    Ok(scene)
  }

  pub unsafe fn destroy(&mut self, allocator: &vma::Allocator) {
    self.models.iter_mut().for_each(|m| m.destroy(allocator));
    self.hair_groups.iter_mut().for_each(|h| h.destroy(allocator));
    self.grid.destroy(allocator);
    self.colliders_buffer.delete(allocator);
    self.time_buffer.delete(allocator);
    self.model_transforms_buffer.delete(allocator);
  }

  pub fn update_time(&mut self, delta_time: f32) -> anyhow::Result<()> {
    self.time.advance(delta_time);
    self.write_time_to_gpu()
  }

  /// Move collider (and the model that represents it) in world space.
  pub fn translate_collider(&mut self, collider_idx: usize, delta: Vec3) -> anyhow::Result<()> {
    let collider = match self.colliders.get_mut(collider_idx) {
      Some(c) => c,
      None => anyhow::bail!(
        "Tried to move collider {}, scene has only {}",
        collider_idx,
        self.colliders.len()
      ),
    };
    collider.translate(delta);
    trace!(
      "Collider {} moved to {}",
      collider_idx,
      vec3_to_pretty_str(collider.center())
    );

    let translation = Mat4::from_translation(delta);
    self
      .models
      .iter_mut()
      .filter(|m| m.attached_collider == Some(collider_idx))
      .for_each(|m| m.transform.model_matrix = translation * m.transform.model_matrix);

    self.write_colliders_to_gpu()?;
    self.write_model_transforms_to_gpu()
  }

  /// Value for `cmd_bind_descriptor_sets`' dynamic offset
  pub fn model_transform_offset(&self, model: &Model) -> u32 {
    (model.transform_slot as vk::DeviceSize * self.model_transform_stride) as u32
  }

  fn write_colliders_to_gpu(&self) -> anyhow::Result<()> {
    self
      .colliders_buffer
      .write_to_mapped(bytemuck::cast_slice(&self.colliders))
  }

  fn write_model_transforms_to_gpu(&self) -> anyhow::Result<()> {
    for model in &self.models {
      let data = model.transform.ubo_data();
      let offset = self.model_transform_offset(model) as usize;
      self
        .model_transforms_buffer
        .write_to_mapped_at(offset, bytemuck::bytes_of(&data))?;
    }
    Ok(())
  }

  fn write_time_to_gpu(&self) -> anyhow::Result<()> {
    self.time_buffer.write_to_mapped(bytemuck::bytes_of(&self.time))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn time_accumulates() {
    let mut time = Time::default();
    time.advance(0.016);
    time.advance(0.020);
    assert!((time.delta_time - 0.020).abs() < 1e-7);
    assert!((time.total_time - 0.036).abs() < 1e-6);
    assert_eq!(std::mem::size_of::<Time>(), 8);
  }

  #[test]
  fn collider_gpu_layout() {
    assert_eq!(std::mem::size_of::<Collider>(), 3 * 64);
    let colliders: Vec<Collider> = COLLIDER_PRESETS.iter().map(|p| p.create()).collect();
    let bytes: &[u8] = bytemuck::cast_slice(&colliders);
    assert_eq!(bytes.len(), colliders.len() * 192);
  }
}
