use ash::vk;
use glam::Mat4;
use log::info;

use crate::config::SimulationConfig;
use crate::vk_ctx::VkCtx;
use crate::vk_utils::{VkBuffer, VkMemoryPreference, VkMemoryResource};

use super::{
  sample_root_points, MeshData, ModelTransformUBO, Strand, TransformUniform, TransformedDrawable,
};

/// Layout of `VkDrawIndirectCommand`. One vertex per strand.
#[derive(Copy, Clone, Debug, PartialEq)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct StrandDrawIndirect {
  pub vertex_count: u32,
  pub instance_count: u32,
  pub first_vertex: u32,
  pub first_instance: u32,
}
unsafe impl bytemuck::Zeroable for StrandDrawIndirect {}
unsafe impl bytemuck::Pod for StrandDrawIndirect {}

impl StrandDrawIndirect {
  pub fn for_strands(num_strands: u32) -> Self {
    Self {
      vertex_count: num_strands,
      instance_count: 1,
      first_vertex: 0,
      first_instance: 0,
    }
  }
}

/// Bytes uploaded to the strands buffer. Vulkan does not allow empty
/// buffers, so no strands still means one (never drawn) strand.
fn strands_buffer_content(strands: &[Strand]) -> Vec<Strand> {
  if strands.is_empty() {
    vec![bytemuck::Zeroable::zeroed()]
  } else {
    strands.to_vec()
  }
}

/// Straight strands on the upper part of a sphere, pointing mostly up and back.
pub fn grow_strands(cfg: &SimulationConfig, count: usize) -> Vec<Strand> {
  let scalp = MeshData::uv_sphere(cfg.scalp_radius, 16, 32);
  let emitters: Vec<_> = scalp
    .emitter_triangles(cfg.scalp_center)
    .into_iter()
    .filter(|t| t.normal.y > cfg.scalp_min_normal_y)
    .collect();

  sample_root_points(&emitters, count, cfg.root_sampling_seed)
    .iter()
    .map(|root| {
      Strand::grow(
        root.position,
        root.normal + cfg.strand_direction_bias,
        cfg.strand_length,
        cfg.initial_velocity,
      )
    })
    .collect()
}

/// Strands simulated together and drawn with a single indirect draw.
pub struct HairGroup {
  pub name: String,
  pub num_strands: u32,
  /// `Strand[]`. SSBO for simulation, vertex buffer for rendering.
  pub strands_buffer: VkBuffer,
  /// `StrandDrawIndirect`. Compute reads strand count from it.
  pub draw_indirect_buffer: VkBuffer,
  pub transform: TransformUniform,
  /// `ModelTransformUBO`, persistently mapped
  pub transform_buffer: VkBuffer,
}

impl HairGroup {
  pub fn new(
    vk_ctx: &VkCtx,
    name: &str,
    strands: &[Strand],
    model_matrix: Mat4,
  ) -> anyhow::Result<Self> {
    let num_strands = strands.len() as u32;
    info!("Creating HairGroup '{}' with {} strands", name, num_strands);

    let strands_content = strands_buffer_content(strands);
    let strands_buffer = vk_ctx.create_buffer_from_data(
      format!("{}.strands", name),
      bytemuck::cast_slice(&strands_content),
      vk::BufferUsageFlags::STORAGE_BUFFER
        | vk::BufferUsageFlags::VERTEX_BUFFER
        | vk::BufferUsageFlags::INDIRECT_BUFFER,
    )?;

    let draw_indirect = StrandDrawIndirect::for_strands(num_strands);
    let draw_indirect_buffer = vk_ctx.create_buffer_from_data(
      format!("{}.draw_indirect", name),
      bytemuck::bytes_of(&draw_indirect),
      vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER,
    )?;

    let transform_buffer = vk_ctx.create_buffer_empty(
      format!("{}.transform_ubo", name),
      std::mem::size_of::<ModelTransformUBO>(),
      vk::BufferUsageFlags::UNIFORM_BUFFER,
      VkMemoryPreference::GpuMappable,
    )?;

    let group = Self {
      name: name.to_string(),
      num_strands,
      strands_buffer,
      draw_indirect_buffer,
      transform: TransformUniform::new(model_matrix),
      transform_buffer,
    };
    group.write_transform_to_gpu()?;
    Ok(group)
  }

  pub fn has_strands(&self) -> bool {
    self.num_strands > 0
  }

  pub fn write_transform_to_gpu(&self) -> anyhow::Result<()> {
    let data = self.transform.ubo_data();
    self
      .transform_buffer
      .write_to_mapped(bytemuck::bytes_of(&data))
  }

  pub unsafe fn destroy(&mut self, allocator: &vma::Allocator) {
    self.strands_buffer.delete(allocator);
    self.draw_indirect_buffer.delete(allocator);
    self.transform_buffer.delete(allocator);
  }
}

impl TransformedDrawable for HairGroup {
  fn name(&self) -> &str {
    &self.name
  }

  fn transform(&self) -> &TransformUniform {
    &self.transform
  }

  /// Vertex count comes from the GPU, after the simulation had its say.
  unsafe fn cmd_draw(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.strands_buffer.buffer], &[0]);
    device.cmd_draw_indirect(
      command_buffer,
      self.draw_indirect_buffer.buffer,
      0,
      1,
      std::mem::size_of::<StrandDrawIndirect>() as u32,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scene::NUM_CURVE_POINTS;

  #[test]
  fn draw_indirect_counts_strands() {
    let cfg = SimulationConfig::default();
    let strands = grow_strands(&cfg, 10);
    assert_eq!(strands.len(), 10);
    assert_eq!(strands[0].curve_points.len(), NUM_CURVE_POINTS);

    let cmd = StrandDrawIndirect::for_strands(strands.len() as u32);
    assert_eq!(cmd.vertex_count, 10);
    assert_eq!(cmd.instance_count, 1);
    assert_eq!(std::mem::size_of::<StrandDrawIndirect>(), 16);
  }

  #[test]
  fn zero_strands_still_allocates_but_draws_nothing() {
    let content = strands_buffer_content(&[]);
    assert_eq!(content.len(), 1);
    assert!(bytemuck::cast_slice::<Strand, u8>(&content)
      .iter()
      .all(|b| *b == 0));
    assert_eq!(StrandDrawIndirect::for_strands(0).vertex_count, 0);
  }

  #[test]
  fn strands_grow_from_scalp_upwards() {
    let cfg = SimulationConfig::default();
    let strands = grow_strands(&cfg, 50);
    for s in &strands {
      let root_dist = s.root().distance(cfg.scalp_center);
      assert!(root_dist <= cfg.scalp_radius + 1e-4);
      assert!(s.tip().y > s.root().y);
    }
    // same seed, same hair
    let again = grow_strands(&cfg, 50);
    assert_eq!(strands[7].tip(), again[7].tip());
  }
}
