use ash::vk;
use glam::Mat4;
use log::trace;

use crate::vk_ctx::VkCtx;
use crate::vk_utils::VkBuffer;

use super::{MeshData, TransformUniform, TransformedDrawable};

/// Rigid, indexed triangle mesh. Its transform lives in the scene's
/// shared dynamic uniform buffer, in slot `transform_slot`.
pub struct Model {
  pub name: String,
  pub vertex_buffer: VkBuffer,
  pub index_buffer: VkBuffer,
  pub index_count: u32,
  pub transform: TransformUniform,
  pub transform_slot: usize,
  /// Collider that moves together with this model
  pub attached_collider: Option<usize>,
}

impl Model {
  pub fn new(
    vk_ctx: &VkCtx,
    name: &str,
    mesh: &MeshData,
    model_matrix: Mat4,
    transform_slot: usize,
  ) -> anyhow::Result<Self> {
    trace!(
      "Model '{}': {} vertices, {} triangles",
      name,
      mesh.vertices.len(),
      mesh.triangle_count()
    );
    let vertex_buffer = vk_ctx.create_buffer_from_data(
      format!("{}.vertices", name),
      bytemuck::cast_slice(&mesh.vertices),
      vk::BufferUsageFlags::VERTEX_BUFFER,
    )?;
    let index_buffer = vk_ctx.create_buffer_from_data(
      format!("{}.indices", name),
      bytemuck::cast_slice(&mesh.indices),
      vk::BufferUsageFlags::INDEX_BUFFER,
    )?;

    Ok(Self {
      name: name.to_string(),
      vertex_buffer,
      index_buffer,
      index_count: mesh.indices.len() as u32,
      transform: TransformUniform::new(model_matrix),
      transform_slot,
      attached_collider: None,
    })
  }

  pub fn with_collider(mut self, collider_idx: usize) -> Self {
    self.attached_collider = Some(collider_idx);
    self
  }

  pub unsafe fn destroy(&mut self, allocator: &vma::Allocator) {
    self.vertex_buffer.delete(allocator);
    self.index_buffer.delete(allocator);
  }
}

impl TransformedDrawable for Model {
  fn name(&self) -> &str {
    &self.name
  }

  fn transform(&self) -> &TransformUniform {
    &self.transform
  }

  unsafe fn cmd_draw(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer.buffer], &[0]);
    device.cmd_bind_index_buffer(
      command_buffer,
      self.index_buffer.buffer,
      0,
      vk::IndexType::UINT32,
    );
    device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
  }
}
