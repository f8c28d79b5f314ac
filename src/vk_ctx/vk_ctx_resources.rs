use ash;
use ash::vk;

use crate::vk_utils::debug::set_debug_label;
use crate::vk_utils::{
  get_image_aspect_from_format, VkBuffer, VkMemoryPreference, VkMemoryResource, VkTexture,
};

use super::*;

impl VkCtx {
  // buffers
  pub fn create_buffer_empty(
    &self,
    name: String,
    size: usize,
    usage: vk::BufferUsageFlags,
    memory_pref: VkMemoryPreference,
  ) -> anyhow::Result<VkBuffer> {
    let buffer = VkBuffer::empty(&self.allocator, name, size, usage, memory_pref)?;
    self.assign_debug_label(buffer.buffer, buffer.get_name());
    Ok(buffer)
  }

  /// Host-written uniforms read by both the compute and the graphics queue.
  /// Concurrent sharing when the queues come from different families.
  pub fn create_uniform_buffer_for_all_queues(
    &self,
    name: String,
    size: usize,
  ) -> anyhow::Result<VkBuffer> {
    let queue_families = self.device.queue_families.unique_indices();
    let buffer = VkBuffer::empty_shared(
      &self.allocator,
      name,
      size,
      vk::BufferUsageFlags::UNIFORM_BUFFER,
      VkMemoryPreference::GpuMappable,
      &queue_families,
    )?;
    self.assign_debug_label(buffer.buffer, buffer.get_name());
    Ok(buffer)
  }

  pub fn create_buffer_from_data(
    &self,
    name: String,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
  ) -> anyhow::Result<VkBuffer> {
    let buffer = VkBuffer::from_data(&self.allocator, self, name, bytes, usage)?;
    self.assign_debug_label(buffer.buffer, buffer.get_name());
    Ok(buffer)
  }

  // textures
  pub fn create_texture_empty(
    &self,
    name: String,
    size: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
  ) -> anyhow::Result<VkTexture> {
    let aspect = get_image_aspect_from_format(format);
    let tex = VkTexture::empty(
      self.vk_device(),
      &self.allocator,
      name,
      size,
      format,
      usage,
      aspect,
    )?;
    self.assign_debug_label(tex.image, tex.name());
    Ok(tex)
  }

  /// Render target that is later sampled (shadow map, opacity map) or
  /// only used inside its pass (depth buffer, if `sampled` is false).
  pub fn create_attachment(
    &self,
    name: &str,
    format: vk::Format,
    size: vk::Extent2D,
    sampled: bool,
  ) -> anyhow::Result<VkTexture> {
    let aspect = get_image_aspect_from_format(format);
    let mut usage_flags = if aspect.contains(vk::ImageAspectFlags::COLOR) {
      vk::ImageUsageFlags::COLOR_ATTACHMENT
    } else {
      vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
    };
    if sampled {
      usage_flags |= vk::ImageUsageFlags::SAMPLED;
    }

    self.create_texture_empty(name.to_string(), size, format, usage_flags)
  }

  fn assign_debug_label<H: vk::Handle>(&self, handle: H, name: &str) {
    self.with_debug_loader(|debug_utils_loader| {
      unsafe {
        set_debug_label(
          debug_utils_loader,
          self.device.device.handle(),
          handle,
          name,
        )
      };
    });
  }
}
