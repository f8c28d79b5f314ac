use anyhow::Context;
use ash::vk;

use super::size_to_rect_vk;

// https://github.com/zeux/niagara/blob/master/src/resources.cpp

pub fn create_image_view(
  device: &ash::Device,
  image: vk::Image,
  image_format: vk::Format,
  aspect_mask_flags: vk::ImageAspectFlags,
) -> anyhow::Result<vk::ImageView> {
  let subresource_range = vk::ImageSubresourceRange::builder()
    .aspect_mask(aspect_mask_flags)
    .base_array_layer(0)
    .layer_count(1)
    .base_mip_level(0)
    .level_count(1)
    .build();

  let create_info = vk::ImageViewCreateInfo::builder()
    .image(image)
    .view_type(vk::ImageViewType::TYPE_2D)
    .format(image_format)
    .subresource_range(subresource_range)
    .build();

  unsafe {
    device
      .create_image_view(&create_info, None)
      .with_context(|| format!("Failed creating image view ({:?})", image_format))
  }
}

pub fn create_semaphores(device: &ash::Device, count: usize) -> anyhow::Result<Vec<vk::Semaphore>> {
  let create_info = vk::SemaphoreCreateInfo::builder()
    .flags(vk::SemaphoreCreateFlags::empty())
    .build();

  (0..count)
    .map(|_| unsafe {
      device
        .create_semaphore(&create_info, None)
        .context("Failed to create semaphore")
    })
    .collect()
}

/// Fences start signaled, so first wait at frame start does not block
pub fn create_fences(device: &ash::Device, count: usize) -> anyhow::Result<Vec<vk::Fence>> {
  let create_info = vk::FenceCreateInfo::builder()
    .flags(vk::FenceCreateFlags::SIGNALED)
    .build();

  (0..count)
    .map(|_| unsafe {
      device
        .create_fence(&create_info, None)
        .context("Failed to create fence")
    })
    .collect()
}

pub fn create_viewport(size: &vk::Extent2D) -> vk::Viewport {
  vk::Viewport {
    x: 0f32,
    y: 0f32,
    width: size.width as f32,
    height: size.height as f32,
    min_depth: 0f32,
    max_depth: 1.0f32,
  }
}

pub fn create_scissor(size: &vk::Extent2D) -> vk::Rect2D {
  size_to_rect_vk(size)
}

pub fn create_command_pool(
  device: &ash::Device,
  queue_family_index: u32,
) -> anyhow::Result<vk::CommandPool> {
  let cmd_pool_create_info = vk::CommandPoolCreateInfo::builder()
    .queue_family_index(queue_family_index)
    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
    .build();

  unsafe {
    device
      .create_command_pool(&cmd_pool_create_info, None)
      .with_context(|| format!("Failed creating command pool (family {})", queue_family_index))
  }
}

pub fn create_command_buffers(
  device: &ash::Device,
  cmd_pool: vk::CommandPool,
  count: usize,
) -> anyhow::Result<Vec<vk::CommandBuffer>> {
  let cmd_buf_create_info = vk::CommandBufferAllocateInfo::builder()
    .command_buffer_count(count as u32)
    .command_pool(cmd_pool)
    .level(vk::CommandBufferLevel::PRIMARY)
    .build();

  unsafe {
    device
      .allocate_command_buffers(&cmd_buf_create_info)
      .with_context(|| format!("Failed allocating {} command buffers", count))
  }
}

pub fn create_framebuffer(
  device: &ash::Device,
  render_pass: vk::RenderPass,
  image_views: &[vk::ImageView],
  size: &vk::Extent2D,
) -> anyhow::Result<vk::Framebuffer> {
  let create_info = vk::FramebufferCreateInfo::builder()
    .render_pass(render_pass)
    .attachments(image_views)
    .width(size.width)
    .height(size.height)
    .layers(1)
    .build();
  unsafe {
    device
      .create_framebuffer(&create_info, None)
      .with_context(|| format!("Failed to create framebuffer {}x{}", size.width, size.height))
  }
}

/// Sampler for light-space maps (shadow depth, opacity).
/// Outside of the map there is nothing that could occlude, hence white border.
pub fn create_light_map_sampler(device: &ash::Device) -> anyhow::Result<vk::Sampler> {
  let create_info = vk::SamplerCreateInfo::builder()
    .mag_filter(vk::Filter::LINEAR)
    .min_filter(vk::Filter::LINEAR)
    .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
    .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
    .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
    .anisotropy_enable(false)
    .max_anisotropy(1f32)
    .compare_enable(false)
    .compare_op(vk::CompareOp::ALWAYS)
    .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
    .unnormalized_coordinates(false) // address with [0, 1) instead of [0, tex_width)
    // mipmaps:
    .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
    .mip_lod_bias(0f32)
    .min_lod(0f32)
    .max_lod(1f32)
    .build();

  unsafe {
    device
      .create_sampler(&create_info, None)
      .context("Failed to create sampler")
  }
}
