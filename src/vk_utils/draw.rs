use ash::vk;

use super::{create_scissor, create_viewport, size_to_rect_vk};

/// Begins render pass over whole framebuffer. Does **not** set viewport,
/// see `cmd_set_viewport_and_scissor` for pipelines that have it dynamic.
pub unsafe fn cmd_begin_render_pass_for_framebuffer(
  device: &ash::Device,
  command_buffer: vk::CommandBuffer,
  render_pass: vk::RenderPass,
  framebuffer: vk::Framebuffer,
  framebuffer_size: &vk::Extent2D,
  clear_values: &[vk::ClearValue],
) {
  let render_area = size_to_rect_vk(framebuffer_size);

  let render_pass_begin_info = vk::RenderPassBeginInfo::builder()
    .render_pass(render_pass)
    .framebuffer(framebuffer)
    .render_area(render_area)
    .clear_values(clear_values)
    .build();

  device.cmd_begin_render_pass(
    command_buffer,
    &render_pass_begin_info,
    vk::SubpassContents::INLINE,
  );
}

pub unsafe fn cmd_set_viewport_and_scissor(
  device: &ash::Device,
  command_buffer: vk::CommandBuffer,
  size: &vk::Extent2D,
) {
  device.cmd_set_viewport(command_buffer, 0, &[create_viewport(size)]);
  device.cmd_set_scissor(command_buffer, 0, &[create_scissor(size)]);
}

pub fn clear_color(rgba: [f32; 4]) -> vk::ClearValue {
  vk::ClearValue {
    color: vk::ClearColorValue { float32: rgba },
  }
}

pub fn clear_depth(depth: f32) -> vk::ClearValue {
  vk::ClearValue {
    depth_stencil: vk::ClearDepthStencilValue { depth, stencil: 0 },
  }
}
