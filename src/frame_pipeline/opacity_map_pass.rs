use ash::vk;
use log::info;

use crate::config::DepthBias;
use crate::utils::get_simple_type_name;
use crate::vk_ctx::VkCtx;
use crate::vk_utils::*;

use super::{create_hair_pipeline, DescriptorSetLayouts, HairPipelineDesc, PassExecContext};

const FRAGMENT_SHADER_PATH: &str = "./assets/shaders-compiled/hair_opacity.frag.spv";

/// Accumulates how much hair lies between each texel and the light.
/// Every fragment is compared against `ShadowMapPass` depth and added on top.
pub struct OpacityMapPass {
  pub render_pass: vk::RenderPass,
  pipeline: vk::Pipeline,
  pipeline_layout: vk::PipelineLayout,
  depth_bias: DepthBias,
}

impl OpacityMapPass {
  /// Additive blending needs more range than a swapchain format
  pub const OPACITY_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

  pub fn new(
    vk_ctx: &VkCtx,
    layouts: &DescriptorSetLayouts,
    depth_bias: DepthBias,
  ) -> anyhow::Result<Self> {
    info!("Creating {}", get_simple_type_name::<Self>());
    let device = vk_ctx.vk_device();

    let render_pass = Self::create_render_pass(device)?;
    // 0: light camera, 1: hair transform, 2: shadow map
    let pipeline_layout = create_pipeline_layout(
      device,
      &[layouts.camera, layouts.hair_transform, layouts.shadow_map],
      &[],
    )?;
    let pipeline = create_hair_pipeline(
      device,
      &vk_ctx.pipeline_cache,
      HairPipelineDesc {
        render_pass,
        layout: pipeline_layout,
        fragment_shader: Some(FRAGMENT_SHADER_PATH),
        color_attachments: ps_color_attachments_additive(1),
        viewport: PipelineViewport::Dynamic,
        // no depth attachment, occlusion is tested against the shadow map in the shader
        depth_stencil: ps_depth_always_stencil_always(),
        dynamic_depth_bias: true,
      },
    )?;

    Ok(Self {
      render_pass,
      pipeline,
      pipeline_layout,
      depth_bias,
    })
  }

  pub unsafe fn destroy(&self, device: &ash::Device) {
    device.destroy_render_pass(self.render_pass, None);
    device.destroy_pipeline_layout(self.pipeline_layout, None);
    device.destroy_pipeline(self.pipeline, None);
  }

  fn create_render_pass(device: &ash::Device) -> anyhow::Result<vk::RenderPass> {
    let color_attachment = create_color_attachment(
      0,
      Self::OPACITY_FORMAT,
      vk::AttachmentLoadOp::CLEAR,
      vk::AttachmentStoreOp::STORE,
      vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    create_render_pass(
      device,
      None,
      &[color_attachment],
      &Self::subpass_dependencies(),
    )
  }

  /// Main pass samples the opacity map at light-space texels, not the
  /// same pixel, so `BY_REGION` would not order the accesses.
  pub fn subpass_dependencies() -> [vk::SubpassDependency; 2] {
    let before = create_subpass_dependency(
      vk::SUBPASS_EXTERNAL,
      0,
      (
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        vk::AccessFlags::SHADER_READ,
      ),
      (
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        // additive blending reads the attachment too
        vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
      ),
      false,
    );
    let after = create_subpass_dependency(
      0,
      vk::SUBPASS_EXTERNAL,
      (
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
      ),
      (
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        vk::AccessFlags::SHADER_READ,
      ),
      false,
    );
    [before, after]
  }

  pub unsafe fn execute(&self, exec_ctx: &PassExecContext) {
    let device = exec_ctx.device();
    let command_buffer = exec_ctx.command_buffer;
    let resources = exec_ctx.resources;
    let size = resources.layout.light_map_extent;

    cmd_begin_render_pass_for_framebuffer(
      device,
      command_buffer,
      self.render_pass,
      resources.opacity_map_fbo,
      &size,
      &[clear_color([0.0, 0.0, 0.0, 0.0])],
    );
    device.cmd_bind_pipeline(
      command_buffer,
      vk::PipelineBindPoint::GRAPHICS,
      self.pipeline,
    );
    cmd_set_viewport_and_scissor(device, command_buffer, &size);
    device.cmd_set_depth_bias(
      command_buffer,
      self.depth_bias.constant,
      self.depth_bias.clamp,
      self.depth_bias.slope,
    );

    let descriptors = exec_ctx.descriptors;
    exec_ctx.cmd_bind_graphics_sets(self.pipeline_layout, 0, &[descriptors.light_camera], &[]);
    exec_ctx.cmd_bind_graphics_sets(self.pipeline_layout, 2, &[descriptors.shadow_map], &[]);
    exec_ctx.cmd_draw_hair_groups(self.pipeline_layout, 1);

    device.cmd_end_render_pass(command_buffer);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn opacity_writes_are_visible_to_main_pass() {
    let [before, after] = OpacityMapPass::subpass_dependencies();
    for dep in [before, after] {
      assert!(!dep.dependency_flags.contains(vk::DependencyFlags::BY_REGION));
    }
    assert_eq!(after.dst_subpass, vk::SUBPASS_EXTERNAL);
    assert_eq!(after.src_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    assert_eq!(after.dst_access_mask, vk::AccessFlags::SHADER_READ);
    assert_eq!(before.src_subpass, vk::SUBPASS_EXTERNAL);
    assert!(before
      .dst_access_mask
      .contains(vk::AccessFlags::COLOR_ATTACHMENT_READ));
  }
}
