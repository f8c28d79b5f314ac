use ash::vk;
use log::info;

use crate::config::DepthBias;
use crate::utils::get_simple_type_name;
use crate::vk_ctx::VkCtx;
use crate::vk_utils::*;

use super::{create_hair_pipeline, DescriptorSetLayouts, HairPipelineDesc, PassExecContext};

/// Depth of all hair groups as seen from the light. Sampled by `MainPass`.
pub struct ShadowMapPass {
  pub render_pass: vk::RenderPass,
  pipeline: vk::Pipeline,
  pipeline_layout: vk::PipelineLayout,
  depth_bias: DepthBias,
}

impl ShadowMapPass {
  pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

  pub fn new(
    vk_ctx: &VkCtx,
    layouts: &DescriptorSetLayouts,
    depth_bias: DepthBias,
  ) -> anyhow::Result<Self> {
    info!("Creating {}", get_simple_type_name::<Self>());
    let device = vk_ctx.vk_device();

    let render_pass = Self::create_render_pass(device)?;
    // 0: light camera, 1: hair transform
    let pipeline_layout =
      create_pipeline_layout(device, &[layouts.camera, layouts.hair_transform], &[])?;
    let pipeline = create_hair_pipeline(
      device,
      &vk_ctx.pipeline_cache,
      HairPipelineDesc {
        render_pass,
        layout: pipeline_layout,
        fragment_shader: None,
        color_attachments: Vec::new(),
        viewport: PipelineViewport::Dynamic,
        depth_stencil: ps_depth_less_stencil_always(),
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
    let depth_attachment = create_depth_attachment(
      0,
      Self::DEPTH_FORMAT,
      vk::AttachmentLoadOp::CLEAR,
      vk::AttachmentStoreOp::STORE,
      vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );

    create_render_pass(
      device,
      Some(&depth_attachment),
      &[],
      &Self::subpass_dependencies(),
    )
  }

  /// Readers sample the shadow map at arbitrary texels, so neither
  /// dependency can be `BY_REGION`.
  pub fn subpass_dependencies() -> [vk::SubpassDependency; 2] {
    let depth_tests =
      vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    // previous frame's opacity and main passes might still sample the shadow map
    let before = create_subpass_dependency(
      vk::SUBPASS_EXTERNAL,
      0,
      (
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        vk::AccessFlags::SHADER_READ,
      ),
      (depth_tests, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
      false,
    );
    let after = create_subpass_dependency(
      0,
      vk::SUBPASS_EXTERNAL,
      (depth_tests, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
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
      resources.shadow_map_fbo,
      &size,
      &[clear_depth(1.0)],
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

    exec_ctx.cmd_bind_graphics_sets(
      self.pipeline_layout,
      0,
      &[exec_ctx.descriptors.light_camera],
      &[],
    );
    exec_ctx.cmd_draw_hair_groups(self.pipeline_layout, 1);

    device.cmd_end_render_pass(command_buffer);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shadow_map_writes_are_visible_to_samplers() {
    let [before, after] = ShadowMapPass::subpass_dependencies();
    for dep in [before, after] {
      assert!(!dep.dependency_flags.contains(vk::DependencyFlags::BY_REGION));
    }

    assert_eq!(after.src_subpass, 0);
    assert_eq!(after.dst_subpass, vk::SUBPASS_EXTERNAL);
    assert!(after
      .src_stage_mask
      .contains(vk::PipelineStageFlags::LATE_FRAGMENT_TESTS));
    assert_eq!(after.dst_stage_mask, vk::PipelineStageFlags::FRAGMENT_SHADER);
    assert_eq!(after.dst_access_mask, vk::AccessFlags::SHADER_READ);

    // no write before the last sampling read finished
    assert_eq!(before.src_subpass, vk::SUBPASS_EXTERNAL);
    assert_eq!(before.src_stage_mask, vk::PipelineStageFlags::FRAGMENT_SHADER);
    assert!(before
      .dst_access_mask
      .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
  }
}
