use ash::vk;
use log::{info, trace};

use crate::config::Config;
use crate::scene::MeshVertex;
use crate::utils::get_simple_type_name;
use crate::vk_ctx::VkCtx;
use crate::vk_utils::*;

use super::{create_hair_pipeline, DescriptorSetLayouts, HairPipelineDesc, PassExecContext};

const MODEL_SHADERS: [(vk::ShaderStageFlags, &str); 2] = [
  (
    vk::ShaderStageFlags::VERTEX,
    "./assets/shaders-compiled/mesh.vert.spv",
  ),
  (
    vk::ShaderStageFlags::FRAGMENT,
    "./assets/shaders-compiled/mesh.frag.spv",
  ),
];
const HAIR_FRAGMENT_SHADER_PATH: &str = "./assets/shaders-compiled/hair.frag.spv";

/// Renders models and hair into the swapchain image.
///
/// Pipelines have the viewport baked in, so they are rebuilt together with the
/// size-dependent resources. Render pass only depends on formats and survives resize.
pub struct MainPass {
  pub render_pass: vk::RenderPass,
  model_pipeline: vk::Pipeline,
  model_pipeline_layout: vk::PipelineLayout,
  hair_pipeline: vk::Pipeline,
  hair_pipeline_layout: vk::PipelineLayout,
  /// color, depth
  clear_values: [vk::ClearValue; 2],
}

impl MainPass {
  pub fn new(
    vk_ctx: &VkCtx,
    layouts: &DescriptorSetLayouts,
    depth_format: vk::Format,
    config: &Config,
  ) -> anyhow::Result<Self> {
    info!("Creating {}", get_simple_type_name::<Self>());
    let device = vk_ctx.vk_device();
    let color_format = vk_ctx.swapchain.surface_format.format;

    let render_pass = Self::create_render_pass(device, color_format, depth_format)?;
    // 0: viewer camera, 1: transform, 2: light camera, 3: light maps
    let model_pipeline_layout = create_pipeline_layout(
      device,
      &[
        layouts.camera,
        layouts.model_transform,
        layouts.camera,
        layouts.light_maps,
      ],
      &[],
    )?;
    let hair_pipeline_layout = create_pipeline_layout(
      device,
      &[
        layouts.camera,
        layouts.hair_transform,
        layouts.camera,
        layouts.light_maps,
      ],
      &[],
    )?;

    // pipelines depend on the viewport, see `recreate_pipelines`
    Ok(Self {
      render_pass,
      model_pipeline: vk::Pipeline::null(),
      model_pipeline_layout,
      hair_pipeline: vk::Pipeline::null(),
      hair_pipeline_layout,
      clear_values: [config.clear_color(), config.clear_depth_stencil()],
    })
  }

  pub unsafe fn destroy(&self, device: &ash::Device) {
    self.destroy_pipelines(device);
    device.destroy_pipeline_layout(self.model_pipeline_layout, None);
    device.destroy_pipeline_layout(self.hair_pipeline_layout, None);
    device.destroy_render_pass(self.render_pass, None);
  }

  unsafe fn destroy_pipelines(&self, device: &ash::Device) {
    // null handles are ignored
    device.destroy_pipeline(self.model_pipeline, None);
    device.destroy_pipeline(self.hair_pipeline, None);
  }

  /// Device must be idle.
  pub fn recreate_pipelines(&mut self, vk_ctx: &VkCtx, viewport: vk::Extent2D) -> anyhow::Result<()> {
    trace!(
      "{} pipelines for viewport {}x{}",
      get_simple_type_name::<Self>(),
      viewport.width,
      viewport.height
    );
    let device = vk_ctx.vk_device();
    let pipeline_cache = &vk_ctx.pipeline_cache;
    unsafe { self.destroy_pipelines(device) };
    self.model_pipeline = vk::Pipeline::null();
    self.hair_pipeline = vk::Pipeline::null();

    let model_desc = GraphicsPipelineDesc {
      render_pass: self.render_pass,
      layout: self.model_pipeline_layout,
      shaders: &MODEL_SHADERS,
      vertex_bindings: &MeshVertex::BINDINGS_DESC,
      vertex_attributes: &MeshVertex::ATTRIBUTES_DESC,
      color_attachments: ps_color_attachments_write_all(1),
      viewport: PipelineViewport::Fixed(viewport),
      extra_dynamic_states: &[],
    };
    self.model_pipeline = create_pipeline_with_defaults(device, &model_desc, |builder| {
      let rasterization = ps_raster_polygons(vk::CullModeFlags::BACK);
      let pipeline_create_info = builder.rasterization_state(&rasterization).build();
      create_pipeline(device, pipeline_cache, pipeline_create_info)
    })?;

    self.hair_pipeline = create_hair_pipeline(
      device,
      pipeline_cache,
      HairPipelineDesc {
        render_pass: self.render_pass,
        layout: self.hair_pipeline_layout,
        fragment_shader: Some(HAIR_FRAGMENT_SHADER_PATH),
        color_attachments: ps_color_attachments_write_all(1),
        viewport: PipelineViewport::Fixed(viewport),
        depth_stencil: ps_depth_less_stencil_always(),
        dynamic_depth_bias: false,
      },
    )?;

    Ok(())
  }

  fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
  ) -> anyhow::Result<vk::RenderPass> {
    let color_attachment = create_color_attachment(
      0,
      color_format,
      vk::AttachmentLoadOp::CLEAR,
      vk::AttachmentStoreOp::STORE,
      vk::ImageLayout::PRESENT_SRC_KHR,
    );
    let depth_attachment = create_depth_attachment(
      1,
      depth_format,
      vk::AttachmentLoadOp::CLEAR,
      vk::AttachmentStoreOp::DONT_CARE,
      vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    create_render_pass(
      device,
      Some(&depth_attachment),
      &[color_attachment],
      &[Self::external_dependency()],
    )
  }

  /// Depth image is shared by all frames in flight. Clearing it has to wait
  /// for the previous frame's depth writes, including late fragment tests.
  pub fn external_dependency() -> vk::SubpassDependency {
    let depth_tests =
      vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | depth_tests;
    create_subpass_dependency(
      vk::SUBPASS_EXTERNAL,
      0,
      (
        attachment_stages,
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
      ),
      (
        attachment_stages,
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
      ),
      false,
    )
  }

  pub unsafe fn execute(&self, exec_ctx: &PassExecContext) {
    let device = exec_ctx.device();
    let command_buffer = exec_ctx.command_buffer;
    let resources = exec_ctx.resources;
    let scene = exec_ctx.scene;

    cmd_begin_render_pass_for_framebuffer(
      device,
      command_buffer,
      self.render_pass,
      resources.main_fbos[exec_ctx.swapchain_image_idx],
      &resources.layout.framebuffer_extent,
      &self.clear_values,
    );

    // models
    device.cmd_bind_pipeline(
      command_buffer,
      vk::PipelineBindPoint::GRAPHICS,
      self.model_pipeline,
    );
    self.cmd_bind_shared_sets(exec_ctx, self.model_pipeline_layout);
    for model in &scene.models {
      exec_ctx.cmd_bind_graphics_sets(
        self.model_pipeline_layout,
        1,
        &[exec_ctx.descriptors.model_transforms],
        &[scene.model_transform_offset(model)],
      );
      exec_ctx.cmd_draw(model);
    }

    // hair. Set 1 layout differs, so everything has to be bound again
    device.cmd_bind_pipeline(
      command_buffer,
      vk::PipelineBindPoint::GRAPHICS,
      self.hair_pipeline,
    );
    self.cmd_bind_shared_sets(exec_ctx, self.hair_pipeline_layout);
    exec_ctx.cmd_draw_hair_groups(self.hair_pipeline_layout, 1);

    device.cmd_end_render_pass(command_buffer);
  }

  unsafe fn cmd_bind_shared_sets(&self, exec_ctx: &PassExecContext, layout: vk::PipelineLayout) {
    let descriptors = exec_ctx.descriptors;
    exec_ctx.cmd_bind_graphics_sets(layout, 0, &[descriptors.viewer_camera], &[]);
    exec_ctx.cmd_bind_graphics_sets(
      layout,
      2,
      &[descriptors.light_camera, descriptors.light_maps],
      &[],
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn depth_clear_waits_for_previous_depth_writes() {
    let dep = MainPass::external_dependency();
    assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
    assert_eq!(dep.dst_subpass, 0);
    assert!(dep
      .src_stage_mask
      .contains(vk::PipelineStageFlags::LATE_FRAGMENT_TESTS));
    assert!(dep
      .src_access_mask
      .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    // swapchain image comes from the acquire semaphore wait
    assert!(dep
      .src_stage_mask
      .contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT));
    assert!(dep
      .dst_access_mask
      .contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
  }
}
