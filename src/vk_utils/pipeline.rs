use anyhow::Context;
use ash::vk;

use super::{create_scissor, create_viewport, load_shader, ShaderStages};

pub fn create_pipeline_cache(device: &ash::Device) -> anyhow::Result<vk::PipelineCache> {
  let create_info = vk::PipelineCacheCreateInfo::builder().build();
  unsafe {
    device
      .create_pipeline_cache(&create_info, None)
      .context("Failed to create pipeline cache")
  }
}

pub fn create_pipeline_layout(
  device: &ash::Device,
  uniform_layouts: &[vk::DescriptorSetLayout],
  push_constant_ranges: &[vk::PushConstantRange],
) -> anyhow::Result<vk::PipelineLayout> {
  let create_info = vk::PipelineLayoutCreateInfo::builder()
    .set_layouts(uniform_layouts)
    .push_constant_ranges(push_constant_ranges)
    .build();
  unsafe {
    device
      .create_pipeline_layout(&create_info, None)
      .context("Failed to create pipeline layout")
  }
}

pub fn create_pipeline(
  device: &ash::Device,
  pipeline_cache: &vk::PipelineCache,
  pipeline_create_info: vk::GraphicsPipelineCreateInfo,
) -> anyhow::Result<vk::Pipeline> {
  let pipelines = unsafe {
    device
      .create_graphics_pipelines(*pipeline_cache, &[pipeline_create_info], None)
      .map_err(|(_, err)| err)
      .context("Failed to create graphic pipeline")?
  };
  pipelines
    .into_iter()
    .next()
    .context("Driver returned no graphic pipelines")
}

pub fn create_compute_pipeline(
  device: &ash::Device,
  pipeline_cache: &vk::PipelineCache,
  pipeline_layout: &vk::PipelineLayout,
  shader_path: &str,
) -> anyhow::Result<vk::Pipeline> {
  let (module_cs, stage_cs) = load_shader(device, vk::ShaderStageFlags::COMPUTE, shader_path)?;

  let create_info = vk::ComputePipelineCreateInfo::builder()
    .stage(stage_cs)
    .layout(*pipeline_layout)
    .build();

  let pipelines = unsafe {
    let pipelines = device
      .create_compute_pipelines(*pipeline_cache, &[create_info], None)
      .map_err(|(_, err)| err);
    device.destroy_shader_module(module_cs, None);
    pipelines.with_context(|| format!("Failed to create compute pipeline '{}'", shader_path))?
  };
  pipelines
    .into_iter()
    .next()
    .context("Driver returned no compute pipelines")
}

/// How viewport and scissor are provided
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PipelineViewport {
  /// Set during command buffer recording. Pipeline does not depend on framebuffer size.
  Dynamic,
  /// Baked into the pipeline. Pipeline has to be recreated when size changes.
  Fixed(vk::Extent2D),
}

/// Everything needed for `create_pipeline_with_defaults`.
pub struct GraphicsPipelineDesc<'a> {
  pub render_pass: vk::RenderPass,
  pub layout: vk::PipelineLayout,
  pub shaders: &'a [(vk::ShaderStageFlags, &'a str)],
  pub vertex_bindings: &'a [vk::VertexInputBindingDescription],
  pub vertex_attributes: &'a [vk::VertexInputAttributeDescription],
  pub color_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
  pub viewport: PipelineViewport,
  /// Added on top of VIEWPORT+SCISSOR (if `PipelineViewport::Dynamic`)
  pub extra_dynamic_states: &'a [vk::DynamicState],
}

/// Creates `vk::GraphicsPipelineCreateInfoBuilder` with sensible defaults
/// and gives `creator` a chance to override them.
pub fn create_pipeline_with_defaults(
  device: &ash::Device,
  desc: &GraphicsPipelineDesc,
  creator: impl FnOnce(vk::GraphicsPipelineCreateInfoBuilder) -> anyhow::Result<vk::Pipeline>,
) -> anyhow::Result<vk::Pipeline> {
  let shaders = ShaderStages::load(device, desc.shaders)?;

  let mut dynamic_states = Vec::with_capacity(2 + desc.extra_dynamic_states.len());
  let (viewports, scissors) = match desc.viewport {
    PipelineViewport::Dynamic => {
      dynamic_states.push(vk::DynamicState::VIEWPORT);
      dynamic_states.push(vk::DynamicState::SCISSOR);
      (Vec::new(), Vec::new())
    }
    PipelineViewport::Fixed(size) => (vec![create_viewport(&size)], vec![create_scissor(&size)]),
  };
  dynamic_states.extend_from_slice(desc.extra_dynamic_states);

  let viewport_state = match desc.viewport {
    PipelineViewport::Dynamic => ps_viewport_single_dynamic(),
    PipelineViewport::Fixed(_) => vk::PipelineViewportStateCreateInfo::builder()
      .viewports(&viewports)
      .scissors(&scissors)
      .build(),
  };
  let dynamic_state = ps_dynamic_state(&dynamic_states);

  let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
    .vertex_binding_descriptions(desc.vertex_bindings)
    .vertex_attribute_descriptions(desc.vertex_attributes)
    .build();
  let input_assembly_state = ps_ia_triangle_list();
  let rasterization_state = ps_raster_polygons(vk::CullModeFlags::NONE);
  let multisample_state = ps_multisample_disabled();
  let depth_stencil_state = ps_depth_less_stencil_always();
  let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
    .attachments(&desc.color_attachments)
    .build();

  let create_info_builder = vk::GraphicsPipelineCreateInfo::builder()
    .stages(&shaders.stages)
    .vertex_input_state(&vertex_input_state)
    .input_assembly_state(&input_assembly_state)
    .viewport_state(&viewport_state)
    .rasterization_state(&rasterization_state)
    .multisample_state(&multisample_state)
    .depth_stencil_state(&depth_stencil_state)
    .color_blend_state(&color_blend_state)
    .dynamic_state(&dynamic_state)
    .layout(desc.layout)
    .render_pass(desc.render_pass);

  let pipeline = creator(create_info_builder);

  unsafe { shaders.destroy(device) };

  pipeline
}

// This file contains presets for `vk::GraphicsPipelineCreateInfo`.
// Most common options, so it's actually manageable and <100LOC every time

/// PipelineInputAssembly-TRIANGLE_LIST
pub fn ps_ia_triangle_list() -> vk::PipelineInputAssemblyStateCreateInfo {
  vk::PipelineInputAssemblyStateCreateInfo::builder()
    .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
    .build()
}

/// PipelineInputAssembly-PATCH_LIST. Use together with `ps_tessellation`.
pub fn ps_ia_patch_list() -> vk::PipelineInputAssemblyStateCreateInfo {
  vk::PipelineInputAssemblyStateCreateInfo::builder()
    .topology(vk::PrimitiveTopology::PATCH_LIST)
    .build()
}

pub fn ps_tessellation(patch_control_points: u32) -> vk::PipelineTessellationStateCreateInfo {
  vk::PipelineTessellationStateCreateInfo::builder()
    .patch_control_points(patch_control_points)
    .build()
}

/// Does not specify dimensions during pipeline create, requires PipelineDynamicStateCreateInfo with
/// - vk::DynamicState::VIEWPORT
/// - vk::DynamicState::SCISSOR
pub fn ps_viewport_single_dynamic() -> vk::PipelineViewportStateCreateInfo {
  vk::PipelineViewportStateCreateInfo {
    viewport_count: 1,
    scissor_count: 1,
    ..Default::default()
  }
}

/// Default state that you would use to display opaque cube
pub fn ps_raster_polygons(
  cull_mode: vk::CullModeFlags,
) -> vk::PipelineRasterizationStateCreateInfo {
  vk::PipelineRasterizationStateCreateInfo::builder()
    .depth_clamp_enable(false)
    .polygon_mode(vk::PolygonMode::FILL)
    .cull_mode(cull_mode)
    .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
    .line_width(1.0) // validation layers: has to be 1.0 if not dynamic
    .build()
}

/// Same as `ps_raster_polygons`, but depth bias values are provided by `cmd_set_depth_bias`.
/// Requires vk::DynamicState::DEPTH_BIAS.
pub fn ps_raster_polygons_depth_bias(
  cull_mode: vk::CullModeFlags,
) -> vk::PipelineRasterizationStateCreateInfo {
  let mut state = ps_raster_polygons(cull_mode);
  state.depth_bias_enable = vk::TRUE;
  state
}

/// - Depth: test LESS, write ON
/// - Stencil: test SKIP
pub fn ps_depth_less_stencil_always() -> vk::PipelineDepthStencilStateCreateInfo {
  vk::PipelineDepthStencilStateCreateInfo::builder()
    .depth_test_enable(true)
    .depth_write_enable(true)
    .depth_compare_op(vk::CompareOp::LESS)
    .depth_bounds_test_enable(false)
    .stencil_test_enable(false)
    .build()
}

/// - Depth: test SKIP, write OFF
/// - Stencil: test SKIP
pub fn ps_depth_always_stencil_always() -> vk::PipelineDepthStencilStateCreateInfo {
  vk::PipelineDepthStencilStateCreateInfo::builder()
    .depth_test_enable(false)
    .depth_write_enable(false)
    .depth_compare_op(vk::CompareOp::ALWAYS)
    .depth_bounds_test_enable(false)
    .stencil_test_enable(false)
    .build()
}

pub fn ps_multisample_disabled() -> vk::PipelineMultisampleStateCreateInfo {
  vk::PipelineMultisampleStateCreateInfo::builder()
    .rasterization_samples(vk::SampleCountFlags::TYPE_1)
    .sample_shading_enable(false)
    .build()
}

/// Write result to all color attachments, disable blending
pub fn ps_color_attachments_write_all(
  attachment_count: usize,
) -> Vec<vk::PipelineColorBlendAttachmentState> {
  let write_all = vk::PipelineColorBlendAttachmentState::builder()
    .color_write_mask(vk::ColorComponentFlags::RGBA)
    .blend_enable(false)
    .src_color_blend_factor(vk::BlendFactor::ONE) // shader output
    .dst_color_blend_factor(vk::BlendFactor::ZERO) // existing value on destination attachment
    .src_alpha_blend_factor(vk::BlendFactor::ONE)
    .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
    .build();

  vec![write_all; attachment_count]
}

/// `dst = src + dst` on all color attachments
pub fn ps_color_attachments_additive(
  attachment_count: usize,
) -> Vec<vk::PipelineColorBlendAttachmentState> {
  let additive = vk::PipelineColorBlendAttachmentState::builder()
    .color_write_mask(vk::ColorComponentFlags::RGBA)
    .blend_enable(true)
    .color_blend_op(vk::BlendOp::ADD)
    .src_color_blend_factor(vk::BlendFactor::ONE)
    .dst_color_blend_factor(vk::BlendFactor::ONE)
    .alpha_blend_op(vk::BlendOp::ADD)
    .src_alpha_blend_factor(vk::BlendFactor::ONE)
    .dst_alpha_blend_factor(vk::BlendFactor::ONE)
    .build();

  vec![additive; attachment_count]
}

/// List of things that will be provided as separate command before draw (actuall 'runtime').
/// Used so that we do not have to specify everything during pipeline create
pub fn ps_dynamic_state(states: &[vk::DynamicState]) -> vk::PipelineDynamicStateCreateInfo {
  vk::PipelineDynamicStateCreateInfo::builder()
    .dynamic_states(states)
    .build()
}
