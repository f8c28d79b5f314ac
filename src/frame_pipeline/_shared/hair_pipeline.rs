use ash::vk;

use crate::scene::Strand;
use crate::vk_utils::*;

/// Strand is a single vertex, expanded to a line strip on the GPU
const HAIR_GEOMETRY_SHADERS: [(vk::ShaderStageFlags, &str); 4] = [
  (
    vk::ShaderStageFlags::VERTEX,
    "./assets/shaders-compiled/hair.vert.spv",
  ),
  (
    vk::ShaderStageFlags::TESSELLATION_CONTROL,
    "./assets/shaders-compiled/hair.tesc.spv",
  ),
  (
    vk::ShaderStageFlags::TESSELLATION_EVALUATION,
    "./assets/shaders-compiled/hair.tese.spv",
  ),
  (
    vk::ShaderStageFlags::GEOMETRY,
    "./assets/shaders-compiled/hair.geom.spv",
  ),
];

pub fn hair_shader_stages(fragment_shader: Option<&str>) -> Vec<(vk::ShaderStageFlags, &str)> {
  let mut stages = HAIR_GEOMETRY_SHADERS.to_vec();
  if let Some(path) = fragment_shader {
    stages.push((vk::ShaderStageFlags::FRAGMENT, path));
  }
  stages
}

/// What differs between the shadow, opacity and main hair pipelines
pub struct HairPipelineDesc<'a> {
  pub render_pass: vk::RenderPass,
  pub layout: vk::PipelineLayout,
  /// `None` for depth-only rendering
  pub fragment_shader: Option<&'a str>,
  pub color_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
  pub viewport: PipelineViewport,
  pub depth_stencil: vk::PipelineDepthStencilStateCreateInfo,
  /// Bias values come from `cmd_set_depth_bias`
  pub dynamic_depth_bias: bool,
}

pub fn create_hair_pipeline(
  device: &ash::Device,
  pipeline_cache: &vk::PipelineCache,
  desc: HairPipelineDesc,
) -> anyhow::Result<vk::Pipeline> {
  let shaders = hair_shader_stages(desc.fragment_shader);
  let vertex_attributes = Strand::attributes_desc();
  let depth_stencil = desc.depth_stencil;
  let dynamic_depth_bias = desc.dynamic_depth_bias;
  let extra_dynamic_states: &[vk::DynamicState] = if dynamic_depth_bias {
    &[vk::DynamicState::DEPTH_BIAS]
  } else {
    &[]
  };

  let pipeline_desc = GraphicsPipelineDesc {
    render_pass: desc.render_pass,
    layout: desc.layout,
    shaders: &shaders,
    vertex_bindings: &Strand::BINDINGS_DESC,
    vertex_attributes: &vertex_attributes,
    color_attachments: desc.color_attachments,
    viewport: desc.viewport,
    extra_dynamic_states,
  };

  create_pipeline_with_defaults(device, &pipeline_desc, |builder| {
    let input_assembly = ps_ia_patch_list();
    let tessellation = ps_tessellation(1);
    let rasterization = if dynamic_depth_bias {
      ps_raster_polygons_depth_bias(vk::CullModeFlags::NONE)
    } else {
      ps_raster_polygons(vk::CullModeFlags::NONE)
    };
    let pipeline_create_info = builder
      .input_assembly_state(&input_assembly)
      .tessellation_state(&tessellation)
      .rasterization_state(&rasterization)
      .depth_stencil_state(&depth_stencil)
      .build();
    create_pipeline(device, pipeline_cache, pipeline_create_info)
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn depth_only_hair_has_no_fragment_stage() {
    let stages = hair_shader_stages(None);
    assert_eq!(stages.len(), 4);
    assert!(stages
      .iter()
      .all(|(stage, _)| *stage != vk::ShaderStageFlags::FRAGMENT));
  }

  #[test]
  fn fragment_stage_goes_last() {
    let stages = hair_shader_stages(Some("hair.frag.spv"));
    assert_eq!(stages.len(), 5);
    assert_eq!(
      stages[4],
      (vk::ShaderStageFlags::FRAGMENT, "hair.frag.spv")
    );
    assert_eq!(stages[0].0, vk::ShaderStageFlags::VERTEX);
  }
}
