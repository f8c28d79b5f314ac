use anyhow::Context;
use ash::vk;

/// Raw Vulkan objects used to create vk::RenderPass
pub type AttachmentDefinition = (vk::AttachmentDescription, vk::AttachmentReference);

/// Color attachment that does not care about previous content (`initial_layout` UNDEFINED).
/// - final_layout - `PRESENT_SRC_KHR` if image is rendered to window framebuffer,
///   `SHADER_READ_ONLY_OPTIMAL` if it's sampled by a later pass
pub fn create_color_attachment(
  attachment_idx: u32,
  image_format: vk::Format,
  load_op: vk::AttachmentLoadOp,
  store_op: vk::AttachmentStoreOp,
  final_layout: vk::ImageLayout,
) -> AttachmentDefinition {
  let attachment = vk::AttachmentDescription::builder()
    .format(image_format)
    .samples(vk::SampleCountFlags::TYPE_1) // single sampled
    .load_op(load_op)
    .store_op(store_op)
    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
    .initial_layout(vk::ImageLayout::UNDEFINED)
    .final_layout(final_layout)
    .build();

  let attachment_reference = vk::AttachmentReference {
    attachment: attachment_idx,
    layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
  };

  (attachment, attachment_reference)
}

/// Depth attachment, stencil is ignored.
pub fn create_depth_attachment(
  attachment_idx: u32,
  image_format: vk::Format,
  load_op: vk::AttachmentLoadOp,
  store_op: vk::AttachmentStoreOp,
  final_layout: vk::ImageLayout,
) -> AttachmentDefinition {
  let attachment = vk::AttachmentDescription::builder()
    .format(image_format)
    .samples(vk::SampleCountFlags::TYPE_1)
    .load_op(load_op)
    .store_op(store_op)
    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
    .initial_layout(vk::ImageLayout::UNDEFINED)
    .final_layout(final_layout)
    .build();

  let attachment_reference = vk::AttachmentReference {
    attachment: attachment_idx,
    layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
  };

  (attachment, attachment_reference)
}

/// Dependency between the (only) subpass and whatever comes before/after the render pass.
pub fn create_subpass_dependency(
  src_subpass: u32,
  dst_subpass: u32,
  src: (vk::PipelineStageFlags, vk::AccessFlags),
  dst: (vk::PipelineStageFlags, vk::AccessFlags),
  by_region: bool,
) -> vk::SubpassDependency {
  let flags = if by_region {
    vk::DependencyFlags::BY_REGION
  } else {
    vk::DependencyFlags::empty()
  };
  vk::SubpassDependency::builder()
    .src_subpass(src_subpass)
    .dst_subpass(dst_subpass)
    .src_stage_mask(src.0)
    .src_access_mask(src.1)
    .dst_stage_mask(dst.0)
    .dst_access_mask(dst.1)
    .dependency_flags(flags)
    .build()
}

/// Single-subpass render pass. Attachment indices are: colors first, then depth.
pub fn create_render_pass(
  device: &ash::Device,
  depth: Option<&AttachmentDefinition>,
  colors: &[AttachmentDefinition],
  dependencies: &[vk::SubpassDependency],
) -> anyhow::Result<vk::RenderPass> {
  let mut all_attachment_descs = Vec::<vk::AttachmentDescription>::with_capacity(colors.len() + 1);
  colors.iter().for_each(|a| all_attachment_descs.push(a.0));

  let color_refs = colors.iter().map(|a| a.1).collect::<Vec<_>>();
  // keep alive till `create_render_pass` returns, subpass holds a pointer
  let depth_ref = depth.map(|a| a.1);

  let mut subpass_builder = vk::SubpassDescription::builder()
    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
    .color_attachments(&color_refs);
  if let (Some(a_ds), Some(depth_ref)) = (depth, depth_ref.as_ref()) {
    all_attachment_descs.push(a_ds.0);
    subpass_builder = subpass_builder.depth_stencil_attachment(depth_ref);
  }
  let subpasses = [subpass_builder.build()];

  let create_info = vk::RenderPassCreateInfo::builder()
    .dependencies(dependencies)
    .attachments(&all_attachment_descs)
    .subpasses(&subpasses)
    .build();

  unsafe {
    device
      .create_render_pass(&create_info, None)
      .context("Failed creating render pass")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn depth_attachment_is_written_in_attachment_layout() {
    let (desc, reference) = create_depth_attachment(
      1,
      vk::Format::D32_SFLOAT,
      vk::AttachmentLoadOp::CLEAR,
      vk::AttachmentStoreOp::STORE,
      vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );
    assert_eq!(desc.initial_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(
      desc.final_layout,
      vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    );
    assert_eq!(reference.attachment, 1);
    assert_eq!(
      reference.layout,
      vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    );
  }

  #[test]
  fn subpass_dependency_by_region() {
    let dep = create_subpass_dependency(
      vk::SUBPASS_EXTERNAL,
      0,
      (
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        vk::AccessFlags::SHADER_READ,
      ),
      (
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
      ),
      true,
    );
    assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
    assert_eq!(dep.dependency_flags, vk::DependencyFlags::BY_REGION);
  }
}
