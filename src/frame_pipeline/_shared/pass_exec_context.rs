use ash::vk;
use log::trace;

use crate::frame_pipeline::FrameResources;
use crate::scene::{Scene, TransformedDrawable};
use crate::vk_ctx::VkCtx;

use super::FrameDescriptors;

/// All the kitchen sink that we might want to use in the render pass.
/// Created so we do not have to provide it all one-by-one.
pub struct PassExecContext<'a> {
  /// Index of the swapchain image this command buffer renders to
  pub swapchain_image_idx: usize,
  pub vk_ctx: &'a VkCtx,
  pub scene: &'a Scene,
  pub descriptors: &'a FrameDescriptors,
  pub resources: &'a FrameResources,
  pub command_buffer: vk::CommandBuffer,
}

impl PassExecContext<'_> {
  pub fn device(&self) -> &ash::Device {
    self.vk_ctx.vk_device()
  }

  pub unsafe fn cmd_bind_graphics_sets(
    &self,
    pipeline_layout: vk::PipelineLayout,
    first_set: u32,
    sets: &[vk::DescriptorSet],
    dynamic_offsets: &[u32],
  ) {
    self.device().cmd_bind_descriptor_sets(
      self.command_buffer,
      vk::PipelineBindPoint::GRAPHICS,
      pipeline_layout,
      first_set,
      sets,
      dynamic_offsets,
    );
  }

  /// Draws every hair group that has strands. Group's transform goes to `transform_set`.
  pub unsafe fn cmd_draw_hair_groups(&self, pipeline_layout: vk::PipelineLayout, transform_set: u32) {
    let hair_groups = self.scene.hair_groups.iter().enumerate();
    for (idx, hair_group) in hair_groups.filter(|(_, h)| h.has_strands()) {
      self.cmd_bind_graphics_sets(
        pipeline_layout,
        transform_set,
        &[self.descriptors.hair_transforms[idx]],
        &[],
      );
      self.cmd_draw(hair_group);
    }
  }

  pub unsafe fn cmd_draw(&self, drawable: &impl TransformedDrawable) {
    trace!(
      "Recording draw of '{}' (swapchain image {})",
      drawable.name(),
      self.swapchain_image_idx
    );
    drawable.cmd_draw(self.device(), self.command_buffer);
  }
}
