use anyhow::bail;
use ash::vk;

/*
https://github.com/KhronosGroup/Vulkan-Docs/wiki/Synchronization-Examples
https://docs.vulkan.org/spec/latest/chapters/synchronization.html#synchronization-queue-transfers
https://gpuopen.com/learn/vulkan-barriers-explained/
*/

/// (stage, access) pair describing one side of a barrier
pub type BarrierScope = (vk::PipelineStageFlags2, vk::AccessFlags2);

/// Masks for the image layout transitions this app does outside of render passes.
/// Any other pair is a programmer error.
pub fn image_layout_transition_masks(
  old_layout: vk::ImageLayout,
  new_layout: vk::ImageLayout,
) -> anyhow::Result<(BarrierScope, BarrierScope)> {
  use vk::AccessFlags2 as A;
  use vk::ImageLayout as L;
  use vk::PipelineStageFlags2 as S;

  let nothing = (S::TOP_OF_PIPE, A::NONE);
  let fragment_read = (S::FRAGMENT_SHADER, A::SHADER_READ);
  let depth_write = (
    S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
    A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
  );
  let transfer_write = (S::TRANSFER, A::TRANSFER_WRITE);

  let masks = match (old_layout, new_layout) {
    (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    | (L::UNDEFINED, L::DEPTH_ATTACHMENT_OPTIMAL) => (nothing, depth_write),
    (L::UNDEFINED, L::DEPTH_STENCIL_READ_ONLY_OPTIMAL)
    | (L::UNDEFINED, L::DEPTH_READ_ONLY_OPTIMAL)
    | (L::UNDEFINED, L::SHADER_READ_ONLY_OPTIMAL) => (nothing, fragment_read),
    (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => (nothing, transfer_write),
    (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (transfer_write, fragment_read),
    _ => bail!(
      "Unsupported image layout transition {:?} -> {:?}",
      old_layout,
      new_layout
    ),
  };
  Ok(masks)
}

/// https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkImageMemoryBarrier2.html
pub fn create_image_barrier(
  image: vk::Image,
  aspect_mask: vk::ImageAspectFlags,
  old_layout: vk::ImageLayout,
  new_layout: vk::ImageLayout,
) -> anyhow::Result<vk::ImageMemoryBarrier2> {
  let (src, dst) = image_layout_transition_masks(old_layout, new_layout)?;

  let barrier = vk::ImageMemoryBarrier2::builder()
    .old_layout(old_layout)
    .new_layout(new_layout)
    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
    .image(image)
    .src_stage_mask(src.0)
    .src_access_mask(src.1)
    .dst_stage_mask(dst.0)
    .dst_access_mask(dst.1)
    .subresource_range(vk::ImageSubresourceRange {
      aspect_mask,
      base_mip_level: 0,
      level_count: 1,
      base_array_layer: 0,
      layer_count: 1,
    })
    .build();
  Ok(barrier)
}

/// Barrier for a whole buffer. Pass `vk::QUEUE_FAMILY_IGNORED` as both families
/// if there is no ownership transfer.
pub fn create_buffer_barrier(
  buffer: vk::Buffer,
  src: BarrierScope,
  dst: BarrierScope,
  src_queue_family: u32,
  dst_queue_family: u32,
) -> vk::BufferMemoryBarrier2 {
  vk::BufferMemoryBarrier2::builder()
    .buffer(buffer)
    .offset(0)
    .size(vk::WHOLE_SIZE)
    .src_stage_mask(src.0)
    .src_access_mask(src.1)
    .dst_stage_mask(dst.0)
    .dst_access_mask(dst.1)
    .src_queue_family_index(src_queue_family)
    .dst_queue_family_index(dst_queue_family)
    .build()
}

pub unsafe fn cmd_buffer_barriers(
  device: &ash::Device,
  command_buffer: vk::CommandBuffer,
  barriers: &[vk::BufferMemoryBarrier2],
) {
  if barriers.is_empty() {
    return;
  }
  let dependency_info = vk::DependencyInfo::builder()
    .buffer_memory_barriers(barriers)
    .build();
  device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_transitions_have_masks() {
    let (src, dst) = image_layout_transition_masks(
      vk::ImageLayout::UNDEFINED,
      vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    )
    .unwrap();
    assert_eq!(src.1, vk::AccessFlags2::NONE);
    assert!(dst
      .1
      .contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE));
  }

  #[test]
  fn unknown_transition_is_an_error() {
    let result = image_layout_transition_masks(
      vk::ImageLayout::PRESENT_SRC_KHR,
      vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );
    assert!(result.is_err());
  }

  #[test]
  fn buffer_barrier_covers_whole_buffer() {
    let barrier = create_buffer_barrier(
      vk::Buffer::null(),
      (vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_WRITE),
      (
        vk::PipelineStageFlags2::DRAW_INDIRECT,
        vk::AccessFlags2::INDIRECT_COMMAND_READ,
      ),
      1,
      0,
    );
    assert_eq!(barrier.size, vk::WHOLE_SIZE);
    assert_eq!(barrier.src_queue_family_index, 1);
    assert_eq!(barrier.dst_queue_family_index, 0);
  }
}
