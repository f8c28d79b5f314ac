use ash;
use ash::vk;

use crate::vk_utils::QueueFamilies;

pub struct VkCtxDevice {
  pub phys_device: vk::PhysicalDevice,
  pub queue_families: QueueFamilies,
  pub device: ash::Device,
  /// Renders and presents
  pub graphics_queue: vk::Queue,
  /// Strand simulation. Same handle as `graphics_queue` if there is no dedicated compute family.
  pub compute_queue: vk::Queue,
  /// `minUniformBufferOffsetAlignment`, needed for dynamic uniform offsets
  pub min_ubo_alignment: u64,
}

impl VkCtxDevice {
  pub unsafe fn destroy(&self) {
    self.device.destroy_device(None);
  }
}

impl VkCtxDevice {
  /// Size of `T` rounded up to `minUniformBufferOffsetAlignment`.
  /// Stride between elements addressed with dynamic uniform offsets.
  pub fn aligned_ubo_size<T: bytemuck::Pod>(&self) -> vk::DeviceSize {
    align_ubo_size(std::mem::size_of::<T>() as vk::DeviceSize, self.min_ubo_alignment)
  }
}

/// Vulkan guarantees `min_align` is a power of two
pub fn align_ubo_size(size: vk::DeviceSize, min_align: vk::DeviceSize) -> vk::DeviceSize {
  if min_align == 0 {
    return size;
  }
  (size + min_align - 1) & !(min_align - 1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ubo_size_rounds_up_to_alignment() {
    assert_eq!(align_ubo_size(128, 256), 256);
    assert_eq!(align_ubo_size(256, 256), 256);
    assert_eq!(align_ubo_size(257, 64), 320);
  }

  #[test]
  fn ubo_size_without_alignment_requirement() {
    assert_eq!(align_ubo_size(100, 0), 100);
    assert_eq!(align_ubo_size(100, 1), 100);
  }
}
