use ash;
use ash::vk;

pub struct VkCtxCommandBuffers {
  /// Pool for the graphics queue family. Per-swapchain-image command buffers are allocated here.
  pub graphics_pool: vk::CommandPool,
  /// Pool for the compute queue family. Same family as `graphics_pool` is allowed.
  pub compute_pool: vk::CommandPool,
  /// Special command buffer used for resource init
  pub setup_cb: vk::CommandBuffer,
}

impl VkCtxCommandBuffers {
  pub unsafe fn destroy(&self, device: &ash::Device) {
    device.destroy_command_pool(self.graphics_pool, None);
    device.destroy_command_pool(self.compute_pool, None);
  }
}
