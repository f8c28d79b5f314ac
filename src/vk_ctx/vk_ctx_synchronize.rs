use ash;
use ash::vk;

use crate::vk_utils::{create_fences, create_semaphores};

/**
https://www.khronos.org/assets/uploads/developers/library/2016-vulkan-devday-uk/7-Keeping-your-GPU-fed.pdf

One of each per frame in flight. Count is decided once, at startup,
so it does not change when the swapchain is recreated.
*/
pub struct VkCtxSynchronize {
  /// Signaled by acquire, waited on by graphics submit
  pub image_available_semaphores: Vec<vk::Semaphore>,
  /// Signaled by graphics submit, waited on by present
  pub render_finished_semaphores: Vec<vk::Semaphore>,
  /// Signaled when all work of the frame slot is done on GPU
  pub frame_fences: Vec<vk::Fence>,
}

impl VkCtxSynchronize {
  pub fn new(device: &ash::Device, frames_in_flight: usize) -> anyhow::Result<Self> {
    Ok(Self {
      image_available_semaphores: create_semaphores(device, frames_in_flight)?,
      render_finished_semaphores: create_semaphores(device, frames_in_flight)?,
      frame_fences: create_fences(device, frames_in_flight)?,
    })
  }

  pub fn frames_in_flight(&self) -> usize {
    self.frame_fences.len()
  }

  pub unsafe fn destroy(&self, device: &ash::Device) {
    for obj in &self.image_available_semaphores {
      device.destroy_semaphore(*obj, None)
    }

    for obj in &self.render_finished_semaphores {
      device.destroy_semaphore(*obj, None)
    }

    for obj in &self.frame_fences {
      device.destroy_fence(*obj, None)
    }
  }
}
