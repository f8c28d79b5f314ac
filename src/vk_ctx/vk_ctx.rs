use log::{info, trace};
use std::mem::ManuallyDrop;

use ash;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Surface;
use ash::vk;

use crate::vk_utils::{
  create_swapchain_images, create_swapchain_khr, execute_setup_cmd_buf, get_surface_capabilities,
  get_swapchain_extent, get_swapchain_image_count, WithSetupCmdBuffer,
};

use super::*;

/** Kitchen sink for Vulkan stuff */
pub struct VkCtx {
  pub entry: ash::Entry,
  pub instance: ash::Instance,
  pub swapchain: VkCtxSwapchain,
  pub synchronize: VkCtxSynchronize,
  pub device: VkCtxDevice,
  pub command_buffers: VkCtxCommandBuffers,
  pub pipeline_cache: vk::PipelineCache,
  /// Has to be dropped before the device, see `destroy`
  pub allocator: ManuallyDrop<vma::Allocator>,

  // surface
  pub surface_loader: Surface,
  pub surface_khr: vk::SurfaceKHR,

  // debug
  pub debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VkCtx {
  pub fn vk_device(&self) -> &ash::Device {
    &self.device.device
  }

  /// Frame slots, each with own semaphores and fence. Not the same as swapchain image count after resize.
  pub fn frames_in_flight(&self) -> usize {
    self.synchronize.frames_in_flight()
  }

  pub fn with_debug_loader(&self, callback: impl FnOnce(&DebugUtils)) {
    if let Some((debug_utils_loader, _)) = &self.debug_utils {
      callback(debug_utils_loader);
    }
  }

  /// Rebuild swapchain for new window size. Surface format does not change.
  /// Caller has to make sure nothing that uses swapchain images is in flight.
  pub fn recreate_swapchain(&mut self, window_size: vk::Extent2D) -> anyhow::Result<()> {
    info!(
      "Recreating swapchain for window {}x{}",
      window_size.width, window_size.height
    );
    let phys_device = self.device.phys_device;
    let device = &self.device.device;

    unsafe { device.device_wait_idle()? };

    let surface_capabilities =
      get_surface_capabilities(phys_device, &self.surface_loader, self.surface_khr)?;
    let size = get_swapchain_extent(&surface_capabilities, window_size);
    let image_count =
      get_swapchain_image_count(&surface_capabilities, self.swapchain.image_count() as u32);

    let old_swapchain = self.swapchain.swapchain;
    let swapchain = create_swapchain_khr(
      &self.swapchain.swapchain_loader,
      self.surface_khr,
      &self.swapchain.surface_format,
      &surface_capabilities,
      &size,
      image_count,
      self.swapchain.present_mode,
      old_swapchain,
    )?;

    unsafe {
      self.swapchain.destroy_image_views(device);
      self
        .swapchain
        .swapchain_loader
        .destroy_swapchain(old_swapchain, None);
    }
    self.swapchain.swapchain = swapchain;
    self.swapchain.size = size;

    let (images, image_views) = create_swapchain_images(
      &self.swapchain.swapchain_loader,
      swapchain,
      device,
      self.swapchain.surface_format.format,
    )?;
    self.swapchain.images = images;
    self.swapchain.image_views = image_views;
    trace!(
      "Swapchain recreated: {}x{}, {} images",
      size.width,
      size.height,
      self.swapchain.image_count()
    );

    Ok(())
  }

  pub unsafe fn destroy(&mut self) {
    info!("VkCtx::destroy()");
    let device = &self.device.device;

    self.synchronize.destroy(device);
    self.command_buffers.destroy(device);
    self.swapchain.destroy(device);
    device.destroy_pipeline_cache(self.pipeline_cache, None);
    self.surface_loader.destroy_surface(self.surface_khr, None);
    ManuallyDrop::drop(&mut self.allocator);

    if let Some((debug_utils_loader, debug_messenger)) = &self.debug_utils {
      debug_utils_loader.destroy_debug_utils_messenger(*debug_messenger, None);
    }

    self.device.destroy();

    self.instance.destroy_instance(None);
    info!("VkCtx::destroy() finished");
  }
}

impl WithSetupCmdBuffer for VkCtx {
  /// Runs on the graphics queue and waits till it's done.
  fn with_setup_cb(
    &self,
    callback: impl FnOnce(&ash::Device, vk::CommandBuffer),
  ) -> anyhow::Result<()> {
    unsafe {
      execute_setup_cmd_buf(
        &self.device.device,
        self.device.graphics_queue,
        self.command_buffers.setup_cb,
        callback,
      )
    }
  }
}
