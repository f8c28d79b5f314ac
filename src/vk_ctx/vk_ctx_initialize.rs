use anyhow::Context;
use log::{info, trace};
use raw_window_handle::HasRawDisplayHandle;
use std::mem::ManuallyDrop;

use ash;
use ash::extensions::khr::{Surface, Swapchain};
use ash::vk;

use crate::config::Config;
use crate::vk_ctx::vk_ctx::VkCtx;
use crate::vk_ctx::vk_ctx_command_buffers::VkCtxCommandBuffers;
use crate::vk_ctx::vk_ctx_device::VkCtxDevice;
use crate::vk_ctx::vk_ctx_swapchain::VkCtxSwapchain;
use crate::vk_ctx::vk_ctx_synchronize::VkCtxSynchronize;
use crate::vk_utils::debug::setup_debug_reporting;
use crate::vk_utils::*;

pub fn get_window_size(window: &winit::window::Window) -> vk::Extent2D {
  let size = window.inner_size();
  vk::Extent2D {
    width: size.width,
    height: size.height,
  }
}

fn create_allocator(
  instance: &ash::Instance,
  device: &ash::Device,
  phys_device: vk::PhysicalDevice,
) -> anyhow::Result<vma::Allocator> {
  let create_info = vma::AllocatorCreateInfo::new(instance, device, phys_device)
    .vulkan_api_version(vk::make_api_version(0, 1, 3, 0));
  vma::Allocator::new(create_info).context("Failed creating memory allocator (VMA lib init)")
}

// https://github.com/MaikKlein/ash/blob/master/examples/src/lib.rs#L332
pub fn vk_ctx_initialize(window: &winit::window::Window, config: &Config) -> anyhow::Result<VkCtx> {
  let graphics_debugging = config.graphics_debugging;
  let (entry, instance) = create_instance(graphics_debugging, window.raw_display_handle())?;
  let debug_utils = if graphics_debugging {
    Some(setup_debug_reporting(&entry, &instance)?)
  } else {
    None
  };

  // surface data
  let surface_loader = Surface::new(&entry, &instance); // I guess some generic OS-independent thing?
  let surface_khr = create_surface_khr(&entry, &instance, window)?; // real OS-backed thing

  // devices
  let (phys_device, queue_families) =
    pick_physical_device_and_queue_families(&instance, &surface_loader, surface_khr)?;
  let (device, graphics_queue, compute_queue) =
    pick_device_and_queues(&instance, phys_device, &queue_families)?;
  let min_ubo_alignment = unsafe {
    instance
      .get_physical_device_properties(phys_device)
      .limits
      .min_uniform_buffer_offset_alignment
  };

  // swapchain - prepare
  let window_size = get_window_size(window);
  trace!("window_size {:?}", window_size);
  let surface_format = get_swapchain_format(&surface_loader, surface_khr, phys_device)?;
  let surface_capabilities = get_surface_capabilities(phys_device, &surface_loader, surface_khr)?;
  let present_mode = get_present_mode(&surface_loader, surface_khr, phys_device, config.vsync)?;
  let swapchain_size = get_swapchain_extent(&surface_capabilities, window_size);
  let image_count =
    get_swapchain_image_count(&surface_capabilities, config.swapchain_image_count);

  // swapchain
  let swapchain_loader = Swapchain::new(&instance, &device); // I guess some generic OS-independent thing?
  let swapchain = create_swapchain_khr(
    &swapchain_loader,
    surface_khr,
    &surface_format,
    &surface_capabilities,
    &swapchain_size,
    image_count,
    present_mode,
    vk::SwapchainKHR::null(),
  )?;
  let (swapchain_images, swapchain_image_views) =
    create_swapchain_images(&swapchain_loader, swapchain, &device, surface_format.format)?;
  let frames_in_flight = swapchain_images.len();
  info!("Will use {} frames in flight", frames_in_flight);

  // command buffers
  let graphics_pool = create_command_pool(&device, queue_families.graphics)?;
  let compute_pool = create_command_pool(&device, queue_families.compute)?;
  let setup_cb = create_command_buffers(&device, graphics_pool, 1)?
    .into_iter()
    .next()
    .context("Driver returned no setup command buffer")?;

  let synchronize = VkCtxSynchronize::new(&device, frames_in_flight)?;
  let pipeline_cache = create_pipeline_cache(&device)?;

  // gpu memory allocator
  let allocator = create_allocator(&instance, &device, phys_device)?;

  Ok(VkCtx {
    entry,
    instance,
    allocator: ManuallyDrop::new(allocator),
    swapchain: VkCtxSwapchain {
      swapchain_loader,
      swapchain,
      size: swapchain_size,
      surface_format,
      present_mode,
      images: swapchain_images,
      image_views: swapchain_image_views,
    },
    synchronize,
    device: VkCtxDevice {
      phys_device,
      queue_families,
      device,
      graphics_queue,
      compute_queue,
      min_ubo_alignment,
    },
    command_buffers: VkCtxCommandBuffers {
      graphics_pool,
      compute_pool,
      setup_cb,
    },
    pipeline_cache,
    surface_loader,
    surface_khr,
    debug_utils,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocator_borrows_instance_and_device() {
    // vma keeps its own copies of the function tables
    let create: fn(
      &ash::Instance,
      &ash::Device,
      vk::PhysicalDevice,
    ) -> anyhow::Result<vma::Allocator> = create_allocator;
    let _ = create;
  }
}
