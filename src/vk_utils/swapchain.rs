use anyhow::{anyhow, Context};
use log::trace;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use ash::extensions::khr::{Surface, Swapchain};
use ash::vk;

use crate::vk_utils::create_image_view;

pub fn size_to_rect_vk(size: &vk::Extent2D) -> vk::Rect2D {
  vk::Rect2D {
    offset: vk::Offset2D { x: 0, y: 0 },
    extent: *size,
  }
}

/// Gets surface from OS window
pub fn create_surface_khr(
  entry: &ash::Entry,
  instance: &ash::Instance,
  window: &winit::window::Window,
) -> anyhow::Result<vk::SurfaceKHR> {
  unsafe {
    ash_window::create_surface(
      entry,
      instance,
      window.raw_display_handle(),
      window.raw_window_handle(),
      None,
    )
    .context("Failed to create surface for the window")
  }
}

/// https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkSurfaceFormatKHR.html
pub fn get_swapchain_format(
  surface_loader: &Surface,
  surface_khr: vk::SurfaceKHR,
  phys_device: vk::PhysicalDevice,
) -> anyhow::Result<vk::SurfaceFormatKHR> {
  let surface_formats = unsafe {
    surface_loader
      .get_physical_device_surface_formats(phys_device, surface_khr)
      .context("Failed to query surface formats")?
  };

  // TBH there is only one that I know
  // https://stackoverflow.com/questions/66401081/vulkan-swapchain-format-unorm-vs-srgb
  let fmt = surface_formats.iter().find(|surface_fmt| {
    let fmt_ok = surface_fmt.format == vk::Format::B8G8R8A8_UNORM;
    let color_space_ok = surface_fmt.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR;
    fmt_ok && color_space_ok
  });

  fmt
    .or_else(|| surface_formats.first())
    .copied()
    .ok_or_else(|| anyhow!("Surface does not report any formats"))
}

pub fn get_surface_capabilities(
  device: vk::PhysicalDevice,
  surface_loader: &Surface,
  surface_khr: vk::SurfaceKHR,
) -> anyhow::Result<vk::SurfaceCapabilitiesKHR> {
  let surface_capabilities = unsafe {
    surface_loader
      .get_physical_device_surface_capabilities(device, surface_khr)
      .context("Failed to query surface capabilities")?
  };
  trace!("Surface_capabilities {:?}", surface_capabilities);
  Ok(surface_capabilities)
}

fn get_pre_transform(
  surface_capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::SurfaceTransformFlagsKHR {
  let can_identity = surface_capabilities
    .supported_transforms
    .contains(vk::SurfaceTransformFlagsKHR::IDENTITY);
  if can_identity {
    vk::SurfaceTransformFlagsKHR::IDENTITY
  } else {
    surface_capabilities.current_transform
  }
}

/// https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPresentModeKHR.html
/// https://github.com/EmbarkStudios/kajiya/blob/main/crates/lib/kajiya-backend/src/vulkan/swapchain.rs#L85
pub fn get_present_mode(
  surface_loader: &Surface,
  surface_khr: vk::SurfaceKHR,
  phys_device: vk::PhysicalDevice,
  vsync: bool,
) -> anyhow::Result<vk::PresentModeKHR> {
  let present_mode_preference = if vsync {
    vec![vk::PresentModeKHR::FIFO_RELAXED, vk::PresentModeKHR::FIFO]
  } else {
    vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
  };

  let present_modes = unsafe {
    surface_loader
      .get_physical_device_surface_present_modes(phys_device, surface_khr)
      .context("Failed to get surface present modes")?
  };

  let mode = present_mode_preference
    .into_iter()
    .find(|mode| present_modes.contains(mode))
    .unwrap_or(vk::PresentModeKHR::FIFO); // FIFO is guaranteed
  Ok(mode)
}

/// Surface decides if it has fixed size. If not, we clamp window size to allowed range.
pub fn get_swapchain_extent(
  capabilities: &vk::SurfaceCapabilitiesKHR,
  window_size: vk::Extent2D,
) -> vk::Extent2D {
  if capabilities.current_extent.width != u32::MAX {
    return capabilities.current_extent;
  }
  let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
  vk::Extent2D {
    width: window_size.width.clamp(min.width, max.width),
    height: window_size.height.clamp(min.height, max.height),
  }
}

/// `max_image_count == 0` means 'no limit'
pub fn get_swapchain_image_count(
  capabilities: &vk::SurfaceCapabilitiesKHR,
  preferred: u32,
) -> u32 {
  let count = preferred.max(capabilities.min_image_count);
  if capabilities.max_image_count > 0 {
    count.min(capabilities.max_image_count)
  } else {
    count
  }
}

/// Creates OS-dependent swapchain. Provide `old_swapchain` when recreating (e.g. after resize).
pub fn create_swapchain_khr(
  swapchain_loader: &Swapchain,
  surface_khr: vk::SurfaceKHR,
  surface_format: &vk::SurfaceFormatKHR,
  surface_capabilites: &vk::SurfaceCapabilitiesKHR,
  size: &vk::Extent2D,
  image_count: u32,
  present_mode: vk::PresentModeKHR,
  old_swapchain: vk::SwapchainKHR,
) -> anyhow::Result<vk::SwapchainKHR> {
  let create_info = vk::SwapchainCreateInfoKHR::builder()
    .surface(surface_khr)
    .min_image_count(image_count)
    .image_format(surface_format.format)
    .image_color_space(surface_format.color_space)
    .image_extent(*size)
    .image_array_layers(1)
    .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
    // graphics family both renders and presents
    .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
    .present_mode(present_mode)
    .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
    .pre_transform(get_pre_transform(surface_capabilites))
    .clipped(true)
    .old_swapchain(old_swapchain)
    .build();

  let swapchain = unsafe {
    swapchain_loader
      .create_swapchain(&create_info, None)
      .context("Failed to create swapchain")?
  };
  trace!("Swapchain created ({}x{})", size.width, size.height);
  Ok(swapchain)
}

pub fn create_swapchain_images(
  swapchain_loader: &Swapchain,
  swapchain: vk::SwapchainKHR,
  device: &ash::Device,
  image_format: vk::Format,
) -> anyhow::Result<(Vec<vk::Image>, Vec<vk::ImageView>)> {
  // auto destroyed with swapchain
  let swapchain_images = unsafe {
    swapchain_loader
      .get_swapchain_images(swapchain)
      .context("Failed to get swapchain images from swapchain")?
  };
  trace!("Will create {} swapchain images", swapchain_images.len());

  let swapchain_image_views = swapchain_images
    .iter()
    .map(|&swapchain_image| {
      create_image_view(
        device,
        swapchain_image,
        image_format,
        vk::ImageAspectFlags::COLOR,
      )
    })
    .collect::<anyhow::Result<Vec<_>>>()?;

  trace!("Swapchain images created");
  Ok((swapchain_images, swapchain_image_views))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn caps(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
      min_image_count: 2,
      max_image_count: 4,
      current_extent: current,
      min_image_extent: vk::Extent2D {
        width: 1,
        height: 1,
      },
      max_image_extent: vk::Extent2D {
        width: 4096,
        height: 4096,
      },
      ..Default::default()
    }
  }

  #[test]
  fn extent_follows_surface_when_fixed() {
    let surface_size = vk::Extent2D {
      width: 640,
      height: 480,
    };
    let window = vk::Extent2D {
      width: 1280,
      height: 720,
    };
    assert_eq!(get_swapchain_extent(&caps(surface_size), window), surface_size);
  }

  #[test]
  fn extent_clamps_window_size_when_surface_is_flexible() {
    let any = vk::Extent2D {
      width: u32::MAX,
      height: u32::MAX,
    };
    let window = vk::Extent2D {
      width: 10_000,
      height: 720,
    };
    let result = get_swapchain_extent(&caps(any), window);
    assert_eq!(result.width, 4096);
    assert_eq!(result.height, 720);
  }

  #[test]
  fn image_count_is_clamped() {
    let c = caps(vk::Extent2D::default());
    assert_eq!(get_swapchain_image_count(&c, 5), 4);
    assert_eq!(get_swapchain_image_count(&c, 1), 2);

    let unlimited = vk::SurfaceCapabilitiesKHR {
      max_image_count: 0,
      ..c
    };
    assert_eq!(get_swapchain_image_count(&unlimited, 5), 5);
  }
}
