use anyhow::Context;
use log::trace;
use vma::Alloc;

use ash::vk;

use crate::vk_utils::{create_image_barrier, create_image_view};

use super::{determine_gpu_allocation_info, VkMemoryPreference, WithSetupCmdBuffer};

const DEBUG_LAYOUT_TRANSITIONS: bool = false;

/// GPU image + its single view. Tracks last known layout.
pub struct VkTexture {
  // For debugging
  name: String,
  /// Native Vulkan image
  pub image: vk::Image,
  image_view: vk::ImageView,
  aspect_flags: vk::ImageAspectFlags,
  pub layout: vk::ImageLayout,
  pub allocation: vma::Allocation,
}

impl VkTexture {
  pub fn empty(
    device: &ash::Device,
    allocator: &vma::Allocator,
    name: String,
    size: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
  ) -> anyhow::Result<VkTexture> {
    let name = create_texture_name(name, size.width, size.height);
    trace!("Allocating {}", name);

    let create_info = vk::ImageCreateInfo::builder()
      .image_type(vk::ImageType::TYPE_2D)
      .extent(vk::Extent3D {
        width: size.width,
        height: size.height,
        depth: 1,
      })
      .format(format)
      .tiling(vk::ImageTiling::OPTIMAL)
      .usage(usage)
      .initial_layout(vk::ImageLayout::UNDEFINED)
      // verbose properties, but vulkan requires
      .sharing_mode(vk::SharingMode::EXCLUSIVE)
      .samples(vk::SampleCountFlags::TYPE_1)
      .mip_levels(1)
      .array_layers(1)
      .build();

    let alloc_info = determine_gpu_allocation_info(&VkMemoryPreference::GpuOnly);

    let (image, allocation) = unsafe {
      allocator
        .create_image(&create_info, &alloc_info)
        .with_context(|| format!("Failed allocating GPU memory for {}", name))?
    };

    let image_view = create_image_view(device, image, format, aspect)?;

    Ok(VkTexture {
      name,
      image,
      allocation,
      layout: create_info.initial_layout,
      image_view,
      aspect_flags: aspect,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn image_view(&self) -> vk::ImageView {
    self.image_view
  }

  /// Transition outside of any render pass, e.g. right after creation.
  pub fn force_image_layout(
    &mut self,
    with_setup_cb: &impl WithSetupCmdBuffer,
    target_layout: vk::ImageLayout,
  ) -> anyhow::Result<()> {
    let barrier = self.prepare_for_layout_transition(target_layout)?;

    with_setup_cb.with_setup_cb(|device, cmd_buf| {
      let dependency_info = vk::DependencyInfo::builder()
        .image_memory_barriers(&[barrier])
        .build();
      unsafe { device.cmd_pipeline_barrier2(cmd_buf, &dependency_info) };
    })
  }

  pub fn prepare_for_layout_transition(
    &mut self,
    new_layout: vk::ImageLayout,
  ) -> anyhow::Result<vk::ImageMemoryBarrier2> {
    if DEBUG_LAYOUT_TRANSITIONS {
      trace!(
        "VkTexture::LayoutTransition '{}' ({:?} -> {:?})",
        self.name,
        self.layout,
        new_layout
      );
    }

    let barrier = create_image_barrier(self.image, self.aspect_flags, self.layout, new_layout)?;

    self.layout = new_layout;
    Ok(barrier)
  }

  pub unsafe fn delete(&mut self, device: &ash::Device, allocator: &vma::Allocator) {
    device.destroy_image_view(self.image_view, None);
    allocator.destroy_image(self.image, &mut self.allocation)
  }
}

fn create_texture_name(name: String, width: u32, height: u32) -> String {
  format!("VkTexture({}, {}x{})", name, width, height)
}

pub fn get_image_aspect_from_format(format: vk::Format) -> vk::ImageAspectFlags {
  match format {
    vk::Format::D32_SFLOAT | vk::Format::D16_UNORM => vk::ImageAspectFlags::DEPTH,
    vk::Format::D32_SFLOAT_S8_UINT
    | vk::Format::D24_UNORM_S8_UINT
    | vk::Format::D16_UNORM_S8_UINT => {
      vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    }
    _ => vk::ImageAspectFlags::COLOR,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn aspect_from_depth_formats() {
    assert_eq!(
      get_image_aspect_from_format(vk::Format::D32_SFLOAT),
      vk::ImageAspectFlags::DEPTH
    );
    assert_eq!(
      get_image_aspect_from_format(vk::Format::D24_UNORM_S8_UINT),
      vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    assert_eq!(
      get_image_aspect_from_format(vk::Format::B8G8R8A8_UNORM),
      vk::ImageAspectFlags::COLOR
    );
  }
}
