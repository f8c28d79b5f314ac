use anyhow::bail;
use ash::vk;
use log::{info, trace};

use crate::vk_ctx::VkCtx;
use crate::vk_utils::{create_command_buffers, create_framebuffer, VkTexture};

use super::{MainPass, OpacityMapPass, ShadowMapPass};

/// Everything the size-dependent resources are built from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SurfaceDescriptor {
  pub extent: vk::Extent2D,
  pub depth_format: vk::Format,
  pub image_count: usize,
}

impl SurfaceDescriptor {
  pub fn from_swapchain(vk_ctx: &VkCtx, depth_format: vk::Format) -> Self {
    Self {
      extent: vk_ctx.swapchain.size,
      depth_format,
      image_count: vk_ctx.swapchain.image_count(),
    }
  }

  pub fn is_zero_sized(&self) -> bool {
    self.extent.width == 0 || self.extent.height == 0
  }
}

/// Shape of the size-dependent resources for a surface, independent of any GPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameResourcesLayout {
  pub depth_extent: vk::Extent2D,
  pub depth_format: vk::Format,
  /// One main pass framebuffer (and graphics cb) per swapchain image
  pub framebuffer_count: usize,
  pub framebuffer_extent: vk::Extent2D,
  /// Viewport baked into the main pass pipelines
  pub pipeline_viewport: vk::Extent2D,
  pub light_map_extent: vk::Extent2D,
}

impl FrameResourcesLayout {
  /// `None` for a zero-sized surface, nothing can be created for it.
  pub fn for_surface(surface: &SurfaceDescriptor, light_map_extent: vk::Extent2D) -> Option<Self> {
    if surface.is_zero_sized() {
      return None;
    }
    Some(Self {
      depth_extent: surface.extent,
      depth_format: surface.depth_format,
      framebuffer_count: surface.image_count,
      framebuffer_extent: surface.extent,
      pipeline_viewport: surface.extent,
      light_map_extent,
    })
  }
}

/// Resources destroyed and rebuilt when the surface changes.
pub struct FrameResources {
  pub layout: FrameResourcesLayout,
  /// Incremented on each recreation
  pub generation: u64,
  pub depth: VkTexture,
  pub shadow_map: VkTexture,
  pub shadow_map_fbo: vk::Framebuffer,
  pub opacity_map: VkTexture,
  pub opacity_map_fbo: vk::Framebuffer,
  /// Per swapchain image
  pub main_fbos: Vec<vk::Framebuffer>,
}

impl FrameResources {
  pub fn new(
    vk_ctx: &VkCtx,
    layout: FrameResourcesLayout,
    generation: u64,
    passes: (&ShadowMapPass, &OpacityMapPass, &MainPass),
  ) -> anyhow::Result<Self> {
    let (shadow_pass, opacity_pass, main_pass) = passes;
    let device = vk_ctx.vk_device();
    info!(
      "Creating FrameResources #{} ({}x{}, {} swapchain images)",
      generation,
      layout.framebuffer_extent.width,
      layout.framebuffer_extent.height,
      layout.framebuffer_count
    );
    let image_views = &vk_ctx.swapchain.image_views;
    if image_views.len() != layout.framebuffer_count {
      bail!(
        "Swapchain has {} images, frame resources were laid out for {}",
        image_views.len(),
        layout.framebuffer_count
      );
    }

    let depth = vk_ctx.create_attachment(
      "MainPass.depth",
      layout.depth_format,
      layout.depth_extent,
      false,
    )?;
    let mut shadow_map = vk_ctx.create_attachment(
      "ShadowMapPass.depth",
      ShadowMapPass::DEPTH_FORMAT,
      layout.light_map_extent,
      true,
    )?;
    let mut opacity_map = vk_ctx.create_attachment(
      "OpacityMapPass.opacity",
      OpacityMapPass::OPACITY_FORMAT,
      layout.light_map_extent,
      true,
    )?;
    // light map descriptors are written before the first frame renders them
    shadow_map.force_image_layout(vk_ctx, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL)?;
    opacity_map.force_image_layout(vk_ctx, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)?;

    let shadow_map_fbo = create_framebuffer(
      device,
      shadow_pass.render_pass,
      &[shadow_map.image_view()],
      &layout.light_map_extent,
    )?;
    let opacity_map_fbo = create_framebuffer(
      device,
      opacity_pass.render_pass,
      &[opacity_map.image_view()],
      &layout.light_map_extent,
    )?;
    // colors first, then depth
    let main_fbos = image_views
      .iter()
      .map(|&iv| {
        create_framebuffer(
          device,
          main_pass.render_pass,
          &[iv, depth.image_view()],
          &layout.framebuffer_extent,
        )
      })
      .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Self {
      layout,
      generation,
      depth,
      shadow_map,
      shadow_map_fbo,
      opacity_map,
      opacity_map_fbo,
      main_fbos,
    })
  }

  pub unsafe fn destroy(&mut self, vk_ctx: &VkCtx) {
    trace!("Destroying FrameResources #{}", self.generation);
    let device = vk_ctx.vk_device();
    let allocator = &vk_ctx.allocator;

    for fbo in &self.main_fbos {
      device.destroy_framebuffer(*fbo, None);
    }
    device.destroy_framebuffer(self.shadow_map_fbo, None);
    device.destroy_framebuffer(self.opacity_map_fbo, None);
    self.depth.delete(device, allocator);
    self.shadow_map.delete(device, allocator);
    self.opacity_map.delete(device, allocator);
  }
}

/// Pre-recorded graphics command buffers, one per swapchain image.
/// Valid only for the `FrameResources` generation they were recorded against.
pub struct RecordedCommands {
  pub command_buffers: Vec<vk::CommandBuffer>,
  recorded_generation: Option<u64>,
}

impl RecordedCommands {
  pub fn new(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: usize,
  ) -> anyhow::Result<Self> {
    Ok(Self {
      command_buffers: create_command_buffers(device, pool, count)?,
      recorded_generation: None,
    })
  }

  pub fn is_stale(&self, current_generation: u64) -> bool {
    self.recorded_generation != Some(current_generation)
  }

  pub fn mark_recorded(&mut self, generation: u64) {
    self.recorded_generation = Some(generation);
  }

  pub fn invalidate(&mut self) {
    self.recorded_generation = None;
  }

  /// Swapchain image count can change on recreation
  pub unsafe fn resize(
    &mut self,
    device: &ash::Device,
    pool: vk::CommandPool,
    count: usize,
  ) -> anyhow::Result<()> {
    self.invalidate();
    if self.command_buffers.len() == count {
      return Ok(());
    }
    self.free(device, pool);
    self.command_buffers = create_command_buffers(device, pool, count)?;
    Ok(())
  }

  pub unsafe fn free(&mut self, device: &ash::Device, pool: vk::CommandPool) {
    if !self.command_buffers.is_empty() {
      device.free_command_buffers(pool, &self.command_buffers);
    }
    self.command_buffers.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn surface(width: u32, height: u32) -> SurfaceDescriptor {
    SurfaceDescriptor {
      extent: vk::Extent2D { width, height },
      depth_format: vk::Format::D32_SFLOAT,
      image_count: 3,
    }
  }

  fn light_map_extent() -> vk::Extent2D {
    vk::Extent2D {
      width: 1080,
      height: 720,
    }
  }

  fn recorded(generation: u64) -> RecordedCommands {
    RecordedCommands {
      command_buffers: Vec::new(),
      recorded_generation: Some(generation),
    }
  }

  fn layout(width: u32, height: u32) -> FrameResourcesLayout {
    FrameResourcesLayout::for_surface(&surface(width, height), light_map_extent()).unwrap()
  }

  #[test]
  fn recreation_with_same_surface_is_idempotent() {
    assert_eq!(layout(640, 480), layout(640, 480));
  }

  #[test]
  fn resize_changes_every_size_dependent_resource() {
    let before = layout(640, 480);
    let after = layout(1280, 720);
    let new_extent = vk::Extent2D {
      width: 1280,
      height: 720,
    };
    assert_ne!(before.depth_extent, after.depth_extent);
    assert_eq!(after.depth_extent, new_extent);
    assert_eq!(after.framebuffer_extent, new_extent);
    assert_eq!(after.pipeline_viewport, new_extent);
    assert_eq!(after.framebuffer_count, 3);
    assert_eq!(after.depth_format, vk::Format::D32_SFLOAT);
    // light maps have fixed resolution
    assert_eq!(before.light_map_extent, after.light_map_extent);
  }

  #[test]
  fn zero_sized_surface_has_no_layout() {
    assert!(FrameResourcesLayout::for_surface(&surface(0, 480), light_map_extent()).is_none());
    assert!(FrameResourcesLayout::for_surface(&surface(640, 0), light_map_extent()).is_none());
  }

  #[test]
  fn recorded_commands_go_stale_on_new_generation() {
    let mut cmds = recorded(0);
    assert!(!cmds.is_stale(0));
    assert!(cmds.is_stale(1));
    cmds.mark_recorded(1);
    assert!(!cmds.is_stale(1));
    cmds.invalidate();
    assert!(cmds.is_stale(1));
  }

  #[test]
  fn zero_sized_surface() {
    assert!(surface(0, 480).is_zero_sized());
    assert!(surface(640, 0).is_zero_sized());
    assert!(!surface(1, 1).is_zero_sized());
  }
}
