mod _shared;
mod cross_queue_sync;
mod frame_resources;
mod main_pass;
mod opacity_map_pass;
mod shadow_map_pass;
mod strand_simulation_pass;

pub use self::_shared::*;
pub use self::cross_queue_sync::*;
pub use self::frame_resources::*;
pub use self::main_pass::*;
pub use self::opacity_map_pass::*;
pub use self::shadow_map_pass::*;
pub use self::strand_simulation_pass::*;

use anyhow::Context;
use ash::vk;
use log::{debug, info, trace};

use crate::config::Config;
use crate::scene::{Scene, SceneCameras};
use crate::vk_ctx::VkCtx;
use crate::vk_utils::{create_light_map_sampler, find_depth_format};

/// Simulation, the 3 render passes and everything to keep them fed.
///
/// Each `frame()` submits the strand simulation on the compute queue, then a
/// pre-recorded graphics command buffer (shadow, opacity, main) for the acquired
/// swapchain image. Stale surface drops the frame; the caller then has to
/// recreate the swapchain and call `recreate_frame_resources`.
pub struct FramePipeline {
  state: FrameState,
  frame_slot: usize,
  surface_zero_sized: bool,
  depth_format: vk::Format,
  light_map_extent: vk::Extent2D,
  light_map_sampler: vk::Sampler,

  descriptors: FrameDescriptors,
  cross_queue: CrossQueueSync,
  simulation_pass: StrandSimulationPass,
  shadow_map_pass: ShadowMapPass,
  opacity_map_pass: OpacityMapPass,
  main_pass: MainPass,

  resources: FrameResources,
  recorded: RecordedCommands,
}

impl FramePipeline {
  pub fn new(
    vk_ctx: &VkCtx,
    config: &Config,
    scene: &Scene,
    cameras: &SceneCameras,
  ) -> anyhow::Result<Self> {
    info!("Creating FramePipeline");
    let device = vk_ctx.vk_device();
    let depth_format = find_depth_format(&vk_ctx.instance, vk_ctx.device.phys_device)?;
    let light_map_extent = config.shadows.shadowmap_size();
    let depth_bias = config.shadows.depth_bias();
    trace!("Main pass depth format: {:?}", depth_format);

    let descriptors = FrameDescriptors::new(device, scene, cameras)?;
    let simulated = scene
      .hair_groups
      .iter()
      .map(SimulatedBuffers::of)
      .collect::<Vec<_>>();
    let cross_queue = CrossQueueSync::new(vk_ctx, &simulated)?;
    let simulation_pass = StrandSimulationPass::new(vk_ctx, scene, &descriptors, &cross_queue)?;
    let shadow_map_pass = ShadowMapPass::new(vk_ctx, &descriptors.layouts, depth_bias)?;
    let opacity_map_pass = OpacityMapPass::new(vk_ctx, &descriptors.layouts, depth_bias)?;
    let mut main_pass = MainPass::new(vk_ctx, &descriptors.layouts, depth_format, config)?;

    let surface = SurfaceDescriptor::from_swapchain(vk_ctx, depth_format);
    let layout = FrameResourcesLayout::for_surface(&surface, light_map_extent)
      .context("Cannot create frame resources for a zero-sized window")?;
    main_pass.recreate_pipelines(vk_ctx, layout.pipeline_viewport)?;
    let resources = FrameResources::new(
      vk_ctx,
      layout,
      0,
      (&shadow_map_pass, &opacity_map_pass, &main_pass),
    )?;
    let light_map_sampler = create_light_map_sampler(device)?;
    unsafe {
      descriptors.bind_light_maps(
        device,
        resources.shadow_map.image_view(),
        resources.opacity_map.image_view(),
        light_map_sampler,
      )
    };
    let recorded = RecordedCommands::new(
      device,
      vk_ctx.command_buffers.graphics_pool,
      layout.framebuffer_count,
    )?;

    let mut pipeline = Self {
      state: FrameState::Idle,
      frame_slot: 0,
      surface_zero_sized: false,
      depth_format,
      light_map_extent,
      light_map_sampler,
      descriptors,
      cross_queue,
      simulation_pass,
      shadow_map_pass,
      opacity_map_pass,
      main_pass,
      resources,
      recorded,
    };
    pipeline.record_graphics_commands(vk_ctx, scene)?;
    Ok(pipeline)
  }

  /// Dependency-ordered teardown. Device has to be idle.
  pub unsafe fn destroy(&mut self, vk_ctx: &VkCtx) {
    info!("FramePipeline::destroy()");
    let device = vk_ctx.vk_device();
    let graphics_pool = vk_ctx.command_buffers.graphics_pool;

    self.recorded.free(device, graphics_pool);
    self.resources.destroy(vk_ctx);
    device.destroy_sampler(self.light_map_sampler, None);
    self.descriptors.destroy(device);
    self.simulation_pass.destroy(device);
    self.main_pass.destroy(device);
    self.opacity_map_pass.destroy(device);
    self.shadow_map_pass.destroy(device);
    self.cross_queue.destroy(device);
  }

  /// Window size as reported by the OS. Zero-area surface pauses rendering.
  pub fn notify_surface_size(&mut self, size: vk::Extent2D) {
    self.surface_zero_sized = size.width == 0 || size.height == 0;
    if self.surface_zero_sized {
      debug!("Surface has zero area, frames are skipped");
    }
  }

  fn transition(&mut self, event: FrameEvent) {
    let next = self.state.next(event);
    trace!("Frame: {:?} --{:?}--> {:?}", self.state, event, next);
    self.state = next;
  }

  fn drop_frame(&self, reason: DropReason) -> FrameOutcome {
    debug!("Frame dropped: {:?}", reason);
    FrameOutcome::Dropped(reason)
  }

  pub fn frame(&mut self, vk_ctx: &VkCtx, scene: &Scene) -> anyhow::Result<FrameOutcome> {
    self.transition(FrameEvent::BeginFrame);
    if self.surface_zero_sized {
      if self.state != FrameState::Recreating {
        self.transition(FrameEvent::SurfaceZeroSized);
      }
      return Ok(self.drop_frame(DropReason::ZeroSizedSurface));
    }
    if self.state == FrameState::Recreating {
      return Ok(self.drop_frame(DropReason::PendingRecreation));
    }
    if self.recorded.is_stale(self.resources.generation) {
      self.record_graphics_commands(vk_ctx, scene)?;
    }

    let device = vk_ctx.vk_device();
    let swapchain = &vk_ctx.swapchain;
    let sync = &vk_ctx.synchronize;
    let slot = self.frame_slot;
    let fence = sync.frame_fences[slot];

    unsafe {
      device
        .wait_for_fences(&[fence], true, u64::MAX)
        .context("Failed waiting for frame fence")?;
      device
        .reset_fences(&[fence])
        .context("Failed resetting frame fence")?;
    }

    // 1. simulation
    unsafe {
      self
        .simulation_pass
        .submit(vk_ctx, &mut self.cross_queue, slot)?
    };
    self.transition(FrameEvent::ComputeSubmitted);
    // validation mode only
    if vk_ctx.debug_utils.is_some() {
      unsafe {
        device.queue_wait_idle(vk_ctx.device.compute_queue)?;
        device.queue_wait_idle(vk_ctx.device.graphics_queue)?;
      }
    }

    // 2. acquire
    let image_available = sync.image_available_semaphores[slot];
    let acquire_result = unsafe {
      swapchain.swapchain_loader.acquire_next_image(
        swapchain.swapchain,
        u64::MAX,
        image_available,
        vk::Fence::null(),
      )
    };
    let image_idx = match classify_acquire(acquire_result) {
      AcquireOutcome::Acquired {
        image_idx,
        suboptimal,
      } => {
        if suboptimal {
          trace!("Acquired suboptimal swapchain image {}", image_idx);
        }
        image_idx
      }
      AcquireOutcome::Stale => {
        // simulation already ran, graphics has to take the buffers anyway
        unsafe { self.cross_queue.submit_handoff(vk_ctx, slot, fence)? };
        self.transition(FrameEvent::AcquireStale);
        self.advance_slot(vk_ctx);
        return Ok(self.drop_frame(DropReason::StaleAcquire));
      }
    };
    self.transition(FrameEvent::ImageAcquired { image_idx });

    // 3-5. shadow, opacity, main
    let render_finished = sync.render_finished_semaphores[slot];
    let wait_semaphores = [image_available, self.cross_queue.sim_finished(slot)];
    let wait_stages = [
      vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
      vk::PipelineStageFlags::DRAW_INDIRECT | vk::PipelineStageFlags::VERTEX_INPUT,
    ];
    let signal_semaphores = [render_finished, self.cross_queue.render_released(slot)];
    let command_buffers = [self.recorded.command_buffers[image_idx as usize]];
    let submit_info = vk::SubmitInfo::builder()
      .wait_semaphores(&wait_semaphores)
      .wait_dst_stage_mask(&wait_stages)
      .command_buffers(&command_buffers)
      .signal_semaphores(&signal_semaphores)
      .build();
    unsafe {
      device
        .queue_submit(vk_ctx.device.graphics_queue, &[submit_info], fence)
        .context("Failed to submit frame's graphics command buffer")?;
    }
    self.cross_queue.mark_render_released(slot);
    self.transition(FrameEvent::GraphicsSubmitted);

    // 6. present
    let present_wait = [render_finished];
    let swapchains = [swapchain.swapchain];
    let image_indices = [image_idx];
    let present_info = vk::PresentInfoKHR::builder()
      .wait_semaphores(&present_wait)
      .swapchains(&swapchains)
      .image_indices(&image_indices)
      .build();
    let present_result = unsafe {
      swapchain
        .swapchain_loader
        .queue_present(vk_ctx.device.graphics_queue, &present_info)
    };
    let outcome = classify_present(present_result)?;
    self.advance_slot(vk_ctx);

    match outcome {
      FrameOutcome::Presented => {
        self.transition(FrameEvent::Presented);
        Ok(outcome)
      }
      FrameOutcome::Dropped(reason) => {
        self.transition(FrameEvent::PresentStale);
        Ok(self.drop_frame(reason))
      }
    }
  }

  fn advance_slot(&mut self, vk_ctx: &VkCtx) {
    self.frame_slot = (self.frame_slot + 1) % vk_ctx.frames_in_flight();
  }

  /// Rebuild everything that depends on the swapchain. Call after `VkCtx::recreate_swapchain`.
  pub fn recreate_frame_resources(&mut self, vk_ctx: &VkCtx, scene: &Scene) -> anyhow::Result<()> {
    let device = vk_ctx.vk_device();
    let surface = SurfaceDescriptor::from_swapchain(vk_ctx, self.depth_format);
    self.notify_surface_size(surface.extent);
    let layout = match FrameResourcesLayout::for_surface(&surface, self.light_map_extent) {
      Some(layout) => layout,
      None => return Ok(()),
    };
    info!(
      "Recreating frame resources for {}x{}",
      layout.framebuffer_extent.width, layout.framebuffer_extent.height
    );

    unsafe { device.device_wait_idle()? };
    let generation = self.resources.generation + 1;
    unsafe { self.resources.destroy(vk_ctx) };
    self.main_pass.recreate_pipelines(vk_ctx, layout.pipeline_viewport)?;
    self.resources = FrameResources::new(
      vk_ctx,
      layout,
      generation,
      (&self.shadow_map_pass, &self.opacity_map_pass, &self.main_pass),
    )?;
    unsafe {
      self.descriptors.bind_light_maps(
        device,
        self.resources.shadow_map.image_view(),
        self.resources.opacity_map.image_view(),
        self.light_map_sampler,
      );
      self.recorded.resize(
        device,
        vk_ctx.command_buffers.graphics_pool,
        layout.framebuffer_count,
      )?;
    }
    self.record_graphics_commands(vk_ctx, scene)?;
    self.transition(FrameEvent::Recreated);
    Ok(())
  }

  fn record_graphics_commands(&mut self, vk_ctx: &VkCtx, scene: &Scene) -> anyhow::Result<()> {
    let generation = self.resources.generation;
    trace!(
      "Recording {} graphics command buffers (resources #{})",
      self.recorded.command_buffers.len(),
      generation
    );
    let device = vk_ctx.vk_device();

    for (image_idx, &command_buffer) in self.recorded.command_buffers.iter().enumerate() {
      let exec_ctx = PassExecContext {
        swapchain_image_idx: image_idx,
        vk_ctx,
        scene,
        descriptors: &self.descriptors,
        resources: &self.resources,
        command_buffer,
      };
      let begin_info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)
        .build();

      unsafe {
        device
          .begin_command_buffer(command_buffer, &begin_info)
          .context("Failed to begin graphics command buffer")?;
        self.cross_queue.cmd_graphics_acquire(device, command_buffer);
        self.shadow_map_pass.execute(&exec_ctx);
        self.opacity_map_pass.execute(&exec_ctx);
        self.main_pass.execute(&exec_ctx);
        self.cross_queue.cmd_graphics_release(device, command_buffer);
        device
          .end_command_buffer(command_buffer)
          .context("Failed to end graphics command buffer")?;
      }
    }

    self.recorded.mark_recorded(generation);
    Ok(())
  }
}
