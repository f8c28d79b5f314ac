use anyhow::Context;
use ash::vk;
use log::{info, trace};

use crate::scene::HairGroup;
use crate::vk_ctx::VkCtx;
use crate::vk_utils::{
  cmd_buffer_barriers, create_buffer_barrier, create_command_buffers, create_semaphores,
  BarrierScope, QueueFamilies, WithSetupCmdBuffer,
};

/*
Strand and draw indirect buffers are EXCLUSIVE. If compute and graphics are
different queue families, they travel compute -> graphics -> compute every frame:

  compute cb:  [acquire g->c] ... dispatch ... [release c->g]  signal sim_finished
  graphics cb: wait sim_finished [acquire c->g] ... passes ... [release g->c]  signal render_released
  next compute cb waits render_released

Same family: one full barrier at the start of the graphics cb, semaphores do the rest.
*/

/// Buffers written by the simulation and read by the graphics passes
#[derive(Copy, Clone, Debug)]
pub struct SimulatedBuffers {
  pub strands: vk::Buffer,
  pub draw_indirect: vk::Buffer,
}

impl SimulatedBuffers {
  pub fn of(hair_group: &HairGroup) -> Self {
    Self {
      strands: hair_group.strands_buffer.buffer,
      draw_indirect: hair_group.draw_indirect_buffer.buffer,
    }
  }
}

/// Both halves of a queue family ownership transfer. With a single queue family
/// `release` is empty and `acquire` holds plain memory barriers.
#[derive(Default)]
pub struct QueueHandoff {
  /// Recorded on the queue that gives the buffers away
  pub release: Vec<vk::BufferMemoryBarrier2>,
  /// Recorded on the queue that receives them
  pub acquire: Vec<vk::BufferMemoryBarrier2>,
}

const NOTHING: BarrierScope = (vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE);

fn compute_write() -> BarrierScope {
  (
    vk::PipelineStageFlags2::COMPUTE_SHADER,
    vk::AccessFlags2::SHADER_WRITE,
  )
}

fn compute_read_write() -> BarrierScope {
  (
    vk::PipelineStageFlags2::COMPUTE_SHADER,
    vk::AccessFlags2::SHADER_READ | vk::AccessFlags2::SHADER_WRITE,
  )
}

fn vertex_read() -> BarrierScope {
  (
    vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
    vk::AccessFlags2::VERTEX_ATTRIBUTE_READ,
  )
}

fn indirect_read() -> BarrierScope {
  (
    vk::PipelineStageFlags2::DRAW_INDIRECT,
    vk::AccessFlags2::INDIRECT_COMMAND_READ,
  )
}

/// `buffer_scopes`: (buffer, scope on the giving queue, scope on the receiving queue)
fn handoff(
  buffer_scopes: &[(vk::Buffer, BarrierScope, BarrierScope)],
  src_family: u32,
  dst_family: u32,
) -> QueueHandoff {
  if src_family == dst_family {
    return QueueHandoff {
      release: Vec::new(),
      acquire: buffer_scopes
        .iter()
        .map(|(buffer, src, dst)| {
          create_buffer_barrier(
            *buffer,
            *src,
            *dst,
            vk::QUEUE_FAMILY_IGNORED,
            vk::QUEUE_FAMILY_IGNORED,
          )
        })
        .collect(),
    };
  }

  QueueHandoff {
    release: buffer_scopes
      .iter()
      .map(|(buffer, src, _)| create_buffer_barrier(*buffer, *src, NOTHING, src_family, dst_family))
      .collect(),
    acquire: buffer_scopes
      .iter()
      .map(|(buffer, _, dst)| create_buffer_barrier(*buffer, NOTHING, *dst, src_family, dst_family))
      .collect(),
  }
}

/// Simulation results -> indirect draw and vertex fetch
pub fn ownership_transfer_barriers(
  groups: &[SimulatedBuffers],
  families: &QueueFamilies,
) -> QueueHandoff {
  let scopes: Vec<_> = groups
    .iter()
    .flat_map(|g| {
      vec![
        (g.draw_indirect, compute_write(), indirect_read()),
        (g.strands, compute_write(), vertex_read()),
      ]
    })
    .collect();
  handoff(&scopes, families.compute, families.graphics)
}

/// Graphics is done reading, give the buffers back to compute.
/// Nothing to do with a single queue family.
pub fn return_ownership_barriers(
  groups: &[SimulatedBuffers],
  families: &QueueFamilies,
) -> QueueHandoff {
  if !families.are_separate() {
    return QueueHandoff::default();
  }
  let scopes: Vec<_> = groups
    .iter()
    .flat_map(|g| {
      vec![
        (g.draw_indirect, indirect_read(), compute_read_write()),
        (g.strands, vertex_read(), compute_read_write()),
      ]
    })
    .collect();
  handoff(&scopes, families.graphics, families.compute)
}

/// Buffers are uploaded on the graphics queue. Hand them to compute
/// before the first simulation step.
fn upload_ownership_barriers(
  groups: &[SimulatedBuffers],
  families: &QueueFamilies,
) -> QueueHandoff {
  let upload = (
    vk::PipelineStageFlags2::ALL_TRANSFER,
    vk::AccessFlags2::TRANSFER_WRITE,
  );
  let scopes: Vec<_> = groups
    .iter()
    .flat_map(|g| {
      vec![
        (g.draw_indirect, upload, compute_read_write()),
        (g.strands, upload, compute_read_write()),
      ]
    })
    .collect();
  handoff(&scopes, families.graphics, families.compute)
}

/// Semaphores between compute and graphics submits, one pair per frame slot.
pub struct CrossQueueSync {
  pub families: QueueFamilies,
  /// Signaled by compute, waited by graphics (or handoff)
  sim_finished: Vec<vk::Semaphore>,
  /// Signaled by graphics (or handoff), waited by next compute submit
  render_released: Vec<vk::Semaphore>,
  /// `render_released` semaphore that next compute submit has to wait for
  pending_render_release: Option<vk::Semaphore>,
  /// Graphics-side half of the ownership round trip, without any rendering.
  /// Submitted instead of the frame's command buffer when the frame is dropped
  /// after compute was already submitted.
  handoff_cb: vk::CommandBuffer,
  pub to_graphics: QueueHandoff,
  pub to_compute: QueueHandoff,
}

impl CrossQueueSync {
  pub fn new(vk_ctx: &VkCtx, groups: &[SimulatedBuffers]) -> anyhow::Result<Self> {
    let device = vk_ctx.vk_device();
    let families = vk_ctx.device.queue_families;
    let frames_in_flight = vk_ctx.frames_in_flight();
    info!(
      "Creating CrossQueueSync (graphics family {}, compute family {})",
      families.graphics, families.compute
    );

    let to_graphics = ownership_transfer_barriers(groups, &families);
    let to_compute = return_ownership_barriers(groups, &families);

    let handoff_cb = create_command_buffers(device, vk_ctx.command_buffers.graphics_pool, 1)?
      .into_iter()
      .next()
      .context("Driver returned no handoff command buffer")?;

    let sync = Self {
      families,
      sim_finished: create_semaphores(device, frames_in_flight)?,
      render_released: create_semaphores(device, frames_in_flight)?,
      pending_render_release: None,
      handoff_cb,
      to_graphics,
      to_compute,
    };
    unsafe { sync.record_handoff_cb(device)? };

    // with separate families, the acquire half is at the start of the compute cb
    let initial = upload_ownership_barriers(groups, &families);
    vk_ctx.with_setup_cb(|device, command_buffer| unsafe {
      cmd_buffer_barriers(device, command_buffer, &initial.release);
      if !families.are_separate() {
        cmd_buffer_barriers(device, command_buffer, &initial.acquire);
      }
    })?;

    Ok(sync)
  }

  unsafe fn record_handoff_cb(&self, device: &ash::Device) -> anyhow::Result<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder()
      .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)
      .build();
    device.begin_command_buffer(self.handoff_cb, &begin_info)?;
    self.cmd_graphics_acquire(device, self.handoff_cb);
    self.cmd_graphics_release(device, self.handoff_cb);
    device.end_command_buffer(self.handoff_cb)?;
    Ok(())
  }

  /// Start of the graphics cb. Before first draw that reads simulation results.
  pub unsafe fn cmd_graphics_acquire(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    cmd_buffer_barriers(device, command_buffer, &self.to_graphics.acquire);
  }

  /// End of the graphics cb
  pub unsafe fn cmd_graphics_release(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    cmd_buffer_barriers(device, command_buffer, &self.to_compute.release);
  }

  /// Start of the compute cb
  pub unsafe fn cmd_compute_acquire(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    cmd_buffer_barriers(device, command_buffer, &self.to_compute.acquire);
  }

  /// End of the compute cb
  pub unsafe fn cmd_compute_release(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    cmd_buffer_barriers(device, command_buffer, &self.to_graphics.release);
  }

  pub fn sim_finished(&self, frame_slot: usize) -> vk::Semaphore {
    self.sim_finished[frame_slot]
  }

  pub fn render_released(&self, frame_slot: usize) -> vk::Semaphore {
    self.render_released[frame_slot]
  }

  /// Semaphore the compute submit has to wait on. Consumed.
  pub fn take_pending_render_release(&mut self) -> Option<vk::Semaphore> {
    self.pending_render_release.take()
  }

  /// Graphics (or handoff) submit of `frame_slot` signals `render_released`
  pub fn mark_render_released(&mut self, frame_slot: usize) {
    self.pending_render_release = Some(self.render_released[frame_slot]);
  }

  /// Frame was dropped after compute submit. Keep the semaphore chain and
  /// buffer ownership consistent. Signals `fence`.
  pub unsafe fn submit_handoff(
    &mut self,
    vk_ctx: &VkCtx,
    frame_slot: usize,
    fence: vk::Fence,
  ) -> anyhow::Result<()> {
    trace!("Submitting ownership handoff for dropped frame (slot {})", frame_slot);
    let device = vk_ctx.vk_device();
    let wait_semaphores = [self.sim_finished(frame_slot)];
    let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
    let signal_semaphores = [self.render_released(frame_slot)];
    let command_buffers = [self.handoff_cb];

    let submit_info = vk::SubmitInfo::builder()
      .wait_semaphores(&wait_semaphores)
      .wait_dst_stage_mask(&wait_stages)
      .command_buffers(&command_buffers)
      .signal_semaphores(&signal_semaphores)
      .build();
    device.queue_submit(vk_ctx.device.graphics_queue, &[submit_info], fence)?;
    self.mark_render_released(frame_slot);
    Ok(())
  }

  pub unsafe fn destroy(&self, device: &ash::Device) {
    for semaphore in self.sim_finished.iter().chain(self.render_released.iter()) {
      device.destroy_semaphore(*semaphore, None);
    }
    // handoff_cb is freed together with the graphics pool
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ash::vk::Handle;

  fn groups() -> Vec<SimulatedBuffers> {
    vec![SimulatedBuffers {
      strands: vk::Buffer::from_raw(1),
      draw_indirect: vk::Buffer::from_raw(2),
    }]
  }

  fn families(graphics: u32, compute: u32) -> QueueFamilies {
    QueueFamilies { graphics, compute }
  }

  #[test]
  fn same_family_uses_single_memory_barrier() {
    let handoff = ownership_transfer_barriers(&groups(), &families(0, 0));
    assert!(handoff.release.is_empty());
    assert_eq!(handoff.acquire.len(), 2);
    for b in &handoff.acquire {
      assert_eq!(b.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
      assert_eq!(b.dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
      assert_eq!(b.src_stage_mask, vk::PipelineStageFlags2::COMPUTE_SHADER);
      assert_eq!(b.src_access_mask, vk::AccessFlags2::SHADER_WRITE);
    }
    assert!(return_ownership_barriers(&groups(), &families(0, 0))
      .acquire
      .is_empty());
  }

  #[test]
  fn count_buffer_is_made_visible_to_indirect_draw() {
    let handoff = ownership_transfer_barriers(&groups(), &families(0, 0));
    let count_barrier = handoff
      .acquire
      .iter()
      .find(|b| b.buffer == vk::Buffer::from_raw(2))
      .unwrap();
    assert_eq!(count_barrier.dst_stage_mask, vk::PipelineStageFlags2::DRAW_INDIRECT);
    assert_eq!(
      count_barrier.dst_access_mask,
      vk::AccessFlags2::INDIRECT_COMMAND_READ
    );
    let strand_barrier = handoff
      .acquire
      .iter()
      .find(|b| b.buffer == vk::Buffer::from_raw(1))
      .unwrap();
    assert_eq!(
      strand_barrier.dst_stage_mask,
      vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT
    );
  }

  #[test]
  fn separate_families_release_and_acquire_match() {
    let handoff = ownership_transfer_barriers(&groups(), &families(0, 2));
    assert_eq!(handoff.release.len(), 2);
    assert_eq!(handoff.acquire.len(), 2);
    for (rel, acq) in handoff.release.iter().zip(handoff.acquire.iter()) {
      assert_eq!(rel.buffer, acq.buffer);
      assert_eq!((rel.src_queue_family_index, rel.dst_queue_family_index), (2, 0));
      assert_eq!((acq.src_queue_family_index, acq.dst_queue_family_index), (2, 0));
      // release has no destination scope, acquire no source scope
      assert_eq!(rel.dst_access_mask, vk::AccessFlags2::NONE);
      assert_eq!(acq.src_access_mask, vk::AccessFlags2::NONE);
    }
  }

  #[test]
  fn separate_families_return_trip() {
    let back = return_ownership_barriers(&groups(), &families(0, 2));
    assert_eq!(back.release.len(), 2);
    for b in back.release.iter().chain(back.acquire.iter()) {
      assert_eq!((b.src_queue_family_index, b.dst_queue_family_index), (0, 2));
    }
    assert!(back
      .acquire
      .iter()
      .all(|b| b.dst_stage_mask == vk::PipelineStageFlags2::COMPUTE_SHADER));
  }

  #[test]
  fn no_groups_no_barriers() {
    let handoff = ownership_transfer_barriers(&[], &families(0, 2));
    assert!(handoff.release.is_empty() && handoff.acquire.is_empty());
  }
}
