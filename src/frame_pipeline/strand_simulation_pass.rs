use anyhow::Context;
use ash::vk;
use log::{info, trace};

use crate::scene::Scene;
use crate::utils::{get_simple_type_name, group_count};
use crate::vk_ctx::VkCtx;
use crate::vk_utils::*;

use super::{CrossQueueSync, FrameDescriptors};

const SHADER_PATH: &str = "./assets/shaders-compiled/strands.comp.spv";
/// `local_size_x` in the compute shader
pub const WORKGROUP_SIZE: u32 = 32;

/// (hair group index, workgroup count) for every group that has anything to simulate
pub fn dispatch_plan(strand_counts: &[u32]) -> Vec<(usize, u32)> {
  strand_counts
    .iter()
    .enumerate()
    .map(|(i, &count)| (i, group_count(count, WORKGROUP_SIZE)))
    .filter(|(_, groups)| *groups > 0)
    .collect()
}

/// One step of the compute command buffer, in recording order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimulationCmd {
  /// Take strand buffers back from graphics
  AcquireOwnership,
  ClearGrid,
  /// Transfer write -> compute read/write on the grid
  GridBarrier,
  Dispatch { group: usize, workgroups: u32 },
  /// Hand strand buffers over to graphics
  ReleaseOwnership,
}

/// Grid is zeroed exactly once per step, before any group scatters into it.
/// Holds even if nothing gets dispatched.
pub fn simulation_step_plan(strand_counts: &[u32]) -> Vec<SimulationCmd> {
  let mut plan = vec![
    SimulationCmd::AcquireOwnership,
    SimulationCmd::ClearGrid,
    SimulationCmd::GridBarrier,
  ];
  plan.extend(
    dispatch_plan(strand_counts)
      .into_iter()
      .map(|(group, workgroups)| SimulationCmd::Dispatch { group, workgroups }),
  );
  plan.push(SimulationCmd::ReleaseOwnership);
  plan
}

/// Advances all hair groups by one step. Runs on the compute queue.
/// Command buffer is recorded once and resubmitted every frame.
pub struct StrandSimulationPass {
  pipeline: vk::Pipeline,
  pipeline_layout: vk::PipelineLayout,
  command_buffer: vk::CommandBuffer,
}

impl StrandSimulationPass {
  pub fn new(
    vk_ctx: &VkCtx,
    scene: &Scene,
    descriptors: &FrameDescriptors,
    cross_queue: &CrossQueueSync,
  ) -> anyhow::Result<Self> {
    info!("Creating {}", get_simple_type_name::<Self>());
    let device = vk_ctx.vk_device();
    let layouts = &descriptors.layouts;

    let pipeline_layout = create_pipeline_layout(
      device,
      &[
        layouts.camera,
        layouts.time,
        layouts.colliders,
        layouts.grid,
        layouts.strands,
      ],
      &[],
    )?;
    let pipeline =
      create_compute_pipeline(device, &vk_ctx.pipeline_cache, &pipeline_layout, SHADER_PATH)?;
    let command_buffer = create_command_buffers(device, vk_ctx.command_buffers.compute_pool, 1)?
      .into_iter()
      .next()
      .context("Driver returned no compute command buffer")?;

    let pass = Self {
      pipeline,
      pipeline_layout,
      command_buffer,
    };
    unsafe { pass.record(device, scene, descriptors, cross_queue)? };
    Ok(pass)
  }

  pub unsafe fn destroy(&self, device: &ash::Device) {
    device.destroy_pipeline(self.pipeline, None);
    device.destroy_pipeline_layout(self.pipeline_layout, None);
    // command buffer is freed together with the compute pool
  }

  unsafe fn record(
    &self,
    device: &ash::Device,
    scene: &Scene,
    descriptors: &FrameDescriptors,
    cross_queue: &CrossQueueSync,
  ) -> anyhow::Result<()> {
    let cb = self.command_buffer;
    let begin_info = vk::CommandBufferBeginInfo::builder()
      .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)
      .build();
    device
      .begin_command_buffer(cb, &begin_info)
      .context("Failed to begin compute command buffer")?;

    device.cmd_bind_pipeline(cb, vk::PipelineBindPoint::COMPUTE, self.pipeline);
    device.cmd_bind_descriptor_sets(
      cb,
      vk::PipelineBindPoint::COMPUTE,
      self.pipeline_layout,
      0,
      &[
        descriptors.viewer_camera,
        descriptors.time,
        descriptors.colliders,
        descriptors.grid,
      ],
      &[],
    );

    let strand_counts: Vec<u32> = scene.hair_groups.iter().map(|h| h.num_strands).collect();
    for cmd in simulation_step_plan(&strand_counts) {
      match cmd {
        SimulationCmd::AcquireOwnership => cross_queue.cmd_compute_acquire(device, cb),
        SimulationCmd::ClearGrid => scene.grid.cmd_clear(device, cb),
        SimulationCmd::GridBarrier => {
          let grid_barrier = create_buffer_barrier(
            scene.grid.buffer.buffer,
            (
              vk::PipelineStageFlags2::ALL_TRANSFER,
              vk::AccessFlags2::TRANSFER_WRITE,
            ),
            (
              vk::PipelineStageFlags2::COMPUTE_SHADER,
              vk::AccessFlags2::SHADER_READ | vk::AccessFlags2::SHADER_WRITE,
            ),
            vk::QUEUE_FAMILY_IGNORED,
            vk::QUEUE_FAMILY_IGNORED,
          );
          cmd_buffer_barriers(device, cb, &[grid_barrier]);
        }
        SimulationCmd::Dispatch { group, workgroups } => {
          trace!(
            "Simulating '{}': {} workgroups",
            scene.hair_groups[group].name,
            workgroups
          );
          device.cmd_bind_descriptor_sets(
            cb,
            vk::PipelineBindPoint::COMPUTE,
            self.pipeline_layout,
            4,
            &[descriptors.strands[group]],
            &[],
          );
          device.cmd_dispatch(cb, workgroups, 1, 1);
        }
        SimulationCmd::ReleaseOwnership => cross_queue.cmd_compute_release(device, cb),
      }
    }

    device
      .end_command_buffer(cb)
      .context("Failed to end compute command buffer")?;
    Ok(())
  }

  /// Not awaited by the CPU. Waits for graphics to give the buffers back.
  pub unsafe fn submit(
    &self,
    vk_ctx: &VkCtx,
    cross_queue: &mut CrossQueueSync,
    frame_slot: usize,
  ) -> anyhow::Result<()> {
    let wait_semaphores: Vec<vk::Semaphore> =
      cross_queue.take_pending_render_release().into_iter().collect();
    let wait_stages = vec![vk::PipelineStageFlags::ALL_COMMANDS; wait_semaphores.len()];
    let signal_semaphores = [cross_queue.sim_finished(frame_slot)];
    let command_buffers = [self.command_buffer];

    let submit_info = vk::SubmitInfo::builder()
      .wait_semaphores(&wait_semaphores)
      .wait_dst_stage_mask(&wait_stages)
      .command_buffers(&command_buffers)
      .signal_semaphores(&signal_semaphores)
      .build();

    vk_ctx
      .vk_device()
      .queue_submit(vk_ctx.device.compute_queue, &[submit_info], vk::Fence::null())
      .context("Failed to submit strand simulation")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn groups_without_strands_are_not_dispatched() {
    assert!(dispatch_plan(&[]).is_empty());
    assert!(dispatch_plan(&[0, 0]).is_empty());
    assert_eq!(dispatch_plan(&[0, 10]), vec![(1, 1)]);
  }

  #[test]
  fn partial_workgroups_are_rounded_up() {
    assert_eq!(dispatch_plan(&[1000, 32, 33]), vec![(0, 32), (1, 1), (2, 2)]);
  }

  fn clear_position(plan: &[SimulationCmd]) -> usize {
    let clears: Vec<usize> = plan
      .iter()
      .enumerate()
      .filter(|(_, c)| **c == SimulationCmd::ClearGrid)
      .map(|(i, _)| i)
      .collect();
    assert_eq!(clears.len(), 1, "{:?}", plan);
    clears[0]
  }

  #[test]
  fn grid_cleared_once_before_every_dispatch() {
    for counts in [vec![], vec![0, 0], vec![10], vec![0, 1000, 0, 40]] {
      let plan = simulation_step_plan(&counts);
      let clear = clear_position(&plan);
      assert_eq!(plan[clear + 1], SimulationCmd::GridBarrier, "{:?}", counts);
      for (i, cmd) in plan.iter().enumerate() {
        if let SimulationCmd::Dispatch { .. } = cmd {
          assert!(i > clear + 1, "{:?}", counts);
        }
      }
    }
  }

  #[test]
  fn step_plan_is_wrapped_in_ownership_transfer() {
    let plan = simulation_step_plan(&[0, 10]);
    assert_eq!(
      plan,
      vec![
        SimulationCmd::AcquireOwnership,
        SimulationCmd::ClearGrid,
        SimulationCmd::GridBarrier,
        SimulationCmd::Dispatch {
          group: 1,
          workgroups: 1
        },
        SimulationCmd::ReleaseOwnership,
      ]
    );

    // nothing to simulate: grid is still cleared, buffers still handed over
    let empty = simulation_step_plan(&[0, 0]);
    assert_eq!(empty.len(), 4);
    assert_eq!(empty.last(), Some(&SimulationCmd::ReleaseOwnership));
  }
}
