use anyhow::Context;
use ash::vk;

/// Anything that can record and synchronously execute one-off commands (uploads, layout transitions).
pub trait WithSetupCmdBuffer {
  fn with_setup_cb(
    &self,
    callback: impl FnOnce(&ash::Device, vk::CommandBuffer),
  ) -> anyhow::Result<()>;
}

pub unsafe fn execute_setup_cmd_buf(
  device: &ash::Device,
  queue: vk::Queue,
  cmd_buf: vk::CommandBuffer,
  callback: impl FnOnce(&ash::Device, vk::CommandBuffer),
) -> anyhow::Result<()> {
  // begin setup
  let cmd_buf_begin_info = vk::CommandBufferBeginInfo::builder()
    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
    .build();
  device
    .begin_command_buffer(cmd_buf, &cmd_buf_begin_info) // also resets command buffer
    .context("with_setup_cb: begin_command_buffer")?;

  // execute
  callback(device, cmd_buf);

  // end+submit
  device
    .end_command_buffer(cmd_buf)
    .context("with_setup_cb: end_command_buffer")?;
  let submit_info = vk::SubmitInfo::builder()
    .command_buffers(std::slice::from_ref(&cmd_buf))
    .build();
  device
    .queue_submit(queue, &[submit_info], vk::Fence::null())
    .context("with_setup_cb: queue_submit")?;

  log::trace!("with_setup_cb: queue_wait_idle");
  device
    .queue_wait_idle(queue)
    .context("with_setup_cb: queue_wait_idle")?;
  Ok(())
}
