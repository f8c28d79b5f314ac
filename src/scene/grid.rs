use ash::vk;
use glam::IVec3;

use crate::vk_ctx::VkCtx;
use crate::vk_utils::VkBuffer;

/// Cells per axis
pub const GRID_RESOLUTION: usize = 64;
pub const GRID_CELL_COUNT: usize = GRID_RESOLUTION * GRID_RESOLUTION * GRID_RESOLUTION;

/// Integer accumulators, so the compute shader can use atomics.
#[derive(Copy, Clone, Debug, Default, PartialEq)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct GridCell {
  pub velocity: IVec3,
  pub density: i32,
}
unsafe impl bytemuck::Zeroable for GridCell {}
unsafe impl bytemuck::Pod for GridCell {}

/// Velocity/density field shared by all hair groups. Only the compute
/// stage touches the contents, the host just owns the buffer.
pub struct Grid {
  pub buffer: VkBuffer,
}

impl Grid {
  pub const SIZE_BYTES: usize = GRID_CELL_COUNT * std::mem::size_of::<GridCell>();

  /// Starts zeroed, same as after `cmd_clear`
  pub fn new(vk_ctx: &VkCtx) -> anyhow::Result<Self> {
    let initial = HostGrid::new();
    let buffer = vk_ctx.create_buffer_from_data(
      "Scene.grid".to_string(),
      initial.as_bytes(),
      vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
    )?;
    Ok(Self { buffer })
  }

  /// Zero the whole grid. Has to be recorded before the first dispatch of
  /// every simulation step, followed by a transfer->compute barrier.
  pub unsafe fn cmd_clear(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    device.cmd_fill_buffer(command_buffer, self.buffer.buffer, 0, vk::WHOLE_SIZE, 0);
  }

  pub unsafe fn destroy(&mut self, allocator: &vma::Allocator) {
    self.buffer.delete(allocator);
  }
}

/// Host mirror of the grid, same memory layout.
pub struct HostGrid {
  pub cells: Vec<GridCell>,
}

impl HostGrid {
  pub fn new() -> Self {
    Self {
      cells: vec![GridCell::default(); GRID_CELL_COUNT],
    }
  }

  pub fn as_bytes(&self) -> &[u8] {
    bytemuck::cast_slice(&self.cells)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grid_cell_index(x: usize, y: usize, z: usize) -> usize {
    (z * GRID_RESOLUTION + y) * GRID_RESOLUTION + x
  }

  #[test]
  fn cell_layout() {
    assert_eq!(std::mem::size_of::<GridCell>(), 16);
    assert_eq!(Grid::SIZE_BYTES, 64 * 64 * 64 * 16);
    assert_eq!(grid_cell_index(63, 63, 63), GRID_CELL_COUNT - 1);
    assert_eq!(grid_cell_index(1, 0, 0), 1);
    assert_eq!(grid_cell_index(0, 1, 0), GRID_RESOLUTION);
  }

  #[test]
  fn initial_upload_is_all_zero() {
    let grid = HostGrid::new();
    assert_eq!(grid.as_bytes().len(), Grid::SIZE_BYTES);
    assert!(grid.as_bytes().iter().all(|b| *b == 0));
  }
}
