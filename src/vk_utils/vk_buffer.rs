use anyhow::Context;
use ash::vk;
use log::trace;
use vma::Alloc;

use super::{
  determine_gpu_allocation_info, get_persistently_mapped_pointer, MemoryMapPointer,
  VkMemoryPreference, VkMemoryResource, WithSetupCmdBuffer,
};

// https://gpuopen-librariesandsdks.github.io/VulkanMemoryAllocator/html/quick_start.html
// https://github.com/expenses/vulkan-base/blob/main/ash-helpers/src/lib.rs

pub struct VkBuffer {
  // For debugging
  name: String,
  long_name: String,
  /// Size in bytes
  pub size: usize,
  /// Native Vulkan buffer
  pub buffer: vk::Buffer,
  pub allocation: vma::Allocation,
  /// Persistently mapped, if created with [VkMemoryPreference::GpuMappable]
  mapped_pointer: Option<MemoryMapPointer>,
}

impl VkBuffer {
  /// Allocate empty vulkan buffer. Vulkan does not allow zero-sized buffers.
  pub fn empty(
    allocator: &vma::Allocator,
    name: String,
    size: usize,
    usage: vk::BufferUsageFlags,
    memory_pref: VkMemoryPreference,
  ) -> anyhow::Result<Self> {
    Self::empty_shared(allocator, name, size, usage, memory_pref, &[])
  }

  /// Same as `empty`, but accessible from all `queue_families` without
  /// ownership transfers (if there is more than one).
  pub fn empty_shared(
    allocator: &vma::Allocator,
    name: String,
    size: usize,
    usage: vk::BufferUsageFlags,
    memory_pref: VkMemoryPreference,
    queue_families: &[u32],
  ) -> anyhow::Result<Self> {
    let long_name = fmt_buf_name(&name, size);
    if size == 0 {
      anyhow::bail!("Tried to allocate 0 bytes for {}", long_name);
    }
    trace!("Allocating {}", long_name);

    let sharing_mode = buffer_sharing_mode(queue_families);
    let mut buffer_info = vk::BufferCreateInfo::builder()
      .size(size as u64)
      .usage(usage)
      .sharing_mode(sharing_mode);
    if sharing_mode == vk::SharingMode::CONCURRENT {
      buffer_info = buffer_info.queue_family_indices(queue_families);
    }
    let buffer_info = buffer_info.build();

    let alloc_info = determine_gpu_allocation_info(&memory_pref);

    let (buffer, allocation) = unsafe {
      allocator
        .create_buffer(&buffer_info, &alloc_info)
        .with_context(|| format!("Failed allocating: {}", long_name))?
    };

    let mapped_pointer = if memory_pref.is_mapped() {
      get_persistently_mapped_pointer(allocator, &allocation)
    } else {
      None
    };

    Ok(Self {
      name,
      long_name,
      size,
      buffer,
      allocation,
      mapped_pointer,
    })
  }

  /// Allocate GPU-only buffer and fill it with data through a temporary staging buffer.
  pub fn from_data(
    allocator: &vma::Allocator,
    with_setup_cb: &impl WithSetupCmdBuffer,
    name: String,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
  ) -> anyhow::Result<Self> {
    let size = bytes.len();
    let buffer = VkBuffer::empty(
      allocator,
      name.clone(),
      size,
      usage | vk::BufferUsageFlags::TRANSFER_DST,
      VkMemoryPreference::GpuOnly,
    )?;

    let mut scratch_buffer = VkBuffer::empty(
      allocator,
      format!("{}-scratch", name),
      size,
      vk::BufferUsageFlags::TRANSFER_SRC,
      VkMemoryPreference::ScratchTransfer,
    )?;
    scratch_buffer.write_to_mapped(bytes)?;

    let copy_result = with_setup_cb.with_setup_cb(|device, cmd_buf| {
      let copy = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: size as u64,
      };
      unsafe { device.cmd_copy_buffer(cmd_buf, scratch_buffer.buffer, buffer.buffer, &[copy]) };
    });

    unsafe { scratch_buffer.delete(allocator) };
    copy_result?;

    Ok(buffer)
  }

  pub unsafe fn delete(&mut self, allocator: &vma::Allocator) {
    allocator.destroy_buffer(self.buffer, &mut self.allocation)
  }
}

impl VkMemoryResource for VkBuffer {
  fn get_name(&self) -> &String {
    &self.name
  }

  fn get_long_name(&self) -> String {
    self.long_name.clone()
  }

  fn get_size(&self) -> usize {
    self.size
  }

  fn get_mapped_pointer(&self) -> Option<MemoryMapPointer> {
    self.mapped_pointer.clone()
  }
}

fn fmt_buf_name(name: &str, size: usize) -> String {
  format!("Buffer '{}' ({} bytes)", name, size)
}

/// `CONCURRENT` needs at least 2 distinct families
pub fn buffer_sharing_mode(queue_families: &[u32]) -> vk::SharingMode {
  match queue_families.split_first() {
    Some((first, rest)) if rest.iter().any(|f| f != first) => vk::SharingMode::CONCURRENT,
    _ => vk::SharingMode::EXCLUSIVE,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sharing_mode_for_queue_families() {
    assert_eq!(buffer_sharing_mode(&[]), vk::SharingMode::EXCLUSIVE);
    assert_eq!(buffer_sharing_mode(&[0]), vk::SharingMode::EXCLUSIVE);
    assert_eq!(buffer_sharing_mode(&[1, 1]), vk::SharingMode::EXCLUSIVE);
    assert_eq!(buffer_sharing_mode(&[0, 2]), vk::SharingMode::CONCURRENT);
  }
}
