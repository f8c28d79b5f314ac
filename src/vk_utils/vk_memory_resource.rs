use std::marker::{Send, Sync};

#[derive(PartialEq, Debug, Copy, Clone)]
pub enum VkMemoryPreference {
  /// Usage: vertex, index buffers, SSBO.
  GpuOnly,
  /// CPU-mapped memory that is read on GPU (e.g. uniforms).
  /// Will be persistently mapped.
  ///
  /// Usage: Uniform buffers.
  GpuMappable,
  /// Temporary allocation used when copying CPU data to GPU-only memory.
  /// No guarantee if it's CPU or GPU. Nor should you care.
  ///
  /// Will be persistently mapped.
  ScratchTransfer,
}

impl VkMemoryPreference {
  pub fn is_mapped(&self) -> bool {
    *self != VkMemoryPreference::GpuOnly
  }
}

pub fn determine_gpu_allocation_info(
  memory_pref: &VkMemoryPreference,
) -> vma::AllocationCreateInfo {
  match memory_pref {
    VkMemoryPreference::GpuOnly => vma::AllocationCreateInfo {
      usage: vma::MemoryUsage::AutoPreferDevice,
      ..Default::default()
    },
    VkMemoryPreference::GpuMappable => vma::AllocationCreateInfo {
      usage: vma::MemoryUsage::AutoPreferDevice,
      flags: vma::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE
        | vma::AllocationCreateFlags::MAPPED,
      ..Default::default()
    },
    VkMemoryPreference::ScratchTransfer => vma::AllocationCreateInfo {
      usage: vma::MemoryUsage::Auto,
      flags: vma::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE
        | vma::AllocationCreateFlags::MAPPED,
      ..Default::default()
    },
  }
}

pub fn get_persistently_mapped_pointer(
  allocator: &vma::Allocator,
  allocation: &vma::Allocation,
) -> Option<MemoryMapPointer> {
  let alloc_info = allocator.get_allocation_info(allocation);
  let ptr = alloc_info.mapped_data;
  if ptr.is_null() {
    None
  } else {
    Some(MemoryMapPointer(ptr))
  }
}

/// Wrapper over a raw pointer to make it moveable and accessible from other threads
#[derive(Clone)]
pub struct MemoryMapPointer(pub *mut ::std::os::raw::c_void);
unsafe impl Send for MemoryMapPointer {}
unsafe impl Sync for MemoryMapPointer {}

pub trait VkMemoryResource {
  fn get_name(&self) -> &String;
  fn get_long_name(&self) -> String;
  fn get_size(&self) -> usize;
  fn get_mapped_pointer(&self) -> Option<MemoryMapPointer>;

  /// Host writes go straight to GPU-visible memory. Allocation is
  /// HOST_COHERENT (or flushed by VMA), no explicit flush needed.
  fn write_to_mapped(&self, bytes: &[u8]) -> anyhow::Result<()> {
    self.write_to_mapped_at(0, bytes)
  }

  fn write_to_mapped_at(&self, offset: usize, bytes: &[u8]) -> anyhow::Result<()> {
    let size = bytes.len();
    if offset + size > self.get_size() {
      anyhow::bail!(
        "Tried to write {} bytes at offset {} into '{}'",
        size,
        offset,
        self.get_long_name()
      );
    }

    match self.get_mapped_pointer() {
      Some(pointer) => {
        let slice = unsafe {
          let dst = (pointer.0 as *mut u8).add(offset);
          std::slice::from_raw_parts_mut(dst, size)
        };
        slice.copy_from_slice(bytes);
        Ok(())
      }
      None => anyhow::bail!(
        "Tried to write {} bytes to unmapped '{}'",
        size,
        self.get_long_name()
      ),
    }
  }
}
