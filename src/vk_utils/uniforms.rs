use anyhow::Context;
use ash::vk;

use crate::vk_utils::VkBuffer;

/*
https://vulkan-tutorial.com/Uniform_buffers/Descriptor_layout_and_buffer <3

Steps:
  1. Create descriptor pool. Specify how many descriptors will be allocated
  2. Create descriptor set(s). Each descriptor set contains some number
     of uniform buffers/textures, each assigned a `binding`.
  3. Connect the real data buffer to a (descriptor_set, binding) using `vkUpdateDescriptorSets`.
  4. Bind the descriptor sets before draw call: `vkCmdBindDescriptorSets`.
*/

////////////////////////////////
/// Layout utils
////////////////////////////////

fn create_binding(
  binding: u32,
  descriptor_type: vk::DescriptorType,
  stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
  vk::DescriptorSetLayoutBinding::builder()
    .binding(binding)
    .descriptor_type(descriptor_type)
    .descriptor_count(1)
    .stage_flags(stage_flags)
    .build()
}

/// Create layout for a single uniform buffer object.
pub fn create_ubo_binding(
  binding: u32,
  stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
  create_binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
}

/// Uniform buffer where offset is provided during `cmd_bind_descriptor_sets`.
pub fn create_ubo_dynamic_binding(
  binding: u32,
  stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
  create_binding(
    binding,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    stage_flags,
  )
}

/// Create layout for a single texture/sampler object.
pub fn create_texture_binding(
  binding: u32,
  stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
  create_binding(
    binding,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    stage_flags,
  )
}

/// Create layout for a single shader storage buffer object (SSBO).
pub fn create_ssbo_binding(
  binding: u32,
  stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
  create_binding(binding, vk::DescriptorType::STORAGE_BUFFER, stage_flags)
}

pub fn create_descriptor_set_layout(
  device: &ash::Device,
  bindings: &[vk::DescriptorSetLayoutBinding],
) -> anyhow::Result<vk::DescriptorSetLayout> {
  let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
    .bindings(bindings)
    .build();

  unsafe {
    device
      .create_descriptor_set_layout(&create_info, None)
      .context("Failed to create DescriptorSetLayout")
  }
}

pub fn create_descriptor_pool(
  device: &ash::Device,
  pool_sizes: &[vk::DescriptorPoolSize],
  max_sets: u32,
) -> anyhow::Result<vk::DescriptorPool> {
  let create_info = vk::DescriptorPoolCreateInfo::builder()
    .pool_sizes(pool_sizes)
    .max_sets(max_sets)
    .build();

  unsafe {
    device
      .create_descriptor_pool(&create_info, None)
      .context("Failed to create DescriptorPool")
  }
}

pub fn allocate_descriptor_set(
  device: &ash::Device,
  pool: vk::DescriptorPool,
  layout: vk::DescriptorSetLayout,
) -> anyhow::Result<vk::DescriptorSet> {
  let layouts = [layout];
  let alloc_info = vk::DescriptorSetAllocateInfo::builder()
    .descriptor_pool(pool)
    .set_layouts(&layouts)
    .build();

  let sets = unsafe {
    device
      .allocate_descriptor_sets(&alloc_info)
      .context("Failed to allocate DescriptorSet")?
  };
  sets
    .into_iter()
    .next()
    .context("Driver returned no descriptor sets")
}

////////////////////////////////
/// Resource binding
////////////////////////////////

pub enum BindableBufferUsage {
  UBO,
  /// Only `range` bytes are visible, starting at the offset given at bind time
  UBODynamic { range: u64 },
  SSBO,
}

fn get_buffer_descriptor_type(buf_type: &BindableBufferUsage) -> vk::DescriptorType {
  match buf_type {
    BindableBufferUsage::UBO => vk::DescriptorType::UNIFORM_BUFFER,
    BindableBufferUsage::UBODynamic { .. } => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    BindableBufferUsage::SSBO => vk::DescriptorType::STORAGE_BUFFER,
  }
}

pub enum BindableResource<'a> {
  Buffer {
    usage: BindableBufferUsage,
    binding: u32,
    buffer: &'a VkBuffer,
  },
  Texture {
    binding: u32,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
    sampler: vk::Sampler,
  },
}

/// Point `descriptor_set`'s bindings at given resources.
/// Must not be called while the set is in use by a pending command buffer.
pub unsafe fn bind_resources_to_descriptors(
  device: &ash::Device,
  descriptor_set: vk::DescriptorSet,
  resources_to_bind: &[BindableResource],
) {
  // Since vk::WriteDescriptorSet has POINTERS to data, keep infos alive
  // (and not reallocated) till `update_descriptor_sets` is done.
  let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::with_capacity(resources_to_bind.len());
  let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::with_capacity(resources_to_bind.len());

  let writes: Vec<vk::WriteDescriptorSet> = resources_to_bind
    .iter()
    .map(|resource| match resource {
      BindableResource::Buffer {
        binding,
        buffer,
        usage,
      } => {
        let range = match usage {
          BindableBufferUsage::UBODynamic { range } => *range,
          _ => vk::WHOLE_SIZE,
        };
        buffer_infos.push(vk::DescriptorBufferInfo {
          buffer: buffer.buffer,
          offset: 0,
          range,
        });
        let data_slice = &buffer_infos[(buffer_infos.len() - 1)..buffer_infos.len()];
        vk::WriteDescriptorSet::builder()
          .dst_set(descriptor_set)
          .dst_binding(*binding)
          .dst_array_element(0)
          .descriptor_type(get_buffer_descriptor_type(usage))
          .buffer_info(data_slice)
          .build()
      }
      BindableResource::Texture {
        binding,
        image_view,
        image_layout,
        sampler,
      } => {
        image_infos.push(vk::DescriptorImageInfo {
          image_layout: *image_layout,
          image_view: *image_view,
          sampler: *sampler,
        });
        let data_slice = &image_infos[(image_infos.len() - 1)..image_infos.len()];
        vk::WriteDescriptorSet::builder()
          .dst_set(descriptor_set)
          .dst_binding(*binding)
          .dst_array_element(0)
          .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
          .image_info(data_slice)
          .build()
      }
    })
    .collect();

  device.update_descriptor_sets(&writes, &[]);
}
