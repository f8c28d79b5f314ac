use ash::vk;
use log::info;

use crate::scene::{ModelTransformUBO, Scene, SceneCameras};
use crate::vk_utils::*;

const ALL_HAIR_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
  vk::ShaderStageFlags::VERTEX.as_raw()
    | vk::ShaderStageFlags::TESSELLATION_CONTROL.as_raw()
    | vk::ShaderStageFlags::TESSELLATION_EVALUATION.as_raw()
    | vk::ShaderStageFlags::GEOMETRY.as_raw(),
);

/// Every descriptor set layout used by the frame pipeline. Persistent.
pub struct DescriptorSetLayouts {
  /// `CameraUBO` at binding 0
  pub camera: vk::DescriptorSetLayout,
  /// `ModelTransformUBO`, dynamic offset selects the model
  pub model_transform: vk::DescriptorSetLayout,
  /// `ModelTransformUBO` of a hair group
  pub hair_transform: vk::DescriptorSetLayout,
  /// shadow map at binding 0, opacity map at binding 1
  pub light_maps: vk::DescriptorSetLayout,
  /// shadow map at binding 0
  pub shadow_map: vk::DescriptorSetLayout,
  pub time: vk::DescriptorSetLayout,
  pub colliders: vk::DescriptorSetLayout,
  pub grid: vk::DescriptorSetLayout,
  /// strands SSBO at binding 0, draw indirect SSBO at binding 1
  pub strands: vk::DescriptorSetLayout,
}

impl DescriptorSetLayouts {
  pub fn new(device: &ash::Device) -> anyhow::Result<Self> {
    let single = |binding: vk::DescriptorSetLayoutBinding| {
      create_descriptor_set_layout(device, &[binding])
    };

    Ok(Self {
      camera: single(create_ubo_binding(0, vk::ShaderStageFlags::ALL))?,
      model_transform: single(create_ubo_dynamic_binding(
        0,
        vk::ShaderStageFlags::VERTEX,
      ))?,
      hair_transform: single(create_ubo_binding(0, ALL_HAIR_STAGES))?,
      light_maps: create_descriptor_set_layout(
        device,
        &[
          create_texture_binding(0, vk::ShaderStageFlags::FRAGMENT),
          create_texture_binding(1, vk::ShaderStageFlags::FRAGMENT),
        ],
      )?,
      shadow_map: single(create_texture_binding(0, vk::ShaderStageFlags::FRAGMENT))?,
      time: single(create_ubo_binding(0, vk::ShaderStageFlags::COMPUTE))?,
      colliders: single(create_ubo_binding(0, vk::ShaderStageFlags::COMPUTE))?,
      grid: single(create_ssbo_binding(0, vk::ShaderStageFlags::COMPUTE))?,
      strands: create_descriptor_set_layout(
        device,
        &[
          create_ssbo_binding(0, vk::ShaderStageFlags::COMPUTE),
          create_ssbo_binding(1, vk::ShaderStageFlags::COMPUTE),
        ],
      )?,
    })
  }

  pub unsafe fn destroy(&self, device: &ash::Device) {
    let all = [
      self.camera,
      self.model_transform,
      self.hair_transform,
      self.light_maps,
      self.shadow_map,
      self.time,
      self.colliders,
      self.grid,
      self.strands,
    ];
    for layout in all {
      device.destroy_descriptor_set_layout(layout, None);
    }
  }
}

/// How many descriptors of each type the pool needs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DescriptorBudget {
  pub uniform_buffers: u32,
  pub uniform_buffers_dynamic: u32,
  pub storage_buffers: u32,
  pub samplers: u32,
  pub max_sets: u32,
}

impl DescriptorBudget {
  pub fn for_hair_groups(hair_group_count: u32) -> Self {
    let per_group_sets = 2; // transform, strands
    Self {
      // 2 cameras, time, colliders, per-group transform
      uniform_buffers: 4 + hair_group_count,
      uniform_buffers_dynamic: 1,
      // grid, per-group strands + draw indirect
      storage_buffers: 1 + 2 * hair_group_count,
      // light maps (2), shadow map
      samplers: 3,
      // 2 cameras, model transforms, light maps, shadow map, time, colliders, grid
      max_sets: 8 + per_group_sets * hair_group_count,
    }
  }

  pub fn pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
    let size = |ty: vk::DescriptorType, descriptor_count: u32| vk::DescriptorPoolSize {
      ty,
      descriptor_count,
    };
    vec![
      size(vk::DescriptorType::UNIFORM_BUFFER, self.uniform_buffers),
      size(
        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        self.uniform_buffers_dynamic,
      ),
      size(vk::DescriptorType::STORAGE_BUFFER, self.storage_buffers),
      size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, self.samplers),
    ]
  }
}

/// Persistent descriptor sets. Only the light map sets point at
/// size-dependent resources, see `bind_light_maps`.
pub struct FrameDescriptors {
  pub layouts: DescriptorSetLayouts,
  pool: vk::DescriptorPool,
  pub viewer_camera: vk::DescriptorSet,
  pub light_camera: vk::DescriptorSet,
  pub model_transforms: vk::DescriptorSet,
  /// Same order as `Scene::hair_groups`
  pub hair_transforms: Vec<vk::DescriptorSet>,
  pub light_maps: vk::DescriptorSet,
  pub shadow_map: vk::DescriptorSet,
  pub time: vk::DescriptorSet,
  pub colliders: vk::DescriptorSet,
  pub grid: vk::DescriptorSet,
  /// Same order as `Scene::hair_groups`
  pub strands: Vec<vk::DescriptorSet>,
}

impl FrameDescriptors {
  pub fn new(device: &ash::Device, scene: &Scene, cameras: &SceneCameras) -> anyhow::Result<Self> {
    info!("Creating FrameDescriptors");
    let layouts = DescriptorSetLayouts::new(device)?;
    let budget = DescriptorBudget::for_hair_groups(scene.hair_groups.len() as u32);
    let pool = create_descriptor_pool(device, &budget.pool_sizes(), budget.max_sets)?;
    let alloc = |layout| allocate_descriptor_set(device, pool, layout);

    let viewer_camera = alloc(layouts.camera)?;
    let light_camera = alloc(layouts.camera)?;
    let model_transforms = alloc(layouts.model_transform)?;
    let light_maps = alloc(layouts.light_maps)?;
    let shadow_map = alloc(layouts.shadow_map)?;
    let time = alloc(layouts.time)?;
    let colliders = alloc(layouts.colliders)?;
    let grid = alloc(layouts.grid)?;
    let hair_transforms = scene
      .hair_groups
      .iter()
      .map(|_| alloc(layouts.hair_transform))
      .collect::<anyhow::Result<Vec<_>>>()?;
    let strands = scene
      .hair_groups
      .iter()
      .map(|_| alloc(layouts.strands))
      .collect::<anyhow::Result<Vec<_>>>()?;

    let descriptors = Self {
      layouts,
      pool,
      viewer_camera,
      light_camera,
      model_transforms,
      hair_transforms,
      light_maps,
      shadow_map,
      time,
      colliders,
      grid,
      strands,
    };
    unsafe { descriptors.bind_persistent(device, scene, cameras) };
    Ok(descriptors)
  }

  unsafe fn bind_persistent(&self, device: &ash::Device, scene: &Scene, cameras: &SceneCameras) {
    let bind_ubo = |set: vk::DescriptorSet, buffer: &VkBuffer| {
      bind_resources_to_descriptors(
        device,
        set,
        &[BindableResource::Buffer {
          usage: BindableBufferUsage::UBO,
          binding: 0,
          buffer,
        }],
      )
    };
    bind_ubo(self.viewer_camera, &cameras.viewer.camera.buffer);
    bind_ubo(self.light_camera, &cameras.light.buffer);
    bind_ubo(self.time, &scene.time_buffer);
    bind_ubo(self.colliders, &scene.colliders_buffer);

    bind_resources_to_descriptors(
      device,
      self.model_transforms,
      &[BindableResource::Buffer {
        usage: BindableBufferUsage::UBODynamic {
          range: std::mem::size_of::<ModelTransformUBO>() as u64,
        },
        binding: 0,
        buffer: &scene.model_transforms_buffer,
      }],
    );

    bind_resources_to_descriptors(
      device,
      self.grid,
      &[BindableResource::Buffer {
        usage: BindableBufferUsage::SSBO,
        binding: 0,
        buffer: &scene.grid.buffer,
      }],
    );

    for (i, hair_group) in scene.hair_groups.iter().enumerate() {
      bind_ubo(self.hair_transforms[i], &hair_group.transform_buffer);
      bind_resources_to_descriptors(
        device,
        self.strands[i],
        &[
          BindableResource::Buffer {
            usage: BindableBufferUsage::SSBO,
            binding: 0,
            buffer: &hair_group.strands_buffer,
          },
          BindableResource::Buffer {
            usage: BindableBufferUsage::SSBO,
            binding: 1,
            buffer: &hair_group.draw_indirect_buffer,
          },
        ],
      );
    }
  }

  /// Point light map sets at the current shadow/opacity images.
  /// Device must be idle, sets are used by pre-recorded command buffers.
  pub unsafe fn bind_light_maps(
    &self,
    device: &ash::Device,
    shadow_map: vk::ImageView,
    opacity_map: vk::ImageView,
    sampler: vk::Sampler,
  ) {
    let shadow = |binding| BindableResource::Texture {
      binding,
      image_view: shadow_map,
      image_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
      sampler,
    };
    bind_resources_to_descriptors(
      device,
      self.light_maps,
      &[
        shadow(0),
        BindableResource::Texture {
          binding: 1,
          image_view: opacity_map,
          image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
          sampler,
        },
      ],
    );
    bind_resources_to_descriptors(device, self.shadow_map, &[shadow(0)]);
  }

  /// Frees all sets together with the pool
  pub unsafe fn destroy(&self, device: &ash::Device) {
    device.destroy_descriptor_pool(self.pool, None);
    self.layouts.destroy(device);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn budget_grows_with_hair_groups() {
    let none = DescriptorBudget::for_hair_groups(0);
    let two = DescriptorBudget::for_hair_groups(2);
    assert_eq!(none.uniform_buffers, 4);
    assert_eq!(two.uniform_buffers, 6);
    assert_eq!(two.storage_buffers, 5);
    assert_eq!(two.max_sets - none.max_sets, 4);
    assert_eq!(none.samplers, 3);
  }

  #[test]
  fn pool_sizes_are_not_empty() {
    let sizes = DescriptorBudget::for_hair_groups(1).pool_sizes();
    assert_eq!(sizes.len(), 4);
    assert!(sizes.iter().all(|s| s.descriptor_count > 0));
  }
}
