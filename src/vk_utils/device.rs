use anyhow::{anyhow, bail, Context};
use log::{info, trace};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};

use ash::extensions::{ext::DebugUtils, khr::Swapchain};
use ash::vk;

fn from_c_str<'a>(s: &[std::os::raw::c_char]) -> &'a CStr {
  unsafe { std::ffi::CStr::from_ptr(s.as_ptr() as *const std::os::raw::c_char) }
}

fn get_app_version() -> u32 {
  let to_u32 = |s: &str| s.parse::<u32>().unwrap_or(0);

  vk::make_api_version(
    0,
    to_u32(env!("CARGO_PKG_VERSION_MAJOR")),
    to_u32(env!("CARGO_PKG_VERSION_MINOR")),
    to_u32(env!("CARGO_PKG_VERSION_PATCH")),
  )
}

const VALIDATION_LAYER_NAME: &[u8] = b"VK_LAYER_KHRONOS_validation\0";

fn get_layer_names(graphics_debugging: bool) -> Vec<*const std::os::raw::c_char> {
  let mut layer_names = Vec::new();
  if graphics_debugging {
    layer_names.push(VALIDATION_LAYER_NAME.as_ptr() as *const std::os::raw::c_char);
  }
  layer_names
}

fn get_extension_names(
  display_handle: RawDisplayHandle,
  graphics_debugging: bool,
) -> anyhow::Result<Vec<*const std::os::raw::c_char>> {
  // surface + platform-specific surface (win32, xlib, wayland, metal...)
  let mut names = ash_window::enumerate_required_extensions(display_handle)
    .context("Window system is not supported by Vulkan")?
    .to_vec();
  if graphics_debugging {
    names.push(DebugUtils::name().as_ptr());
  }
  Ok(names)
}

pub fn create_instance(
  graphics_debugging: bool,
  display_handle: RawDisplayHandle,
) -> anyhow::Result<(ash::Entry, ash::Instance)> {
  let entry = unsafe { ash::Entry::load().context("Failed to load Vulkan library")? };

  let app_name = CString::new(env!("CARGO_PKG_NAME"))?;

  let app_info = vk::ApplicationInfo::builder()
    .application_name(&app_name)
    .application_version(get_app_version())
    .api_version(vk::make_api_version(0, 1, 3, 0))
    .build();

  // https://github.com/EmbarkStudios/kajiya/blob/main/crates/lib/kajiya-backend/src/vulkan/instance.rs#L52
  let layers_names_raw = get_layer_names(graphics_debugging);

  let extension_names_raw = get_extension_names(display_handle, graphics_debugging)?;

  let create_info = vk::InstanceCreateInfo::builder()
    .application_info(&app_info)
    .enabled_layer_names(&layers_names_raw)
    .enabled_extension_names(&extension_names_raw)
    .build();

  let instance: ash::Instance = unsafe {
    entry
      .create_instance(&create_info, None)
      .context("Failed to create ash::Instance")?
  };

  trace!("Ash instance created");
  Ok((entry, instance))
}

/// Queue families used by the app. Graphics family is also used to present.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
  pub graphics: u32,
  pub compute: u32,
}

impl QueueFamilies {
  /// If `true`, compute->graphics handoff needs queue family ownership transfer
  pub fn are_separate(&self) -> bool {
    self.graphics != self.compute
  }

  /// Unique indices, as required by `vk::DeviceQueueCreateInfo`
  pub fn unique_indices(&self) -> Vec<u32> {
    if self.are_separate() {
      vec![self.graphics, self.compute]
    } else {
      vec![self.graphics]
    }
  }
}

/// Graphics family with present support.
pub fn find_graphics_queue_family(
  q_props: &[vk::QueueFamilyProperties],
  can_present: impl Fn(u32) -> bool,
) -> Option<u32> {
  q_props.iter().enumerate().find_map(|(index, q)| {
    let index = index as u32;
    let is_gfx = q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
      && q.queue_flags.contains(vk::QueueFlags::COMPUTE)
      && q.queue_flags.contains(vk::QueueFlags::TRANSFER);
    if is_gfx && can_present(index) {
      Some(index)
    } else {
      None
    }
  })
}

/// Prefer async compute family (no GRAPHICS bit). Fallback to the graphics family.
pub fn find_compute_queue_family(q_props: &[vk::QueueFamilyProperties], graphics: u32) -> u32 {
  let dedicated = q_props.iter().enumerate().find_map(|(index, q)| {
    let is_compute = q.queue_flags.contains(vk::QueueFlags::COMPUTE);
    let is_gfx = q.queue_flags.contains(vk::QueueFlags::GRAPHICS);
    if is_compute && !is_gfx && q.queue_count > 0 {
      Some(index as u32)
    } else {
      None
    }
  });
  dedicated.unwrap_or(graphics)
}

fn find_queue_families(
  instance: &ash::Instance,
  surface_loader: &ash::extensions::khr::Surface,
  surface_khr: vk::SurfaceKHR,
  phys_device: vk::PhysicalDevice,
) -> Option<QueueFamilies> {
  let q_props = unsafe { instance.get_physical_device_queue_family_properties(phys_device) };

  let graphics = find_graphics_queue_family(&q_props, |index| unsafe {
    surface_loader
      .get_physical_device_surface_support(phys_device, index, surface_khr)
      .unwrap_or(false)
  })?;
  let compute = find_compute_queue_family(&q_props, graphics);

  Some(QueueFamilies { graphics, compute })
}

/// Picks physical device e.g. "GeForce GTX 1050 Ti" and queue families.
/// Same physical device will also be used to present result.
/// Discrete GPUs are preferred, but not required.
pub fn pick_physical_device_and_queue_families(
  instance: &ash::Instance,
  surface_loader: &ash::extensions::khr::Surface,
  surface_khr: vk::SurfaceKHR,
) -> anyhow::Result<(vk::PhysicalDevice, QueueFamilies)> {
  let phys_devices = unsafe {
    instance
      .enumerate_physical_devices()
      .context("Failed to enumerate physical devices")?
  };
  trace!("Found {} physical devices", phys_devices.len());

  // list of devices that satisfy our conditions
  let mut candidates: Vec<(vk::PhysicalDevice, QueueFamilies, bool)> = phys_devices
    .iter()
    .filter_map(|&phys_device| {
      let props = unsafe { instance.get_physical_device_properties(phys_device) };
      let features = unsafe { instance.get_physical_device_features(phys_device) };

      let is_discrete = props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
      let phys_device_ok = features.tessellation_shader != vk::FALSE
        && features.geometry_shader != vk::FALSE
        && features.sampler_anisotropy != vk::FALSE;

      match find_queue_families(instance, surface_loader, surface_khr, phys_device) {
        Some(families) if phys_device_ok => Some((phys_device, families, is_discrete)),
        _ => None,
      }
    })
    .collect();
  candidates.sort_by_key(|(_, _, is_discrete)| !*is_discrete);

  let (p_device, families, _) = candidates
    .into_iter()
    .next()
    .ok_or_else(|| anyhow!("No devices with tessellation and geometry shaders found"))?;

  let props = unsafe { instance.get_physical_device_properties(p_device) };
  let device_name = from_c_str(&props.device_name);
  info!("Using physical device: {:?}", device_name);
  info!("Using queue families: {:?}", families);
  Ok((p_device, families))
}

/// Pick logical device. Returns `(device, graphics_queue, compute_queue)`.
pub fn pick_device_and_queues(
  instance: &ash::Instance,
  phys_device: vk::PhysicalDevice,
  queue_families: &QueueFamilies,
) -> anyhow::Result<(ash::Device, vk::Queue, vk::Queue)> {
  trace!("Will pick logical device");
  let queue_prio = [1.0f32]; // only one queue per family
  let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
    .unique_indices()
    .iter()
    .map(|&family_idx| {
      vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(family_idx)
        .queue_priorities(&queue_prio)
        .build()
    })
    .collect();

  let device_extension_names_raw = [Swapchain::name().as_ptr()];

  let mut device_features_13 = vk::PhysicalDeviceVulkan13Features::builder()
    .synchronization2(true)
    .build();
  let device_create_info = vk::DeviceCreateInfo::builder()
    .queue_create_infos(&queue_create_infos)
    .enabled_extension_names(&device_extension_names_raw)
    .enabled_features(&vk::PhysicalDeviceFeatures {
      sampler_anisotropy: vk::TRUE,
      tessellation_shader: vk::TRUE,
      geometry_shader: vk::TRUE,
      ..Default::default()
    })
    .push_next(&mut device_features_13)
    .build();

  let device: ash::Device = unsafe {
    instance
      .create_device(phys_device, &device_create_info, None)
      .context("Failed to create (logical) device")?
  };
  trace!("Logical device selected");

  let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
  let compute_queue = unsafe { device.get_device_queue(queue_families.compute, 0) };
  trace!("Queues on logical device selected");

  Ok((device, graphics_queue, compute_queue))
}

/// First of `candidates` whose `format_features` (for given tiling) contain `features`.
pub fn select_supported_format(
  candidates: &[vk::Format],
  tiling: vk::ImageTiling,
  features: vk::FormatFeatureFlags,
  get_format_props: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
  candidates.iter().copied().find(|&format| {
    let props = get_format_props(format);
    match tiling {
      vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
      vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
      _ => false,
    }
  })
}

pub fn find_supported_format(
  instance: &ash::Instance,
  phys_device: vk::PhysicalDevice,
  candidates: &[vk::Format],
  tiling: vk::ImageTiling,
  features: vk::FormatFeatureFlags,
) -> anyhow::Result<vk::Format> {
  let format = select_supported_format(candidates, tiling, features, |format| unsafe {
    instance.get_physical_device_format_properties(phys_device, format)
  });
  match format {
    Some(f) => Ok(f),
    None => bail!(
      "None of formats {:?} supports {:?} with {:?} tiling",
      candidates,
      features,
      tiling
    ),
  }
}

pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
  vk::Format::D32_SFLOAT,
  vk::Format::D32_SFLOAT_S8_UINT,
  vk::Format::D24_UNORM_S8_UINT,
];

pub fn find_depth_format(
  instance: &ash::Instance,
  phys_device: vk::PhysicalDevice,
) -> anyhow::Result<vk::Format> {
  find_supported_format(
    instance,
    phys_device,
    &DEPTH_FORMAT_CANDIDATES,
    vk::ImageTiling::OPTIMAL,
    vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
      queue_flags: flags,
      queue_count: 1,
      ..Default::default()
    }
  }

  #[test]
  fn compute_family_prefers_dedicated() {
    let all = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
    let props = [
      family(all),
      family(vk::QueueFlags::TRANSFER),
      family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
    ];
    let graphics = find_graphics_queue_family(&props, |_| true);
    assert_eq!(graphics, Some(0));
    assert_eq!(find_compute_queue_family(&props, 0), 2);
  }

  #[test]
  fn compute_family_falls_back_to_graphics() {
    let all = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
    let props = [family(vk::QueueFlags::TRANSFER), family(all)];
    let graphics = find_graphics_queue_family(&props, |_| true).unwrap();
    assert_eq!(graphics, 1);

    let families = QueueFamilies {
      graphics,
      compute: find_compute_queue_family(&props, graphics),
    };
    assert!(!families.are_separate());
    assert_eq!(families.unique_indices(), vec![1]);
  }

  #[test]
  fn graphics_family_requires_present() {
    let all = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
    let props = [family(all), family(all)];
    assert_eq!(find_graphics_queue_family(&props, |idx| idx == 1), Some(1));
    assert_eq!(find_graphics_queue_family(&props, |_| false), None);
  }

  #[test]
  fn depth_format_picks_first_supported() {
    let only_d24 = |format: vk::Format| {
      let mut props = vk::FormatProperties::default();
      if format == vk::Format::D24_UNORM_S8_UINT {
        props.optimal_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
      }
      props
    };
    let result = select_supported_format(
      &DEPTH_FORMAT_CANDIDATES,
      vk::ImageTiling::OPTIMAL,
      vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
      only_d24,
    );
    assert_eq!(result, Some(vk::Format::D24_UNORM_S8_UINT));

    // linear tiling was not requested
    let result = select_supported_format(
      &DEPTH_FORMAT_CANDIDATES,
      vk::ImageTiling::LINEAR,
      vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
      only_d24,
    );
    assert_eq!(result, None);
  }
}
