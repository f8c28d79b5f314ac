use anyhow::Context;
use log::{debug, error, info, warn};
use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::vk::{self, Handle};

// called on validation layer message
extern "system" fn vulkan_debug_callback(
  message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
  message_type: vk::DebugUtilsMessageTypeFlagsEXT,
  p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
  _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
  let callback_data = unsafe { *p_callback_data };
  let message = if callback_data.p_message.is_null() {
    std::borrow::Cow::from("<no message>")
  } else {
    unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
  };

  let message_str = format!("[VK_dbg_callback, {:?}]: {}", message_type, message);

  match message_severity {
    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("{}", message_str),
    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("{}", message_str),
    vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("{}", message_str),
    _ => debug!("{}", message_str),
  }

  vk::FALSE
}

pub fn setup_debug_reporting(
  entry: &ash::Entry,
  instance: &ash::Instance,
) -> anyhow::Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
  let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
    .message_severity(
      vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
      // | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE // will cause spam about extensions
    )
    .message_type(
      vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
    )
    .pfn_user_callback(Some(vulkan_debug_callback))
    .build();

  let debug_utils_loader = DebugUtils::new(entry, instance);

  let debug_messenger = unsafe {
    debug_utils_loader
      .create_debug_utils_messenger(&debug_info, None)
      .context("Failed to create debug utils messenger")?
  };

  Ok((debug_utils_loader, debug_messenger))
}

/// Name shows up in validation messages and RenderDoc. Failures are only logged.
pub unsafe fn set_debug_label<H: Handle>(
  debug_utils_loader: &DebugUtils,
  device: vk::Device,
  handle: H,
  name: &str,
) {
  let name_c = match CString::new(name) {
    Ok(s) => s,
    Err(_) => return,
  };
  let name_info = vk::DebugUtilsObjectNameInfoEXT::builder()
    .object_type(H::TYPE)
    .object_handle(handle.as_raw())
    .object_name(&name_c)
    .build();

  if let Err(err) = debug_utils_loader.set_debug_utils_object_name(device, &name_info) {
    warn!("Could not set debug label '{}': {:?}", name, err);
  }
}
