mod vk_ctx;
mod vk_ctx_command_buffers;
mod vk_ctx_device;
mod vk_ctx_initialize;
mod vk_ctx_resources;
mod vk_ctx_swapchain;
mod vk_ctx_synchronize;

pub use vk_ctx::*;
pub use vk_ctx_command_buffers::*;
pub use vk_ctx_device::*;
pub use vk_ctx_initialize::*;
pub use vk_ctx_swapchain::*;
pub use vk_ctx_synchronize::*;
