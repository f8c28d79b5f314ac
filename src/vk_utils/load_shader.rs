use anyhow::Context;
use log::trace;
use std::ffi::CStr;

use ash::vk;

// https://github.com/zeux/niagara/blob/master/src/shaders.cpp

const SHADER_ENTRY_POINT: &[u8] = b"main\0";

fn load_shader_module(device: &ash::Device, path: &std::path::Path) -> anyhow::Result<vk::ShaderModule> {
  trace!("Loading shader from {}", path.to_string_lossy());

  let mut file = std::fs::File::open(path)
    .with_context(|| format!("Could not open file '{}'", path.to_string_lossy()))?;
  let spirv_code = ash::util::read_spv(&mut file)
    .with_context(|| format!("File '{}' is not valid SPIR-V", path.to_string_lossy()))?;
  let create_info = vk::ShaderModuleCreateInfo::builder()
    .code(&spirv_code)
    .build();

  unsafe {
    device.create_shader_module(&create_info, None).with_context(|| {
      format!(
        "Failed to create shader module from file '{}'",
        path.to_string_lossy()
      )
    })
  }
}

pub fn load_shader(
  device: &ash::Device,
  stage: vk::ShaderStageFlags,
  path: &str,
) -> anyhow::Result<(vk::ShaderModule, vk::PipelineShaderStageCreateInfo)> {
  let shader_fn_name = CStr::from_bytes_with_nul(SHADER_ENTRY_POINT)?;

  let shader_module = load_shader_module(device, std::path::Path::new(path))?;

  let stage_info = vk::PipelineShaderStageCreateInfo::builder()
    .stage(stage)
    .module(shader_module)
    .name(shader_fn_name)
    .build();
  trace!("Shader {:?} loaded from {}", stage, path);

  Ok((shader_module, stage_info))
}

/// Set of shader stages of a single pipeline. Modules can be destroyed right after pipeline creation.
pub struct ShaderStages {
  pub modules: Vec<vk::ShaderModule>,
  pub stages: Vec<vk::PipelineShaderStageCreateInfo>,
}

impl ShaderStages {
  pub fn load(device: &ash::Device, paths: &[(vk::ShaderStageFlags, &str)]) -> anyhow::Result<Self> {
    let mut result = Self {
      modules: Vec::with_capacity(paths.len()),
      stages: Vec::with_capacity(paths.len()),
    };

    for (stage, path) in paths {
      match load_shader(device, *stage, path) {
        Ok((module, stage_info)) => {
          result.modules.push(module);
          result.stages.push(stage_info);
        }
        Err(err) => {
          unsafe { result.destroy(device) };
          return Err(err);
        }
      }
    }

    Ok(result)
  }

  pub unsafe fn destroy(&self, device: &ash::Device) {
    for &module in &self.modules {
      device.destroy_shader_module(module, None);
    }
  }
}
