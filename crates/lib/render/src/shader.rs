// Copyright (C) 2024 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use ash::vk;
use log::info;
use onyx_backend::Device;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Compute,
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn shaderc(self) -> shaderc::ShaderKind {
        match self {
            ShaderStage::Compute => shaderc::ShaderKind::Compute,
            ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
            ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
        }
    }

    pub fn vk(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

/// GLSL -> SPIR-V -> module, cached by path. Hot reload evicts entries
/// through `remove` so the next compile picks up the edited source.
pub struct ShaderCache {
    device: Arc<Device>,
    compiler: shaderc::Compiler,
    modules: HashMap<PathBuf, vk::ShaderModule>,
}

impl ShaderCache {
    pub fn new(device: &Arc<Device>) -> Result<Self> {
        let compiler = shaderc::Compiler::new().ok_or_else(|| {
            Error::ShaderCompilationFailed("failed to initialize shader compiler".into())
        })?;

        Ok(Self {
            device: device.clone(),
            compiler,
            modules: HashMap::new(),
        })
    }

    pub fn compile(&mut self, path: &Path, stage: ShaderStage) -> Result<vk::ShaderModule> {
        if let Some(module) = self.modules.get(path) {
            return Ok(*module);
        }
        let source = fs::read_to_string(path)?;
        let artifact = self
            .compiler
            .compile_into_spirv(
                &source,
                stage.shaderc(),
                &path.to_string_lossy(),
                "main",
                None,
            )
            .map_err(|err| Error::ShaderCompilationFailed(err.to_string()))?;
        let info = vk::ShaderModuleCreateInfo::builder()
            .code(artifact.as_binary())
            .build();
        let module = unsafe { self.device.get().create_shader_module(&info, None) }
            .map_err(onyx_backend::Error::from)?;
        self.device.set_object_name(module, &path.to_string_lossy());
        info!("Compiled shader {}", path.display());
        self.modules.insert(path.to_path_buf(), module);

        Ok(module)
    }

    pub fn remove(&mut self, path: &Path) {
        if let Some(module) = self.modules.remove(path) {
            unsafe { self.device.get().destroy_shader_module(module, None) };
        }
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        self.device.wait_idle();
        for (_, module) in self.modules.drain() {
            unsafe { self.device.get().destroy_shader_module(module, None) };
        }
    }
}
