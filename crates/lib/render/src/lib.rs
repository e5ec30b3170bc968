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

mod alloc;
mod draw;
mod graph;
mod heap;
mod pass;
mod pipeline;
mod pipeline_cache;
mod reload;
mod renderer;
mod resource;
mod shader;
mod stage;

pub use alloc::*;
pub use draw::*;
pub use graph::*;
pub use heap::*;
pub use pass::*;
pub use pipeline::*;
pub use renderer::*;
pub use resource::*;
pub use shader::*;
pub use stage::*;

use ash::vk;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Backend error: {0}")]
    Backend(#[from] onyx_backend::Error),
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Heap is out of space")]
    OutOfHeap,
    #[error("Upload is bigger than the staging ring")]
    NotEnoughSpace,
    #[error("Resource has no bound GPU handle")]
    InvalidHandle,
    #[error("Resource kind doesn't match declared usage")]
    KindMismatch,
    #[error("Pipeline creation failed")]
    PipelineCreationFailed,
    #[error("Shader compilation failed:\n{0}")]
    ShaderCompilationFailed(String),
    #[error("Swapchain needs to be recreated")]
    RecreateSwapchain,
}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        onyx_backend::Error::from(value).into()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
