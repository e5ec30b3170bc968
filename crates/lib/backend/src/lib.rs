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

mod buffer;
mod context;
mod device;
mod error;
mod image;
mod instance;
mod physical_device;
mod surface;
mod swapchain;

pub use buffer::*;
pub use context::*;
pub use device::*;
pub use error::*;
pub use image::*;
pub use instance::*;
pub use physical_device::*;
pub use surface::*;
pub use swapchain::*;

pub type GpuAllocator = gpu_alloc::GpuAllocator<ash::vk::DeviceMemory>;
pub type GpuMemory = gpu_alloc::MemoryBlock<ash::vk::DeviceMemory>;
