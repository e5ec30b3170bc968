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

use std::fmt;

use ash::vk;

#[derive(Debug)]
pub enum Error {
    Vulkan(vk::Result),
    Loading(ash::LoadingError),
    MemoryAllocation(gpu_alloc::AllocationError),
    MemoryMap(gpu_alloc::MapError),
    NoSuitableDevice,
    NoSuitableQueue,
    ExtensionNotFound(String),
    NotSupported,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Vulkan(err) => write!(f, "vulkan error: {}", err),
            Error::Loading(err) => write!(f, "failed to load vulkan library: {}", err),
            Error::MemoryAllocation(err) => write!(f, "memory allocation failed: {}", err),
            Error::MemoryMap(err) => write!(f, "memory mapping failed: {}", err),
            Error::NoSuitableDevice => write!(f, "no suitable physical device"),
            Error::NoSuitableQueue => write!(f, "no suitable queue family"),
            Error::ExtensionNotFound(name) => write!(f, "extension {} not found", name),
            Error::NotSupported => write!(f, "not supported"),
        }
    }
}

impl std::error::Error for Error {}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        Error::Vulkan(value)
    }
}

impl From<ash::LoadingError> for Error {
    fn from(value: ash::LoadingError) -> Self {
        Error::Loading(value)
    }
}

impl From<gpu_alloc::AllocationError> for Error {
    fn from(value: gpu_alloc::AllocationError) -> Self {
        Error::MemoryAllocation(value)
    }
}

impl From<gpu_alloc::MapError> for Error {
    fn from(value: gpu_alloc::MapError) -> Self {
        Error::MemoryMap(value)
    }
}
