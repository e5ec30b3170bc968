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

use std::{ptr::NonNull, sync::Arc};

use ash::vk;
use gpu_alloc::UsageFlags;

use crate::{Device, GpuMemory, Result};

#[derive(Debug, Clone, Copy)]
pub struct BufferCreateDesc<'a> {
    pub size: usize,
    pub usage: vk::BufferUsageFlags,
    pub dedicated: bool,
    pub name: Option<&'a str>,
    memory_usage: UsageFlags,
}

impl<'a> BufferCreateDesc<'a> {
    /// Device-local buffer.
    pub fn gpu(size: usize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            dedicated: false,
            name: None,
            memory_usage: UsageFlags::FAST_DEVICE_ACCESS,
        }
    }

    /// Host-visible buffer the CPU fills and the GPU reads.
    pub fn upload(size: usize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            dedicated: false,
            name: None,
            memory_usage: UsageFlags::UPLOAD,
        }
    }

    /// Makes the buffer addressable by GPU virtual address.
    pub fn device_address(mut self) -> Self {
        self.usage |= vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        self.memory_usage |= UsageFlags::DEVICE_ADDRESS;
        self
    }

    pub fn dedicated(mut self, value: bool) -> Self {
        self.dedicated = value;
        self
    }

    pub fn name(mut self, value: &'a str) -> Self {
        self.name = Some(value);
        self
    }

    fn build(&self) -> vk::BufferCreateInfo {
        vk::BufferCreateInfo::builder()
            .size(self.size as u64)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .build()
    }
}

/// Buffer plus the memory block backing it.
#[derive(Debug)]
pub struct Buffer {
    device: Arc<Device>,
    raw: vk::Buffer,
    memory: Option<GpuMemory>,
    mapping: Option<NonNull<u8>>,
    size: usize,
}

unsafe impl Send for Buffer {}

impl Buffer {
    pub fn new(device: &Arc<Device>, desc: BufferCreateDesc) -> Result<Self> {
        let buffer = unsafe { device.get().create_buffer(&desc.build(), None) }?;
        let requirements = unsafe { device.get().get_buffer_memory_requirements(buffer) };
        let memory = device.allocate(requirements, desc.memory_usage, desc.dedicated)?;
        unsafe {
            device
                .get()
                .bind_buffer_memory(buffer, *memory.memory(), memory.offset())
        }?;
        if let Some(name) = desc.name {
            device.set_object_name(buffer, name);
        }

        Ok(Self {
            device: device.clone(),
            raw: buffer,
            memory: Some(memory),
            mapping: None,
            size: desc.size,
        })
    }

    pub fn raw(&self) -> vk::Buffer {
        self.raw
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// GPU virtual address of the buffer. Requires `device_address()` on
    /// creation.
    pub fn device_address(&self) -> u64 {
        unsafe {
            self.device.get().get_buffer_device_address(
                &vk::BufferDeviceAddressInfo::builder()
                    .buffer(self.raw)
                    .build(),
            )
        }
    }

    /// Maps once, stays mapped.
    pub fn map(&mut self) -> Result<NonNull<u8>> {
        if let Some(mapping) = self.mapping {
            return Ok(mapping);
        }
        let memory = self.memory.as_mut().expect("buffer memory is gone");
        let mapping = self.device.map_memory(memory, self.size)?;
        self.mapping = Some(mapping);

        Ok(mapping)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device.wait_idle();
        if let Some(memory) = self.memory.as_mut() {
            if self.mapping.take().is_some() {
                self.device.unmap_memory(memory);
            }
        }
        unsafe { self.device.get().destroy_buffer(self.raw, None) };
        if let Some(memory) = self.memory.take() {
            self.device.free_memory(memory);
        }
    }
}
