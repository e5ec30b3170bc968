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

use std::sync::Arc;

use ash::vk;
use log::info;
use onyx_backend::{Buffer, BufferCreateDesc, Device};
use onyx_common::BumpAlloc;

use crate::{Error, Result};

/// Minimum sub-allocation alignment, what PhysicalStorageBuffer64 loads
/// require.
pub const HEAP_MIN_ALIGNMENT: u64 = 16;

/// One large device-local buffer addressed by GPU virtual address. All
/// shader-visible data lives here, kernels chase `base + offset` pointers
/// instead of descriptors.
pub struct Heap {
    buffer: Buffer,
    address: u64,
    allocator: BumpAlloc,
}

impl Heap {
    pub fn new(device: &Arc<Device>, size: usize) -> Result<Self> {
        let buffer = Buffer::new(
            device,
            BufferCreateDesc::gpu(
                size,
                vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            )
            .device_address()
            .dedicated(true)
            .name("Heap"),
        )?;
        let address = buffer.device_address();
        info!("Created {} MiB heap at {:#x}", size >> 20, address);

        Ok(Self {
            buffer,
            address,
            allocator: BumpAlloc::new(size as u64),
        })
    }

    /// Base GPU virtual address. Every shader access into the heap is
    /// `device_address() + offset`.
    pub fn device_address(&self) -> u64 {
        self.address
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer.raw()
    }

    pub fn size(&self) -> u64 {
        self.allocator.size()
    }

    /// Bump-allocates a heap range, returning its offset.
    pub fn sub_alloc(&mut self, size: u64, align: u64) -> Result<u64> {
        self.allocator
            .allocate(size, align.max(HEAP_MIN_ALIGNMENT))
            .ok_or(Error::OutOfHeap)
    }
}
