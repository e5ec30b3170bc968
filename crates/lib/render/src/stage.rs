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

use std::{ptr::copy_nonoverlapping, slice, sync::Arc};

use ash::vk;
use log::warn;
use onyx_backend::{Buffer, BufferCreateDesc, Device};
use onyx_common::{RingCursor, RingSlot};
use parking_lot::Mutex;

use crate::{Error, Pass, ResId, ResourceState, ResourceUsage, Result};

/// Per-upload alignment inside the ring.
pub const STAGE_ALIGNMENT: u64 = 16;

#[derive(Debug, Clone, Copy)]
struct PendingCopy {
    stage_offset: u64,
    size: u64,
    heap_offset: u64,
}

struct StageInner {
    device: Arc<Device>,
    buffer: Buffer,
    ring: RingCursor,
    pending: Vec<PendingCopy>,
    target: vk::Buffer,
    fence: Option<vk::Fence>,
}

impl StageInner {
    fn stage_bytes(&mut self, data: &[u8]) -> Result<RingSlot> {
        let slot = self
            .ring
            .allocate(data.len() as u64)
            .ok_or(Error::NotEnoughSpace)?;
        if slot.wrapped {
            warn!(
                "Staging ring wrapped, epoch is now {}. Older stage offsets are stale.",
                slot.epoch
            );
        }
        let mapping = self.buffer.map()?;
        unsafe {
            copy_nonoverlapping(
                data.as_ptr(),
                mapping.as_ptr().add(slot.offset as usize),
                data.len(),
            )
        };

        Ok(slot)
    }

    fn queue_upload(&mut self, data: &[u8], heap_offset: u64) -> Result<RingSlot> {
        let slot = self.stage_bytes(data)?;
        self.pending.push(PendingCopy {
            stage_offset: slot.offset,
            size: data.len() as u64,
            heap_offset,
        });

        Ok(slot)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let mapping = self.buffer.map()?;
        unsafe {
            copy_nonoverlapping(
                data.as_ptr(),
                mapping.as_ptr().add(offset as usize),
                data.len(),
            )
        };

        Ok(())
    }

    fn record_copies(&mut self, device: &Device, cb: vk::CommandBuffer) {
        if self.pending.is_empty() {
            return;
        }
        let regions = self
            .pending
            .iter()
            .map(|copy| vk::BufferCopy {
                src_offset: copy.stage_offset,
                dst_offset: copy.heap_offset,
                size: copy.size,
            })
            .collect::<Vec<_>>();
        unsafe {
            device
                .get()
                .cmd_copy_buffer(cb, self.buffer.raw(), self.target, &regions)
        };
        self.pending.clear();
        self.ring.reset();
    }

    fn record_image_copies(
        &mut self,
        device: &Device,
        cb: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            device
                .get()
                .cmd_copy_buffer_to_image(cb, self.buffer.raw(), image, layout, regions)
        };
    }
}

/// Host-visible ring buffer feeding the heap (or images). Persistently
/// mapped once first touched; the mutex keeps the mapping safe for future
/// worker upload threads.
pub struct Stage {
    inner: Mutex<StageInner>,
}

impl Stage {
    pub fn new(device: &Arc<Device>, size: usize, target: vk::Buffer) -> Result<Self> {
        let buffer = Buffer::new(
            device,
            BufferCreateDesc::upload(size, vk::BufferUsageFlags::TRANSFER_SRC)
                .dedicated(true)
                .name("Staging ring"),
        )?;

        Ok(Self {
            inner: Mutex::new(StageInner {
                device: device.clone(),
                buffer,
                ring: RingCursor::new(size as u64, STAGE_ALIGNMENT),
                pending: Vec::with_capacity(32),
                target,
                fence: None,
            }),
        })
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.inner.lock().buffer.raw()
    }

    pub fn capacity(&self) -> u64 {
        self.inner.lock().ring.capacity()
    }

    /// Current ring generation. Bumped by every wrap and every staging
    /// pass execution; offsets from older epochs are stale.
    pub fn epoch(&self) -> u64 {
        self.inner.lock().ring.epoch()
    }

    pub fn pending_uploads(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Copies `data` into the ring and queues a stage->heap copy for the
    /// next staging pass.
    pub fn queue_upload(&self, data: &[u8], heap_offset: u64) -> Result<RingSlot> {
        self.inner.lock().queue_upload(data, heap_offset)
    }

    /// Copies `data` into the ring without queueing a heap copy. Image
    /// uploads reference the returned offset from their copy regions.
    pub fn stage_bytes(&self, data: &[u8]) -> Result<RingSlot> {
        self.inner.lock().stage_bytes(data)
    }

    /// Write-through into already staged bytes. Only valid while the epoch
    /// the offset was handed out under is still current.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.inner.lock().write_at(offset, data)
    }

    /// Host-side flush. The mapping is host-coherent so there is no cache
    /// maintenance to do; the fence, when given, is remembered so teardown
    /// can wait for uploads still in flight.
    pub fn flush(&self, fence: Option<vk::Fence>) {
        self.inner.lock().fence = fence;
    }

    /// The pass that moves every pending upload into the heap, then
    /// recycles the ring.
    pub fn create_staging_pass(self: &Arc<Self>, name: &str, stage: ResId, heap: ResId) -> Pass {
        let this = self.clone();
        Pass::command(name)
            .read(ResourceUsage::read(stage, ResourceState::transfer_src()))
            .write(ResourceUsage::write(heap, ResourceState::transfer_dst()))
            .execute(move |ctx| {
                puffin::profile_scope!("staging upload");
                this.inner.lock().record_copies(ctx.device, ctx.cb);
                Ok(())
            })
    }

    /// Same as the staging pass, for image destinations.
    pub fn create_image_copy_pass(
        self: &Arc<Self>,
        name: &str,
        stage: ResId,
        dst: ResId,
        dst_image: vk::Image,
        regions: Vec<vk::BufferImageCopy>,
        dst_layout: vk::ImageLayout,
    ) -> Pass {
        let this = self.clone();
        Pass::command(name)
            .read(ResourceUsage::read(stage, ResourceState::transfer_src()))
            .write(ResourceUsage::write(
                dst,
                ResourceState::transfer_dst().layout(dst_layout),
            ))
            .execute(move |ctx| {
                this.inner
                    .lock()
                    .record_image_copies(ctx.device, ctx.cb, dst_image, dst_layout, &regions);
                Ok(())
            })
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(fence) = inner.fence.take() {
            let _ = unsafe {
                inner
                    .device
                    .get()
                    .wait_for_fences(slice::from_ref(&fence), true, u64::MAX)
            };
        }
    }
}
