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

use std::{slice, sync::Arc};

use arrayvec::ArrayVec;
use ash::vk;
use log::info;

use crate::{Device, Result, Surface, Swapchain};

pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Per-frame synchronization set. One command buffer and one fence per
/// frame slot, semaphores connecting acquire -> submit -> present.
pub struct FrameSync {
    pub pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    fn new(device: &Device, index: usize) -> Result<Self> {
        unsafe {
            let pool = device.raw.create_command_pool(
                &vk::CommandPoolCreateInfo::builder()
                    .queue_family_index(device.queue_family_index())
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                    .build(),
                None,
            )?;
            let command_buffer = device.raw.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::builder()
                    .command_buffer_count(1)
                    .command_pool(pool)
                    .level(vk::CommandBufferLevel::PRIMARY),
            )?[0];
            let image_available = device
                .raw
                .create_semaphore(&vk::SemaphoreCreateInfo::builder(), None)?;
            let render_finished = device
                .raw
                .create_semaphore(&vk::SemaphoreCreateInfo::builder(), None)?;
            let in_flight = device.raw.create_fence(
                &vk::FenceCreateInfo::builder()
                    .flags(vk::FenceCreateFlags::SIGNALED)
                    .build(),
                None,
            )?;
            device.set_object_name(image_available, &format!("Acquire {index}"));
            device.set_object_name(render_finished, &format!("Finished {index}"));
            device.set_object_name(in_flight, &format!("In flight {index}"));

            Ok(Self {
                pool,
                command_buffer,
                image_available,
                render_finished,
                in_flight,
            })
        }
    }

    fn free(&self, device: &Device) {
        unsafe {
            device.raw.destroy_fence(self.in_flight, None);
            device.raw.destroy_semaphore(self.image_available, None);
            device.raw.destroy_semaphore(self.render_finished, None);
            device.raw.destroy_command_pool(self.pool, None);
        }
    }
}

pub enum Acquired {
    Image(u32),
    NotReady,
    OutOfDate,
}

/// Everything the render core needs from the platform: device, swapchain
/// and the per-frame synchronization objects.
pub struct Context {
    device: Arc<Device>,
    surface: Surface,
    swapchain: Swapchain,
    frames: ArrayVec<FrameSync, MAX_FRAMES_IN_FLIGHT>,
    images_in_flight: Vec<vk::Fence>,
}

impl Context {
    pub fn new(device: &Arc<Device>, surface: Surface, resolution: [u32; 2]) -> Result<Self> {
        let swapchain = Swapchain::new(device, &surface, resolution)?;
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|index| FrameSync::new(device, index))
            .collect::<Result<ArrayVec<_, MAX_FRAMES_IN_FLIGHT>>>()?;
        let images_in_flight = vec![vk::Fence::null(); swapchain.images().len()];

        Ok(Self {
            device: device.clone(),
            surface,
            swapchain,
            frames,
            images_in_flight,
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn frame(&self, index: usize) -> &FrameSync {
        &self.frames[index]
    }

    /// Waits for the frame slot's fence, acquires the next swapchain image
    /// and, if another in-flight frame still claims that image, waits for
    /// that frame's fence too. The slot fence is left unsignaled so the
    /// frame's submit can re-arm it.
    pub fn acquire_next_image(&mut self, frame_index: usize) -> Result<Acquired> {
        puffin::profile_function!();
        let frame = &self.frames[frame_index];
        unsafe {
            self.device
                .raw
                .wait_for_fences(slice::from_ref(&frame.in_flight), true, u64::MAX)
        }?;

        let image_index = match self.swapchain.acquire(frame.image_available) {
            Ok((image_index, _suboptimal)) => image_index,
            Err(vk::Result::NOT_READY) | Err(vk::Result::TIMEOUT) => {
                return Ok(Acquired::NotReady)
            }
            Err(vk::Result::SUBOPTIMAL_KHR) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                return Ok(Acquired::OutOfDate)
            }
            Err(err) => return Err(err.into()),
        };

        // The driver may hand images back out of order. If this image still
        // belongs to another in-flight frame, wait for that frame first.
        let claimed = self.images_in_flight[image_index as usize];
        if claimed != vk::Fence::null() && claimed != frame.in_flight {
            unsafe {
                self.device
                    .raw
                    .wait_for_fences(slice::from_ref(&claimed), true, u64::MAX)
            }?;
        }
        self.images_in_flight[image_index as usize] = frame.in_flight;

        unsafe {
            self.device
                .raw
                .reset_fences(slice::from_ref(&frame.in_flight))
        }?;

        Ok(Acquired::Image(image_index))
    }

    pub fn recreate_swapchain(&mut self, resolution: [u32; 2]) -> Result<()> {
        info!("Recreating swapchain");
        self.swapchain
            .recreate(&self.device, &self.surface, resolution)?;
        self.images_in_flight = vec![vk::Fence::null(); self.swapchain.images().len()];

        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.device.wait_idle();
        for frame in &self.frames {
            frame.free(&self.device);
        }
        self.swapchain.destroy(&self.device);
    }
}
