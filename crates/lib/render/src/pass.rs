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

use ash::vk;
use onyx_backend::{Device, Swapchain};
use smol_str::SmolStr;

use crate::{Error, ResId, ResourceState, ResourceUsage, Result};

/// Command passes record into the frame's command buffer. Non-command
/// passes run after `end_command_buffer`, in registration order; submit
/// and present are the two well-known ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Command,
    NonCommand,
}

/// Everything a pass can touch while executing.
pub struct PassContext<'a> {
    pub device: &'a Device,
    pub swapchain: &'a Swapchain,
    pub cb: vk::CommandBuffer,
    pub queue: vk::Queue,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
    pub image_index: u32,
    /// View over the acquired swapchain image.
    pub swapchain_view: vk::ImageView,
    pub render_area: vk::Rect2D,
    pub frame_index: usize,
    pub frame_count: u64,
    pub heap_address: u64,
}

type ExecuteFn = Box<dyn FnMut(&mut PassContext) -> Result<()>>;

pub struct Pass {
    pub(crate) name: SmolStr,
    pub(crate) kind: PassKind,
    pub(crate) inputs: Vec<ResourceUsage>,
    pub(crate) outputs: Vec<ResourceUsage>,
    pub(crate) execute: ExecuteFn,
}

impl Pass {
    pub fn command(name: &str) -> Self {
        Self {
            name: name.into(),
            kind: PassKind::Command,
            inputs: Vec::new(),
            outputs: Vec::new(),
            execute: Box::new(|_| Ok(())),
        }
    }

    pub fn non_command(name: &str) -> Self {
        Self {
            kind: PassKind::NonCommand,
            ..Self::command(name)
        }
    }

    pub fn read(mut self, usage: ResourceUsage) -> Self {
        debug_assert!(!usage.is_write);
        self.inputs.push(usage);
        self
    }

    pub fn write(mut self, usage: ResourceUsage) -> Self {
        debug_assert!(usage.is_write);
        self.outputs.push(usage);
        self
    }

    pub fn execute<F: FnMut(&mut PassContext) -> Result<()> + 'static>(mut self, f: F) -> Self {
        self.execute = Box::new(f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Submits the frame's command buffer: waits for the acquired image at
    /// color-attachment output, signals rendering completion and arms the
    /// frame's fence.
    pub fn submit() -> Self {
        Self::non_command("submit").execute(|ctx| {
            ctx.device
                .submit(
                    ctx.cb,
                    (
                        ctx.image_available,
                        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    ),
                    ctx.render_finished,
                    ctx.in_flight,
                )
                .map_err(Error::from)
        })
    }

    /// Presents the acquired image once rendering is finished. Declares the
    /// swapchain image in present layout so the graph records the final
    /// transition.
    pub fn present(swapchain_image: ResId) -> Self {
        Self::non_command("present")
            .read(ResourceUsage::read(swapchain_image, ResourceState::present()))
            .execute(|ctx| {
                match ctx
                    .swapchain
                    .present(ctx.queue, ctx.render_finished, ctx.image_index)
                {
                    Ok(false) => Ok(()),
                    Ok(true) => Err(Error::RecreateSwapchain),
                    Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                        Err(Error::RecreateSwapchain)
                    }
                    Err(err) => Err(err.into()),
                }
            })
    }
}
