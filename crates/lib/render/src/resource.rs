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
use onyx_backend::Device;
use onyx_common::Region;
use smol_str::SmolStr;

use crate::Result;

/// Index of a resource registered with a graph. The graph owns the storage,
/// passes and user code keep indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResId(pub(crate) u32);

impl ResId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuHandle {
    Buffer(vk::Buffer),
    Image(vk::Image),
}

impl GpuHandle {
    pub fn kind(&self) -> ResourceKind {
        match self {
            GpuHandle::Buffer(_) => ResourceKind::Buffer,
            GpuHandle::Image(_) => ResourceKind::Image,
        }
    }
}

/// Access/stage/layout/queue-family tuple a usage requires, and what the
/// graph tracks per GPU handle between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceState {
    pub access: vk::AccessFlags2,
    pub stages: vk::PipelineStageFlags2,
    pub layout: vk::ImageLayout,
    pub queue_family: u32,
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl ResourceState {
    pub const UNDEFINED: Self = Self {
        access: vk::AccessFlags2::NONE,
        stages: vk::PipelineStageFlags2::NONE,
        layout: vk::ImageLayout::UNDEFINED,
        queue_family: vk::QUEUE_FAMILY_IGNORED,
    };

    pub fn new(stages: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self {
            access,
            stages,
            layout: vk::ImageLayout::UNDEFINED,
            queue_family: vk::QUEUE_FAMILY_IGNORED,
        }
    }

    pub fn layout(mut self, layout: vk::ImageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn queue_family(mut self, index: u32) -> Self {
        self.queue_family = index;
        self
    }

    pub fn transfer_src() -> Self {
        Self::new(
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_READ,
        )
    }

    pub fn transfer_dst() -> Self {
        Self::new(
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        )
    }

    pub fn color_attachment() -> Self {
        Self::new(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        )
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
    }

    pub fn present() -> Self {
        Self::new(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::MEMORY_READ,
        )
        .layout(vk::ImageLayout::PRESENT_SRC_KHR)
    }

    pub fn compute_read() -> Self {
        Self::new(
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_READ,
        )
    }

    pub fn compute_write() -> Self {
        Self::new(
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_WRITE,
        )
    }

    pub fn shader_read(stages: vk::PipelineStageFlags2) -> Self {
        Self::new(stages, vk::AccessFlags2::SHADER_READ)
    }
}

/// Named handle over a buffer or an image. The GPU handle may be bound
/// later than registration (the swapchain image is only known after
/// acquire), so it is optional.
pub struct Resource {
    name: SmolStr,
    kind: ResourceKind,
    handle: Option<GpuHandle>,
    view: Option<vk::ImageView>,
    aspect: vk::ImageAspectFlags,
    pub(crate) first_use_in_pass: bool,
    pub(crate) first_use_in_frame: bool,
}

impl Resource {
    pub fn buffer(name: &str) -> Self {
        Self {
            name: name.into(),
            kind: ResourceKind::Buffer,
            handle: None,
            view: None,
            aspect: vk::ImageAspectFlags::COLOR,
            first_use_in_pass: false,
            first_use_in_frame: false,
        }
    }

    pub fn image(name: &str) -> Self {
        Self {
            kind: ResourceKind::Image,
            ..Self::buffer(name)
        }
    }

    pub fn buffer_with(name: &str, buffer: vk::Buffer) -> Self {
        let mut resource = Self::buffer(name);
        resource.handle = Some(GpuHandle::Buffer(buffer));
        resource
    }

    pub fn image_with(name: &str, image: vk::Image) -> Self {
        let mut resource = Self::image(name);
        resource.handle = Some(GpuHandle::Image(image));
        resource
    }

    pub fn aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn handle(&self) -> Option<GpuHandle> {
        self.handle
    }

    pub fn image_aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    pub fn bind_buffer(&mut self, buffer: vk::Buffer) {
        debug_assert_eq!(ResourceKind::Buffer, self.kind);
        self.handle = Some(GpuHandle::Buffer(buffer));
    }

    pub fn bind_image(&mut self, image: vk::Image) {
        debug_assert_eq!(ResourceKind::Image, self.kind);
        self.handle = Some(GpuHandle::Image(image));
        self.view = None;
    }

    pub fn view(&self) -> Option<vk::ImageView> {
        self.view
    }

    pub fn set_view(&mut self, view: vk::ImageView) {
        self.view = Some(view);
    }

    /// Creates a 2D view over the bound image. The old view, if any, is
    /// the caller's to destroy once the GPU is done with it.
    pub fn create_view(&mut self, device: &Device, format: vk::Format) -> Result<vk::ImageView> {
        let image = match self.handle {
            Some(GpuHandle::Image(image)) => image,
            _ => return Err(crate::Error::InvalidHandle),
        };
        let info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
            .build();
        let view = unsafe { device.get().create_image_view(&info, None) }
            .map_err(onyx_backend::Error::from)?;
        self.view = Some(view);

        Ok(view)
    }
}

/// One declared use of a resource by a pass.
#[derive(Debug, Clone, Copy)]
pub struct ResourceUsage {
    pub resource: ResId,
    pub state: ResourceState,
    pub is_write: bool,
    pub region: Option<Region>,
}

impl ResourceUsage {
    pub fn read(resource: ResId, state: ResourceState) -> Self {
        Self {
            resource,
            state,
            is_write: false,
            region: None,
        }
    }

    pub fn write(resource: ResId, state: ResourceState) -> Self {
        Self {
            resource,
            state,
            is_write: true,
            region: None,
        }
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}
