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

use std::{collections::HashMap, sync::Arc};

use ash::vk;
use gpu_alloc::UsageFlags;
use parking_lot::Mutex;

use crate::{Device, GpuMemory, Result};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ImageType {
    Tex2D,
    Tex2DArray,
    Tex3D,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ImageDesc {
    pub ty: ImageType,
    pub usage: vk::ImageUsageFlags,
    pub format: vk::Format,
    pub extent: [u32; 3],
    pub tiling: vk::ImageTiling,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl ImageDesc {
    pub fn new(format: vk::Format, ty: ImageType, extent: [u32; 3]) -> Self {
        Self {
            ty,
            usage: vk::ImageUsageFlags::default(),
            format,
            extent,
            tiling: vk::ImageTiling::OPTIMAL,
            mip_levels: 1,
            array_layers: 1,
        }
    }

    pub fn usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    pub fn tiling(mut self, tiling: vk::ImageTiling) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        self
    }

    fn build(&self) -> vk::ImageCreateInfo {
        let (image_type, extent, array_layers) = match self.ty {
            ImageType::Tex2D => (
                vk::ImageType::TYPE_2D,
                vk::Extent3D {
                    width: self.extent[0],
                    height: self.extent[1],
                    depth: 1,
                },
                1,
            ),
            ImageType::Tex2DArray => (
                vk::ImageType::TYPE_2D,
                vk::Extent3D {
                    width: self.extent[0],
                    height: self.extent[1],
                    depth: 1,
                },
                self.array_layers,
            ),
            ImageType::Tex3D => (
                vk::ImageType::TYPE_3D,
                vk::Extent3D {
                    width: self.extent[0],
                    height: self.extent[1],
                    depth: self.extent[2],
                },
                1,
            ),
        };

        vk::ImageCreateInfo::builder()
            .image_type(image_type)
            .format(self.format)
            .extent(extent)
            .mip_levels(self.mip_levels)
            .array_layers(array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(self.tiling)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .build()
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ImageViewDesc {
    pub view_type: Option<vk::ImageViewType>,
    pub format: Option<vk::Format>,
    pub aspect_mask: vk::ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: Option<u32>,
}

impl Default for ImageViewDesc {
    fn default() -> Self {
        Self {
            view_type: None,
            format: None,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: None,
        }
    }
}

impl ImageViewDesc {
    pub fn view_type(mut self, view_type: vk::ImageViewType) -> Self {
        self.view_type = Some(view_type);
        self
    }

    pub fn format(mut self, format: vk::Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn aspect_mask(mut self, aspect_mask: vk::ImageAspectFlags) -> Self {
        self.aspect_mask = aspect_mask;
        self
    }

    pub fn base_mip_level(mut self, base_mip_level: u32) -> Self {
        self.base_mip_level = base_mip_level;
        self
    }

    pub fn level_count(mut self, level_count: u32) -> Self {
        self.level_count = Some(level_count);
        self
    }

    fn build(&self, image: &Image) -> vk::ImageViewCreateInfo {
        vk::ImageViewCreateInfo::builder()
            .image(image.raw)
            .format(self.format.unwrap_or(image.desc.format))
            .view_type(self.view_type.unwrap_or(match image.desc.ty {
                ImageType::Tex2D => vk::ImageViewType::TYPE_2D,
                ImageType::Tex2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
                ImageType::Tex3D => vk::ImageViewType::TYPE_3D,
            }))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect_mask,
                base_mip_level: self.base_mip_level,
                level_count: self.level_count.unwrap_or(image.desc.mip_levels),
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
            .build()
    }
}

/// Image plus its memory and all views created over it. Also wraps
/// externally owned images (swapchain) without taking their memory.
#[derive(Debug)]
pub struct Image {
    device: Arc<Device>,
    raw: vk::Image,
    desc: ImageDesc,
    memory: Option<GpuMemory>,
    views: Mutex<HashMap<ImageViewDesc, vk::ImageView>>,
}

unsafe impl Send for Image {}

impl Image {
    pub fn new(device: &Arc<Device>, desc: ImageDesc) -> Result<Self> {
        let image = unsafe { device.get().create_image(&desc.build(), None) }?;
        let requirements = unsafe { device.get().get_image_memory_requirements(image) };
        let memory = device.allocate(requirements, UsageFlags::FAST_DEVICE_ACCESS, false)?;
        unsafe {
            device
                .get()
                .bind_image_memory(image, *memory.memory(), memory.offset())
        }?;

        Ok(Self {
            device: device.clone(),
            raw: image,
            desc,
            memory: Some(memory),
            views: Mutex::default(),
        })
    }

    pub fn external(device: &Arc<Device>, image: vk::Image, desc: ImageDesc) -> Self {
        Self {
            device: device.clone(),
            raw: image,
            desc,
            memory: None,
            views: Mutex::default(),
        }
    }

    pub fn raw(&self) -> vk::Image {
        self.raw
    }

    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    pub fn name(&self, name: &str) {
        self.device.set_object_name(self.raw, name);
    }

    pub fn get_or_create_view(&self, desc: ImageViewDesc) -> Result<vk::ImageView> {
        let mut views = self.views.lock();
        if let Some(view) = views.get(&desc) {
            return Ok(*view);
        }
        let view = unsafe {
            self.device
                .get()
                .create_image_view(&desc.build(self), None)
        }?;
        views.insert(desc, view);

        Ok(view)
    }

    pub fn subresource_layers(
        &self,
        layer: u32,
        mip: u32,
        aspect: vk::ImageAspectFlags,
    ) -> vk::ImageSubresourceLayers {
        vk::ImageSubresourceLayers::builder()
            .aspect_mask(aspect)
            .mip_level(mip)
            .base_array_layer(layer)
            .layer_count(1)
            .build()
    }

    pub fn clear_views(&self) {
        let mut views = self.views.lock();
        for (_, view) in views.drain() {
            unsafe { self.device.get().destroy_image_view(view, None) };
        }
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.device.wait_idle();
        self.clear_views();
        if let Some(memory) = self.memory.take() {
            unsafe { self.device.get().destroy_image(self.raw, None) };
            self.device.free_memory(memory);
        }
    }
}
