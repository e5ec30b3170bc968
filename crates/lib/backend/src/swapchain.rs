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

use ash::{extensions::khr, vk};
use log::info;

use crate::{Device, Error, PhysicalDevice, Result, Surface};

const DESIRED_IMAGES_COUNT: u32 = 3;

pub struct Swapchain {
    pub(crate) raw: vk::SwapchainKHR,
    pub(crate) loader: khr::Swapchain,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    dims: [u32; 2],
}

impl Swapchain {
    pub fn new(device: &Device, surface: &Surface, resolution: [u32; 2]) -> Result<Self> {
        let loader = khr::Swapchain::new(&device.instance.raw, &device.raw);
        let (raw, images, format, dims) = Self::create(
            device,
            &loader,
            surface,
            resolution,
            vk::SwapchainKHR::null(),
        )?;
        Ok(Self {
            raw,
            loader,
            images,
            format,
            dims,
        })
    }

    /// Builds a new swapchain chained to the old one, then destroys the old.
    pub fn recreate(
        &mut self,
        device: &Device,
        surface: &Surface,
        resolution: [u32; 2],
    ) -> Result<()> {
        device.wait_idle();
        let (raw, images, format, dims) =
            Self::create(device, &self.loader, surface, resolution, self.raw)?;
        unsafe { self.loader.destroy_swapchain(self.raw, None) };
        self.raw = raw;
        self.images = images;
        self.format = format;
        self.dims = dims;

        Ok(())
    }

    fn create(
        device: &Device,
        loader: &khr::Swapchain,
        surface: &Surface,
        resolution: [u32; 2],
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<(vk::SwapchainKHR, Vec<vk::Image>, vk::SurfaceFormatKHR, [u32; 2])> {
        info!(
            "Create swapchain for resolution {} x {}",
            resolution[0], resolution[1]
        );
        let surface_capabilities = unsafe {
            surface
                .loader
                .get_physical_device_surface_capabilities(device.pdevice.raw, surface.raw)
        }?;

        let formats = Self::enumerate_surface_formats(&device.pdevice, surface)?;
        let format = match Self::select_surface_format(&formats) {
            Some(format) => format,
            None => return Err(Error::NotSupported),
        };

        let mut desired_image_count =
            DESIRED_IMAGES_COUNT.max(surface_capabilities.min_image_count);
        if surface_capabilities.max_image_count != 0 {
            desired_image_count = desired_image_count.min(surface_capabilities.max_image_count);
        }

        info!("Swapchain image count {}", desired_image_count);

        let surface_resolution = match surface_capabilities.current_extent.width {
            u32::MAX => vk::Extent2D {
                width: resolution[0],
                height: resolution[1],
            },
            _ => surface_capabilities.current_extent,
        };

        if surface_resolution.width == 0 || surface_resolution.height == 0 {
            return Err(Error::NotSupported);
        }

        let present_mode_preferences = [vk::PresentModeKHR::FIFO_RELAXED, vk::PresentModeKHR::FIFO];

        let present_modes = unsafe {
            surface
                .loader
                .get_physical_device_surface_present_modes(device.pdevice.raw, surface.raw)
        }?;

        info!("Swapchain format: {:?}", format.format);

        let present_mode = present_mode_preferences
            .into_iter()
            .find(|mode| present_modes.contains(mode))
            .unwrap_or(vk::PresentModeKHR::FIFO);

        info!("Presentation mode: {:?}", present_mode);

        let pre_transform = if surface_capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            surface_capabilities.current_transform
        };

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.raw)
            .min_image_count(desired_image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(surface_resolution)
            .image_usage(
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            )
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .image_array_layers(1)
            .old_swapchain(old_swapchain)
            .build();

        let swapchain = unsafe { loader.create_swapchain(&swapchain_create_info, None) }?;
        let images = unsafe { loader.get_swapchain_images(swapchain) }?;

        Ok((
            swapchain,
            images,
            format,
            [surface_resolution.width, surface_resolution.height],
        ))
    }

    pub(crate) fn acquire(
        &self,
        semaphore: vk::Semaphore,
    ) -> std::result::Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.raw, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Queues the image for presentation. `Ok(true)` means suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        wait: vk::Semaphore,
        image_index: u32,
    ) -> std::result::Result<bool, vk::Result> {
        puffin::profile_function!();
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(std::slice::from_ref(&wait))
            .swapchains(std::slice::from_ref(&self.raw))
            .image_indices(std::slice::from_ref(&image_index))
            .build();

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    pub fn get(&self) -> vk::SwapchainKHR {
        self.raw
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn dims(&self) -> [u32; 2] {
        self.dims
    }

    fn enumerate_surface_formats(
        pdevice: &PhysicalDevice,
        surface: &Surface,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe {
            surface
                .loader
                .get_physical_device_surface_formats(pdevice.raw, surface.raw)
        }?)
    }

    fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
        let prefered = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        prefered.into_iter().find(|format| formats.contains(format))
    }

    pub fn destroy(&mut self, device: &Device) {
        device.wait_idle();
        unsafe { self.loader.destroy_swapchain(self.raw, None) };
        self.raw = vk::SwapchainKHR::null();
    }
}
