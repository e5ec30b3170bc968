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

use std::{collections::HashSet, ffi::CStr, fmt::Debug, os::raw::c_char};

use ash::vk;

use crate::{Instance, Result, Surface};

#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
}

impl QueueFamily {
    pub fn is_supported(&self, flags: vk::QueueFlags) -> bool {
        self.properties.queue_flags.contains(flags)
    }
}

#[derive(Clone)]
pub struct PhysicalDevice {
    pub(crate) raw: vk::PhysicalDevice,
    queue_families: Vec<QueueFamily>,
    properties: vk::PhysicalDeviceProperties,
    supported_extensions: HashSet<String>,
}

impl PhysicalDevice {
    pub(crate) fn is_queue_flag_supported(&self, flags: vk::QueueFlags) -> bool {
        self.queue_families
            .iter()
            .any(|queue_family| queue_family.is_supported(flags))
    }

    pub(crate) fn find_queue(&self, flags: vk::QueueFlags) -> Option<QueueFamily> {
        self.queue_families
            .iter()
            .filter(|x| x.is_supported(flags))
            .copied()
            .next()
    }

    pub fn is_extension_supported(&self, ext: &str) -> bool {
        self.supported_extensions.contains(ext)
    }

    pub fn get(&self) -> vk::PhysicalDevice {
        self.raw
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    fn is_presentation_supported(&self, surface: &Surface, queue_index: u32) -> bool {
        unsafe {
            surface.loader.get_physical_device_surface_support(
                self.raw,
                queue_index,
                surface.raw,
            )
        }
        .unwrap_or(false)
    }
}

impl Debug for PhysicalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PhysicalDevice ( {:#?} )", self.properties)
    }
}

pub trait PhysicalDeviceList {
    fn find_suitable_device(
        self,
        surface: &Surface,
        preference: &[vk::PhysicalDeviceType],
    ) -> Option<PhysicalDevice>;
}

impl PhysicalDeviceList for Vec<PhysicalDevice> {
    fn find_suitable_device(
        self,
        surface: &Surface,
        preference: &[vk::PhysicalDeviceType],
    ) -> Option<PhysicalDevice> {
        for ty in preference {
            let found = self.iter().find(|pdevice| {
                if pdevice.properties.device_type != *ty {
                    return false;
                }
                match pdevice.find_queue(
                    vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                ) {
                    Some(queue) => pdevice.is_presentation_supported(surface, queue.index),
                    None => false,
                }
            });
            if let Some(found) = found {
                return Some(found.clone());
            }
        }

        None
    }
}

impl Instance {
    pub fn enumerate_physical_devices(&self) -> Result<Vec<PhysicalDevice>> {
        unsafe {
            Ok(self
                .get()
                .enumerate_physical_devices()?
                .into_iter()
                .map(|pdevice| {
                    let properties = self.get().get_physical_device_properties(pdevice);
                    let queue_families = self
                        .get()
                        .get_physical_device_queue_family_properties(pdevice)
                        .into_iter()
                        .enumerate()
                        .map(|(index, properties)| QueueFamily {
                            index: index as _,
                            properties,
                        })
                        .collect();

                    let extension_properties = self
                        .get()
                        .enumerate_device_extension_properties(pdevice)
                        .unwrap_or_default();
                    let supported_extensions = extension_properties
                        .iter()
                        .map(|ext| {
                            CStr::from_ptr(ext.extension_name.as_ptr() as *const c_char)
                                .to_string_lossy()
                                .as_ref()
                                .to_owned()
                        })
                        .collect();

                    PhysicalDevice {
                        raw: pdevice,
                        queue_families,
                        properties,
                        supported_extensions,
                    }
                })
                .collect())
        }
    }
}
