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

use std::{
    borrow::Cow,
    ffi::{CStr, CString},
};

use ash::{extensions::ext::DebugUtils, vk};
use log::{debug, error, info, warn};
use raw_window_handle::RawDisplayHandle;

use crate::Result;

#[derive(Debug, Default)]
pub struct InstanceBuilder {
    pub debug: bool,
}

impl InstanceBuilder {
    pub fn debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }
}

pub struct Instance {
    pub(crate) entry: ash::Entry,
    pub(crate) raw: ash::Instance,
    debug_utils: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

unsafe extern "system" fn vulkan_debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ty: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = if callback_data.p_message.is_null() {
        Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("{:?}: {}", ty, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("{:?}: {}", ty, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("{:?}: {}", ty, message),
        _ => debug!("{:?}: {}", ty, message),
    }

    vk::FALSE
}

impl Instance {
    pub fn vulkan_version() -> u32 {
        vk::API_VERSION_1_3
    }

    pub fn new(builder: InstanceBuilder, display_handle: RawDisplayHandle) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }?;
        let app_name = CString::new("onyx").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .engine_name(&app_name)
            .api_version(Self::vulkan_version())
            .build();

        let mut extensions = ash_window::enumerate_required_extensions(display_handle)?.to_vec();
        if builder.debug {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let validation_layer = CString::new("VK_LAYER_KHRONOS_validation").unwrap();
        let layers = if builder.debug {
            vec![validation_layer.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers)
            .build();

        let instance = unsafe { entry.create_instance(&create_info, None) }?;
        info!("Created vulkan instance, API version 1.3");

        let (debug_utils, debug_messenger) = if builder.debug {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(vulkan_debug_callback))
                .build();
            let messenger = unsafe {
                debug_utils.create_debug_utils_messenger(&messenger_info, None)
            }?;
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            raw: instance,
            debug_utils,
            debug_messenger,
        })
    }

    pub fn get(&self) -> &ash::Instance {
        &self.raw
    }

    pub(crate) fn get_debug_utils(&self) -> Option<&DebugUtils> {
        self.debug_utils.as_ref()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger) {
            unsafe { debug_utils.destroy_debug_utils_messenger(messenger, None) };
        }
        unsafe { self.raw.destroy_instance(None) };
    }
}
