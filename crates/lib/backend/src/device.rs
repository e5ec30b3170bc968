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
    ffi::{CStr, CString},
    ptr::NonNull,
    slice,
    sync::Arc,
};

use ash::{extensions::khr, vk};
use gpu_alloc::{Dedicated, Request, UsageFlags};
use gpu_alloc_ash::{device_properties, AshMemoryDevice};
use log::info;
use parking_lot::Mutex;

use crate::{Error, GpuAllocator, GpuMemory, Instance, PhysicalDevice, Result};

pub struct Device {
    pub(crate) raw: ash::Device,
    pub(crate) pdevice: PhysicalDevice,
    pub(crate) instance: Instance,
    memory_allocator: Mutex<GpuAllocator>,
    queue: vk::Queue,
    queue_family_index: u32,
    use_sync2: bool,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("queue_family_index", &self.queue_family_index)
            .field("use_sync2", &self.use_sync2)
            .finish()
    }
}

impl Device {
    pub fn new(instance: Instance, pdevice: PhysicalDevice) -> Result<Arc<Self>> {
        if !pdevice.is_queue_flag_supported(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER | vk::QueueFlags::COMPUTE,
        ) {
            return Err(Error::NoSuitableDevice);
        };

        let device_extension_names = vec![
            khr::Swapchain::name().as_ptr(),
            vk::KhrDynamicRenderingFn::name().as_ptr(),
            vk::KhrSynchronization2Fn::name().as_ptr(),
            vk::KhrBufferDeviceAddressFn::name().as_ptr(),
        ];

        for ext in &device_extension_names {
            let ext = unsafe { CStr::from_ptr(*ext).to_str() }.unwrap();
            if !pdevice.is_extension_supported(ext) {
                return Err(Error::ExtensionNotFound(ext.into()));
            }
        }

        let universal_queue = pdevice
            .find_queue(
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER | vk::QueueFlags::COMPUTE,
            )
            .ok_or(Error::NoSuitableQueue)?;
        let queue_family_index = universal_queue.index;

        let mut dynamic_rendering = vk::PhysicalDeviceDynamicRenderingFeatures::default();
        let mut synchronization2 = vk::PhysicalDeviceSynchronization2Features::default();
        let mut buffer_device_address = vk::PhysicalDeviceBufferDeviceAddressFeatures::default();

        let mut features = vk::PhysicalDeviceFeatures2::builder()
            .push_next(&mut dynamic_rendering)
            .push_next(&mut synchronization2)
            .push_next(&mut buffer_device_address)
            .build();

        unsafe {
            instance
                .raw
                .get_physical_device_features2(pdevice.raw, &mut features)
        };

        if buffer_device_address.buffer_device_address == vk::FALSE {
            return Err(Error::NotSupported);
        }
        let use_sync2 = synchronization2.synchronization2 == vk::TRUE;

        let priorities = [1.0];
        let queue_info = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities)
            .build()];

        let device_create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_info)
            .enabled_extension_names(&device_extension_names)
            .push_next(&mut features)
            .build();

        let device = unsafe {
            instance
                .raw
                .create_device(pdevice.raw, &device_create_info, None)
        }?;

        info!(
            "Created device on {:?}, sync2: {}",
            unsafe { CStr::from_ptr(pdevice.properties().device_name.as_ptr()) },
            use_sync2
        );

        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let allocator_config = gpu_alloc::Config {
            dedicated_threshold: 64 * 1024 * 1024,
            preferred_dedicated_threshold: 16 * 1024 * 1024,
            transient_dedicated_threshold: 32 * 1024 * 1024,
            final_free_list_chunk: 1024 * 1024,
            minimal_buddy_size: 256,
            starting_free_list_chunk: 256 * 1024,
            initial_buddy_dedicated_size: 128 * 1024 * 1024,
        };
        let allocator_props =
            unsafe { device_properties(&instance.raw, Instance::vulkan_version(), pdevice.raw) }?;
        let memory_allocator = GpuAllocator::new(allocator_config, allocator_props);

        Ok(Arc::new(Self {
            raw: device,
            pdevice,
            instance,
            memory_allocator: Mutex::new(memory_allocator),
            queue,
            queue_family_index,
            use_sync2,
        }))
    }

    pub fn get(&self) -> &ash::Device {
        &self.raw
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.pdevice
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// True when the device records barriers through synchronization2.
    pub fn use_sync2(&self) -> bool {
        self.use_sync2
    }

    pub fn allocate(
        &self,
        requirements: vk::MemoryRequirements,
        usage: UsageFlags,
        dedicated: bool,
    ) -> Result<GpuMemory> {
        let request = Request {
            size: requirements.size,
            align_mask: requirements.alignment,
            usage,
            memory_types: requirements.memory_type_bits,
        };

        Ok(if dedicated {
            unsafe {
                self.memory_allocator.lock().alloc_with_dedicated(
                    AshMemoryDevice::wrap(&self.raw),
                    request,
                    Dedicated::Required,
                )
            }
        } else {
            unsafe {
                self.memory_allocator
                    .lock()
                    .alloc(AshMemoryDevice::wrap(&self.raw), request)
            }
        }?)
    }

    pub fn free_memory(&self, memory: GpuMemory) {
        unsafe {
            self.memory_allocator
                .lock()
                .dealloc(AshMemoryDevice::wrap(&self.raw), memory)
        };
    }

    pub fn map_memory(&self, memory: &mut GpuMemory, size: usize) -> Result<NonNull<u8>> {
        Ok(unsafe { memory.map(AshMemoryDevice::wrap(&self.raw), 0, size) }?)
    }

    pub fn unmap_memory(&self, memory: &mut GpuMemory) {
        unsafe { memory.unmap(AshMemoryDevice::wrap(&self.raw)) };
    }

    pub fn wait_idle(&self) {
        let _ = unsafe { self.raw.device_wait_idle() };
    }

    /// Submits one command buffer, waiting on `wait` at the given stage and
    /// signaling `signal` + `fence`. Records through synchronization2 when
    /// the device has it, the classical path otherwise.
    pub fn submit(
        &self,
        cb: vk::CommandBuffer,
        wait: (vk::Semaphore, vk::PipelineStageFlags2),
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        puffin::profile_function!();
        if self.use_sync2 {
            let command_buffers = vk::CommandBufferSubmitInfo::builder()
                .command_buffer(cb)
                .build();
            let wait = vk::SemaphoreSubmitInfo::builder()
                .semaphore(wait.0)
                .stage_mask(wait.1)
                .build();
            let signal = vk::SemaphoreSubmitInfo::builder().semaphore(signal).build();
            let info = vk::SubmitInfo2::builder()
                .command_buffer_infos(slice::from_ref(&command_buffers))
                .wait_semaphore_infos(slice::from_ref(&wait))
                .signal_semaphore_infos(slice::from_ref(&signal))
                .build();
            unsafe { self.raw.queue_submit2(self.queue, slice::from_ref(&info), fence) }?;
        } else {
            let wait_stage = vk::PipelineStageFlags::from_raw((wait.1.as_raw() & u32::MAX as u64) as u32);
            let info = vk::SubmitInfo::builder()
                .command_buffers(slice::from_ref(&cb))
                .wait_semaphores(slice::from_ref(&wait.0))
                .wait_dst_stage_mask(slice::from_ref(&wait_stage))
                .signal_semaphores(slice::from_ref(&signal))
                .build();
            unsafe { self.raw.queue_submit(self.queue, slice::from_ref(&info), fence) }?;
        }

        Ok(())
    }

    pub fn set_object_name<T: vk::Handle>(&self, object: T, name: &str) {
        if let Some(debug_utils) = self.instance.get_debug_utils() {
            let name = CString::new(name).unwrap();
            let name_info = vk::DebugUtilsObjectNameInfoEXT::builder()
                .object_type(T::TYPE)
                .object_handle(object.as_raw())
                .object_name(&name)
                .build();
            let _ = unsafe {
                debug_utils.set_debug_utils_object_name(self.raw.handle(), &name_info)
            };
        }
    }

    pub fn scoped_label(&self, cb: vk::CommandBuffer, label: &str) -> ScopedCommandBufferLabel {
        self.cmd_begin_label(cb, label);
        ScopedCommandBufferLabel { device: self, cb }
    }

    pub(crate) fn cmd_begin_label(&self, cb: vk::CommandBuffer, label: &str) {
        if let Some(debug_utils) = self.instance.get_debug_utils() {
            let label = CString::new(label).unwrap();
            let label = vk::DebugUtilsLabelEXT::builder().label_name(&label).build();
            unsafe { debug_utils.cmd_begin_debug_utils_label(cb, &label) }
        }
    }

    pub(crate) fn cmd_end_label(&self, cb: vk::CommandBuffer) {
        if let Some(debug_utils) = self.instance.get_debug_utils() {
            unsafe { debug_utils.cmd_end_debug_utils_label(cb) }
        }
    }
}

pub struct ScopedCommandBufferLabel<'a> {
    device: &'a Device,
    cb: vk::CommandBuffer,
}

impl<'a> Drop for ScopedCommandBufferLabel<'a> {
    fn drop(&mut self) {
        self.device.cmd_end_label(self.cb);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.raw.device_wait_idle() }.unwrap();
        unsafe {
            self.memory_allocator
                .lock()
                .cleanup(AshMemoryDevice::wrap(&self.raw));
            self.raw.destroy_device(None);
        }
    }
}
