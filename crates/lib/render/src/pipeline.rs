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
    collections::HashMap,
    ffi::CStr,
    path::PathBuf,
    slice,
    sync::Arc,
};

use arrayvec::ArrayVec;
use ash::vk;
use log::{error, info, warn};
use onyx_backend::Device;
use smol_str::SmolStr;

use crate::{
    pipeline_cache::{load_or_create_pipeline_cache, save_pipeline_cache},
    reload::{self, ShaderMonitor},
    Error, Result, ShaderCache, ShaderStage,
};

#[derive(Debug, Clone)]
pub struct ComputePipelineDesc {
    pub shader: PathBuf,
    pub push_constant_size: u32,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub phase: u32,
    pub local_size: Option<[u32; 3]>,
}

impl ComputePipelineDesc {
    pub fn new<P: Into<PathBuf>>(shader: P) -> Self {
        Self {
            shader: shader.into(),
            push_constant_size: 0,
            set_layouts: Vec::new(),
            phase: 0,
            local_size: None,
        }
    }

    pub fn push_constant_size(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }

    pub fn set_layouts(mut self, layouts: &[vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = layouts.to_vec();
        self
    }

    pub fn phase(mut self, phase: u32) -> Self {
        self.phase = phase;
        self
    }

    pub fn local_size(mut self, local_size: [u32; 3]) -> Self {
        self.local_size = Some(local_size);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub color_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    pub stencil_format: Option<vk::Format>,
    pub blend: bool,
    pub push_constant_size: u32,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
}

impl GraphicsPipelineDesc {
    pub fn new<P: Into<PathBuf>>(vertex_shader: P, fragment_shader: P) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            color_formats: Vec::new(),
            depth_format: None,
            stencil_format: None,
            blend: false,
            push_constant_size: 0,
            set_layouts: Vec::new(),
        }
    }

    pub fn color_formats(mut self, formats: &[vk::Format]) -> Self {
        self.color_formats = formats.to_vec();
        self
    }

    pub fn depth_format(mut self, format: vk::Format) -> Self {
        self.depth_format = Some(format);
        self
    }

    pub fn stencil_format(mut self, format: vk::Format) -> Self {
        self.stencil_format = Some(format);
        self
    }

    pub fn blend(mut self) -> Self {
        self.blend = true;
        self
    }

    pub fn push_constant_size(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }

    pub fn set_layouts(mut self, layouts: &[vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = layouts.to_vec();
        self
    }
}

#[derive(Debug)]
pub struct ComputePipeline {
    raw: vk::Pipeline,
    layout: vk::PipelineLayout,
    desc: ComputePipelineDesc,
}

#[derive(Debug)]
pub struct GraphicsPipeline {
    raw: vk::Pipeline,
    layout: vk::PipelineLayout,
    desc: GraphicsPipelineDesc,
}

/// Tagged pipeline record. Reloads swap the handles in place so callers
/// can hold on to a name (or the record itself) across shader edits.
#[derive(Debug)]
pub enum Pipeline {
    Compute(ComputePipeline),
    Graphics(GraphicsPipeline),
}

impl Pipeline {
    pub fn raw(&self) -> vk::Pipeline {
        match self {
            Pipeline::Compute(pipeline) => pipeline.raw,
            Pipeline::Graphics(pipeline) => pipeline.raw,
        }
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        match self {
            Pipeline::Compute(pipeline) => pipeline.layout,
            Pipeline::Graphics(pipeline) => pipeline.layout,
        }
    }

    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        match self {
            Pipeline::Compute(_) => vk::PipelineBindPoint::COMPUTE,
            Pipeline::Graphics(_) => vk::PipelineBindPoint::GRAPHICS,
        }
    }

    pub fn push_constant_size(&self) -> u32 {
        match self {
            Pipeline::Compute(pipeline) => pipeline.desc.push_constant_size,
            Pipeline::Graphics(pipeline) => pipeline.desc.push_constant_size,
        }
    }

    pub fn descriptor_set_layouts(&self) -> &[vk::DescriptorSetLayout] {
        match self {
            Pipeline::Compute(pipeline) => &pipeline.desc.set_layouts,
            Pipeline::Graphics(pipeline) => &pipeline.desc.set_layouts,
        }
    }
}

/// Specialization data layout shared by every compute kernel: constant 0
/// is the phase (4 bytes), constant 1 the optional local size (12 bytes
/// at offset 4).
fn specialization_layout(
    phase: u32,
    local_size: Option<[u32; 3]>,
) -> ([u8; 16], usize, ArrayVec<vk::SpecializationMapEntry, 2>) {
    let mut data = [0u8; 16];
    data[0..4].copy_from_slice(&phase.to_ne_bytes());
    let mut entries = ArrayVec::new();
    entries.push(vk::SpecializationMapEntry {
        constant_id: 0,
        offset: 0,
        size: 4,
    });
    let len = if let Some(local_size) = local_size {
        for (index, value) in local_size.iter().enumerate() {
            let at = 4 + index * 4;
            data[at..at + 4].copy_from_slice(&value.to_ne_bytes());
        }
        entries.push(vk::SpecializationMapEntry {
            constant_id: 1,
            offset: 4,
            size: 12,
        });
        16
    } else {
        4
    };

    (data, len, entries)
}

fn shader_entry() -> &'static CStr {
    // Entry point is always "main", shader edits can't rename it away.
    CStr::from_bytes_with_nul(b"main\0").unwrap()
}

/// Builds and caches compute and graphics pipelines by name, watches
/// their shader files and rebuilds in place when they change on disk.
pub struct PipelineCompiler {
    device: Arc<Device>,
    shaders: ShaderCache,
    pipelines: HashMap<SmolStr, Pipeline>,
    monitors: Vec<ShaderMonitor>,
    is_reloading: bool,
    cache: vk::PipelineCache,
    cache_path: Option<PathBuf>,
}

impl PipelineCompiler {
    pub fn new(device: &Arc<Device>) -> Result<Self> {
        Ok(Self {
            device: device.clone(),
            shaders: ShaderCache::new(device)?,
            pipelines: HashMap::new(),
            monitors: Vec::new(),
            is_reloading: false,
            cache: vk::PipelineCache::null(),
            cache_path: None,
        })
    }

    /// Same compiler, backed by a driver pipeline cache persisted at
    /// `path` across runs.
    pub fn with_disk_cache<P: Into<PathBuf>>(device: &Arc<Device>, path: P) -> Result<Self> {
        let path = path.into();
        let mut compiler = Self::new(device)?;
        compiler.cache = load_or_create_pipeline_cache(device, &path)?;
        compiler.cache_path = Some(path);

        Ok(compiler)
    }

    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    pub fn create_compute_pipeline(
        &mut self,
        name: &str,
        desc: ComputePipelineDesc,
    ) -> Result<()> {
        let (raw, layout) = Self::build_compute(&self.device, &mut self.shaders, self.cache, &desc)?;
        self.device.set_object_name(raw, name);
        self.monitors.retain(|monitor| monitor.pipeline != name);
        self.monitors.push(ShaderMonitor::new(&desc.shader, name));
        self.replace(name, Pipeline::Compute(ComputePipeline { raw, layout, desc }));

        Ok(())
    }

    pub fn create_graphics_pipeline(
        &mut self,
        name: &str,
        desc: GraphicsPipelineDesc,
    ) -> Result<()> {
        let (raw, layout) = Self::build_graphics(&self.device, &mut self.shaders, self.cache, &desc)?;
        self.device.set_object_name(raw, name);
        self.monitors.retain(|monitor| monitor.pipeline != name);
        self.monitors
            .push(ShaderMonitor::new(&desc.vertex_shader, name));
        self.monitors
            .push(ShaderMonitor::new(&desc.fragment_shader, name));
        self.replace(name, Pipeline::Graphics(GraphicsPipeline { raw, layout, desc }));

        Ok(())
    }

    fn replace(&mut self, name: &str, pipeline: Pipeline) {
        if let Some(old) = self.pipelines.insert(name.into(), pipeline) {
            self.destroy_handles(old.raw(), old.layout());
        }
    }

    fn destroy_handles(&self, pipeline: vk::Pipeline, layout: vk::PipelineLayout) {
        self.device.wait_idle();
        unsafe {
            self.device.get().destroy_pipeline(pipeline, None);
            self.device.get().destroy_pipeline_layout(layout, None);
        }
    }

    /// Polls every watched shader. At most one pipeline is rebuilt per
    /// call; a failed rebuild keeps the previous pipeline live.
    pub fn check_for_changes(&mut self) {
        if self.is_reloading {
            return;
        }
        let outcome = reload::scan(&mut self.monitors);
        if outcome.changed.is_empty() {
            return;
        }
        self.is_reloading = true;
        for path in &outcome.changed {
            self.shaders.remove(path);
        }
        if let Some(name) = outcome.reload {
            info!("Shader change detected, reloading pipeline {}", name);
            if let Err(err) = self.reload(&name) {
                error!(
                    "Failed to reload pipeline {}: {}. Previous pipeline stays live.",
                    name, err
                );
            }
        }
        self.is_reloading = false;
    }

    fn reload(&mut self, name: &SmolStr) -> Result<()> {
        let built = match self.pipelines.get(name) {
            Some(Pipeline::Compute(pipeline)) => {
                let desc = pipeline.desc.clone();
                Self::build_compute(&self.device, &mut self.shaders, self.cache, &desc)?
            }
            Some(Pipeline::Graphics(pipeline)) => {
                let desc = pipeline.desc.clone();
                Self::build_graphics(&self.device, &mut self.shaders, self.cache, &desc)?
            }
            None => return Err(Error::PipelineCreationFailed),
        };
        self.device.set_object_name(built.0, name);

        let (old_raw, old_layout) = {
            let record = self.pipelines.get_mut(name).unwrap();
            match record {
                Pipeline::Compute(pipeline) => {
                    let old = (pipeline.raw, pipeline.layout);
                    pipeline.raw = built.0;
                    pipeline.layout = built.1;
                    old
                }
                Pipeline::Graphics(pipeline) => {
                    let old = (pipeline.raw, pipeline.layout);
                    pipeline.raw = built.0;
                    pipeline.layout = built.1;
                    old
                }
            }
        };
        self.destroy_handles(old_raw, old_layout);

        Ok(())
    }

    fn build_layout(
        device: &Device,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_size: u32,
        stages: vk::ShaderStageFlags,
    ) -> Result<vk::PipelineLayout> {
        let range = vk::PushConstantRange {
            stage_flags: stages,
            offset: 0,
            size: push_constant_size,
        };
        let mut info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        if push_constant_size > 0 {
            info = info.push_constant_ranges(slice::from_ref(&range));
        }

        Ok(unsafe { device.get().create_pipeline_layout(&info, None) }
            .map_err(onyx_backend::Error::from)?)
    }

    fn build_compute(
        device: &Device,
        shaders: &mut ShaderCache,
        cache: vk::PipelineCache,
        desc: &ComputePipelineDesc,
    ) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
        let module = shaders.compile(&desc.shader, ShaderStage::Compute)?;
        let (spec_data, spec_len, spec_entries) =
            specialization_layout(desc.phase, desc.local_size);
        let spec_info = vk::SpecializationInfo::builder()
            .map_entries(&spec_entries)
            .data(&spec_data[..spec_len])
            .build();
        let layout = Self::build_layout(
            device,
            &desc.set_layouts,
            desc.push_constant_size,
            vk::ShaderStageFlags::COMPUTE,
        )?;
        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(shader_entry())
            .specialization_info(&spec_info)
            .build();
        let info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage)
            .layout(layout)
            .build();
        let pipeline = match unsafe {
            device.get().create_compute_pipelines(cache, slice::from_ref(&info), None)
        } {
            Ok(pipelines) => pipelines[0],
            Err(_) => {
                unsafe { device.get().destroy_pipeline_layout(layout, None) };
                return Err(Error::PipelineCreationFailed);
            }
        };

        Ok((pipeline, layout))
    }

    fn build_graphics(
        device: &Device,
        shaders: &mut ShaderCache,
        cache: vk::PipelineCache,
        desc: &GraphicsPipelineDesc,
    ) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
        let vertex = shaders.compile(&desc.vertex_shader, ShaderStage::Vertex)?;
        let fragment = shaders.compile(&desc.fragment_shader, ShaderStage::Fragment)?;
        let layout = Self::build_layout(
            device,
            &desc.set_layouts,
            desc.push_constant_size,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )?;

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex)
                .name(shader_entry())
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment)
                .name(shader_entry())
                .build(),
        ];

        // No vertex streams: geometry is pulled from the heap by address.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder().build();

        let assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
            .build();

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(&dynamic_states)
            .build();

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1)
            .build();

        let rasterizer_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_bias_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .build();

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .build();

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_format.is_some())
            .depth_write_enable(desc.depth_format.is_some())
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
            .build();

        let blend_attachment = if desc.blend {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build()
        } else {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build()
        };
        let blend_attachments = vec![blend_attachment; desc.color_formats.len()];
        let blending_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .attachments(&blend_attachments)
            .logic_op_enable(false)
            .build();

        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&desc.color_formats)
            .depth_attachment_format(desc.depth_format.unwrap_or(vk::Format::UNDEFINED))
            .stencil_attachment_format(desc.stencil_format.unwrap_or(vk::Format::UNDEFINED));

        let info = vk::GraphicsPipelineCreateInfo::builder()
            .push_next(&mut rendering_info)
            .layout(layout)
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&assembly_state)
            .dynamic_state(&dynamic_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&blending_state)
            .build();

        let pipeline = match unsafe {
            device.get().create_graphics_pipelines(cache, slice::from_ref(&info), None)
        } {
            Ok(pipelines) => pipelines[0],
            Err(_) => {
                unsafe { device.get().destroy_pipeline_layout(layout, None) };
                return Err(Error::PipelineCreationFailed);
            }
        };

        Ok((pipeline, layout))
    }
}

impl Drop for PipelineCompiler {
    fn drop(&mut self) {
        self.device.wait_idle();
        for (_, pipeline) in self.pipelines.drain() {
            unsafe {
                self.device.get().destroy_pipeline(pipeline.raw(), None);
                self.device
                    .get()
                    .destroy_pipeline_layout(pipeline.layout(), None);
            }
        }
        if self.cache != vk::PipelineCache::null() {
            if let Some(path) = &self.cache_path {
                if let Err(err) = save_pipeline_cache(&self.device, self.cache, path) {
                    warn!("Failed to save pipeline cache: {:?}", err);
                }
            }
            unsafe { self.device.get().destroy_pipeline_cache(self.cache, None) };
        }
    }
}

#[cfg(test)]
mod test {
    use super::specialization_layout;

    #[test]
    fn specialization_phase_only() {
        let (data, len, entries) = specialization_layout(7, None);
        assert_eq!(4, len);
        assert_eq!(1, entries.len());
        assert_eq!(0, entries[0].constant_id);
        assert_eq!(0, entries[0].offset);
        assert_eq!(4, entries[0].size);
        assert_eq!(&7u32.to_ne_bytes()[..], &data[0..4]);
    }

    #[test]
    fn specialization_with_local_size() {
        let (data, len, entries) = specialization_layout(2, Some([8, 8, 1]));
        assert_eq!(16, len);
        assert_eq!(2, entries.len());
        assert_eq!(1, entries[1].constant_id);
        assert_eq!(4, entries[1].offset);
        assert_eq!(12, entries[1].size);
        assert_eq!(&8u32.to_ne_bytes()[..], &data[4..8]);
        assert_eq!(&8u32.to_ne_bytes()[..], &data[8..12]);
        assert_eq!(&1u32.to_ne_bytes()[..], &data[12..16]);
    }
}
