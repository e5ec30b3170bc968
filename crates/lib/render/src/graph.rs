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

use std::collections::HashMap;

use ash::vk;
use log::error;
use onyx_common::Region;
use onyx_common::RegionSet;

use crate::{
    Error, GpuHandle, Pass, PassContext, PassKind, ResId, Resource, ResourceState, ResourceUsage,
    Result,
};

#[derive(Debug, Default)]
struct HandleState {
    state: ResourceState,
    written: RegionSet,
}

/// Authoritative per-GPU-handle state. Keyed by the raw handle so that
/// several `Resource` wrappers over the same buffer or image share it.
#[derive(Default)]
pub(crate) struct BarrierTracker {
    buffers: HashMap<vk::Buffer, HandleState>,
    images: HashMap<vk::Image, HandleState>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PlannedBarrier {
    pub handle: GpuHandle,
    pub src: ResourceState,
    pub dst: ResourceState,
    pub region: Option<Region>,
    pub aspect: vk::ImageAspectFlags,
}

#[derive(Debug, Default)]
pub(crate) struct PassBarriers {
    pub buffers: Vec<PlannedBarrier>,
    pub images: Vec<PlannedBarrier>,
}

impl PassBarriers {
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffers.len() + self.images.len()
    }
}

fn queue_family_differs(current: u32, required: u32) -> bool {
    required != vk::QUEUE_FAMILY_IGNORED && current != required
}

fn state_matches(is_image: bool, current: &ResourceState, required: &ResourceState) -> bool {
    current.access == required.access
        && current.stages == required.stages
        && (!is_image || current.layout == required.layout)
        && !queue_family_differs(current.queue_family, required.queue_family)
}

impl BarrierTracker {
    /// Decides whether one declared usage needs a barrier, appends it if
    /// so, and stores the required state as the handle's new current state.
    ///
    /// Reads with a declared region barrier iff the region overlaps the
    /// handle's written set. Images are forced on their first use in a
    /// pass, layout semantics are strict. Buffers with no prior GPU work
    /// on them have nothing to synchronize against and are skipped.
    fn plan_usage(
        &mut self,
        resource: &mut Resource,
        usage: &ResourceUsage,
        out: &mut PassBarriers,
    ) -> Result<()> {
        let handle = match resource.handle() {
            Some(handle) => handle,
            // Pre-declared but not bound yet (swapchain image before acquire).
            None => return Ok(()),
        };
        if handle.kind() != resource.kind() {
            return Err(Error::KindMismatch);
        }
        let is_image = matches!(handle, GpuHandle::Image(_));
        let entry = match handle {
            GpuHandle::Buffer(buffer) => self.buffers.entry(buffer).or_default(),
            GpuHandle::Image(image) => self.images.entry(image).or_default(),
        };

        let needs = if is_image && resource.first_use_in_pass {
            true
        } else if !usage.is_write && usage.region.is_some() {
            entry.written.intersects(&usage.region.unwrap())
        } else {
            !state_matches(is_image, &entry.state, &usage.state)
        };

        if needs && (is_image || entry.state.stages != vk::PipelineStageFlags2::NONE) {
            let first = resource.first_use_in_frame
                || entry.state.stages == vk::PipelineStageFlags2::NONE;
            let (src_stages, src_access) = if first {
                (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE)
            } else {
                (entry.state.stages, entry.state.access)
            };
            let barrier = PlannedBarrier {
                handle,
                src: ResourceState {
                    access: src_access,
                    stages: src_stages,
                    // UNDEFINED only when the image literally is undefined,
                    // anything else preserves contents across the transition.
                    layout: entry.state.layout,
                    queue_family: entry.state.queue_family,
                },
                dst: usage.state,
                region: usage.region,
                aspect: resource.image_aspect(),
            };
            if is_image {
                out.images.push(barrier);
            } else {
                out.buffers.push(barrier);
            }
        }

        entry.state = usage.state;
        if usage.is_write {
            match usage.region {
                Some(region) => entry.written.insert(region),
                None => entry.written.cover_all(),
            }
        }
        resource.first_use_in_pass = false;
        resource.first_use_in_frame = false;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn state_of(&self, handle: GpuHandle) -> Option<ResourceState> {
        match handle {
            GpuHandle::Buffer(buffer) => self.buffers.get(&buffer).map(|x| x.state),
            GpuHandle::Image(image) => self.images.get(&image).map(|x| x.state),
        }
    }
}

fn full_subresource_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

// The low 32 bits of the synchronization2 masks are identical to the
// classical flags, which is all this crate ever puts in them.
fn stage_mask_sync1(stages: vk::PipelineStageFlags2) -> vk::PipelineStageFlags {
    vk::PipelineStageFlags::from_raw((stages.as_raw() & u32::MAX as u64) as u32)
}

fn access_mask_sync1(access: vk::AccessFlags2) -> vk::AccessFlags {
    vk::AccessFlags::from_raw((access.as_raw() & u32::MAX as u64) as u32)
}

/// Classical barriers carry the stage masks on the command, not on the
/// barrier. Combine them across the pass, never leaving either side zero.
fn combined_sync1_stages(
    barriers: &PassBarriers,
) -> (vk::PipelineStageFlags, vk::PipelineStageFlags) {
    let mut src = vk::PipelineStageFlags::empty();
    let mut dst = vk::PipelineStageFlags::empty();
    for barrier in barriers.buffers.iter().chain(barriers.images.iter()) {
        src |= stage_mask_sync1(barrier.src.stages);
        dst |= stage_mask_sync1(barrier.dst.stages);
    }
    if src.is_empty() {
        src = vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    if dst.is_empty() {
        dst = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
    }

    (src, dst)
}

fn image_barrier2(barrier: &PlannedBarrier) -> vk::ImageMemoryBarrier2 {
    let image = match barrier.handle {
        GpuHandle::Image(image) => image,
        GpuHandle::Buffer(_) => unreachable!(),
    };
    vk::ImageMemoryBarrier2::builder()
        .src_stage_mask(barrier.src.stages)
        .src_access_mask(barrier.src.access)
        .dst_stage_mask(barrier.dst.stages)
        .dst_access_mask(barrier.dst.access)
        .old_layout(barrier.src.layout)
        .new_layout(barrier.dst.layout)
        .src_queue_family_index(barrier.src.queue_family)
        .dst_queue_family_index(barrier.dst.queue_family)
        .image(image)
        .subresource_range(full_subresource_range(barrier.aspect))
        .build()
}

fn buffer_barrier2(barrier: &PlannedBarrier) -> vk::BufferMemoryBarrier2 {
    let buffer = match barrier.handle {
        GpuHandle::Buffer(buffer) => buffer,
        GpuHandle::Image(_) => unreachable!(),
    };
    let (offset, size) = match barrier.region {
        Some(region) => (region.offset, region.size),
        None => (0, vk::WHOLE_SIZE),
    };
    vk::BufferMemoryBarrier2::builder()
        .src_stage_mask(barrier.src.stages)
        .src_access_mask(barrier.src.access)
        .dst_stage_mask(barrier.dst.stages)
        .dst_access_mask(barrier.dst.access)
        .src_queue_family_index(barrier.src.queue_family)
        .dst_queue_family_index(barrier.dst.queue_family)
        .buffer(buffer)
        .offset(offset)
        .size(size)
        .build()
}

fn image_barrier1(barrier: &PlannedBarrier) -> vk::ImageMemoryBarrier {
    let image = match barrier.handle {
        GpuHandle::Image(image) => image,
        GpuHandle::Buffer(_) => unreachable!(),
    };
    vk::ImageMemoryBarrier::builder()
        .src_access_mask(access_mask_sync1(barrier.src.access))
        .dst_access_mask(access_mask_sync1(barrier.dst.access))
        .old_layout(barrier.src.layout)
        .new_layout(barrier.dst.layout)
        .src_queue_family_index(barrier.src.queue_family)
        .dst_queue_family_index(barrier.dst.queue_family)
        .image(image)
        .subresource_range(full_subresource_range(barrier.aspect))
        .build()
}

fn buffer_barrier1(barrier: &PlannedBarrier) -> vk::BufferMemoryBarrier {
    let buffer = match barrier.handle {
        GpuHandle::Buffer(buffer) => buffer,
        GpuHandle::Image(_) => unreachable!(),
    };
    let (offset, size) = match barrier.region {
        Some(region) => (region.offset, region.size),
        None => (0, vk::WHOLE_SIZE),
    };
    vk::BufferMemoryBarrier::builder()
        .src_access_mask(access_mask_sync1(barrier.src.access))
        .dst_access_mask(access_mask_sync1(barrier.dst.access))
        .src_queue_family_index(barrier.src.queue_family)
        .dst_queue_family_index(barrier.dst.queue_family)
        .buffer(buffer)
        .offset(offset)
        .size(size)
        .build()
}

/// Task graph: append-only pass list, per-handle state tracking, barrier
/// synthesis and the per-frame execution driver. Execution order is
/// insertion order.
pub struct Graph {
    passes: Vec<Pass>,
    resources: Vec<Resource>,
    tracker: BarrierTracker,
    use_sync2: bool,
}

impl Graph {
    pub fn new(use_sync2: bool) -> Self {
        Self {
            passes: Vec::new(),
            resources: Vec::new(),
            tracker: BarrierTracker::default(),
            use_sync2,
        }
    }

    pub fn add_resource(&mut self, resource: Resource) -> ResId {
        let id = ResId(self.resources.len() as u32);
        self.resources.push(resource);
        id
    }

    pub fn resource(&self, id: ResId) -> &Resource {
        &self.resources[id.index()]
    }

    pub fn resource_mut(&mut self, id: ResId) -> &mut Resource {
        &mut self.resources[id.index()]
    }

    pub fn add_pass(&mut self, pass: Pass) -> usize {
        self.passes.push(pass);
        self.passes.len() - 1
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Execution order. Currently identity; any future dependency-driven
    /// reorder must keep write-before-read pairs and the trailing
    /// non-command passes in their relative order.
    fn schedule(&self) -> Vec<usize> {
        (0..self.passes.len()).collect()
    }

    pub(crate) fn mark_frame(&mut self) {
        for pass in &self.passes {
            for usage in pass.inputs.iter().chain(pass.outputs.iter()) {
                self.resources[usage.resource.index()].first_use_in_frame = true;
            }
        }
    }

    /// Synthesizes the barriers one pass needs, inputs before outputs,
    /// updating the per-handle states. Pure bookkeeping, no recording.
    pub(crate) fn plan_pass(&mut self, index: usize) -> Result<PassBarriers> {
        let usages: Vec<ResourceUsage> = self.passes[index]
            .inputs
            .iter()
            .chain(self.passes[index].outputs.iter())
            .copied()
            .collect();
        for usage in &usages {
            self.resources[usage.resource.index()].first_use_in_pass = true;
        }
        let mut barriers = PassBarriers::default();
        for usage in &usages {
            self.tracker.plan_usage(
                &mut self.resources[usage.resource.index()],
                usage,
                &mut barriers,
            )?;
        }

        Ok(barriers)
    }

    fn emit_barriers(&self, ctx: &PassContext, barriers: &PassBarriers) {
        if barriers.is_empty() {
            return;
        }
        if self.use_sync2 {
            let images: Vec<_> = barriers.images.iter().map(image_barrier2).collect();
            let buffers: Vec<_> = barriers.buffers.iter().map(buffer_barrier2).collect();
            let info = vk::DependencyInfo::builder()
                .image_memory_barriers(&images)
                .buffer_memory_barriers(&buffers)
                .build();
            unsafe { ctx.device.get().cmd_pipeline_barrier2(ctx.cb, &info) };
        } else {
            let (src_stages, dst_stages) = combined_sync1_stages(barriers);
            let images: Vec<_> = barriers.images.iter().map(image_barrier1).collect();
            let buffers: Vec<_> = barriers.buffers.iter().map(buffer_barrier1).collect();
            unsafe {
                ctx.device.get().cmd_pipeline_barrier(
                    ctx.cb,
                    src_stages,
                    dst_stages,
                    vk::DependencyFlags::empty(),
                    &[],
                    &buffers,
                    &images,
                )
            };
        }
    }

    /// Records the whole frame: barriers + command passes between
    /// begin/end of the command buffer, then the deferred non-command
    /// passes (submit, present) in ascending registration order.
    ///
    /// A failing command pass is logged and skipped, the frame goes on.
    /// Failures of deferred passes are the frame's failures and propagate.
    pub fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        puffin::profile_function!();
        self.mark_frame();

        let begin = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .build();
        unsafe { ctx.device.get().begin_command_buffer(ctx.cb, &begin) }
            .map_err(onyx_backend::Error::from)?;

        let mut deferred = Vec::new();
        for index in self.schedule() {
            let name = self.passes[index].name.clone();
            match self.plan_pass(index) {
                Ok(barriers) => self.emit_barriers(ctx, &barriers),
                Err(err) => {
                    error!("Pass {} dropped: {}", name, err);
                    continue;
                }
            }
            match self.passes[index].kind {
                PassKind::Command => {
                    let _label = ctx.device.scoped_label(ctx.cb, &name);
                    if let Err(err) = (self.passes[index].execute)(ctx) {
                        error!("Pass {} failed: {}", name, err);
                    }
                }
                PassKind::NonCommand => deferred.push(index),
            }
        }

        unsafe { ctx.device.get().end_command_buffer(ctx.cb) }
            .map_err(onyx_backend::Error::from)?;

        for index in deferred {
            (self.passes[index].execute)(ctx)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use ash::vk::{self, Handle};
    use onyx_common::Region;

    use crate::{
        Graph, GpuHandle, Pass, PassKind, ResourceState, ResourceUsage, Resource,
    };

    use super::combined_sync1_stages;

    fn graph_with_buffer() -> (Graph, crate::ResId, GpuHandle) {
        let mut graph = Graph::new(true);
        let buffer = vk::Buffer::from_raw(1);
        let id = graph.add_resource(Resource::buffer_with("data", buffer));
        (graph, id, GpuHandle::Buffer(buffer))
    }

    fn graph_with_image() -> (Graph, crate::ResId, GpuHandle) {
        let mut graph = Graph::new(true);
        let image = vk::Image::from_raw(2);
        let id = graph.add_resource(Resource::image_with("target", image));
        (graph, id, GpuHandle::Image(image))
    }

    #[test]
    fn compute_write_then_vertex_read() {
        let (mut graph, id, handle) = graph_with_buffer();
        graph.add_pass(Pass::command("fill").write(
            ResourceUsage::write(id, ResourceState::compute_write()).region(Region::new(2048, 1024)),
        ));
        graph.add_pass(Pass::command("draw").read(
            ResourceUsage::read(
                id,
                ResourceState::shader_read(vk::PipelineStageFlags2::VERTEX_SHADER),
            )
            .region(Region::new(2048, 256)),
        ));
        graph.mark_frame();

        // First write has nothing before it, no barrier.
        let barriers = graph.plan_pass(0).unwrap();
        assert_eq!(0, barriers.len());

        // The read overlaps the written region.
        let barriers = graph.plan_pass(1).unwrap();
        assert_eq!(1, barriers.buffers.len());
        assert_eq!(0, barriers.images.len());
        let barrier = &barriers.buffers[0];
        assert_eq!(vk::PipelineStageFlags2::COMPUTE_SHADER, barrier.src.stages);
        assert_eq!(vk::AccessFlags2::SHADER_WRITE, barrier.src.access);
        assert_eq!(vk::PipelineStageFlags2::VERTEX_SHADER, barrier.dst.stages);
        assert_eq!(vk::AccessFlags2::SHADER_READ, barrier.dst.access);

        // The handle tracks the last declared usage.
        let state = graph.tracker.state_of(handle).unwrap();
        assert_eq!(vk::PipelineStageFlags2::VERTEX_SHADER, state.stages);
    }

    #[test]
    fn disjoint_reads_elide_barriers() {
        let (mut graph, id, _) = graph_with_buffer();
        graph.add_pass(Pass::command("init").write(
            ResourceUsage::write(id, ResourceState::compute_write()).region(Region::new(0, 256)),
        ));
        graph.add_pass(Pass::command("r1").read(
            ResourceUsage::read(
                id,
                ResourceState::shader_read(vk::PipelineStageFlags2::VERTEX_SHADER),
            )
            .region(Region::new(512, 128)),
        ));
        graph.add_pass(Pass::command("r2").read(
            ResourceUsage::read(
                id,
                ResourceState::shader_read(vk::PipelineStageFlags2::VERTEX_SHADER),
            )
            .region(Region::new(1024, 128)),
        ));
        graph.mark_frame();

        graph.plan_pass(0).unwrap();
        assert_eq!(0, graph.plan_pass(1).unwrap().len());
        assert_eq!(0, graph.plan_pass(2).unwrap().len());
    }

    #[test]
    fn overlapping_read_needs_barrier() {
        let (mut graph, id, _) = graph_with_buffer();
        graph.add_pass(Pass::command("init").write(
            ResourceUsage::write(id, ResourceState::compute_write()).region(Region::new(0, 256)),
        ));
        graph.add_pass(Pass::command("read").read(
            ResourceUsage::read(
                id,
                ResourceState::shader_read(vk::PipelineStageFlags2::VERTEX_SHADER),
            )
            .region(Region::new(128, 64)),
        ));
        graph.mark_frame();

        graph.plan_pass(0).unwrap();
        assert_eq!(1, graph.plan_pass(1).unwrap().len());
    }

    #[test]
    fn whole_resource_write_hits_any_read() {
        let (mut graph, id, _) = graph_with_buffer();
        graph
            .add_pass(Pass::command("init").write(ResourceUsage::write(
                id,
                ResourceState::compute_write(),
            )));
        graph.add_pass(Pass::command("read").read(
            ResourceUsage::read(
                id,
                ResourceState::shader_read(vk::PipelineStageFlags2::VERTEX_SHADER),
            )
            .region(Region::new(1 << 30, 16)),
        ));
        graph.mark_frame();

        graph.plan_pass(0).unwrap();
        assert_eq!(1, graph.plan_pass(1).unwrap().len());
    }

    #[test]
    fn swapchain_transitions() {
        let (mut graph, id, _) = graph_with_image();
        graph.add_pass(
            Pass::command("triangle")
                .write(ResourceUsage::write(id, ResourceState::color_attachment())),
        );
        graph.add_pass(
            Pass::non_command("present")
                .read(ResourceUsage::read(id, ResourceState::present())),
        );
        graph.mark_frame();

        let barriers = graph.plan_pass(0).unwrap();
        assert_eq!(1, barriers.images.len());
        let barrier = &barriers.images[0];
        assert_eq!(vk::ImageLayout::UNDEFINED, barrier.src.layout);
        assert_eq!(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, barrier.dst.layout);
        assert_eq!(vk::PipelineStageFlags2::TOP_OF_PIPE, barrier.src.stages);

        let barriers = graph.plan_pass(1).unwrap();
        assert_eq!(1, barriers.images.len());
        let barrier = &barriers.images[0];
        assert_eq!(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, barrier.src.layout);
        assert_eq!(vk::ImageLayout::PRESENT_SRC_KHR, barrier.dst.layout);
        assert_eq!(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            barrier.src.stages
        );
        assert_eq!(vk::AccessFlags2::MEMORY_READ, barrier.dst.access);
    }

    #[test]
    fn image_first_use_in_pass_is_forced() {
        let (mut graph, id, _) = graph_with_image();
        graph.add_pass(
            Pass::command("a").write(ResourceUsage::write(id, ResourceState::color_attachment())),
        );
        graph.add_pass(
            Pass::command("b").write(ResourceUsage::write(id, ResourceState::color_attachment())),
        );
        graph.mark_frame();

        assert_eq!(1, graph.plan_pass(0).unwrap().images.len());
        // Same required state, still one barrier: layouts are strict.
        let barriers = graph.plan_pass(1).unwrap();
        assert_eq!(1, barriers.images.len());
        assert_eq!(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            barriers.images[0].src.layout
        );
    }

    #[test]
    fn repeated_usage_inside_pass_not_forced() {
        let (mut graph, id, _) = graph_with_image();
        graph.add_pass(
            Pass::command("a")
                .read(ResourceUsage::read(
                    id,
                    ResourceState::shader_read(vk::PipelineStageFlags2::FRAGMENT_SHADER)
                        .layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                ))
                .read(ResourceUsage::read(
                    id,
                    ResourceState::shader_read(vk::PipelineStageFlags2::FRAGMENT_SHADER)
                        .layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                )),
        );
        graph.mark_frame();

        // Forced once for the pass, the second identical usage matches state.
        assert_eq!(1, graph.plan_pass(0).unwrap().images.len());
    }

    #[test]
    fn unbound_resource_is_skipped() {
        let mut graph = Graph::new(true);
        let id = graph.add_resource(Resource::image("swapchain_image"));
        graph.add_pass(
            Pass::command("draw").write(ResourceUsage::write(id, ResourceState::color_attachment())),
        );
        graph.mark_frame();

        assert_eq!(0, graph.plan_pass(0).unwrap().len());
    }

    #[test]
    fn shared_handle_shares_state() {
        let mut graph = Graph::new(true);
        let buffer = vk::Buffer::from_raw(7);
        let a = graph.add_resource(Resource::buffer_with("a", buffer));
        let b = graph.add_resource(Resource::buffer_with("b", buffer));
        graph.add_pass(
            Pass::command("fill").write(ResourceUsage::write(a, ResourceState::compute_write())),
        );
        graph.add_pass(Pass::command("read").read(ResourceUsage::read(
            b,
            ResourceState::shader_read(vk::PipelineStageFlags2::FRAGMENT_SHADER),
        )));
        graph.mark_frame();

        graph.plan_pass(0).unwrap();
        // Resource b wraps the same buffer, the write is visible through it.
        let barriers = graph.plan_pass(1).unwrap();
        assert_eq!(1, barriers.buffers.len());
        assert_eq!(
            vk::AccessFlags2::SHADER_WRITE,
            barriers.buffers[0].src.access
        );
    }

    #[test]
    fn sync1_masks_never_zero() {
        let barriers = super::PassBarriers::default();
        let (src, dst) = combined_sync1_stages(&barriers);
        assert_eq!(vk::PipelineStageFlags::TOP_OF_PIPE, src);
        assert_eq!(vk::PipelineStageFlags::BOTTOM_OF_PIPE, dst);
    }

    #[test]
    fn sync1_masks_combine() {
        let (mut graph, id, _) = graph_with_buffer();
        graph.add_pass(
            Pass::command("fill").write(ResourceUsage::write(id, ResourceState::compute_write())),
        );
        graph.add_pass(Pass::command("read").read(ResourceUsage::read(
            id,
            ResourceState::shader_read(vk::PipelineStageFlags2::VERTEX_SHADER),
        )));
        graph.mark_frame();

        graph.plan_pass(0).unwrap();
        let barriers = graph.plan_pass(1).unwrap();
        let (src, dst) = combined_sync1_stages(&barriers);
        assert_eq!(vk::PipelineStageFlags::COMPUTE_SHADER, src);
        assert_eq!(vk::PipelineStageFlags::VERTEX_SHADER, dst);
    }

    #[test]
    fn schedule_is_insertion_order() {
        let (mut graph, id, _) = graph_with_image();
        graph.add_pass(Pass::command("terrain"));
        graph.add_pass(Pass::command("triangle"));
        graph.add_pass(Pass::submit());
        graph.add_pass(Pass::present(id));
        assert_eq!(vec![0, 1, 2, 3], graph.schedule());
        assert_eq!(PassKind::NonCommand, graph.passes[2].kind());
        assert_eq!(PassKind::NonCommand, graph.passes[3].kind());
    }
}
