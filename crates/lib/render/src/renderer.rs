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
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use ash::vk;
use onyx_backend::{Acquired, Context, Device, Surface, MAX_FRAMES_IN_FLIGHT};
use onyx_common::any_as_u8_slice;

use crate::{
    Error, Graph, Heap, HeapAllocator, PassContext, PipelineCompiler, ResId, Resource, Result,
    Stage,
};

/// Push-constant convention shared with every shader: the heap base
/// address first, then the heap offsets of whatever the kernel needs.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PushData<const N: usize> {
    pub heap_address: u64,
    pub offsets: [u32; N],
}

impl<const N: usize> PushData<N> {
    pub fn new(heap_address: u64, offsets: [u32; N]) -> Self {
        Self {
            heap_address,
            offsets,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { any_as_u8_slice(self) }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCounters {
    pub index: usize,
    pub count: u64,
}

impl FrameCounters {
    fn advance(&mut self) {
        self.index = (self.index + 1) % MAX_FRAMES_IN_FLIGHT;
        self.count += 1;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RendererDesc {
    pub heap_size: usize,
    pub staging_size: usize,
    pub resolution: [u32; 2],
}

impl Default for RendererDesc {
    fn default() -> Self {
        Self {
            heap_size: 256 * 1024 * 1024,
            staging_size: 32 * 1024 * 1024,
            resolution: [1280, 720],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    Rendered,
    /// Nothing was ready, the frame was yielded.
    Skipped,
    /// The swapchain was rebuilt, the frame was yielded.
    Recreated,
}

/// One renderer per surface: owns the context, the graph, the heap and
/// its upload machinery, and the pipeline compiler, and drives the
/// per-frame lifecycle.
pub struct Renderer {
    device: Arc<Device>,
    context: Context,
    graph: Graph,
    allocator: HeapAllocator,
    stage: Arc<Stage>,
    compiler: PipelineCompiler,
    swapchain_image: ResId,
    stage_buffer: ResId,
    heap_buffer: ResId,
    views: HashMap<vk::Image, vk::ImageView>,
    resolution: [u32; 2],
    frame: FrameCounters,
}

impl Renderer {
    pub fn new(device: &Arc<Device>, surface: Surface, desc: RendererDesc) -> Result<Self> {
        let context = Context::new(device, surface, desc.resolution)?;
        let heap = Heap::new(device, desc.heap_size)?;
        let stage = Arc::new(Stage::new(device, desc.staging_size, heap.buffer())?);
        let mut graph = Graph::new(device.use_sync2());
        let swapchain_image = graph.add_resource(Resource::image("swapchain_image"));
        let stage_buffer = graph.add_resource(Resource::buffer_with("staging", stage.buffer()));
        let heap_buffer = graph.add_resource(Resource::buffer_with("heap", heap.buffer()));
        let allocator = HeapAllocator::new(heap, stage.clone());
        let compiler = PipelineCompiler::new(device)?;

        Ok(Self {
            device: device.clone(),
            context,
            graph,
            allocator,
            stage,
            compiler,
            swapchain_image,
            stage_buffer,
            heap_buffer,
            views: HashMap::new(),
            resolution: desc.resolution,
            frame: FrameCounters::default(),
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn allocator(&self) -> &HeapAllocator {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut HeapAllocator {
        &mut self.allocator
    }

    pub fn compiler(&self) -> &PipelineCompiler {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut PipelineCompiler {
        &mut self.compiler
    }

    /// The shared resource the acquired image is bound into every frame.
    pub fn swapchain_image(&self) -> ResId {
        self.swapchain_image
    }

    pub fn stage_resource(&self) -> ResId {
        self.stage_buffer
    }

    pub fn heap_resource(&self) -> ResId {
        self.heap_buffer
    }

    pub fn frame(&self) -> FrameCounters {
        self.frame
    }

    pub fn set_resolution(&mut self, resolution: [u32; 2]) {
        self.resolution = resolution;
    }

    /// Registers the pass that moves this frame's queued uploads into the
    /// heap. Usually the first pass of the graph.
    pub fn add_staging_pass(&mut self, name: &str) -> usize {
        let pass = self
            .stage
            .create_staging_pass(name, self.stage_buffer, self.heap_buffer);
        self.graph.add_pass(pass)
    }

    /// Runs one frame: hot-reload poll, acquire, bind the image into the
    /// shared resource, execute the graph (which submits and presents),
    /// advance the frame counters.
    pub fn render_frame(&mut self) -> Result<FrameResult> {
        puffin::profile_function!();
        self.compiler.check_for_changes();

        let image_index = match self.context.acquire_next_image(self.frame.index)? {
            Acquired::NotReady => return Ok(FrameResult::Skipped),
            Acquired::OutOfDate => {
                self.recreate_swapchain()?;
                return Ok(FrameResult::Recreated);
            }
            Acquired::Image(index) => index,
        };

        let image = self.context.swapchain().images()[image_index as usize];
        let format = self.context.swapchain().format();
        self.graph.resource_mut(self.swapchain_image).bind_image(image);
        let view = match self.views.entry(image) {
            Entry::Occupied(entry) => {
                let view = *entry.get();
                self.graph.resource_mut(self.swapchain_image).set_view(view);
                view
            }
            Entry::Vacant(entry) => {
                let view = self
                    .graph
                    .resource_mut(self.swapchain_image)
                    .create_view(&self.device, format)?;
                entry.insert(view);
                view
            }
        };
        let dims = self.context.swapchain().dims();

        let frame_sync = self.context.frame(self.frame.index);
        self.allocator.flush_stage(Some(frame_sync.in_flight));

        let mut ctx = PassContext {
            device: &self.device,
            swapchain: self.context.swapchain(),
            cb: frame_sync.command_buffer,
            queue: self.device.queue(),
            image_available: frame_sync.image_available,
            render_finished: frame_sync.render_finished,
            in_flight: frame_sync.in_flight,
            image_index,
            swapchain_view: view,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: dims[0],
                    height: dims[1],
                },
            },
            frame_index: self.frame.index,
            frame_count: self.frame.count,
            heap_address: self.allocator.heap().device_address(),
        };

        match self.graph.execute(&mut ctx) {
            Ok(()) => {}
            Err(Error::RecreateSwapchain) => {
                drop(ctx);
                self.recreate_swapchain()?;
                return Ok(FrameResult::Recreated);
            }
            Err(err) => return Err(err),
        }

        self.frame.advance();

        Ok(FrameResult::Rendered)
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        self.context.recreate_swapchain(self.resolution)?;
        self.destroy_views();

        Ok(())
    }

    fn destroy_views(&mut self) {
        self.device.wait_idle();
        for (_, view) in self.views.drain() {
            unsafe { self.device.get().destroy_image_view(view, None) };
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.destroy_views();
    }
}

/// Identifies a surface (window) a renderer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Explicitly keyed renderer registry. There is no process-wide renderer
/// state, the application owns this.
#[derive(Default)]
pub struct Renderers {
    renderers: HashMap<SurfaceId, Renderer>,
}

impl Renderers {
    pub fn insert(&mut self, id: SurfaceId, renderer: Renderer) {
        self.renderers.insert(id, renderer);
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Renderer> {
        self.renderers.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Renderer> {
        self.renderers.get_mut(&id)
    }

    pub fn remove(&mut self, id: SurfaceId) -> Option<Renderer> {
        self.renderers.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::{FrameCounters, PushData};

    #[test]
    fn frame_counters_wrap() {
        let mut frame = FrameCounters::default();
        frame.advance();
        frame.advance();
        frame.advance();
        assert_eq!(0, frame.index);
        assert_eq!(3, frame.count);
        frame.advance();
        assert_eq!(1, frame.index);
    }

    #[test]
    fn push_data_layout() {
        let push = PushData::new(0xdead_0000, [16, 32]);
        let bytes = push.bytes();
        assert_eq!(&0xdead_0000u64.to_ne_bytes()[..], &bytes[0..8]);
        assert_eq!(&16u32.to_ne_bytes()[..], &bytes[8..12]);
        assert_eq!(&32u32.to_ne_bytes()[..], &bytes[12..16]);
    }
}
