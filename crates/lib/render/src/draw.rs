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

use std::slice;

use arrayvec::ArrayVec;
use ash::vk;

use crate::{PassContext, Pipeline};

const MAX_COLOR_ATTACHMENTS: usize = 8;

/// One attachment of a dynamic-rendering pass.
pub struct RenderAttachment {
    pub target: vk::ImageView,
    pub layout: vk::ImageLayout,
    pub load: vk::AttachmentLoadOp,
    pub store: vk::AttachmentStoreOp,
    pub clear: Option<vk::ClearValue>,
}

impl RenderAttachment {
    pub fn new(target: vk::ImageView, layout: vk::ImageLayout) -> Self {
        Self {
            target,
            layout,
            load: vk::AttachmentLoadOp::DONT_CARE,
            store: vk::AttachmentStoreOp::DONT_CARE,
            clear: None,
        }
    }

    pub fn clear_input(mut self, color: vk::ClearValue) -> Self {
        self.load = vk::AttachmentLoadOp::CLEAR;
        self.clear = Some(color);
        self
    }

    pub fn load_input(mut self) -> Self {
        self.load = vk::AttachmentLoadOp::LOAD;
        self.clear = None;
        self
    }

    pub fn store_output(mut self) -> Self {
        self.store = vk::AttachmentStoreOp::STORE;
        self
    }

    fn build(&self) -> vk::RenderingAttachmentInfo {
        vk::RenderingAttachmentInfo::builder()
            .clear_value(self.clear.unwrap_or_default())
            .load_op(self.load)
            .store_op(self.store)
            .image_view(self.target)
            .image_layout(self.layout)
            .build()
    }
}

impl<'a> PassContext<'a> {
    /// Starts dynamic rendering over the given area and points the dynamic
    /// viewport and scissor at it.
    pub fn begin_rendering(
        &self,
        area: vk::Rect2D,
        color_attachments: &[RenderAttachment],
        depth_attachment: Option<RenderAttachment>,
    ) {
        let color_attachments = color_attachments
            .iter()
            .map(RenderAttachment::build)
            .collect::<ArrayVec<_, MAX_COLOR_ATTACHMENTS>>();
        let depth_attachment = depth_attachment.map(|x| x.build());

        let info = vk::RenderingInfo::builder()
            .render_area(area)
            .layer_count(1)
            .color_attachments(&color_attachments);
        let info = if let Some(depth_attachment) = depth_attachment.as_ref() {
            info.depth_attachment(depth_attachment)
        } else {
            info
        };
        unsafe { self.device.get().cmd_begin_rendering(self.cb, &info) };

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: area.extent.width as f32,
            height: area.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        unsafe {
            self.device
                .get()
                .cmd_set_viewport(self.cb, 0, slice::from_ref(&viewport));
            self.device
                .get()
                .cmd_set_scissor(self.cb, 0, slice::from_ref(&area));
        }
    }

    pub fn end_rendering(&self) {
        unsafe { self.device.get().cmd_end_rendering(self.cb) };
    }

    pub fn bind_pipeline(&self, pipeline: &Pipeline) {
        unsafe {
            self.device
                .get()
                .cmd_bind_pipeline(self.cb, pipeline.bind_point(), pipeline.raw())
        };
    }

    /// Pushes the kernel's constants. By convention the first 8 bytes are
    /// the heap base address.
    pub fn push_constants(&self, pipeline: &Pipeline, data: &[u8]) {
        let stages = match pipeline.bind_point() {
            vk::PipelineBindPoint::COMPUTE => vk::ShaderStageFlags::COMPUTE,
            _ => vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        };
        unsafe {
            self.device
                .get()
                .cmd_push_constants(self.cb, pipeline.layout(), stages, 0, data)
        };
    }

    pub fn dispatch(&self, x: u32, y: u32, z: u32) {
        unsafe { self.device.get().cmd_dispatch(self.cb, x, y, z) };
    }

    pub fn draw(&self, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .get()
                .cmd_draw(self.cb, vertex_count, instance_count, 0, 0)
        };
    }
}

#[cfg(test)]
mod test {
    use ash::vk;

    use super::RenderAttachment;

    #[test]
    fn attachment_ops() {
        let attachment = RenderAttachment::new(vk::ImageView::null(), vk::ImageLayout::GENERAL)
            .clear_input(vk::ClearValue::default())
            .store_output();
        assert_eq!(vk::AttachmentLoadOp::CLEAR, attachment.load);
        assert_eq!(vk::AttachmentStoreOp::STORE, attachment.store);
        assert!(attachment.clear.is_some());

        let attachment = RenderAttachment::new(vk::ImageView::null(), vk::ImageLayout::GENERAL)
            .load_input();
        assert_eq!(vk::AttachmentLoadOp::LOAD, attachment.load);
        assert!(attachment.clear.is_none());
    }
}
