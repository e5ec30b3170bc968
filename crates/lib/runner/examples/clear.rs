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
use onyx_render::{Pass, RenderAttachment, Renderer, ResourceState, ResourceUsage};
use onyx_runner::{Client, ClientState, Runner};

#[derive(Default)]
struct ClearBackbuffer {}

impl Client for ClearBackbuffer {
    fn init(&mut self, renderer: &mut Renderer) -> onyx_render::Result<()> {
        let target = renderer.swapchain_image();
        let graph = renderer.graph_mut();
        graph.add_pass(
            Pass::command("clear")
                .write(ResourceUsage::write(target, ResourceState::color_attachment()))
                .execute(|ctx| {
                    let color_attachment = RenderAttachment::new(
                        ctx.swapchain_view,
                        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    )
                    .clear_input(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: [0.05, 0.05, 0.1, 1.0],
                        },
                    })
                    .store_output();
                    ctx.begin_rendering(ctx.render_area, &[color_attachment], None);
                    ctx.end_rendering();
                    Ok(())
                }),
        );
        graph.add_pass(Pass::submit());
        graph.add_pass(Pass::present(target));

        Ok(())
    }

    fn tick(&mut self, _dt: f32) -> ClientState {
        ClientState::Continue
    }

    fn hidden(&mut self, _value: bool) {}
}

fn main() {
    let mut runner = Runner::new(
        ClearBackbuffer::default(),
        "Onyx - Clear backbuffer example",
    );
    runner.run();
}
