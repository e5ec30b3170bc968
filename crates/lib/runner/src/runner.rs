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

use std::time::Instant;

use ash::vk;
use log::info;
use onyx_backend::{Device, Instance, InstanceBuilder, PhysicalDeviceList, Surface};
use onyx_render::{Renderer, RendererDesc};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, WindowBuilder, WindowButtons},
};

use crate::{Client, ClientState};

pub struct Runner<T: Client> {
    client: T,
    title: String,
    dims: [u32; 2],
}

impl<T: Client> Runner<T> {
    pub fn new(client: T, title: &str) -> Self {
        Self {
            client,
            dims: [1280, 720],
            title: title.to_owned(),
        }
    }

    pub fn run(&mut self) {
        simple_logger::init().unwrap();
        info!("Init systems");

        let event_loop = EventLoop::new().unwrap();
        let window = WindowBuilder::new()
            .with_title(&self.title)
            .with_inner_size(PhysicalSize::new(self.dims[0], self.dims[1]))
            .with_resizable(false)
            .with_enabled_buttons(WindowButtons::MINIMIZE | WindowButtons::CLOSE)
            .build(&event_loop)
            .unwrap();

        let instance = Instance::new(
            InstanceBuilder::default().debug(true),
            window.raw_display_handle(),
        )
        .unwrap();
        let surface = Surface::new(
            &instance,
            window.raw_display_handle(),
            window.raw_window_handle(),
        )
        .unwrap();
        let pdevice = instance
            .enumerate_physical_devices()
            .unwrap()
            .find_suitable_device(
                &surface,
                &[
                    vk::PhysicalDeviceType::DISCRETE_GPU,
                    vk::PhysicalDeviceType::INTEGRATED_GPU,
                ],
            )
            .unwrap();
        let device = Device::new(instance, pdevice).unwrap();
        let resolution = [window.inner_size().width, window.inner_size().height];
        let mut renderer = Renderer::new(
            &device,
            surface,
            RendererDesc {
                resolution,
                ..Default::default()
            },
        )
        .unwrap();

        info!("Init client");
        self.client.init(&mut renderer).unwrap();

        info!("Main loop enter");
        let mut paused = false;
        let mut skip_draw = false;
        let mut alt_pressed = false;
        let mut last_timestamp = Instant::now();
        event_loop
            .run(|event, elwt| {
                elwt.set_control_flow(winit::event_loop::ControlFlow::Poll);
                match event {
                    Event::Suspended => {
                        paused = true;
                        self.client.hidden(true);
                    }
                    Event::Resumed => {
                        paused = false;
                        self.client.hidden(false);
                        last_timestamp = Instant::now();
                    }
                    Event::WindowEvent { event, .. } => match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::RedrawRequested => {
                            if skip_draw {
                                return;
                            }
                            if let Err(err) = renderer.render_frame() {
                                panic!("Frame failed: {}", err);
                            }
                        }
                        WindowEvent::Resized(new_size) => {
                            skip_draw = new_size.width == 0 || new_size.height == 0;
                            renderer.set_resolution([new_size.width, new_size.height]);
                        }
                        WindowEvent::ModifiersChanged(mods) => {
                            alt_pressed = mods.state().alt_key();
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.physical_key == PhysicalKey::Code(KeyCode::Enter)
                                && event.state.is_pressed()
                                && alt_pressed
                            {
                                if window.fullscreen().is_none() {
                                    window.set_fullscreen(Some(Fullscreen::Borderless(None)))
                                } else {
                                    window.set_fullscreen(None);
                                }
                            }
                        }
                        _ => {}
                    },
                    Event::AboutToWait => {
                        if paused {
                            last_timestamp = Instant::now();
                            return;
                        }
                        let current_timestamp = Instant::now();
                        let dt = (current_timestamp - last_timestamp).as_secs_f32();
                        last_timestamp = current_timestamp;
                        if self.client.tick(dt) == ClientState::Exit {
                            elwt.exit();
                        }

                        window.request_redraw()
                    }
                    _ => {}
                }
            })
            .unwrap();
        info!("Main loop exit");
        drop(renderer);
        drop(device);
        info!("Done.");
    }
}
