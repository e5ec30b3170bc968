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

mod runner;

pub use runner::*;

use onyx_render::{Renderer, Result};

#[derive(Debug, PartialEq, Eq)]
pub enum ClientState {
    Continue,
    Exit,
}

pub trait Client {
    /// Called once, before the main loop. Register resources, passes and
    /// pipelines against the renderer here.
    fn init(&mut self, renderer: &mut Renderer) -> Result<()>;
    fn tick(&mut self, dt: f32) -> ClientState;
    fn hidden(&mut self, value: bool);
}
