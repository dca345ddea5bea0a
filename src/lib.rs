//! Rendering core of an X11 compositing engine.
//!
//! Given a window stack ([`WindowModel`]) and a drawing surface
//! ([`Backend`]), this crate tracks per-frame layout snapshots, builds an
//! ordered stream of backend-neutral drawing commands, computes the minimal
//! screen region that needs to be redrawn, and synthesizes shadow/blur
//! kernels. It does not itself talk to an X server, parse configuration, or
//! schedule frames — those are the embedding application's job; see
//! [`Backend`] and [`WindowModel`] for the boundary.
//!
//! [`Backend`]: backend::Backend
//! [`WindowModel`]: window_model::WindowModel

pub mod backend;
pub mod command;
pub mod command_builder;
pub mod damage;
pub mod error;
pub mod geometry;
pub mod kernel;
pub mod layer;
pub mod layout;
#[cfg(test)]
pub mod logging;
pub mod renderer;
pub mod shadow;
pub mod window_model;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use backend::Backend;
pub use command::Command;
pub use command_builder::CommandBuilder;
pub use damage::DamageEngine;
pub use error::{RenderError, Result};
pub use geometry::{Rect, Region};
pub use kernel::Kernel;
pub use layer::Layer;
pub use layout::{Layout, LayoutManager};
pub use renderer::{Renderer, RendererConfig};
pub use window_model::WindowModel;
