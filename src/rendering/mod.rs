pub mod chrome;
pub mod compositor;
pub mod engine;

pub use chrome::ChromeLauncher;
pub use compositor::{compose, escape_text, ResolvedResources};
pub use engine::{Launcher, Renderer, Surface, Viewport};
