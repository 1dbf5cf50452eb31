mod input;
mod loop_runner;
mod rendering;
mod screen;

pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use rendering::Renderer;
pub use screen::{Screen, ScreenCommand, ScreenKey};
