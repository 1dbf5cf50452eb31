use super::batch::Batch;
use super::failure::FrameFailure;
use super::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

/// A node in a stage host's visual tree.
///
/// Resize, teardown and orientation notifications are opt-in: an actor that wants
/// one returns `Some(self)` from the matching accessor.
pub trait Actor {
    fn name(&self) -> &str;

    fn act(&mut self, _delta_seconds: f32) -> Result<(), FrameFailure> {
        Ok(())
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure>;

    fn as_resizable(&mut self) -> Option<&mut dyn Resizable> {
        None
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        None
    }

    fn as_orientation_aware(&mut self) -> Option<&mut dyn OrientationAware> {
        None
    }
}

pub trait Resizable {
    fn on_resize(&mut self, screen_width: u32, screen_height: u32, viewport: &Viewport);
}

pub trait Disposable {
    fn dispose(&mut self);
}

pub trait OrientationAware {
    fn on_orientation_change(&mut self, is_vertical: bool);
}
