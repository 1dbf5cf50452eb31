mod actor;
mod batch;
mod failure;
mod fade;
mod geometry;
mod host;
mod liveness;
mod viewport;

pub use actor::{Actor, ActorId, Disposable, OrientationAware, Resizable};
pub use batch::{Batch, DrawCommand, RgbaSprite, TEXT_ADVANCE_RATIO};
pub use failure::{FrameFailure, FrameFailureKind};
pub use fade::{
    FadeCallback, FadeTransitionController, TransitionState, FADE_DURATION_SECONDS, HIDDEN_ALPHA,
    VISIBLE_ALPHA,
};
pub use geometry::{Color, Rect, ScreenRect, Vec2};
pub use host::{FrameReport, StageConfig, StageHost};
pub use liveness::{Liveness, LivenessWatch};
pub use viewport::{
    compute_scale, Orientation, ScaleFactor, Viewport, ViewportError, DEFAULT_USER_ZOOM,
    RATIO_SCALE_FACTOR, WORLD_HEIGHT, WORLD_WIDTH,
};
