use thiserror::Error;

use super::geometry::{Rect, ScreenRect, Vec2};

pub const WORLD_WIDTH: f32 = 200.0;
pub const WORLD_HEIGHT: f32 = 200.0;
pub const RATIO_SCALE_FACTOR: f32 = 1.6;
pub const DEFAULT_USER_ZOOM: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ViewportError {
    #[error("invalid screen dimensions {width}x{height}; both must be positive")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("invalid user zoom {0}; must be finite and positive")]
    InvalidZoom(f32),
}

/// Display scale derived from screen shape and the user's zoom preference.
///
/// `ratio` is the orientation-independent aspect term, floor-clamped to 1.0 so the
/// logical world never shrinks below its minimum size before zoom is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    ratio: f32,
    zoom: f32,
}

impl ScaleFactor {
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn value(&self) -> f32 {
        self.ratio * self.zoom
    }
}

pub fn compute_scale(
    screen_width: i64,
    screen_height: i64,
    user_zoom: f32,
) -> Result<ScaleFactor, ViewportError> {
    if screen_width <= 0 || screen_height <= 0 {
        return Err(ViewportError::InvalidDimensions {
            width: screen_width,
            height: screen_height,
        });
    }
    if !user_zoom.is_finite() || user_zoom <= 0.0 {
        return Err(ViewportError::InvalidZoom(user_zoom));
    }

    let width = screen_width as f32;
    let height = screen_height as f32;
    let shorter_over_longer = (width / height).min(height / width);
    Ok(ScaleFactor {
        ratio: (shorter_over_longer * RATIO_SCALE_FACTOR).max(1.0),
        zoom: user_zoom,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Keeps a minimum world size visible and extends the world along the longer screen
/// axis so the whole screen is covered without letterboxing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    min_world_width: f32,
    min_world_height: f32,
    world_width: f32,
    world_height: f32,
    screen_width: u32,
    screen_height: u32,
}

impl Viewport {
    pub fn extend(min_world_width: f32, min_world_height: f32) -> Self {
        Self {
            min_world_width,
            min_world_height,
            world_width: min_world_width,
            world_height: min_world_height,
            screen_width: 0,
            screen_height: 0,
        }
    }

    pub fn scaled(min_world_width: f32, min_world_height: f32, scale: ScaleFactor) -> Self {
        Self::extend(
            min_world_width * scale.value(),
            min_world_height * scale.value(),
        )
    }

    pub fn update(&mut self, screen_width: u32, screen_height: u32) {
        self.screen_width = screen_width;
        self.screen_height = screen_height;
        if screen_width == 0 || screen_height == 0 {
            self.world_width = self.min_world_width;
            self.world_height = self.min_world_height;
            return;
        }

        let fit = (screen_width as f32 / self.min_world_width)
            .min(screen_height as f32 / self.min_world_height);
        self.world_width = screen_width as f32 / fit;
        self.world_height = screen_height as f32 / fit;
    }

    pub fn world_width(&self) -> f32 {
        self.world_width
    }

    pub fn world_height(&self) -> f32 {
        self.world_height
    }

    pub fn min_world_size(&self) -> (f32, f32) {
        (self.min_world_width, self.min_world_height)
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    pub fn pixels_per_world(&self) -> f32 {
        if self.world_width <= 0.0 {
            return 0.0;
        }
        self.screen_width as f32 / self.world_width
    }

    /// `None` for a square world, where neither orientation wins.
    pub fn orientation(&self) -> Option<Orientation> {
        if self.world_height > self.world_width {
            Some(Orientation::Vertical)
        } else if self.world_width > self.world_height {
            Some(Orientation::Horizontal)
        } else {
            None
        }
    }

    pub fn world_to_screen(&self, point: Vec2) -> (f32, f32) {
        let ppw = self.pixels_per_world();
        (point.x * ppw, self.screen_height as f32 - point.y * ppw)
    }

    /// Inverse of `world_to_screen`; `None` before the first non-empty update.
    pub fn screen_to_world(&self, x: f32, y: f32) -> Option<Vec2> {
        let ppw = self.pixels_per_world();
        if ppw <= 0.0 {
            return None;
        }
        Some(Vec2 {
            x: x / ppw,
            y: (self.screen_height as f32 - y) / ppw,
        })
    }

    pub fn project_rect(&self, rect: Rect) -> ScreenRect {
        let (left, bottom) = self.world_to_screen(rect.origin);
        let (right, top) = self.world_to_screen(Vec2 {
            x: rect.origin.x + rect.width,
            y: rect.origin.y + rect.height,
        });
        ScreenRect {
            left: left.round() as i32,
            top: top.round() as i32,
            right: right.round() as i32,
            bottom: bottom.round() as i32,
        }
    }
}
