use std::sync::Arc;

use super::failure::FrameFailure;
use super::geometry::{Color, Rect, ScreenRect, Vec2};
use super::viewport::Viewport;

/// Horizontal advance per glyph relative to the glyph cell height.
pub const TEXT_ADVANCE_RATIO: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaSprite {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        rect: ScreenRect,
        color: [u8; 4],
    },
    Sprite {
        rect: ScreenRect,
        sprite: Arc<RgbaSprite>,
        alpha: f32,
    },
    Text {
        left: i32,
        top: i32,
        pixel_size: u32,
        text: String,
        color: [u8; 4],
    },
}

/// Collects draw commands for one frame, projected through the viewport that was
/// applied before `begin`.
#[derive(Debug)]
pub struct Batch {
    projection: Viewport,
    drawing: bool,
    commands: Vec<DrawCommand>,
}

impl Batch {
    pub fn new(projection: Viewport) -> Self {
        Self {
            projection,
            drawing: false,
            commands: Vec::new(),
        }
    }

    pub fn set_projection(&mut self, projection: Viewport) {
        self.projection = projection;
    }

    pub fn projection(&self) -> &Viewport {
        &self.projection
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn begin(&mut self) -> Result<(), FrameFailure> {
        if self.drawing {
            return Err(FrameFailure::illegal_state(
                "batch.end must be called before begin",
            ));
        }
        self.commands.clear();
        self.drawing = true;
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), FrameFailure> {
        if !self.drawing {
            return Err(FrameFailure::illegal_state(
                "batch.begin must be called before end",
            ));
        }
        self.drawing = false;
        Ok(())
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), FrameFailure> {
        self.ensure_drawing()?;
        let rect = self.projection.project_rect(rect);
        if rect.is_empty() {
            return Ok(());
        }
        self.commands.push(DrawCommand::Rect {
            rect,
            color: color.to_rgba8(),
        });
        Ok(())
    }

    pub fn draw_sprite(
        &mut self,
        rect: Rect,
        sprite: &Arc<RgbaSprite>,
        alpha: f32,
    ) -> Result<(), FrameFailure> {
        self.ensure_drawing()?;
        let expected_len = sprite.width as usize * sprite.height as usize * 4;
        if sprite.rgba.len() != expected_len {
            return Err(FrameFailure::out_of_bounds(format!(
                "sprite buffer holds {} bytes, expected {expected_len}",
                sprite.rgba.len()
            )));
        }
        let rect = self.projection.project_rect(rect);
        if rect.is_empty() {
            return Ok(());
        }
        self.commands.push(DrawCommand::Sprite {
            rect,
            sprite: Arc::clone(sprite),
            alpha: alpha.clamp(0.0, 1.0),
        });
        Ok(())
    }

    /// `top_left` is in world units; `height` is the glyph cell height in world units.
    pub fn draw_text(
        &mut self,
        top_left: Vec2,
        height: f32,
        text: &str,
        color: Color,
    ) -> Result<(), FrameFailure> {
        self.ensure_drawing()?;
        let (left, top) = self.projection.world_to_screen(top_left);
        let pixel_size = (height * self.projection.pixels_per_world()).round().max(1.0) as u32;
        self.commands.push(DrawCommand::Text {
            left: left.round() as i32,
            top: top.round() as i32,
            pixel_size,
            text: text.to_string(),
            color: color.to_rgba8(),
        });
        Ok(())
    }

    /// Approximate width in world units of `text` drawn `height` units tall.
    pub fn text_width(text: &str, height: f32) -> f32 {
        text.chars().count() as f32 * height * TEXT_ADVANCE_RATIO
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    fn ensure_drawing(&self) -> Result<(), FrameFailure> {
        if self.drawing {
            Ok(())
        } else {
            Err(FrameFailure::illegal_state("batch is not drawing"))
        }
    }
}
