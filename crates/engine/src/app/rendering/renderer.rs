use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::stage::{DrawCommand, RgbaSprite, ScreenRect};

use super::font::{glyph_advance, glyph_bits, glyph_pixel, text_scale, GLYPH_HEIGHT, GLYPH_WIDTH};

const CLEAR_COLOR: [u8; 4] = [18, 20, 26, 255];

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render(&mut self, commands: &[DrawCommand]) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        rasterize(self.pixels.frame_mut(), self.width, self.height, commands);
        self.pixels.render()
    }
}

pub(crate) fn rasterize(frame: &mut [u8], width: u32, height: u32, commands: &[DrawCommand]) {
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&CLEAR_COLOR);
    }
    if width == 0 || height == 0 {
        return;
    }

    for command in commands {
        match command {
            DrawCommand::Rect { rect, color } => fill_rect(frame, width, height, *rect, *color),
            DrawCommand::Sprite {
                rect,
                sprite,
                alpha,
            } => draw_sprite_scaled(frame, width, height, *rect, sprite, *alpha),
            DrawCommand::Text {
                left,
                top,
                pixel_size,
                text,
                color,
            } => draw_text_clipped(frame, width, height, *left, *top, *pixel_size, text, *color),
        }
    }
}

fn blend_pixel_clipped(frame: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 || color[3] == 0 {
        return;
    }
    let Some(byte_offset) = (y as usize)
        .checked_mul(width as usize)
        .and_then(|row| row.checked_add(x as usize))
        .and_then(|pixel| pixel.checked_mul(4))
    else {
        return;
    };
    let Some(pixel) = frame.get_mut(byte_offset..byte_offset + 4) else {
        return;
    };

    let alpha = u32::from(color[3]);
    for channel in 0..3 {
        let src = u32::from(color[channel]);
        let dst = u32::from(pixel[channel]);
        pixel[channel] = ((src * alpha + dst * (255 - alpha) + 127) / 255) as u8;
    }
    pixel[3] = 255;
}

fn fill_rect(frame: &mut [u8], width: u32, height: u32, rect: ScreenRect, color: [u8; 4]) {
    let start_x = rect.left.max(0);
    let start_y = rect.top.max(0);
    let end_x = rect.right.min(width as i32);
    let end_y = rect.bottom.min(height as i32);
    for y in start_y..end_y {
        for x in start_x..end_x {
            blend_pixel_clipped(frame, width, height, x, y, color);
        }
    }
}

/// Nearest-neighbour scale of `sprite` into `rect`.
fn draw_sprite_scaled(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRect,
    sprite: &RgbaSprite,
    alpha: f32,
) {
    let rect_width = rect.width();
    let rect_height = rect.height();
    if rect_width <= 0 || rect_height <= 0 || sprite.width == 0 || sprite.height == 0 {
        return;
    }

    for dy in 0..rect_height {
        let y = rect.top + dy;
        if y < 0 || y >= height as i32 {
            continue;
        }
        let src_y = (dy as u64 * u64::from(sprite.height) / rect_height as u64) as usize;
        for dx in 0..rect_width {
            let x = rect.left + dx;
            if x < 0 || x >= width as i32 {
                continue;
            }
            let src_x = (dx as u64 * u64::from(sprite.width) / rect_width as u64) as usize;
            let offset = (src_y * sprite.width as usize + src_x) * 4;
            let Some(texel) = sprite.rgba.get(offset..offset + 4) else {
                continue;
            };
            let texel_alpha = (f32::from(texel[3]) * alpha).round().clamp(0.0, 255.0) as u8;
            blend_pixel_clipped(
                frame,
                width,
                height,
                x,
                y,
                [texel[0], texel[1], texel[2], texel_alpha],
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_text_clipped(
    frame: &mut [u8],
    width: u32,
    height: u32,
    left: i32,
    top: i32,
    pixel_size: u32,
    text: &str,
    color: [u8; 4],
) {
    let scale = text_scale(pixel_size);
    let mut x = left;
    for ch in text.chars() {
        let bits = glyph_bits(ch);
        for row in 0..GLYPH_HEIGHT {
            for col in 0..GLYPH_WIDTH {
                if !glyph_pixel(bits, col, row) {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        blend_pixel_clipped(
                            frame,
                            width,
                            height,
                            x + col * scale + sx,
                            top + row * scale + sy,
                            color,
                        );
                    }
                }
            }
        }
        x += glyph_advance(scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_at(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    fn rect(left: i32, top: i32, right: i32, bottom: i32) -> ScreenRect {
        ScreenRect {
            left,
            top,
            right,
            bottom,
        }
    }

    #[test]
    fn empty_frame_is_cleared() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        rasterize(&mut frame, 4, 4, &[]);
        assert_eq!(pixel_at(&frame, 4, 3, 3), CLEAR_COLOR);
    }

    #[test]
    fn opaque_rect_covers_half_open_range() {
        let mut frame = vec![0u8; 8 * 8 * 4];
        let commands = [DrawCommand::Rect {
            rect: rect(2, 2, 4, 4),
            color: [200, 10, 10, 255],
        }];
        rasterize(&mut frame, 8, 8, &commands);

        assert_eq!(pixel_at(&frame, 8, 2, 2), [200, 10, 10, 255]);
        assert_eq!(pixel_at(&frame, 8, 3, 3), [200, 10, 10, 255]);
        assert_eq!(pixel_at(&frame, 8, 4, 4), CLEAR_COLOR);
    }

    #[test]
    fn transparent_rect_leaves_background() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        let commands = [DrawCommand::Rect {
            rect: rect(0, 0, 4, 4),
            color: [255, 255, 255, 0],
        }];
        rasterize(&mut frame, 4, 4, &commands);
        assert_eq!(pixel_at(&frame, 4, 1, 1), CLEAR_COLOR);
    }

    #[test]
    fn half_alpha_blends_toward_source() {
        let mut frame = vec![0u8; 4];
        frame.copy_from_slice(&[0, 0, 0, 255]);
        blend_pixel_clipped(&mut frame, 1, 1, 0, 0, [255, 255, 255, 128]);
        assert_eq!(frame, vec![128, 128, 128, 255]);
    }

    #[test]
    fn offscreen_commands_never_write_out_of_bounds() {
        let mut frame = vec![0u8; 2 * 2 * 4];
        let sprite = Arc::new(RgbaSprite {
            width: 1,
            height: 1,
            rgba: vec![255, 0, 0, 255],
        });
        let commands = [
            DrawCommand::Rect {
                rect: rect(-50, -50, 50, 50),
                color: [1, 2, 3, 255],
            },
            DrawCommand::Sprite {
                rect: rect(-4, -4, 8, 8),
                sprite,
                alpha: 1.0,
            },
            DrawCommand::Text {
                left: -3,
                top: -3,
                pixel_size: 10,
                text: "Leaderboard".to_string(),
                color: [9, 9, 9, 255],
            },
        ];
        rasterize(&mut frame, 2, 2, &commands);
        assert_eq!(frame.len(), 2 * 2 * 4);
    }

    #[test]
    fn sprite_is_scaled_nearest_neighbour() {
        let sprite = Arc::new(RgbaSprite {
            width: 2,
            height: 1,
            rgba: vec![255, 0, 0, 255, 0, 0, 255, 255],
        });
        let mut frame = vec![0u8; 4 * 2 * 4];
        rasterize(
            &mut frame,
            4,
            2,
            &[DrawCommand::Sprite {
                rect: rect(0, 0, 4, 2),
                sprite,
                alpha: 1.0,
            }],
        );
        assert_eq!(pixel_at(&frame, 4, 1, 1), [255, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 4, 2, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn text_draws_glyph_pixels_at_scale() {
        let mut frame = vec![0u8; 16 * 16 * 4];
        rasterize(
            &mut frame,
            16,
            16,
            &[DrawCommand::Text {
                left: 0,
                top: 0,
                pixel_size: 10,
                text: "!".to_string(),
                color: [250, 250, 250, 255],
            }],
        );
        assert_eq!(pixel_at(&frame, 16, 2, 0), [250, 250, 250, 255]);
        assert_eq!(pixel_at(&frame, 16, 0, 0), CLEAR_COLOR);
        assert_eq!(pixel_at(&frame, 16, 2, 6), CLEAR_COLOR);
        assert_eq!(pixel_at(&frame, 16, 2, 8), [250, 250, 250, 255]);
    }
}
