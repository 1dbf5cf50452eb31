use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use engine::{
    Actor, Batch, Color, FrameFailure, Rect, Resizable, RgbaSprite, UserNotice, Vec2, Viewport,
};
use tracing::debug;

use super::context::ToastQueue;

const BUTTON_COLOR: Color = Color::rgba(0.20, 0.42, 0.30, 0.95);
const BUTTON_DISABLED_COLOR: Color = Color::rgba(0.28, 0.30, 0.32, 0.80);
const BUTTON_TEXT_COLOR: Color = Color::WHITE;
const BUTTON_DISABLED_TEXT_COLOR: Color = Color::rgba(0.65, 0.66, 0.68, 1.0);
const BUTTON_TEXT_HEIGHT_RATIO: f32 = 0.45;
const SKY_COLOR: Color = Color::rgba(0.42, 0.66, 0.86, 1.0);
const GRASS_COLOR: Color = Color::rgba(0.30, 0.55, 0.24, 1.0);
pub(crate) const GRASS_HEIGHT_RATIO: f32 = 0.18;
const TOAST_SECONDS: f32 = 2.5;
const TOAST_HEIGHT: f32 = 16.0;
const TOAST_TEXT_HEIGHT: f32 = 6.0;
const TOAST_COLOR: Color = Color::rgba(0.05, 0.05, 0.07, 0.85);
const AVATAR_SIZE: f32 = 24.0;
const AVATAR_MARGIN: f32 = 6.0;

/// Shared, screen-owned state of one button. The screen hit-tests it; a
/// `ButtonActor` draws it.
#[derive(Debug)]
pub(crate) struct ButtonModel {
    label: &'static str,
    rect: Cell<Rect>,
    visible: Cell<bool>,
    enabled: Arc<AtomicBool>,
}

impl ButtonModel {
    pub(crate) fn new(label: &'static str) -> Rc<Self> {
        Rc::new(Self {
            label,
            rect: Cell::new(Rect::default()),
            visible: Cell::new(true),
            enabled: Arc::new(AtomicBool::new(true)),
        })
    }

    pub(crate) fn rect(&self) -> Rect {
        self.rect.get()
    }

    pub(crate) fn set_rect(&self, rect: Rect) {
        self.rect.set(rect);
    }

    pub(crate) fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub(crate) fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Handle for listeners that flip the enabled flag off the loop thread.
    pub(crate) fn enabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    pub(crate) fn hit(&self, point: Vec2) -> bool {
        self.is_visible() && self.rect().contains(point)
    }
}

pub(crate) struct ButtonActor {
    model: Rc<ButtonModel>,
}

impl ButtonActor {
    pub(crate) fn boxed(model: &Rc<ButtonModel>) -> Box<dyn Actor> {
        Box::new(Self {
            model: Rc::clone(model),
        })
    }
}

impl Actor for ButtonActor {
    fn name(&self) -> &str {
        self.model.label
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
        if !self.model.is_visible() {
            return Ok(());
        }
        let rect = self.model.rect();
        let (fill, text) = if self.model.is_enabled() {
            (BUTTON_COLOR, BUTTON_TEXT_COLOR)
        } else {
            (BUTTON_DISABLED_COLOR, BUTTON_DISABLED_TEXT_COLOR)
        };
        batch.fill_rect(rect, fill.with_alpha_scaled(parent_alpha))?;
        draw_centered_text(
            batch,
            rect.center(),
            rect.height * BUTTON_TEXT_HEIGHT_RATIO,
            self.model.label,
            text.with_alpha_scaled(parent_alpha),
        )
    }
}

#[derive(Debug)]
pub(crate) struct LabelModel {
    text: RefCell<String>,
    center: Cell<Vec2>,
    height: f32,
    color: Color,
}

impl LabelModel {
    pub(crate) fn new(text: impl Into<String>, height: f32, color: Color) -> Rc<Self> {
        Rc::new(Self {
            text: RefCell::new(text.into()),
            center: Cell::new(Vec2::default()),
            height,
            color,
        })
    }

    pub(crate) fn text(&self) -> String {
        self.text.borrow().clone()
    }

    pub(crate) fn set_text(&self, text: impl Into<String>) {
        *self.text.borrow_mut() = text.into();
    }

    pub(crate) fn center(&self) -> Vec2 {
        self.center.get()
    }

    pub(crate) fn set_center(&self, center: Vec2) {
        self.center.set(center);
    }
}

pub(crate) struct LabelActor {
    name: &'static str,
    model: Rc<LabelModel>,
}

impl LabelActor {
    pub(crate) fn boxed(name: &'static str, model: &Rc<LabelModel>) -> Box<dyn Actor> {
        Box::new(Self {
            name,
            model: Rc::clone(model),
        })
    }
}

impl Actor for LabelActor {
    fn name(&self) -> &str {
        self.name
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
        let text = self.model.text.borrow();
        if text.is_empty() {
            return Ok(());
        }
        draw_centered_text(
            batch,
            self.model.center(),
            self.model.height,
            &text,
            self.model.color.with_alpha_scaled(parent_alpha),
        )
    }
}

/// Full-world sky and grass strip.
#[derive(Default)]
pub(crate) struct Backdrop {
    world: (f32, f32),
}

impl Actor for Backdrop {
    fn name(&self) -> &str {
        "backdrop"
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
        let (width, height) = self.world;
        batch.fill_rect(
            Rect::new(0.0, 0.0, width, height),
            SKY_COLOR.with_alpha_scaled(parent_alpha),
        )?;
        batch.fill_rect(
            Rect::new(0.0, 0.0, width, height * GRASS_HEIGHT_RATIO),
            GRASS_COLOR.with_alpha_scaled(parent_alpha),
        )
    }

    fn as_resizable(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}

impl Resizable for Backdrop {
    fn on_resize(&mut self, _screen_width: u32, _screen_height: u32, viewport: &Viewport) {
        self.world = (viewport.world_width(), viewport.world_height());
    }
}

/// Shows queued notices one at a time along the bottom edge.
pub(crate) struct ToastActor {
    queue: Arc<ToastQueue>,
    current: Option<(UserNotice, f32)>,
    world_width: f32,
}

impl ToastActor {
    pub(crate) fn new(queue: Arc<ToastQueue>) -> Self {
        Self {
            queue,
            current: None,
            world_width: 0.0,
        }
    }

    pub(crate) fn showing(&self) -> Option<UserNotice> {
        self.current.map(|(notice, _)| notice)
    }
}

impl Actor for ToastActor {
    fn name(&self) -> &str {
        "toast"
    }

    fn act(&mut self, delta_seconds: f32) -> Result<(), FrameFailure> {
        if let Some((_, remaining)) = &mut self.current {
            *remaining -= delta_seconds;
            if *remaining <= 0.0 {
                self.current = None;
            }
        }
        if self.current.is_none() {
            self.current = self.queue.pop().map(|notice| (notice, TOAST_SECONDS));
            if self.current.is_some() {
                debug!(queued = self.queue.len(), "toast_shown");
            }
        }
        Ok(())
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
        let Some(notice) = self.showing() else {
            return Ok(());
        };
        let message = notice.message();
        let width = Batch::text_width(message, TOAST_TEXT_HEIGHT) + TOAST_TEXT_HEIGHT * 2.0;
        let rect = Rect::centered(
            Vec2::new(self.world_width * 0.5, TOAST_HEIGHT),
            width,
            TOAST_HEIGHT,
        );
        batch.fill_rect(rect, TOAST_COLOR.with_alpha_scaled(parent_alpha))?;
        draw_centered_text(
            batch,
            rect.center(),
            TOAST_TEXT_HEIGHT,
            message,
            Color::WHITE.with_alpha_scaled(parent_alpha),
        )
    }

    fn as_resizable(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}

impl Resizable for ToastActor {
    fn on_resize(&mut self, _screen_width: u32, _screen_height: u32, viewport: &Viewport) {
        self.world_width = viewport.world_width();
    }
}

/// Mailbox a profile-image completion writes into from whatever thread it runs on.
pub(crate) type AvatarSlot = Arc<Mutex<Option<Arc<RgbaSprite>>>>;

/// Player picture in the top-right corner, once one has arrived.
pub(crate) struct AvatarActor {
    slot: AvatarSlot,
    world: (f32, f32),
}

impl AvatarActor {
    pub(crate) fn new(slot: AvatarSlot) -> Self {
        Self {
            slot,
            world: (0.0, 0.0),
        }
    }
}

impl Actor for AvatarActor {
    fn name(&self) -> &str {
        "avatar"
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
        let sprite = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sprite) = sprite else {
            return Ok(());
        };
        let (width, height) = self.world;
        let rect = Rect::new(
            width - AVATAR_SIZE - AVATAR_MARGIN,
            height - AVATAR_SIZE - AVATAR_MARGIN,
            AVATAR_SIZE,
            AVATAR_SIZE,
        );
        batch.draw_sprite(rect, &sprite, parent_alpha)
    }

    fn as_resizable(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}

impl Resizable for AvatarActor {
    fn on_resize(&mut self, _screen_width: u32, _screen_height: u32, viewport: &Viewport) {
        self.world = (viewport.world_width(), viewport.world_height());
    }
}

pub(crate) fn draw_centered_text(
    batch: &mut Batch,
    center: Vec2,
    height: f32,
    text: &str,
    color: Color,
) -> Result<(), FrameFailure> {
    let width = Batch::text_width(text, height);
    batch.draw_text(
        Vec2::new(center.x - width * 0.5, center.y + height * 0.5),
        height,
        text,
        color,
    )
}
