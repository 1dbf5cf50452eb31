use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use engine::{
    Actor, ActorId, Batch, Color, DrawCommand, FrameFailure, InputAction, InputSnapshot,
    OrientationAware, PlatformServiceBridge, Rect, Resizable, Screen, ScreenCommand, ScreenKey,
    StageConfig, StageHost, Vec2, Viewport, PREF_HIGH_SCORE,
};
use tracing::{debug, info, warn};

use super::context::GameContext;
use super::widgets::{
    Backdrop, ButtonActor, ButtonModel, LabelActor, LabelModel, ToastActor, GRASS_HEIGHT_RATIO,
};

pub(crate) const MAX_MISSES: u32 = 3;
pub(crate) const DEFAULT_PLAYER_NAME: &str = "Player";
pub(crate) const SHARPSHOOTER_ACHIEVEMENT: &str = "sharpshooter";
pub(crate) const SHARPSHOOTER_POINTS: i32 = 10;
const WINDOW_TITLE: &str = "Bird Hunt by Daniel Vega";
const CONTROLS_HINT: &str = "Click birds to shoot. Esc for menu";
const HINT_SECONDS: f32 = 4.0;
const BIRD_SIZE: f32 = 14.0;
const BIRD_BASE_SPEED: f32 = 40.0;
const BIRD_SPEED_STEP: f32 = 4.0;
const GOLDEN_RATIO_FRACTION: f32 = 0.618_034;
const SKY_TOP_MARGIN: f32 = 24.0;
const BIRD_COLOR: Color = Color::rgba(0.35, 0.22, 0.12, 1.0);
const PANEL_COLOR: Color = Color::rgba(0.08, 0.09, 0.12, 0.90);
const HUD_HEIGHT: f32 = 7.0;
const WINDOW_TITLE_HEIGHT: f32 = 7.0;
const WINDOW_SCORE_HEIGHT: f32 = 10.0;
const WINDOW_BUTTON_WIDTH: f32 = 64.0;
const WINDOW_BUTTON_HEIGHT: f32 = 14.0;
const WINDOW_PADDING: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bird {
    rect: Rect,
    velocity: f32,
}

/// One round of play: a single bird crosses the sky at a time, each a little
/// faster than the last. Letting `MAX_MISSES` birds escape ends the round.
#[derive(Debug, Default)]
pub(crate) struct Round {
    bird: Option<Bird>,
    spawned: u32,
    points: i32,
    misses: u32,
}

impl Round {
    pub(crate) fn points(&self) -> i32 {
        self.points
    }

    pub(crate) fn misses(&self) -> u32 {
        self.misses
    }

    pub(crate) fn is_over(&self) -> bool {
        self.misses >= MAX_MISSES
    }

    pub(crate) fn bird_rect(&self) -> Option<Rect> {
        self.bird.map(|bird| bird.rect)
    }

    pub(crate) fn tick(&mut self, delta_seconds: f32, world: (f32, f32)) {
        if self.is_over() || world.0 <= 0.0 || world.1 <= 0.0 {
            return;
        }
        let Some(bird) = self.bird.as_mut() else {
            self.bird = Some(self.spawn(world));
            return;
        };

        bird.rect.origin.x += bird.velocity * delta_seconds;
        let escaped = bird.rect.origin.x > world.0 || bird.rect.origin.x + bird.rect.width < 0.0;
        if escaped {
            self.bird = None;
            self.register_miss();
        }
    }

    /// Returns `true` when the shot hit the current bird.
    pub(crate) fn shoot(&mut self, point: Vec2) -> bool {
        if self.is_over() {
            return false;
        }
        match self.bird {
            Some(bird) if bird.rect.contains(point) => {
                self.bird = None;
                self.register_hit();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn register_hit(&mut self) {
        self.points = self.points.saturating_add(1);
    }

    pub(crate) fn register_miss(&mut self) {
        self.misses = (self.misses + 1).min(MAX_MISSES);
        debug!(misses = self.misses, "bird_escaped");
    }

    fn spawn(&mut self, world: (f32, f32)) -> Bird {
        let index = self.spawned;
        self.spawned = self.spawned.saturating_add(1);

        let floor = world.1 * GRASS_HEIGHT_RATIO;
        let span = (world.1 - floor - BIRD_SIZE - SKY_TOP_MARGIN).max(0.0);
        let altitude = (0.25 + index as f32 * GOLDEN_RATIO_FRACTION).fract();
        let speed = BIRD_BASE_SPEED + index as f32 * BIRD_SPEED_STEP;
        let (x, velocity) = if index % 2 == 0 {
            (-BIRD_SIZE, speed)
        } else {
            (world.0, -speed)
        };
        Bird {
            rect: Rect::new(x, floor + altitude * span, BIRD_SIZE, BIRD_SIZE),
            velocity,
        }
    }
}

struct BirdActor {
    round: Rc<RefCell<Round>>,
    world: (f32, f32),
}

impl Actor for BirdActor {
    fn name(&self) -> &str {
        "bird"
    }

    fn act(&mut self, delta_seconds: f32) -> Result<(), FrameFailure> {
        self.round.borrow_mut().tick(delta_seconds, self.world);
        Ok(())
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
        match self.round.borrow().bird_rect() {
            Some(rect) => batch.fill_rect(rect, BIRD_COLOR.with_alpha_scaled(parent_alpha)),
            None => Ok(()),
        }
    }

    fn as_resizable(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}

impl Resizable for BirdActor {
    fn on_resize(&mut self, _screen_width: u32, _screen_height: u32, viewport: &Viewport) {
        self.world = (viewport.world_width(), viewport.world_height());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GameOverSlots {
    panel: Rect,
    title: Vec2,
    score: Vec2,
    restart: Rect,
    exit: Rect,
}

/// Vertical worlds stack the two buttons; horizontal worlds place them side by side.
fn game_over_slots(world_width: f32, world_height: f32, vertical: bool) -> GameOverSlots {
    let center = Vec2::new(world_width * 0.5, world_height * 0.5);
    let text_block = WINDOW_TITLE_HEIGHT + WINDOW_SCORE_HEIGHT + 3.0 * WINDOW_PADDING;
    let (panel_width, panel_height) = if vertical {
        (
            WINDOW_BUTTON_WIDTH + 2.0 * WINDOW_PADDING,
            text_block + 2.0 * WINDOW_BUTTON_HEIGHT + 2.0 * WINDOW_PADDING,
        )
    } else {
        (
            2.0 * WINDOW_BUTTON_WIDTH + 3.0 * WINDOW_PADDING,
            text_block + WINDOW_BUTTON_HEIGHT + WINDOW_PADDING,
        )
    };
    let panel = Rect::centered(center, panel_width, panel_height);
    let top = panel.origin.y + panel.height;
    let title = Vec2::new(center.x, top - WINDOW_PADDING - WINDOW_TITLE_HEIGHT * 0.5);
    let score = Vec2::new(
        center.x,
        title.y - WINDOW_TITLE_HEIGHT * 0.5 - WINDOW_PADDING - WINDOW_SCORE_HEIGHT * 0.5,
    );
    let first_row =
        score.y - WINDOW_SCORE_HEIGHT * 0.5 - WINDOW_PADDING - WINDOW_BUTTON_HEIGHT * 0.5;

    let (restart_center, exit_center) = if vertical {
        (
            Vec2::new(center.x, first_row),
            Vec2::new(center.x, first_row - WINDOW_BUTTON_HEIGHT - WINDOW_PADDING),
        )
    } else {
        let offset = (WINDOW_BUTTON_WIDTH + WINDOW_PADDING) * 0.5;
        (
            Vec2::new(center.x - offset, first_row),
            Vec2::new(center.x + offset, first_row),
        )
    };
    GameOverSlots {
        panel,
        title,
        score,
        restart: Rect::centered(restart_center, WINDOW_BUTTON_WIDTH, WINDOW_BUTTON_HEIGHT),
        exit: Rect::centered(exit_center, WINDOW_BUTTON_WIDTH, WINDOW_BUTTON_HEIGHT),
    }
}

type NameSlot = Arc<Mutex<Option<Option<String>>>>;

/// End-of-round panel. Shows the player's name once the platform answers and
/// submits the score at that point.
struct GameOverWindow {
    bridge: Rc<PlatformServiceBridge>,
    points: i32,
    player: NameSlot,
    submitted: bool,
    panel: Rect,
    title: Rc<LabelModel>,
    score: Rc<LabelModel>,
    restart: Rc<ButtonModel>,
    exit: Rc<ButtonModel>,
    parts: Vec<Box<dyn Actor>>,
    world: (f32, f32),
    vertical: Option<bool>,
}

impl GameOverWindow {
    fn arrange(&mut self) {
        let Some(vertical) = self.vertical else {
            return;
        };
        let slots = game_over_slots(self.world.0, self.world.1, vertical);
        self.panel = slots.panel;
        self.title.set_center(slots.title);
        self.score.set_center(slots.score);
        self.restart.set_rect(slots.restart);
        self.exit.set_rect(slots.exit);
    }
}

impl Actor for GameOverWindow {
    fn name(&self) -> &str {
        "game_over_window"
    }

    fn act(&mut self, _delta_seconds: f32) -> Result<(), FrameFailure> {
        if self.submitted {
            return Ok(());
        }
        let Some(name) = self.player.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return Ok(());
        };
        self.submitted = true;
        let name = name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_owned());
        self.score.set_text(format!("{name}: {}", self.points));
        let dispatch = self.bridge.submit_score(i64::from(self.points));
        info!(points = self.points, dispatch = ?dispatch, "score_submitted");
        Ok(())
    }

    fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
        batch.fill_rect(self.panel, PANEL_COLOR.with_alpha_scaled(parent_alpha))?;
        for part in &self.parts {
            part.draw(batch, parent_alpha)?;
        }
        Ok(())
    }

    fn as_resizable(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }

    fn as_orientation_aware(&mut self) -> Option<&mut dyn OrientationAware> {
        Some(self)
    }
}

impl Resizable for GameOverWindow {
    fn on_resize(&mut self, _screen_width: u32, _screen_height: u32, viewport: &Viewport) {
        self.world = (viewport.world_width(), viewport.world_height());
        self.arrange();
    }
}

impl OrientationAware for GameOverWindow {
    fn on_orientation_change(&mut self, is_vertical: bool) {
        self.vertical = Some(is_vertical);
        self.arrange();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundEvent {
    Restart,
    Exit,
}

struct GameOverView {
    actor: ActorId,
    score: Rc<LabelModel>,
    restart: Rc<ButtonModel>,
    exit: Rc<ButtonModel>,
}

struct RoundStage {
    host: StageHost,
    round: Rc<RefCell<Round>>,
    hud: Rc<LabelModel>,
    hint: Rc<LabelModel>,
    hint_remaining: f32,
    game_over: Option<GameOverView>,
    leaving: bool,
}

pub(crate) struct RoundScreen {
    context: GameContext,
    stage: Option<RoundStage>,
    pending: Rc<Cell<Option<RoundEvent>>>,
}

fn hud_text(round: &Round) -> String {
    format!("Points: {}  Misses: {}/{}", round.points(), round.misses(), MAX_MISSES)
}

impl RoundScreen {
    pub(crate) fn new(context: GameContext) -> Self {
        Self {
            context,
            stage: None,
            pending: Rc::new(Cell::new(None)),
        }
    }

    fn finish_round(&mut self) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        let points = stage.round.borrow().points();
        let preferences = &self.context.preferences;
        let previous_best = preferences.get(PREF_HIGH_SCORE);
        if points > previous_best {
            preferences.put(PREF_HIGH_SCORE, points);
            self.context.flush_preferences("high_score");
        }
        if points >= SHARPSHOOTER_POINTS {
            self.context.bridge.unlock_achievement(SHARPSHOOTER_ACHIEVEMENT);
        }
        info!(points, previous_best, "round_over");

        let player: NameSlot = Arc::new(Mutex::new(None));
        let delivered = Arc::clone(&player);
        let on_name = stage.host.liveness_watch().guard("display_name", move |name| {
            *delivered.lock().unwrap_or_else(PoisonError::into_inner) = Some(name);
        });

        let title = LabelModel::new(WINDOW_TITLE, WINDOW_TITLE_HEIGHT, Color::WHITE);
        let score = LabelModel::new(format!("Score: {points}"), WINDOW_SCORE_HEIGHT, Color::WHITE);
        let restart = ButtonModel::new("Restart");
        let exit = ButtonModel::new("Exit");
        let window = GameOverWindow {
            bridge: Rc::clone(&self.context.bridge),
            points,
            player,
            submitted: false,
            panel: Rect::default(),
            parts: vec![
                LabelActor::boxed("game_over_title", &title),
                LabelActor::boxed("game_over_score", &score),
                ButtonActor::boxed(&restart),
                ButtonActor::boxed(&exit),
            ],
            title,
            score: Rc::clone(&score),
            restart: Rc::clone(&restart),
            exit: Rc::clone(&exit),
            world: (0.0, 0.0),
            vertical: None,
        };
        let actor = stage.host.add_actor(Box::new(window));
        stage.game_over = Some(GameOverView {
            actor,
            score,
            restart,
            exit,
        });
        self.context.bridge.get_display_name(on_name);
    }

    fn leave(&mut self, event: RoundEvent) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        if stage.leaving {
            return;
        }
        stage.leaving = true;
        if let Some(view) = &stage.game_over {
            view.restart.set_visible(false);
            view.exit.set_visible(false);
        }
        debug!(event = ?event, "round_leaving");
        let pending = Rc::clone(&self.pending);
        stage.host.fade_out(move || pending.set(Some(event)));
    }

    fn restart(&mut self) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        if let Some(view) = stage.game_over.take() {
            info!(previous = %view.score.text(), "round_restarted");
            stage.host.remove_actor(view.actor);
        }
        *stage.round.borrow_mut() = Round::default();
        stage.leaving = false;
        stage.host.fade_in(|| {});
    }

    fn handle_input(&mut self, input: &InputSnapshot) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        if stage.leaving {
            return;
        }
        let click = input
            .click_position_px()
            .and_then(|(x, y)| stage.host.viewport().screen_to_world(x, y));

        let event = match &stage.game_over {
            Some(view) => {
                let clicked = |button: &ButtonModel| click.is_some_and(|point| button.hit(point));
                if input.pressed(InputAction::Confirm) || clicked(&view.restart) {
                    Some(RoundEvent::Restart)
                } else if input.pressed(InputAction::Back) || clicked(&view.exit) {
                    Some(RoundEvent::Exit)
                } else {
                    None
                }
            }
            None => {
                if let Some(point) = click {
                    if stage.round.borrow_mut().shoot(point) {
                        stage.hint_remaining = 0.0;
                    }
                }
                input.pressed(InputAction::Back).then_some(RoundEvent::Exit)
            }
        };
        if let Some(event) = event {
            self.leave(event);
        }
    }
}

impl Screen for RoundScreen {
    fn show(&mut self, window_width: u32, window_height: u32) {
        let preferences = Arc::clone(&self.context.preferences);
        let mut host = StageHost::new(StageConfig::named("round"), preferences);
        if let Err(error) = host.resize(window_width, window_height) {
            warn!(error = %error, "round_initial_resize_failed");
        }

        let round = Rc::new(RefCell::new(Round::default()));
        let hud = LabelModel::new(hud_text(&round.borrow()), HUD_HEIGHT, Color::WHITE);
        let show_hint = self.context.controls_hint.take();
        let hint = LabelModel::new(
            if show_hint { CONTROLS_HINT } else { "" },
            HUD_HEIGHT,
            Color::WHITE,
        );
        host.add_actor(Box::new(Backdrop::default()));
        host.add_actor(Box::new(BirdActor {
            round: Rc::clone(&round),
            world: (0.0, 0.0),
        }));
        host.add_actor(LabelActor::boxed("hud", &hud));
        host.add_actor(LabelActor::boxed("controls_hint", &hint));
        host.add_actor(Box::new(ToastActor::new(Arc::clone(&self.context.toasts))));
        host.fade_in(|| {});
        info!(show_hint, "round_started");

        self.pending.set(None);
        self.stage = Some(RoundStage {
            host,
            round,
            hud,
            hint,
            hint_remaining: if show_hint { HINT_SECONDS } else { 0.0 },
            game_over: None,
            leaving: false,
        });
    }

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> ScreenCommand {
        let Some(stage) = self.stage.as_mut() else {
            return ScreenCommand::None;
        };
        stage.host.advance(fixed_dt_seconds);

        match self.pending.take() {
            Some(RoundEvent::Exit) => return ScreenCommand::SwitchTo(ScreenKey::A),
            Some(RoundEvent::Restart) => self.restart(),
            None => {}
        }

        self.handle_input(input);

        let Some(stage) = self.stage.as_mut() else {
            return ScreenCommand::None;
        };
        let world = stage.host.viewport();
        let (world_width, world_height) = (world.world_width(), world.world_height());
        stage.hud.set_text(hud_text(&stage.round.borrow()));
        stage
            .hud
            .set_center(Vec2::new(world_width * 0.5, world_height - HUD_HEIGHT * 1.5));
        stage
            .hint
            .set_center(Vec2::new(world_width * 0.5, world_height - HUD_HEIGHT * 3.5));
        if stage.hint_remaining > 0.0 {
            stage.hint_remaining -= fixed_dt_seconds;
        }
        if stage.hint_remaining <= 0.0 {
            stage.hint.set_text("");
        }

        let over = stage.round.borrow().is_over();
        if over && stage.game_over.is_none() {
            self.finish_round();
        }
        ScreenCommand::None
    }

    fn resize(&mut self, window_width: u32, window_height: u32) {
        if let Some(stage) = self.stage.as_mut() {
            if let Err(error) = stage.host.resize(window_width, window_height) {
                warn!(error = %error, "round_resize_failed");
            }
        }
    }

    fn render(&mut self) -> &[DrawCommand] {
        match self.stage.as_mut() {
            Some(stage) => {
                stage.host.render();
                stage.host.frame()
            }
            None => &[],
        }
    }

    fn hide(&mut self) {
        if let Some(mut stage) = self.stage.take() {
            stage.host.teardown();
        }
    }
}
