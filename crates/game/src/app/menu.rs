use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};

use engine::{
    Actor, Batch, Color, Disposable, DrawCommand, FrameFailure, InputAction, InputSnapshot,
    ListenerId, OrientationAware, Preferences, Rect, Resizable, Screen, ScreenCommand, ScreenKey,
    StageConfig, StageHost, Vec2, Viewport, PREF_FIRST_GAME, PREF_GAME_SCALE, PREF_HIGH_SCORE,
    PREF_PGS_AUTH,
};
use tracing::{debug, info, warn};

use super::context::GameContext;
use super::widgets::{
    AvatarActor, AvatarSlot, Backdrop, ButtonActor, ButtonModel, LabelActor, LabelModel,
    ToastActor,
};

pub(crate) const TITLE_TEXT: &str = "Bird Hunt";
const TITLE_HEIGHT: f32 = 16.0;
const LABEL_HEIGHT: f32 = 7.0;
const BUTTON_WIDTH: f32 = 76.0;
const BUTTON_HEIGHT: f32 = 14.0;
const ROW_GAP: f32 = 5.0;
const TOP_MARGIN: f32 = 24.0;
const ZOOM_STEP: f32 = 0.1;
const MIN_ZOOM: f32 = 0.5;
const MAX_ZOOM: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuButton {
    Start,
    Leaderboard,
    Achievements,
    SignIn,
    ZoomOut,
    ZoomIn,
}

const MENU_BUTTONS: [MenuButton; 6] = [
    MenuButton::Start,
    MenuButton::Leaderboard,
    MenuButton::Achievements,
    MenuButton::SignIn,
    MenuButton::ZoomOut,
    MenuButton::ZoomIn,
];

impl MenuButton {
    fn label(self) -> &'static str {
        match self {
            MenuButton::Start => "Start",
            MenuButton::Leaderboard => "Leaderboard",
            MenuButton::Achievements => "Achievements",
            MenuButton::SignIn => "Sign in",
            MenuButton::ZoomOut => "Zoom -",
            MenuButton::ZoomIn => "Zoom +",
        }
    }

    fn for_action(action: InputAction) -> Option<Self> {
        match action {
            InputAction::Confirm => Some(MenuButton::Start),
            InputAction::Leaderboard => Some(MenuButton::Leaderboard),
            InputAction::Achievements => Some(MenuButton::Achievements),
            InputAction::SignIn => Some(MenuButton::SignIn),
            InputAction::ZoomOut => Some(MenuButton::ZoomOut),
            InputAction::ZoomIn => Some(MenuButton::ZoomIn),
            InputAction::Back => None,
        }
    }
}

/// Widget positions for one orientation, in world units.
#[derive(Debug, Clone, PartialEq)]
struct MenuSlots {
    title: Vec2,
    buttons: Vec<Rect>,
    high_score: Vec2,
}

/// Horizontal worlds put the title left of the button column; vertical worlds stack
/// the title above it. The two zoom buttons share the last row.
fn menu_slots(world_width: f32, world_height: f32, vertical: bool) -> MenuSlots {
    let (title, column_x, column_top) = if vertical {
        let title = Vec2::new(world_width * 0.5, world_height - TOP_MARGIN);
        (title, world_width * 0.5, title.y - TITLE_HEIGHT - 2.0 * ROW_GAP)
    } else {
        let title = Vec2::new(world_width * 0.3, world_height - TOP_MARGIN);
        (title, world_width * 0.7, world_height - TOP_MARGIN * 0.5)
    };

    let row_center =
        |row: usize| column_top - BUTTON_HEIGHT * 0.5 - row as f32 * (BUTTON_HEIGHT + ROW_GAP);
    let mut buttons = Vec::with_capacity(MENU_BUTTONS.len());
    for row in 0..4 {
        buttons.push(Rect::centered(
            Vec2::new(column_x, row_center(row)),
            BUTTON_WIDTH,
            BUTTON_HEIGHT,
        ));
    }
    let half = (BUTTON_WIDTH - ROW_GAP) * 0.5;
    let zoom_y = row_center(4);
    buttons.push(Rect::centered(
        Vec2::new(column_x - (half + ROW_GAP) * 0.5, zoom_y),
        half,
        BUTTON_HEIGHT,
    ));
    buttons.push(Rect::centered(
        Vec2::new(column_x + (half + ROW_GAP) * 0.5, zoom_y),
        half,
        BUTTON_HEIGHT,
    ));

    MenuSlots {
        title,
        buttons,
        high_score: Vec2::new(column_x, row_center(5)),
    }
}

pub(crate) fn next_zoom(current: f32, step: f32) -> f32 {
    (((current + step) * 10.0).round() / 10.0).clamp(MIN_ZOOM, MAX_ZOOM)
}

fn high_score_text(preferences: &Preferences) -> String {
    format!("High score: {}", preferences.get(PREF_HIGH_SCORE))
}

#[derive(Clone)]
struct MenuWidgets {
    title: Rc<LabelModel>,
    high_score: Rc<LabelModel>,
    buttons: Vec<(MenuButton, Rc<ButtonModel>)>,
}

impl MenuWidgets {
    fn new(preferences: &Preferences) -> Self {
        Self {
            title: LabelModel::new(TITLE_TEXT, TITLE_HEIGHT, Color::WHITE),
            high_score: LabelModel::new(high_score_text(preferences), LABEL_HEIGHT, Color::WHITE),
            buttons: MENU_BUTTONS
                .iter()
                .map(|kind| (*kind, ButtonModel::new(kind.label())))
                .collect(),
        }
    }

    fn button(&self, kind: MenuButton) -> Option<&Rc<ButtonModel>> {
        self.buttons
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, model)| model)
    }

    fn hit(&self, point: Vec2) -> Option<MenuButton> {
        self.buttons
            .iter()
            .find(|(_, model)| model.hit(point))
            .map(|(kind, _)| *kind)
    }
}

/// Rebuilds the menu arrangement on orientation changes and owns the `pgs_auth`
/// listener that greys out platform buttons.
struct MenuLayout {
    widgets: MenuWidgets,
    preferences: Arc<Preferences>,
    auth_listener: Option<ListenerId>,
    world: (f32, f32),
    vertical: Option<bool>,
}

impl MenuLayout {
    fn new(widgets: MenuWidgets, preferences: Arc<Preferences>) -> Self {
        let gated: Vec<_> = [MenuButton::Leaderboard, MenuButton::Achievements]
            .iter()
            .filter_map(|kind| widgets.button(*kind))
            .map(|model| model.enabled_flag())
            .collect();
        let sign_in = widgets.button(MenuButton::SignIn).map(|model| model.enabled_flag());

        let apply = move |authenticated: bool| {
            for flag in &gated {
                flag.store(authenticated, Ordering::Release);
            }
            if let Some(flag) = &sign_in {
                flag.store(!authenticated, Ordering::Release);
            }
        };
        apply(preferences.get(PREF_PGS_AUTH));
        let auth_listener = preferences.add_listener(PREF_PGS_AUTH, apply);

        Self {
            widgets,
            preferences,
            auth_listener: Some(auth_listener),
            world: (0.0, 0.0),
            vertical: None,
        }
    }

    fn arrange(&self) {
        let Some(vertical) = self.vertical else {
            return;
        };
        let slots = menu_slots(self.world.0, self.world.1, vertical);
        self.widgets.title.set_center(slots.title);
        self.widgets.high_score.set_center(slots.high_score);
        for ((_, model), rect) in self.widgets.buttons.iter().zip(slots.buttons) {
            model.set_rect(rect);
        }
    }
}

impl Actor for MenuLayout {
    fn name(&self) -> &str {
        "menu_layout"
    }

    fn draw(&self, _batch: &mut Batch, _parent_alpha: f32) -> Result<(), FrameFailure> {
        Ok(())
    }

    fn as_resizable(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        Some(self)
    }

    fn as_orientation_aware(&mut self) -> Option<&mut dyn OrientationAware> {
        Some(self)
    }
}

impl Resizable for MenuLayout {
    fn on_resize(&mut self, _screen_width: u32, _screen_height: u32, viewport: &Viewport) {
        self.world = (viewport.world_width(), viewport.world_height());
        self.arrange();
    }
}

impl OrientationAware for MenuLayout {
    fn on_orientation_change(&mut self, is_vertical: bool) {
        info!(is_vertical, "menu_layout_rebuilt");
        self.vertical = Some(is_vertical);
        self.arrange();
    }
}

impl Disposable for MenuLayout {
    fn dispose(&mut self) {
        if let Some(listener) = self.auth_listener.take() {
            self.preferences.remove_listener(PREF_PGS_AUTH, listener);
        }
    }
}

struct MenuStage {
    host: StageHost,
    widgets: MenuWidgets,
    avatar: AvatarSlot,
    avatar_requested: bool,
    leaving: bool,
}

pub(crate) struct MenuScreen {
    context: GameContext,
    stage: Option<MenuStage>,
    pending: Rc<Cell<Option<ScreenCommand>>>,
}

impl MenuScreen {
    pub(crate) fn new(context: GameContext) -> Self {
        Self {
            context,
            stage: None,
            pending: Rc::new(Cell::new(None)),
        }
    }

    fn activate(&mut self, button: MenuButton) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        if stage.leaving {
            return;
        }
        debug!(button = button.label(), "menu_button_activated");

        match button {
            MenuButton::Start => {
                stage.leaving = true;
                let preferences = &self.context.preferences;
                if preferences.get(PREF_FIRST_GAME) {
                    preferences.put(PREF_FIRST_GAME, false);
                    self.context.flush_preferences("first_game");
                    self.context.controls_hint.set(true);
                    info!("first_game_routed_to_controls_hint");
                }
                let pending = Rc::clone(&self.pending);
                stage
                    .host
                    .fade_out(move || pending.set(Some(ScreenCommand::SwitchTo(ScreenKey::B))));
            }
            // Disabled platform buttons still forward; the bridge explains why nothing opens.
            MenuButton::Leaderboard => {
                self.context.bridge.show_leaderboard();
            }
            MenuButton::Achievements => {
                self.context.bridge.show_achievements();
            }
            MenuButton::SignIn => {
                if !self.context.bridge.is_authenticated() {
                    self.context.bridge.sign_in();
                }
            }
            MenuButton::ZoomOut => self.change_zoom(-ZOOM_STEP),
            MenuButton::ZoomIn => self.change_zoom(ZOOM_STEP),
        }
    }

    fn change_zoom(&self, step: f32) {
        let preferences = &self.context.preferences;
        let current = preferences.get(PREF_GAME_SCALE);
        let next = next_zoom(current, step);
        if next == current {
            return;
        }
        preferences.put(PREF_GAME_SCALE, next);
        self.context.flush_preferences("game_scale");
    }

    fn request_avatar(&mut self) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        if stage.avatar_requested || !self.context.bridge.is_authenticated() {
            return;
        }
        stage.avatar_requested = true;
        let slot = Arc::clone(&stage.avatar);
        let on_image = stage.host.liveness_watch().guard("profile_image", move |image| {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = image;
        });
        self.context.bridge.get_profile_image(on_image);
    }
}

impl Screen for MenuScreen {
    fn show(&mut self, window_width: u32, window_height: u32) {
        let preferences = Arc::clone(&self.context.preferences);
        let mut host = StageHost::new(StageConfig::named("main_menu"), Arc::clone(&preferences));
        if let Err(error) = host.resize(window_width, window_height) {
            warn!(error = %error, "menu_initial_resize_failed");
        }

        let widgets = MenuWidgets::new(&preferences);
        let avatar: AvatarSlot = Arc::new(Mutex::new(None));
        host.add_actor(Box::new(Backdrop::default()));
        host.add_actor(Box::new(MenuLayout::new(widgets.clone(), preferences)));
        host.add_actor(LabelActor::boxed("title", &widgets.title));
        for (_, model) in &widgets.buttons {
            host.add_actor(ButtonActor::boxed(model));
        }
        host.add_actor(LabelActor::boxed("high_score", &widgets.high_score));
        host.add_actor(Box::new(AvatarActor::new(Arc::clone(&avatar))));
        host.add_actor(Box::new(ToastActor::new(Arc::clone(&self.context.toasts))));
        host.fade_in(|| {});

        self.pending.set(None);
        self.stage = Some(MenuStage {
            host,
            widgets,
            avatar,
            avatar_requested: false,
            leaving: false,
        });
    }

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> ScreenCommand {
        let Some(stage) = self.stage.as_mut() else {
            return ScreenCommand::None;
        };
        let report = stage.host.advance(fixed_dt_seconds);
        if report.first_frame {
            info!(
                high_score = self.context.preferences.get(PREF_HIGH_SCORE),
                authenticated = self.context.bridge.is_authenticated(),
                "menu_ready"
            );
        }
        if let Some(command) = self.pending.take() {
            return command;
        }

        if input.pressed(InputAction::Back) {
            return ScreenCommand::Quit;
        }
        let clicked = input
            .click_position_px()
            .and_then(|(x, y)| stage.host.viewport().screen_to_world(x, y))
            .and_then(|point| stage.widgets.hit(point));
        let pressed = [
            InputAction::Confirm,
            InputAction::Leaderboard,
            InputAction::Achievements,
            InputAction::SignIn,
            InputAction::ZoomOut,
            InputAction::ZoomIn,
        ]
        .into_iter()
        .filter(|action| input.pressed(*action))
        .filter_map(MenuButton::for_action);

        let activated: Vec<_> = clicked.into_iter().chain(pressed).collect();
        for button in activated {
            self.activate(button);
        }
        self.request_avatar();
        ScreenCommand::None
    }

    fn resize(&mut self, window_width: u32, window_height: u32) {
        if let Some(stage) = self.stage.as_mut() {
            if let Err(error) = stage.host.resize(window_width, window_height) {
                warn!(error = %error, "menu_resize_failed");
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
