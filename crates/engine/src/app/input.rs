#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Confirm,
    Back,
    Leaderboard,
    Achievements,
    SignIn,
    ZoomIn,
    ZoomOut,
}

const ACTION_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn clear(&mut self) {
        self.down = [false; ACTION_COUNT];
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::Confirm => 0,
            InputAction::Back => 1,
            InputAction::Leaderboard => 2,
            InputAction::Achievements => 3,
            InputAction::SignIn => 4,
            InputAction::ZoomIn => 5,
            InputAction::ZoomOut => 6,
        }
    }
}

/// Per-tick input. Actions and clicks are edge-triggered: they are set for exactly one
/// tick after the press.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    pressed: ActionStates,
    cursor_position_px: Option<(f32, f32)>,
    click_pressed: bool,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        quit_requested: bool,
        pressed: ActionStates,
        cursor_position_px: Option<(f32, f32)>,
        click_pressed: bool,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            pressed,
            cursor_position_px,
            click_pressed,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn with_pressed(mut self, action: InputAction) -> Self {
        self.pressed.set(action, true);
        self
    }

    /// A click at the given window position.
    pub fn with_click_at(mut self, x: f32, y: f32) -> Self {
        self.cursor_position_px = Some((x, y));
        self.click_pressed = true;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<(f32, f32)> {
        self.cursor_position_px
    }

    pub fn click_pressed(&self) -> bool {
        self.click_pressed
    }

    /// Cursor position of this tick's click, if there was one.
    pub fn click_position_px(&self) -> Option<(f32, f32)> {
        if self.click_pressed {
            self.cursor_position_px
        } else {
            None
        }
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}
