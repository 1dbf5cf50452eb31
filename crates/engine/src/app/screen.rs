use tracing::info;

use crate::stage::DrawCommand;

use super::input::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenKey {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenCommand {
    None,
    SwitchTo(ScreenKey),
    Quit,
}

/// A full-window screen. Screens usually own a `StageHost` that lives between `show`
/// and `hide`.
pub trait Screen {
    fn show(&mut self, window_width: u32, window_height: u32);
    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> ScreenCommand;
    fn resize(&mut self, window_width: u32, window_height: u32);
    /// Draw commands for this frame, already in window pixels.
    fn render(&mut self) -> &[DrawCommand];
    fn hide(&mut self);
    fn title(&self) -> Option<String> {
        None
    }
}

struct ScreenRuntime {
    screen: Box<dyn Screen>,
    is_shown: bool,
}

pub(crate) struct ScreenMachine {
    screen_a: ScreenRuntime,
    screen_b: ScreenRuntime,
    active_screen: ScreenKey,
    window_size: (u32, u32),
}

impl ScreenMachine {
    pub(crate) fn new(
        screen_a: Box<dyn Screen>,
        screen_b: Box<dyn Screen>,
        active_screen: ScreenKey,
    ) -> Self {
        Self {
            screen_a: ScreenRuntime {
                screen: screen_a,
                is_shown: false,
            },
            screen_b: ScreenRuntime {
                screen: screen_b,
                is_shown: false,
            },
            active_screen,
            window_size: (0, 0),
        }
    }

    pub(crate) fn active_screen(&self) -> ScreenKey {
        self.active_screen
    }

    pub(crate) fn show_active(&mut self, window_width: u32, window_height: u32) {
        self.window_size = (window_width, window_height);
        let runtime = self.active_runtime_mut();
        if runtime.is_shown {
            return;
        }
        runtime.screen.show(window_width, window_height);
        runtime.is_shown = true;
    }

    pub(crate) fn resize(&mut self, window_width: u32, window_height: u32) {
        self.window_size = (window_width, window_height);
        let runtime = self.active_runtime_mut();
        if runtime.is_shown {
            runtime.screen.resize(window_width, window_height);
        }
    }

    pub(crate) fn update_active(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
    ) -> ScreenCommand {
        self.active_runtime_mut()
            .screen
            .update(fixed_dt_seconds, input)
    }

    pub(crate) fn render_active(&mut self) -> &[DrawCommand] {
        self.active_runtime_mut().screen.render()
    }

    pub(crate) fn title_active(&self) -> Option<String> {
        self.active_runtime_ref().screen.title()
    }

    /// Hides the current screen and shows `next_screen` at the last known window size.
    pub(crate) fn switch_to(&mut self, next_screen: ScreenKey) -> bool {
        if self.active_screen == next_screen {
            return false;
        }

        let previous = self.active_runtime_mut();
        if previous.is_shown {
            previous.screen.hide();
            previous.is_shown = false;
        }
        self.active_screen = next_screen;
        let (width, height) = self.window_size;
        self.show_active(width, height);
        info!(screen = ?next_screen, "screen_switched");
        true
    }

    pub(crate) fn shutdown_all(&mut self) {
        for runtime in [&mut self.screen_a, &mut self.screen_b] {
            if runtime.is_shown {
                runtime.screen.hide();
                runtime.is_shown = false;
            }
        }
    }

    fn active_runtime_mut(&mut self) -> &mut ScreenRuntime {
        match self.active_screen {
            ScreenKey::A => &mut self.screen_a,
            ScreenKey::B => &mut self.screen_b,
        }
    }

    fn active_runtime_ref(&self) -> &ScreenRuntime {
        match self.active_screen {
            ScreenKey::A => &self.screen_a,
            ScreenKey::B => &self.screen_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct JournalScreen {
        label: &'static str,
        journal: Journal,
        command: ScreenCommand,
        commands: Vec<DrawCommand>,
    }

    impl JournalScreen {
        fn boxed(
            label: &'static str,
            journal: &Journal,
            command: ScreenCommand,
        ) -> Box<dyn Screen> {
            Box::new(Self {
                label,
                journal: Rc::clone(journal),
                command,
                commands: Vec::new(),
            })
        }

        fn log(&self, event: String) {
            self.journal.borrow_mut().push(format!("{}:{event}", self.label));
        }
    }

    impl Screen for JournalScreen {
        fn show(&mut self, window_width: u32, window_height: u32) {
            self.log(format!("show {window_width}x{window_height}"));
        }

        fn update(&mut self, _fixed_dt_seconds: f32, _input: &InputSnapshot) -> ScreenCommand {
            self.log("update".to_string());
            self.command
        }

        fn resize(&mut self, window_width: u32, window_height: u32) {
            self.log(format!("resize {window_width}x{window_height}"));
        }

        fn render(&mut self) -> &[DrawCommand] {
            &self.commands
        }

        fn hide(&mut self) {
            self.log("hide".to_string());
        }
    }

    #[test]
    fn switch_hides_previous_and_shows_next_at_window_size() {
        let journal = Journal::default();
        let mut machine = ScreenMachine::new(
            JournalScreen::boxed("a", &journal, ScreenCommand::SwitchTo(ScreenKey::B)),
            JournalScreen::boxed("b", &journal, ScreenCommand::None),
            ScreenKey::A,
        );
        machine.show_active(640, 480);
        let command = machine.update_active(0.016, &InputSnapshot::empty());
        if let ScreenCommand::SwitchTo(next) = command {
            assert!(machine.switch_to(next));
        }

        assert_eq!(machine.active_screen(), ScreenKey::B);
        assert_eq!(
            *journal.borrow(),
            vec!["a:show 640x480", "a:update", "a:hide", "b:show 640x480"]
        );
    }

    #[test]
    fn switching_to_active_screen_is_a_no_op() {
        let journal = Journal::default();
        let mut machine = ScreenMachine::new(
            JournalScreen::boxed("a", &journal, ScreenCommand::None),
            JournalScreen::boxed("b", &journal, ScreenCommand::None),
            ScreenKey::A,
        );
        machine.show_active(100, 100);
        assert!(!machine.switch_to(ScreenKey::A));
        assert_eq!(*journal.borrow(), vec!["a:show 100x100"]);
    }

    #[test]
    fn resize_reaches_only_the_shown_screen() {
        let journal = Journal::default();
        let mut machine = ScreenMachine::new(
            JournalScreen::boxed("a", &journal, ScreenCommand::None),
            JournalScreen::boxed("b", &journal, ScreenCommand::None),
            ScreenKey::A,
        );
        machine.resize(300, 200);
        machine.show_active(300, 200);
        machine.resize(320, 240);

        assert_eq!(*journal.borrow(), vec!["a:show 300x200", "a:resize 320x240"]);
    }

    #[test]
    fn shutdown_hides_shown_screens_once() {
        let journal = Journal::default();
        let mut machine = ScreenMachine::new(
            JournalScreen::boxed("a", &journal, ScreenCommand::None),
            JournalScreen::boxed("b", &journal, ScreenCommand::None),
            ScreenKey::B,
        );
        machine.show_active(10, 10);
        machine.shutdown_all();
        machine.shutdown_all();

        assert_eq!(*journal.borrow(), vec!["b:show 10x10", "b:hide"]);
    }
}
