use std::collections::VecDeque;

pub const FADE_DURATION_SECONDS: f32 = 0.20;
pub const VISIBLE_ALPHA: f32 = 1.0;
pub const HIDDEN_ALPHA: f32 = 0.0;

pub type FadeCallback = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    FadingIn,
    FadingOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeDirection {
    In,
    Out,
}

impl FadeDirection {
    fn target_alpha(self) -> f32 {
        match self {
            FadeDirection::In => VISIBLE_ALPHA,
            FadeDirection::Out => HIDDEN_ALPHA,
        }
    }
}

struct ActiveFade {
    direction: FadeDirection,
    start_alpha: f32,
    elapsed: f32,
    on_complete: FadeCallback,
}

/// Linear opacity animation advanced by the frame tick.
///
/// A request made while another fade is running is queued and starts on the tick after
/// the running one settles; every callback runs exactly once, in request order.
pub struct FadeTransitionController {
    alpha: f32,
    duration: f32,
    active: Option<ActiveFade>,
    queued: VecDeque<(FadeDirection, FadeCallback)>,
}

impl FadeTransitionController {
    pub fn new(initial_alpha: f32, duration_seconds: f32) -> Self {
        Self {
            alpha: initial_alpha.clamp(HIDDEN_ALPHA, VISIBLE_ALPHA),
            duration: duration_seconds.max(0.0),
            active: None,
            queued: VecDeque::new(),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn state(&self) -> TransitionState {
        match self.active.as_ref().map(|fade| fade.direction) {
            None => TransitionState::Idle,
            Some(FadeDirection::In) => TransitionState::FadingIn,
            Some(FadeDirection::Out) => TransitionState::FadingOut,
        }
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn fade_in(&mut self, on_complete: impl FnOnce() + 'static) {
        self.request(FadeDirection::In, Box::new(on_complete));
    }

    pub fn fade_out(&mut self, on_complete: impl FnOnce() + 'static) {
        self.request(FadeDirection::Out, Box::new(on_complete));
    }

    /// Advances the running fade. Returns `true` when a fade settled on this tick.
    pub fn tick(&mut self, delta_seconds: f32) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        active.elapsed += delta_seconds.max(0.0);
        let target = active.direction.target_alpha();
        let progress = if self.duration <= 0.0 {
            1.0
        } else {
            (active.elapsed / self.duration).min(1.0)
        };

        if progress < 1.0 {
            self.alpha = active.start_alpha + (target - active.start_alpha) * progress;
            return false;
        }

        self.alpha = target;
        let finished = self.active.take();
        if let Some((direction, on_complete)) = self.queued.pop_front() {
            self.start(direction, on_complete);
        }
        if let Some(finished) = finished {
            (finished.on_complete)();
        }
        true
    }

    /// Drops pending fades without running their callbacks. Used on host teardown.
    pub(crate) fn cancel_all(&mut self) -> usize {
        let dropped = self.queued.len() + usize::from(self.active.is_some());
        self.active = None;
        self.queued.clear();
        dropped
    }

    fn request(&mut self, direction: FadeDirection, on_complete: FadeCallback) {
        if self.active.is_some() {
            self.queued.push_back((direction, on_complete));
        } else {
            self.start(direction, on_complete);
        }
    }

    fn start(&mut self, direction: FadeDirection, on_complete: FadeCallback) {
        self.active = Some(ActiveFade {
            direction,
            start_alpha: self.alpha,
            elapsed: 0.0,
            on_complete,
        });
    }
}
