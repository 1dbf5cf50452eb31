use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::prefs::{ListenerId, Preferences, PREF_GAME_SCALE};

use super::actor::{Actor, ActorId};
use super::batch::{Batch, DrawCommand};
use super::failure::{isolate, FrameFailure};
use super::fade::{
    FadeTransitionController, TransitionState, FADE_DURATION_SECONDS, HIDDEN_ALPHA,
};
use super::liveness::{Liveness, LivenessWatch};
use super::viewport::{
    compute_scale, Orientation, Viewport, ViewportError, WORLD_HEIGHT, WORLD_WIDTH,
};

#[derive(Debug, Clone)]
pub struct StageConfig {
    pub name: String,
    pub min_world_width: f32,
    pub min_world_height: f32,
    pub fade_duration_seconds: f32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: "stage".to_string(),
            min_world_width: WORLD_WIDTH,
            min_world_height: WORLD_HEIGHT,
            fade_duration_seconds: FADE_DURATION_SECONDS,
        }
    }
}

impl StageConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub first_frame: bool,
    pub failures: usize,
}

struct ActorSlot {
    id: ActorId,
    actor: Box<dyn Actor>,
}

/// Owns a viewport, an actor tree and the per-frame update/draw lifecycle.
///
/// Failures raised by individual actors during `advance` or `render` are logged and
/// isolated; they never propagate past the host. Fade completion callbacks run inside the
/// same guard during `advance`.
///
/// Zoom preference changes are not applied from the listener itself. The listener parks
/// the new zoom in a mailbox, and the next `advance` or `render` re-runs `resize` with the
/// last known screen size before touching any actor.
pub struct StageHost {
    config: StageConfig,
    preferences: Arc<Preferences>,
    zoom_listener: Option<ListenerId>,
    pending_zoom: Arc<Mutex<Option<f32>>>,
    user_zoom: f32,
    viewport: Viewport,
    last_screen_size: Option<(u32, u32)>,
    orientation: Option<Orientation>,
    fade: FadeTransitionController,
    batch: Batch,
    actors: Vec<ActorSlot>,
    next_actor_id: u64,
    liveness: Liveness,
    frames_advanced: u64,
    frame_failures: u64,
    torn_down: bool,
}

impl StageHost {
    pub fn new(config: StageConfig, preferences: Arc<Preferences>) -> Self {
        let pending_zoom = Arc::new(Mutex::new(None));
        let mailbox = Arc::clone(&pending_zoom);
        let zoom_listener = preferences.add_listener(PREF_GAME_SCALE, move |zoom: f32| {
            *mailbox.lock().unwrap_or_else(PoisonError::into_inner) = Some(zoom);
        });
        let user_zoom = preferences.get(PREF_GAME_SCALE);
        let viewport = Viewport::extend(config.min_world_width, config.min_world_height);
        let fade = FadeTransitionController::new(HIDDEN_ALPHA, config.fade_duration_seconds);
        info!(host = %config.name, user_zoom, "stage_created");

        Self {
            config,
            preferences,
            zoom_listener: Some(zoom_listener),
            pending_zoom,
            user_zoom,
            viewport,
            last_screen_size: None,
            orientation: None,
            fade,
            batch: Batch::new(viewport),
            actors: Vec::new(),
            next_actor_id: 0,
            liveness: Liveness::default(),
            frames_advanced: 0,
            frame_failures: 0,
            torn_down: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn user_zoom(&self) -> f32 {
        self.user_zoom
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    pub fn is_vertical(&self) -> bool {
        self.orientation == Some(Orientation::Vertical)
    }

    pub fn alpha(&self) -> f32 {
        self.fade.alpha()
    }

    pub fn transition_state(&self) -> TransitionState {
        self.fade.state()
    }

    pub fn frame_failures(&self) -> u64 {
        self.frame_failures
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn liveness_watch(&self) -> LivenessWatch {
        self.liveness.watch()
    }

    pub fn preferences(&self) -> &Arc<Preferences> {
        &self.preferences
    }

    /// Draw commands produced by the last `render`.
    pub fn frame(&self) -> &[DrawCommand] {
        self.batch.commands()
    }

    pub fn fade_in(&mut self, on_complete: impl FnOnce() + 'static) {
        self.fade.fade_in(on_complete);
    }

    pub fn fade_out(&mut self, on_complete: impl FnOnce() + 'static) {
        self.fade.fade_out(on_complete);
    }

    pub fn add_actor(&mut self, mut actor: Box<dyn Actor>) -> ActorId {
        let id = ActorId(self.next_actor_id);
        self.next_actor_id = self.next_actor_id.saturating_add(1);

        if self.torn_down {
            warn!(host = %self.config.name, actor = actor.name(), "actor_added_after_teardown");
            if let Some(disposable) = actor.as_disposable() {
                disposable.dispose();
            }
            return id;
        }

        if let Some((width, height)) = self.last_screen_size {
            if let Some(resizable) = actor.as_resizable() {
                resizable.on_resize(width, height, &self.viewport);
            }
        }
        if let Some(orientation) = self.orientation {
            if let Some(aware) = actor.as_orientation_aware() {
                aware.on_orientation_change(orientation == Orientation::Vertical);
            }
        }
        self.actors.push(ActorSlot { id, actor });
        id
    }

    /// Detaches an actor, running its disposal hook first when it has one.
    pub fn remove_actor(&mut self, id: ActorId) -> bool {
        let Some(index) = self.actors.iter().position(|slot| slot.id == id) else {
            return false;
        };
        let mut slot = self.actors.remove(index);
        if let Some(disposable) = slot.actor.as_disposable() {
            disposable.dispose();
        }
        debug!(host = %self.config.name, actor = slot.actor.name(), "actor_removed");
        true
    }

    pub fn resize(&mut self, screen_width: u32, screen_height: u32) -> Result<(), ViewportError> {
        let scale = compute_scale(
            i64::from(screen_width),
            i64::from(screen_height),
            self.user_zoom,
        )?;
        let mut viewport = Viewport::scaled(
            self.config.min_world_width,
            self.config.min_world_height,
            scale,
        );
        viewport.update(screen_width, screen_height);
        self.viewport = viewport;
        self.last_screen_size = Some((screen_width, screen_height));
        debug!(
            host = %self.config.name,
            screen_width,
            screen_height,
            scale = scale.value(),
            world_width = viewport.world_width(),
            world_height = viewport.world_height(),
            "stage_resized"
        );

        for slot in &mut self.actors {
            if let Some(resizable) = slot.actor.as_resizable() {
                resizable.on_resize(screen_width, screen_height, &viewport);
            }
        }
        self.update_orientation();
        Ok(())
    }

    /// Applies a zoom preference change received since the last frame.
    pub fn sync_preferences(&mut self) {
        let pending = self
            .pending_zoom
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(zoom) = pending else {
            return;
        };
        if zoom == self.user_zoom {
            return;
        }

        let previous = self.user_zoom;
        self.user_zoom = zoom;
        info!(host = %self.config.name, previous, zoom, "user_zoom_changed");
        let Some((width, height)) = self.last_screen_size else {
            return;
        };
        if let Err(error) = self.resize(width, height) {
            warn!(host = %self.config.name, error = %error, "user_zoom_rejected");
            self.user_zoom = previous;
        }
    }

    pub fn advance(&mut self, delta_seconds: f32) -> FrameReport {
        if self.torn_down {
            return FrameReport::default();
        }
        self.sync_preferences();

        let first_frame = self.frames_advanced == 0;
        self.frames_advanced = self.frames_advanced.saturating_add(1);
        let mut failures = 0;
        let fade = &mut self.fade;
        if let Err(failure) = isolate(|| {
            fade.tick(delta_seconds);
            Ok(())
        }) {
            failures += 1;
            report_frame_failure(&self.config.name, "act", "fade", &failure);
        }

        for slot in &mut self.actors {
            let actor = &mut slot.actor;
            if let Err(failure) = isolate(|| actor.act(delta_seconds)) {
                failures += 1;
                report_frame_failure(&self.config.name, "act", actor.name(), &failure);
            }
        }
        if failures > 0 {
            self.frame_failures = self.frame_failures.saturating_add(failures as u64);
            self.safely_end_batch();
        }

        FrameReport {
            first_frame,
            failures,
        }
    }

    pub fn render(&mut self) -> FrameReport {
        if self.torn_down {
            return FrameReport::default();
        }
        self.sync_preferences();

        self.batch.set_projection(self.viewport);
        self.safely_end_batch();
        if let Err(failure) = self.batch.begin() {
            report_frame_failure(&self.config.name, "draw", "batch", &failure);
            self.frame_failures = self.frame_failures.saturating_add(1);
            return FrameReport {
                first_frame: false,
                failures: 1,
            };
        }

        let parent_alpha = self.fade.alpha();
        let mut failures = 0;
        for slot in &self.actors {
            let batch = &mut self.batch;
            let actor = &slot.actor;
            if let Err(failure) = isolate(|| actor.draw(batch, parent_alpha)) {
                failures += 1;
                report_frame_failure(&self.config.name, "draw", actor.name(), &failure);
            }
        }
        self.frame_failures = self.frame_failures.saturating_add(failures as u64);
        self.safely_end_batch();

        FrameReport {
            first_frame: false,
            failures,
        }
    }

    /// Unregisters listeners, disposes actors and invalidates liveness watches.
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(listener) = self.zoom_listener.take() {
            self.preferences.remove_listener(PREF_GAME_SCALE, listener);
        }
        self.liveness.kill();
        let dropped_fades = self.fade.cancel_all();
        let disposed = self.actors.len();
        for mut slot in self.actors.drain(..) {
            if let Some(disposable) = slot.actor.as_disposable() {
                disposable.dispose();
            }
        }
        self.safely_end_batch();
        info!(host = %self.config.name, disposed, dropped_fades, "stage_torn_down");
    }

    fn update_orientation(&mut self) {
        let Some(next) = self.viewport.orientation() else {
            return;
        };
        if self.orientation == Some(next) {
            return;
        }
        self.orientation = Some(next);
        let is_vertical = next == Orientation::Vertical;
        info!(host = %self.config.name, is_vertical, "orientation_changed");
        for slot in &mut self.actors {
            if let Some(aware) = slot.actor.as_orientation_aware() {
                aware.on_orientation_change(is_vertical);
            }
        }
    }

    fn safely_end_batch(&mut self) {
        if !self.batch.is_drawing() {
            return;
        }
        if let Err(failure) = self.batch.end() {
            error!(host = %self.config.name, error = %failure, "batch_end_failed");
        }
    }
}

impl Drop for StageHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn report_frame_failure(host: &str, phase: &'static str, actor: &str, failure: &FrameFailure) {
    error!(
        host,
        phase,
        actor,
        kind = failure.kind.as_str(),
        message = %failure.message,
        "frame_failure_isolated"
    );
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::stage::{
        Color, Disposable, FrameFailureKind, OrientationAware, Rect, Resizable, VISIBLE_ALPHA,
    };

    #[derive(Debug, Default)]
    struct ProbeLog {
        acted: Vec<String>,
        resized: Vec<(u32, u32)>,
        orientation_changes: Vec<bool>,
        disposed: u32,
    }

    struct Probe {
        name: &'static str,
        log: Rc<RefCell<ProbeLog>>,
        act_failure: Option<FrameFailureKind>,
        panic_on_act: bool,
        panic_on_draw: bool,
    }

    impl Probe {
        fn boxed(name: &'static str, log: &Rc<RefCell<ProbeLog>>) -> Box<Self> {
            Box::new(Self {
                name,
                log: Rc::clone(log),
                act_failure: None,
                panic_on_act: false,
                panic_on_draw: false,
            })
        }
    }

    impl Actor for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn act(&mut self, _delta_seconds: f32) -> Result<(), FrameFailure> {
            if self.panic_on_act {
                let empty: Vec<u32> = Vec::new();
                let index = empty.len() + 1;
                let _value = empty[index];
            }
            if let Some(kind) = self.act_failure {
                return Err(FrameFailure::new(kind, "probe failure"));
            }
            self.log.borrow_mut().acted.push(self.name.to_string());
            Ok(())
        }

        fn draw(&self, batch: &mut Batch, parent_alpha: f32) -> Result<(), FrameFailure> {
            if self.panic_on_draw {
                let empty: Vec<u32> = Vec::new();
                let index = empty.len() + 1;
                let _value = empty[index];
            }
            if self.act_failure.is_some() {
                return Err(FrameFailure::missing_reference("nothing to draw"));
            }
            batch.fill_rect(
                Rect::new(0.0, 0.0, 10.0, 10.0),
                Color::WHITE.with_alpha_scaled(parent_alpha),
            )
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

    impl Resizable for Probe {
        fn on_resize(&mut self, screen_width: u32, screen_height: u32, _viewport: &Viewport) {
            self.log.borrow_mut().resized.push((screen_width, screen_height));
        }
    }

    impl Disposable for Probe {
        fn dispose(&mut self) {
            self.log.borrow_mut().disposed += 1;
        }
    }

    impl OrientationAware for Probe {
        fn on_orientation_change(&mut self, is_vertical: bool) {
            self.log.borrow_mut().orientation_changes.push(is_vertical);
        }
    }

    struct Plain;

    impl Actor for Plain {
        fn name(&self) -> &str {
            "plain"
        }

        fn draw(&self, _batch: &mut Batch, _parent_alpha: f32) -> Result<(), FrameFailure> {
            Ok(())
        }
    }

    fn host() -> (StageHost, Arc<Preferences>) {
        let prefs = Arc::new(Preferences::in_memory());
        let host = StageHost::new(StageConfig::named("test_stage"), Arc::clone(&prefs));
        (host, prefs)
    }

    #[test]
    fn failing_actor_does_not_stop_later_actors() {
        let (mut host, _prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        let mut broken = Probe::boxed("broken", &log);
        broken.act_failure = Some(FrameFailureKind::OutOfBounds);
        host.add_actor(broken);
        host.add_actor(Probe::boxed("healthy", &log));
        host.resize(800, 600).expect("resize");

        let report = host.advance(0.016);
        assert_eq!(report.failures, 1);
        assert_eq!(log.borrow().acted, vec!["healthy".to_string()]);

        let render = host.render();
        assert_eq!(render.failures, 1);
        assert_eq!(host.frame().len(), 1);
        assert_eq!(host.frame_failures(), 2);
    }

    #[test]
    fn panicking_actor_is_isolated_and_render_still_succeeds() {
        let (mut host, _prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        let mut panicking = Probe::boxed("panicking", &log);
        panicking.panic_on_act = true;
        host.add_actor(panicking);
        host.add_actor(Probe::boxed("after", &log));
        host.resize(640, 480).expect("resize");

        let report = host.advance(0.016);
        assert_eq!(report.failures, 1);
        assert_eq!(log.borrow().acted, vec!["after".to_string()]);

        let render = host.render();
        assert_eq!(render.failures, 0);
        assert_eq!(host.frame().len(), 2);
    }

    #[test]
    fn panic_while_drawing_is_isolated_and_batch_closed() {
        let (mut host, _prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        let mut panicking = Probe::boxed("panicking", &log);
        panicking.panic_on_draw = true;
        host.add_actor(panicking);
        host.add_actor(Probe::boxed("after", &log));
        host.resize(640, 480).expect("resize");

        let render = host.render();
        assert_eq!(render.failures, 1);
        assert_eq!(host.frame().len(), 1);
        assert!(!host.batch.is_drawing());
        assert_eq!(host.frame_failures(), 1);

        assert_eq!(host.render().failures, 1);
        assert_eq!(host.frame().len(), 1);
    }

    #[test]
    fn panicking_fade_callback_is_isolated() {
        let (mut host, _prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        host.add_actor(Probe::boxed("probe", &log));
        host.fade_in(|| {
            let empty: Vec<u32> = Vec::new();
            let index = empty.len() + 1;
            let _value = empty[index];
        });

        let failures: usize = (0..30).map(|_| host.advance(1.0 / 60.0).failures).sum();

        assert_eq!(failures, 1);
        assert_eq!(host.frame_failures(), 1);
        assert_eq!(log.borrow().acted.len(), 30);
        assert_eq!(host.alpha(), VISIBLE_ALPHA);
        assert_eq!(host.transition_state(), TransitionState::Idle);
        assert_eq!(host.render().failures, 0);
    }

    #[test]
    fn first_frame_is_reported_once() {
        let (mut host, _prefs) = host();
        assert!(host.advance(0.016).first_frame);
        assert!(!host.advance(0.016).first_frame);
    }

    #[test]
    fn resize_forwards_dimensions_to_resizable_actors() {
        let (mut host, _prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        host.add_actor(Probe::boxed("probe", &log));
        host.add_actor(Box::new(Plain));

        host.resize(1280, 720).expect("resize");
        assert_eq!(log.borrow().resized, vec![(1280, 720)]);
        let expected = compute_scale(1280, 720, 1.0).expect("scale").value() * WORLD_HEIGHT;
        assert!((host.viewport().world_height() - expected).abs() < 1e-3);
    }

    #[test]
    fn invalid_dimensions_are_rejected_and_viewport_kept() {
        let (mut host, _prefs) = host();
        host.resize(800, 600).expect("resize");
        let before = *host.viewport();

        let error = host.resize(0, 600).expect_err("zero width");
        assert!(matches!(error, ViewportError::InvalidDimensions { .. }));
        assert_eq!(*host.viewport(), before);
    }

    #[test]
    fn rotation_notifies_orientation_once_per_change() {
        let (mut host, prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        host.add_actor(Probe::boxed("probe", &log));

        host.resize(800, 600).expect("landscape");
        host.resize(600, 800).expect("portrait");
        host.resize(600, 800).expect("portrait again");
        prefs.put(PREF_GAME_SCALE, 1.5);
        host.sync_preferences();

        assert_eq!(log.borrow().orientation_changes, vec![false, true]);
        assert!(host.is_vertical());
    }

    #[test]
    fn actor_added_after_sizing_receives_current_state() {
        let (mut host, _prefs) = host();
        host.resize(600, 800).expect("portrait");
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        host.add_actor(Probe::boxed("late", &log));

        assert_eq!(log.borrow().resized, vec![(600, 800)]);
        assert_eq!(log.borrow().orientation_changes, vec![true]);
    }

    #[test]
    fn zoom_preference_change_reapplies_last_screen_size() {
        let (mut host, prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        host.add_actor(Probe::boxed("probe", &log));
        host.resize(800, 600).expect("resize");
        let before = host.viewport().world_width();

        prefs.put(PREF_GAME_SCALE, 2.0);
        host.render();

        assert_eq!(host.user_zoom(), 2.0);
        assert!((host.viewport().world_width() - before * 2.0).abs() < 1e-3);
        assert_eq!(log.borrow().resized, vec![(800, 600), (800, 600)]);
    }

    #[test]
    fn invalid_zoom_preference_is_rejected() {
        let (mut host, prefs) = host();
        host.resize(800, 600).expect("resize");
        let before = *host.viewport();

        prefs.put(PREF_GAME_SCALE, 0.0);
        host.sync_preferences();

        assert_eq!(host.user_zoom(), 1.0);
        assert_eq!(*host.viewport(), before);
    }

    #[test]
    fn remove_actor_disposes_before_detaching() {
        let (mut host, _prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        let id = host.add_actor(Probe::boxed("probe", &log));

        assert!(host.remove_actor(id));
        assert!(!host.remove_actor(id));
        assert_eq!(log.borrow().disposed, 1);
        assert_eq!(host.actor_count(), 0);
    }

    #[test]
    fn teardown_is_idempotent_and_releases_everything() {
        let (mut host, prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        host.add_actor(Probe::boxed("probe", &log));
        let watch = host.liveness_watch();
        assert_eq!(prefs.listener_count(PREF_GAME_SCALE), 1);

        host.teardown();
        host.teardown();
        drop(host);

        assert_eq!(log.borrow().disposed, 1);
        assert_eq!(prefs.listener_count(PREF_GAME_SCALE), 0);
        assert!(!watch.is_alive());
    }

    #[test]
    fn dropping_host_unregisters_zoom_listener() {
        let (host, prefs) = host();
        drop(host);
        assert_eq!(prefs.listener_count(PREF_GAME_SCALE), 0);
    }

    #[test]
    fn torn_down_host_skips_frames() {
        let (mut host, _prefs) = host();
        let log = Rc::new(RefCell::new(ProbeLog::default()));
        host.add_actor(Probe::boxed("probe", &log));
        host.teardown();

        assert_eq!(host.advance(0.016), FrameReport::default());
        assert_eq!(host.render(), FrameReport::default());
        assert!(log.borrow().acted.is_empty());
    }

    #[test]
    fn fade_in_through_host_ends_visible() {
        let (mut host, _prefs) = host();
        let done = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&done);
        host.fade_in(move || *flag.borrow_mut() = true);
        assert_eq!(host.alpha(), HIDDEN_ALPHA);

        for _ in 0..30 {
            host.advance(1.0 / 60.0);
        }
        assert!(*done.borrow());
        assert_eq!(host.alpha(), VISIBLE_ALPHA);
        assert_eq!(host.transition_state(), TransitionState::Idle);
    }
}
