//! Weighted random event generator.
//!
//! One draw in [0,1) picks a category by first-fit over the cumulative
//! distribution; the category then expands into a burst of events that is
//! queued and handed out one at a time.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{
    ComponentName, Event, KeyAction, MotionAction, MotionEvent, PermissionTarget, Rotation,
};
use crate::keys::{Capabilities, KeyCode, PhysicalKeys, MAX_KEY_CODE};
use crate::queue::{EventQueue, Throttle};
use crate::rng::source_rng;
use crate::source::{EventSource, SourceError};
use crate::weights::{Category, Distribution, WeightTable};

/// Number of move steps in a trackball burst.
const TRACKBALL_STEPS: usize = 10;
/// Upper bound (exclusive) on move steps in a drag or pinch.
const MAX_GESTURE_STEPS: usize = 10;
/// Scale of the per-burst velocity vector.
const VECTOR_SCALE: f32 = 50.0;

/// Size of the target surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
        }
    }
}

/// Configuration for the random generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub weights: WeightTable,
    pub surface: Surface,
    /// Components reachable through app-switch events.
    pub apps: Vec<ComponentName>,
    /// Candidates for permission toggle events.
    pub permissions: Vec<PermissionTarget>,
    pub throttle: Throttle,
    /// Ceiling on key-code draws for one key burst.
    pub max_key_attempts: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::new(),
            surface: Surface::default(),
            apps: Vec::new(),
            permissions: Vec::new(),
            throttle: Throttle::default(),
            max_key_attempts: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Tap,
    Drag,
    PinchOrZoom,
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: f32,
    y: f32,
}

/// The weighted random event source.
pub struct RandomSource<C: Capabilities = PhysicalKeys> {
    config: GeneratorConfig,
    capabilities: C,
    rng: ChaCha8Rng,
    queue: EventQueue,
    distribution: Option<Distribution>,
    keyboard_open: bool,
    bursts: u64,
    events_handed_out: u64,
    seed: u64,
    verbose: u8,
}

impl<C: Capabilities> RandomSource<C> {
    pub fn new(config: GeneratorConfig, capabilities: C, seed: u64) -> Self {
        let queue = EventQueue::new(config.throttle);
        Self {
            config,
            capabilities,
            rng: source_rng(seed),
            queue,
            distribution: None,
            keyboard_open: false,
            bursts: 0,
            events_handed_out: 0,
            seed,
            verbose: 0,
        }
    }

    /// Queue a switch to a random launchable component. No-op without apps.
    pub fn generate_activity(&mut self) {
        if self.config.apps.is_empty() {
            return;
        }
        let idx = self.rng.gen_range(0..self.config.apps.len());
        let component = self.config.apps[idx].clone();
        self.queue
            .push(Event::AppSwitch { component }, &mut self.rng);
    }

    /// The normalized distribution, once validated.
    pub fn distribution(&self) -> Option<&Distribution> {
        self.distribution.as_ref()
    }

    pub fn events_handed_out(&self) -> u64 {
        self.events_handed_out
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Generate one burst into the queue and return its category.
    pub fn generate_burst(&mut self) -> Result<Category, SourceError> {
        let dist = self.distribution.as_ref().ok_or(SourceError::NotValidated)?;
        let draw: f64 = self.rng.gen();
        let category = dist.select(draw);

        match category {
            Category::Touch => self.generate_pointer(Gesture::Tap),
            Category::Motion => self.generate_pointer(Gesture::Drag),
            Category::PinchZoom => self.generate_pointer(Gesture::PinchOrZoom),
            Category::Trackball => self.generate_trackball(),
            Category::Rotation => self.generate_rotation(),
            Category::Permission => self.generate_permission(),
            Category::AppSwitch => self.generate_activity(),
            Category::Flip => {
                let open = self.keyboard_open;
                self.keyboard_open = !self.keyboard_open;
                self.queue.push(Event::Flip { open }, &mut self.rng);
            }
            Category::Nav | Category::MajorNav | Category::SysKeys | Category::AnyKey => {
                let code = self.pick_key(category)?;
                self.queue.push(
                    Event::Key {
                        action: KeyAction::Down,
                        code,
                    },
                    &mut self.rng,
                );
                self.queue.push(
                    Event::Key {
                        action: KeyAction::Up,
                        code,
                    },
                    &mut self.rng,
                );
            }
        }
        Ok(category)
    }

    /// Draw key codes from the category until one is allowed and present.
    fn pick_key(&mut self, category: Category) -> Result<KeyCode, SourceError> {
        let max = self.config.max_key_attempts;
        for _ in 0..max {
            let code = match category.key_repertoire() {
                Some(keys) => keys[self.rng.gen_range(0..keys.len())],
                None => KeyCode(1 + self.rng.gen_range(0..MAX_KEY_CODE - 1)),
            };
            if !code.is_denied() && self.capabilities.has_key(code) {
                return Ok(code);
            }
        }
        Err(SourceError::KeySelectionExhausted { attempts: max })
    }

    fn generate_pointer(&mut self, gesture: Gesture) {
        self.bursts += 1;
        let down_at = self.bursts;

        let mut p1 = self.random_point();
        let v1 = self.random_vector();

        self.push_touch(
            MotionEvent::new(MotionAction::Down, down_at).with_pointer(0, p1.x, p1.y),
        );

        match gesture {
            Gesture::Tap => {}
            Gesture::Drag => {
                let count = self.rng.gen_range(0..MAX_GESTURE_STEPS);
                for _ in 0..count {
                    self.random_walk(&mut p1, v1);
                    self.push_touch(
                        MotionEvent::new(MotionAction::Move, down_at)
                            .with_pointer(0, p1.x, p1.y)
                            .intermediate(true),
                    );
                }
            }
            Gesture::PinchOrZoom => {
                let mut p2 = self.random_point();
                let v2 = self.random_vector();

                self.random_walk(&mut p1, v1);
                self.push_touch(
                    MotionEvent::new(MotionAction::PointerDown(1), down_at)
                        .with_pointer(0, p1.x, p1.y)
                        .with_pointer(1, p2.x, p2.y)
                        .intermediate(true),
                );

                let count = self.rng.gen_range(0..MAX_GESTURE_STEPS);
                for _ in 0..count {
                    self.random_walk(&mut p1, v1);
                    self.random_walk(&mut p2, v2);
                    self.push_touch(
                        MotionEvent::new(MotionAction::Move, down_at)
                            .with_pointer(0, p1.x, p1.y)
                            .with_pointer(1, p2.x, p2.y)
                            .intermediate(true),
                    );
                }

                self.random_walk(&mut p1, v1);
                self.random_walk(&mut p2, v2);
                self.push_touch(
                    MotionEvent::new(MotionAction::PointerUp(1), down_at)
                        .with_pointer(0, p1.x, p1.y)
                        .with_pointer(1, p2.x, p2.y)
                        .intermediate(true),
                );
            }
        }

        self.random_walk(&mut p1, v1);
        self.push_touch(MotionEvent::new(MotionAction::Up, down_at).with_pointer(0, p1.x, p1.y));
    }

    fn push_touch(&mut self, motion: MotionEvent) {
        self.queue.push(Event::Touch(motion), &mut self.rng);
    }

    /// Small random steps, then a click one time in ten.
    fn generate_trackball(&mut self) {
        self.bursts += 1;
        let down_at = self.bursts;

        for i in 0..TRACKBALL_STEPS {
            let dx = self.rng.gen_range(0..10) as f32 - 5.0;
            let dy = self.rng.gen_range(0..10) as f32 - 5.0;
            self.queue.push(
                Event::Trackball(
                    MotionEvent::new(MotionAction::Move, down_at)
                        .with_pointer(0, dx, dy)
                        .intermediate(i > 0),
                ),
                &mut self.rng,
            );
        }

        if self.rng.gen_range(0..10) == 0 {
            self.queue.push(
                Event::Trackball(
                    MotionEvent::new(MotionAction::Down, down_at)
                        .with_pointer(0, 0.0, 0.0)
                        .intermediate(true),
                ),
                &mut self.rng,
            );
            self.queue.push(
                Event::Trackball(
                    MotionEvent::new(MotionAction::Up, down_at).with_pointer(0, 0.0, 0.0),
                ),
                &mut self.rng,
            );
        }
    }

    fn generate_rotation(&mut self) {
        let rotation = Rotation::ALL[self.rng.gen_range(0..Rotation::ALL.len())];
        let persist = self.rng.gen::<bool>();
        self.queue
            .push(Event::Rotation { rotation, persist }, &mut self.rng);
    }

    fn generate_permission(&mut self) {
        if self.config.permissions.is_empty() {
            return;
        }
        let idx = self.rng.gen_range(0..self.config.permissions.len());
        let target = self.config.permissions[idx].clone();
        let grant = self.rng.gen::<bool>();
        self.queue
            .push(Event::Permission { target, grant }, &mut self.rng);
    }

    fn random_point(&mut self) -> Point {
        Point {
            x: self.rng.gen_range(0..self.config.surface.width) as f32,
            y: self.rng.gen_range(0..self.config.surface.height) as f32,
        }
    }

    fn random_vector(&mut self) -> Point {
        Point {
            x: (self.rng.gen::<f32>() - 0.5) * VECTOR_SCALE,
            y: (self.rng.gen::<f32>() - 0.5) * VECTOR_SCALE,
        }
    }

    fn random_walk(&mut self, point: &mut Point, vector: Point) {
        let width = self.config.surface.width as f32;
        let height = self.config.surface.height as f32;
        point.x = (point.x + self.rng.gen::<f32>() * vector.x).clamp(0.0, width);
        point.y = (point.y + self.rng.gen::<f32>() * vector.y).clamp(0.0, height);
    }
}

impl<C: Capabilities> EventSource for RandomSource<C> {
    fn validate(&mut self) -> Result<(), SourceError> {
        if self.config.surface.width == 0 || self.config.surface.height == 0 {
            return Err(SourceError::EmptySurface);
        }
        let weights = &self.config.weights;
        if weights.raw(Category::Permission) != 0.0 && self.config.permissions.is_empty() {
            return Err(SourceError::NoPermissionTargets);
        }

        let dist = weights.normalize(&self.capabilities, self.verbose)?;
        if dist.percentage(Category::AppSwitch) >= 0.1 && self.config.apps.is_empty() {
            return Err(SourceError::NoApplications);
        }
        if self.verbose >= 2 {
            debug!(seed = self.seed, "Seeded");
        }
        self.distribution = Some(dist);
        Ok(())
    }

    fn next_event(&mut self) -> Result<Option<Event>, SourceError> {
        // App switches without apps produce an empty burst; draw again.
        while self.queue.is_empty() {
            self.generate_burst()?;
        }
        self.events_handed_out += 1;
        Ok(self.queue.pop())
    }

    fn set_verbose(&mut self, verbose: u8) {
        self.verbose = verbose;
    }
}
