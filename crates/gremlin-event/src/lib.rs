//! Event model and weighted random event generation.

pub mod event;
pub mod generator;
pub mod keys;
pub mod queue;
pub mod rng;
pub mod source;
pub mod weights;

pub use event::{
    ComponentName, Event, KeyAction, MotionAction, MotionEvent, PermissionTarget, Pointer,
    Rotation,
};
pub use generator::{GeneratorConfig, RandomSource, Surface};
pub use keys::{Capabilities, KeyCode, PhysicalKeys};
pub use queue::{EventQueue, Throttle};
pub use rng::{fresh_seed, source_rng};
pub use source::{EventSource, FixedSource, SourceError};
pub use weights::{Category, Distribution, WeightError, WeightTable};
