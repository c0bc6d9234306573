//! Application Services
//!
//! The scorers and detectors the state machine composes: the frame ring
//! buffer, the frontality and quality scorers, the screen-attack cascade
//! (spec §4.4) and its sub-detectors, the photo-attack detector (spec
//! §4.5), and the event bus the `Engine` facade publishes through.

pub mod event_bus;
pub mod frame_collector;
pub mod frontality;
pub mod photo_attack;
pub mod quality;
pub mod screen_attack;

pub use event_bus::{EventBus, EventSubscriber};
pub use frame_collector::FrameCollector;
pub use frontality::FrontalityScorer;
pub use photo_attack::{PhotoAttackDetector, PhotoAttackResult};
pub use quality::{QualityResult, QualityScorer};
pub use screen_attack::ScreenAttackCascade;
