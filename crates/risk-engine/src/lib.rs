//! Flood risk estimation strategies.
//!
//! Three estimators share one interface: a shallow-water physics
//! simulation, a learned image-to-image model, and a deterministic
//! heuristic that always succeeds. The orchestrator tries them in that
//! order, falling through on failure; whichever produces the raw risk
//! raster, [`RiskNormalizer`] gives the output its final contrast.

pub mod estimator;
pub mod heuristic;
pub mod model;
pub mod normalize;
pub mod physics;

pub use estimator::RiskEstimator;
pub use heuristic::HeuristicFallback;
pub use model::{FloodNet, LearnedModel};
pub use normalize::RiskNormalizer;
pub use physics::PhysicsSimulation;
