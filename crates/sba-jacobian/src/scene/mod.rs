//! Scene description consumed by the Jacobian: structure and observations.

pub mod observations;
pub mod structure;

pub use observations::{Observation, ObservationView, SceneObservations};
pub use structure::{Estimate, SceneCamera, ScenePoint, SceneStructureMetric, SceneView};
