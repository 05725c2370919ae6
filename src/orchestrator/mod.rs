//! Application-level orchestration.
//!
//! This module owns the screen state and the coordinator that keeps it consistent
//! while session, generation, enrichment and persistence requests complete in any
//! order. Presentation layers send [`UiCommand`]s in and observe [`ViewState`]
//! snapshots or [`crate::model::ViewEvent`]s coming back out.

mod controller;
mod state;

pub use controller::{Services, UiCommand, ViewCoordinator};
pub use state::{Page, ViewState};
