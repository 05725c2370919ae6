//! Pet-name suggestions with a per-user saved list.
//!
//! The client side is an event-driven coordinator ([`orchestrator::ViewCoordinator`])
//! that gates every request on the signed-in identity, and the [`server`] module is a
//! small reference implementation of the saved-names API it talks to.

pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod selection;
pub mod server;
pub mod session;
mod text_summary;
