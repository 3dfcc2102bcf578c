//! Client core for the Khawarizmi query-to-visualization pipeline.
//!
//! A question goes through the [`orchestrator`] as one pipeline call; the
//! resulting report and chart fragments are rendered by [`render`] into the
//! [`view`], which re-executes their embedded scripts inside sandboxed
//! surfaces.

pub mod config;
pub mod dom;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod pipeline;
pub mod printer;
pub mod query;
pub mod render;
pub mod telemetry;
pub mod tui;
pub mod view;
