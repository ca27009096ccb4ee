//! Issue detection and correlation engine.
//!
//! Data flows one way through a pass: the detector turns snapshots into
//! issues, the correlator links them across stages and pipelines, the scorer
//! dedupes and orders them, and the recommender and roadmap builder derive the
//! remediation plan. Only the history buffer outlives a pass.

mod blueprints;
mod catalog;
mod components;
mod correlator;
mod detector;
mod history;
mod monitor;
mod pass;
mod patterns;
mod recommender;
mod roadmap;
mod rules;
mod scorer;

pub use history::History;
pub use monitor::{Monitor, MonitorSettings, MonitorState};
pub use pass::{AnalysisPass, PassOutcome, PassStage};
pub use rules::RuleCatalog;
pub use scorer::report_order;
