//! Visreg Workflow Engine
//!
//! Decides, per named screenshot, whether a capture establishes a baseline
//! or is a candidate to compare, diffs candidates against baselines, and
//! keeps the review report and approval history on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Workflow (per invocation)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  capture(identity, driver) -> CaptureOutcome                │
//! │    └── PathResolver::resolve -> baseline | candidate        │
//! │  compare_all() -> BatchReport                               │
//! │    ├── Comparator::compare (EngineRegistry)                 │
//! │    ├── report::aggregate -> compare-report.json             │
//! │    ├── report::diff_summary -> diffs/diffs.json             │
//! │    └── approvals::snapshot -> approvals.json                │
//! │  decide(decisions) -> DecisionOutcome                       │
//! │    └── HistoryStore (bounded, keyed by short SHA)           │
//! │          -> history.json                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each invocation loads, mutates and persists the report files
//! synchronously. Writes are atomic and read-modify-write spans hold an
//! advisory lock on `{report_dir}/.visreg.lock`.

pub mod approvals;
pub mod capture;
pub mod compare;
pub mod error;
pub mod history;
pub mod report;
pub mod resolver;
pub mod workflow;

pub use capture::{CaptureOptions, FileDriver, ScreenshotDriver};
pub use compare::{Comparator, DiffEngine, EngineRegistry, PixelDiff};
pub use error::{VisregError, VisregResult};
pub use history::HistoryStore;
pub use resolver::{PathResolver, Resolution};
pub use workflow::{BatchReport, CaptureOutcome, DecisionOutcome, Workflow};
