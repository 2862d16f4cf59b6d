//! Grade snapshot cache and course classification engine.
//!
//! Classifies courses as standards-based or traditional, resolves each
//! course's current grade, and keeps one session-scoped snapshot per course
//! that any number of consumers can read.

pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod fakes;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod resolver;
pub mod session;
pub mod store;

pub use classifier::CourseClassifier;
pub use client::{CanvasClient, GradingClient};
pub use config::EngineConfig;
pub use models::{BatchReport, CourseRef, CourseSnapshot, GradeSource, PageContext};
pub use pipeline::populate_all;
pub use resolver::GradeResolver;
pub use session::{JsonFileSessionStore, MemorySessionStore, SessionStore};
pub use store::SnapshotStore;
