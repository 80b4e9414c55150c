// src/lib.rs
// Client core for the DevPulse trends dashboard: scan streaming, aggregation,
// the onboarding demo and the backend gateway.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod cues;
pub mod dashboard;
pub mod demo;
pub mod error;
pub mod gateway;
pub mod item;
pub mod notice;
pub mod scan;
pub mod terminal;
pub mod typing;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{AggregationState, SourceSelection};
pub use crate::client::ApiClient;
pub use crate::config::ClientConfig;
pub use crate::dashboard::{Dashboard, ScanReport};
pub use crate::demo::{DemoOrchestrator, DemoPhase};
pub use crate::error::{ClientError, ClientResult, DemoError};
pub use crate::item::TrendingItem;
pub use crate::scan::{ScanEvent, ScanPhase, ScanStream, SourceScope};
