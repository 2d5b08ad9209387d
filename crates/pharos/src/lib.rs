//! Client-side page instrumentation: web-vitals collection, Lighthouse-style
//! score estimation, rate-limited telemetry, and lazy resource loading, all
//! behind injectable host bridges so the pipeline runs anywhere.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod score;
pub mod session;
pub mod telemetry;
pub mod vitals;

pub use config::{Config, Mode};
pub use error::PharosError;
pub use session::{PageContext, Pharos, PharosBuilder};
