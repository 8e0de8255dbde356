//! Compatibility oracle seam and implementations.

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpOracle;
pub use mock::MockOracle;
pub use traits::{CompatibilityOracle, CompatibilityReport, OracleError};
