//! Typed handler registry for decoded HCN payloads.
//!
//! Applications register handlers per key (key/value packets) or per entry
//! type (datapoint, vector and text packets). The registry routes each
//! decoded payload to at most one handler per entry, in input order,
//! synchronously.
//!
//! Lookup misses are soft: they are counted in the [`DispatchOutcome`] rather
//! than raised, unless [`RegistryConfig::fail_on_unhandled`] is set.

pub mod config;
pub mod error;
pub mod handler;
pub mod keyvalue;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{DispatchError, Result};
pub use handler::{DatapointHandler, KeyValueHandler, TextHandler, VectorHandler};
pub use keyvalue::{parse_key_value, KeyValuePair};
pub use registry::{BatchAbort, DispatchOutcome, DispatchRegistry};
