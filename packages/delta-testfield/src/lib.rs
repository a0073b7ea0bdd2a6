//! Fixture geometry and field builders used by the service crate's
//! integration tests. Not part of the planning core itself.

pub mod provider;
pub mod scenarios;

pub use provider::ReferenceGeometry;
