//! Quarry Core
//!
//! Shared foundations for the Quarry asset database: hash collections,
//! stable identifiers, logging and profiling setup.

pub mod alloc;
pub mod guid;
pub mod logging;
pub mod profiling;

pub use guid::Guid;
