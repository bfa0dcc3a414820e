//! sbx-resolver: stable logical file IDs over backend-assigned storage IDs
//!
//! Each logical ID is either unregistered or registered; upload registers,
//! delete unregisters. An ID with no registration is passed to the backend
//! verbatim, so raw backend IDs stay addressable after the in-memory registry
//! is lost (e.g. on restart).

pub mod error;
pub mod resolver;

pub use error::{Action, ResolverError, ResolverResult};
pub use resolver::IdentityResolver;
