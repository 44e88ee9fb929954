//! Activity abstractions
//!
//! Activities are units of work that are executed by workers. They:
//! - Take an opaque string input and return an opaque string output
//! - Fail by returning an [`ActivityError`], which is reported to the service
//! - Observe worker shutdown via [`ActivityContext::cancelled`]

mod context;
mod definition;
mod executor;

pub use context::ActivityContext;
pub use definition::{Activity, ActivityError};
pub use executor::{ActivityExecutor, ACTIVITY_PANIC, UNREGISTERED_ACTIVITY};
