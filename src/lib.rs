//! A concurrency core for pooling per-application-root fleets of
//! worker-process instances: acquire a session against an application root,
//! spawning, reusing, or waiting for capacity as needed; release it back
//! when done. Modeled on the single mutex + condition variable design of
//! Phusion Passenger's `ApplicationPool`.
//!
//! # Example
//!
//! ```ignore
//! use apppool::{AcquireOptions, Pool, PoolConfig};
//!
//! let pool = Pool::new(my_spawner, PoolConfig::default())?;
//! let session = pool.get("/srv/app", AcquireOptions::default())?;
//! // ... use `session` (Deref's to the collaborator's Session type) ...
//! pool.release(session);
//! ```

mod config;
mod container;
mod domain;
mod error;
mod idle;
mod pool;
mod restart;
mod session;
mod slab;
mod spawner;
#[cfg(test)]
mod testutil;

pub use config::{AcquireOptions, PoolConfig};
pub use error::{Error, Result};
pub use pool::{Pool, PoolStats};
pub use session::Session;
pub use spawner::{CollaboratorError, Instance, Spawner};
