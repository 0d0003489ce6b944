//! parlor-core: shared types, error taxonomy, config schema, and clock abstraction
//!
//! Everything the other parlor crates agree on lives here: the record types
//! mirroring the relational schema, the error taxonomy of the encrypted-session
//! core, the TOML config schema, and the injectable clock used for all
//! expiry decisions.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;
pub mod types;

pub use error::{ParlorError, ParlorResult};
pub use time::{Clock, ManualClock, SystemClock};
