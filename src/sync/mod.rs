//! Cache-aside synchronization between the remote API and the local store.
//!
//! - Serves records from the local store when it has any
//! - Falls back to one remote fetch when the store is empty
//! - Writes fetched records back once per store per session, guarded by a
//!   per-store latch owned by the helper instance

mod latch;
mod layer;
mod traits;

pub use latch::LatchState;
pub use layer::SyncHelper;
pub use traits::{Record, SyncResult};
