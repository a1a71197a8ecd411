//! Layered client cache.
//!
//! Every view of the website is served from a two-tier cache: a process
//! lifetime memory tier and a durable tier that survives restarts. Readers get
//! the best value available synchronously; background refreshes reconcile it
//! with the server and only write when the payload actually changed.
//!
//! - `SwrCache`: the stale-while-revalidate primitive all stores share
//! - `DurableStore`: `FileStore` on disk, `MemoryStore` in process
//! - `CacheEntry`, `CachePolicy`: stored values and their TTL / size bound
//! - `CacheView`, `LoadState`: what a reader sees

pub mod clock;
pub mod entry;
pub(crate) mod lock;
pub mod state;
pub mod storage;
pub mod swr;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CachePolicy};
pub use state::{CacheView, LoadState};
pub use storage::{DurableStore, FileStore, MemoryStore, StorageError};
pub use swr::{DurableLayout, RefreshOutcome, SwrCache};
