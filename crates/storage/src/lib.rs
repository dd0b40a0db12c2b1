//! pact-storage: the transactional storage seam of the performance
//! agreement engine.
//!
//! [`PactStorage`] is implemented by every backend. [`MemoryStorage`] is the
//! bundled implementation, and [`conformance`] is the suite any backend must
//! pass.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::{StorageError, PENDING_REQUEST_UNIQUE, SELECTION_UNIQUE};
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{IndicatorRecord, PartnerRecord};
pub use traits::PactStorage;
