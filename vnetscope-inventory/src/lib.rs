pub mod arm;
pub mod error;
pub mod record;
pub mod snapshot;

pub use error::{InventoryError, Result};
pub use record::{ParsedRecord, PeeringRecord, RawRecord, RawResource, ResourceKind};
pub use snapshot::{Snapshot, SnapshotIssue, SnapshotMetadata};
