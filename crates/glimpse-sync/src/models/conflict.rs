//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::EntityKind;

/// Recorded pull-phase conflict resolved by strategy
///
/// `"lww"` means an incoming remote row older than the local row was
/// discarded; `"pending-preserved"` means a local in-flight edit was kept
/// over a newer remote row until it gets pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Record table involved in the conflict
    pub entity: EntityKind,
    /// Record involved in the conflict
    pub entity_id: String,
    /// Local row's timestamp when the conflict occurred
    pub local_updated_at: i64,
    /// Incoming row's timestamp
    pub incoming_updated_at: i64,
    /// Resolution timestamp (Unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
