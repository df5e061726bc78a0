//! One WebSocket accept+read loop per peer type (§2, §4.5, §4.6), each
//! bound to its own port. Grounded on
//! `examples/hi-youichi-loom/serve/src/connection.rs`'s read-loop shape;
//! the teacher enables axum's `ws` feature but never exercises it, so this
//! module is the pack's nearest precedent rather than teacher-internal.

pub mod agent_session;
pub mod ui_session;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::coordinator::Coordinator;

/// The coordinator, shared between the two session acceptor loops. All
/// mutation is serialized through this single async mutex (§5).
pub type SharedCoordinator = Arc<Mutex<Coordinator>>;
