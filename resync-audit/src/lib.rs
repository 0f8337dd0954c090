//! ABOUTME: Lifecycle management for memory records awaiting human review (spec §4.9)
//! ABOUTME: Race-free per-record processing built on `resync-lock`

pub mod error;
pub mod guard;
pub mod in_memory;
pub mod record;
pub mod redis_queue;
pub mod traits;

pub use error::{AuditError, Result};
pub use guard::AuditGuard;
pub use in_memory::InMemoryAuditQueue;
pub use record::{AuditMetrics, AuditRecord, AuditStatus};
pub use redis_queue::RedisAuditQueue;
pub use traits::AuditQueue;
