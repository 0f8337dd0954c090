//! ABOUTME: Redis-backed distributed mutual exclusion (spec §4.8, §5)
//! ABOUTME: The only cross-process synchronization primitive in the system

pub mod error;
pub mod in_memory;
pub mod redis_lock;
pub mod traits;

pub use error::{LockError, Result};
pub use in_memory::InMemoryLock;
pub use redis_lock::RedisLock;
pub use traits::{DistributedLock, LockHandle};
