//! Bus transport adapters: Redis for production, in-memory for tests.

mod in_memory;
mod redis;

pub use in_memory::InMemoryBus;
pub use redis::RedisBus;
