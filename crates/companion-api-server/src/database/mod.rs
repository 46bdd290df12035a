pub mod memory;
pub mod models;
pub mod pool;
pub mod repository;

pub use memory::InMemorySessionRepository;
pub use models::*;
pub use pool::DbPool;
pub use repository::{PgSessionRepository, SessionRepository};
