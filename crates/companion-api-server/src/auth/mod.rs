pub mod extractor;
pub mod jwt;

pub use extractor::AuthUser;
pub use jwt::{Claims, JwtManager};
