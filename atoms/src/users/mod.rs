pub mod model;
pub mod repository;

pub use model::{UpdateUserPayload, User, UserContact, DEFAULT_AVATAR};
pub use repository::{DynamoUserRepository, UserRepository};
