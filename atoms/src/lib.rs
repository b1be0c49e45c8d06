pub mod error;
pub mod listings;
pub mod media;
pub mod users;

pub use error::StoreError;
