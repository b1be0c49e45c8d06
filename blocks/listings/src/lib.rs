pub mod error;
pub mod listings;
pub mod response;
pub mod users;

pub use error::ApiError;
pub use listings::ListingLimits;
