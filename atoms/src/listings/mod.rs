// Re-export model types, repository and search
pub mod model;
pub mod repository;
pub mod search;

pub use model::{CreateListingPayload, Listing, ListingType, UpdateListingPayload};
pub use repository::{DynamoListingRepository, ListingRepository};
pub use search::{apply_query, ListingQuery, SortField, SortOrder};
