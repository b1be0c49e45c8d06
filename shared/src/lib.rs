pub mod auth;
pub mod config;
pub mod users;

use std::sync::Arc;

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use estate_atoms::listings::{DynamoListingRepository, ListingRepository};
use estate_atoms::media::{ImageReconciler, S3AssetStore};
use estate_atoms::users::{DynamoUserRepository, UserRepository};

pub use config::{Config, ConfigError};

const LISTINGS_FOLDER: &str = "listings";
const AVATARS_FOLDER: &str = "avatars";

/// Everything a request needs, built once per cold start.
pub struct AppState {
    pub cognito_client: CognitoClient,
    pub config: Config,
    pub listings: Arc<dyn ListingRepository>,
    pub users: Arc<dyn UserRepository>,
    pub listing_images: ImageReconciler,
    pub avatars: ImageReconciler,
}

impl AppState {
    pub async fn new(config: Config) -> Self {
        let aws = aws_config::load_from_env().await;
        let dynamo_client = DynamoClient::new(&aws);
        let s3_client = S3Client::new(&aws);

        let store = |folder: &str| {
            ImageReconciler::new(Arc::new(S3AssetStore::new(
                s3_client.clone(),
                config.bucket_name.clone(),
                folder,
                config.asset_base_url.clone(),
            )))
        };
        let listing_images = store(LISTINGS_FOLDER);
        let avatars = store(AVATARS_FOLDER);

        tracing::info!(
            "🏗️ State ready - table: {} bucket: {}",
            config.table_name,
            config.bucket_name
        );

        Self {
            cognito_client: CognitoClient::new(&aws),
            listings: Arc::new(DynamoListingRepository::new(
                dynamo_client.clone(),
                config.table_name.clone(),
            )),
            users: Arc::new(DynamoUserRepository::new(dynamo_client, config.table_name.clone())),
            listing_images,
            avatars,
            config,
        }
    }
}
