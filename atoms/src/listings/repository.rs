use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;

use super::model::{Listing, ListingType};
use crate::error::StoreError;
use crate::media::ImageRecord;

/// Persistence for listings. Failures propagate to the caller.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn create(&self, listing: &Listing) -> Result<(), StoreError>;

    async fn find_by_id(&self, listing_id: &str) -> Result<Option<Listing>, StoreError>;

    /// Replace a stored listing; `StoreError::NotFound` if it vanished.
    async fn update_by_id(&self, listing_id: &str, listing: &Listing) -> Result<Listing, StoreError>;

    async fn delete_by_id(&self, listing_id: &str) -> Result<(), StoreError>;

    async fn list_all(&self) -> Result<Vec<Listing>, StoreError>;

    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Listing>, StoreError>;

    /// The listing whose gallery already holds `image`, if any.
    async fn find_by_image(&self, image: &ImageRecord) -> Result<Option<Listing>, StoreError>;
}

enum ListingFilter<'a> {
    Owner(&'a str),
    Image(&'a ImageRecord),
}

/// Listings in the shared table:
/// PK = "LISTING"
/// SK = "LISTING#{listing_id}"
pub struct DynamoListingRepository {
    client: DynamoClient,
    table_name: String,
}

impl DynamoListingRepository {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn query_listings(
        &self,
        filter: Option<ListingFilter<'_>>,
    ) -> Result<Vec<Listing>, StoreError> {
        let mut listings = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut builder = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(LISTING_PK.to_string()))
                .expression_attribute_values(":sk_prefix", AttributeValue::S(SK_PREFIX.to_string()))
                .set_exclusive_start_key(start_key.take());

            match &filter {
                Some(ListingFilter::Owner(user_id)) => {
                    builder = builder
                        .filter_expression("user_ref = :uid")
                        .expression_attribute_values(":uid", AttributeValue::S(user_id.to_string()));
                }
                // Stored image maps are {url, public_id}; contains() needs the exact map
                Some(ListingFilter::Image(image)) => {
                    builder = builder
                        .filter_expression("contains(image_urls, :img)")
                        .expression_attribute_values(":img", image_to_attr(image));
                }
                None => {}
            }

            let result = builder.send().await.map_err(|e| {
                tracing::error!(
                    "DynamoDB listings query failed for table {}: {:?}",
                    self.table_name,
                    e
                );
                StoreError::dynamo(e)
            })?;

            for item in result.items() {
                listings.push(listing_from_item(item)?);
            }

            match result.last_evaluated_key() {
                Some(key) => start_key = Some(key.clone()),
                None => break,
            }
        }

        Ok(listings)
    }
}

const LISTING_PK: &str = "LISTING";
const SK_PREFIX: &str = "LISTING#";

#[async_trait]
impl ListingRepository for DynamoListingRepository {
    async fn create(&self, listing: &Listing) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(listing_to_item(listing)))
            .condition_expression("attribute_not_exists(SK)")
            .send()
            .await
            .map_err(StoreError::dynamo)?;
        Ok(())
    }

    async fn find_by_id(&self, listing_id: &str) -> Result<Option<Listing>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(LISTING_PK.to_string()))
            .key("SK", AttributeValue::S(format!("{}{}", SK_PREFIX, listing_id)))
            .send()
            .await
            .map_err(StoreError::dynamo)?;

        result.item().map(listing_from_item).transpose()
    }

    async fn update_by_id(&self, listing_id: &str, listing: &Listing) -> Result<Listing, StoreError> {
        let mut stored = listing.clone();
        stored.listing_id = listing_id.to_string();

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(listing_to_item(&stored)))
            .condition_expression("attribute_exists(SK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(stored),
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Err(StoreError::NotFound)
            }
            Err(e) => Err(StoreError::dynamo(e)),
        }
    }

    async fn delete_by_id(&self, listing_id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(LISTING_PK.to_string()))
            .key("SK", AttributeValue::S(format!("{}{}", SK_PREFIX, listing_id)))
            .send()
            .await
            .map_err(StoreError::dynamo)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Listing>, StoreError> {
        self.query_listings(None).await
    }

    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Listing>, StoreError> {
        self.query_listings(Some(ListingFilter::Owner(user_id))).await
    }

    async fn find_by_image(&self, image: &ImageRecord) -> Result<Option<Listing>, StoreError> {
        let holders = self.query_listings(Some(ListingFilter::Image(image))).await?;
        Ok(holders.into_iter().next())
    }
}

fn image_to_attr(image: &ImageRecord) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        ("url".to_string(), AttributeValue::S(image.url.clone())),
        ("public_id".to_string(), AttributeValue::S(image.public_id.clone())),
    ]))
}

fn listing_to_item(listing: &Listing) -> HashMap<String, AttributeValue> {
    let images = listing.image_urls.iter().map(image_to_attr).collect();

    HashMap::from([
        ("PK".to_string(), AttributeValue::S(LISTING_PK.to_string())),
        ("SK".to_string(), AttributeValue::S(format!("{}{}", SK_PREFIX, listing.listing_id))),
        ("user_ref".to_string(), AttributeValue::S(listing.user_ref.clone())),
        ("name".to_string(), AttributeValue::S(listing.name.clone())),
        ("description".to_string(), AttributeValue::S(listing.description.clone())),
        ("address".to_string(), AttributeValue::S(listing.address.clone())),
        ("listing_type".to_string(), AttributeValue::S(listing.listing_type.as_str().to_string())),
        ("bedrooms".to_string(), AttributeValue::N(listing.bedrooms.to_string())),
        ("bathrooms".to_string(), AttributeValue::N(listing.bathrooms.to_string())),
        ("regular_price".to_string(), AttributeValue::N(listing.regular_price.to_string())),
        ("discount_price".to_string(), AttributeValue::N(listing.discount_price.to_string())),
        ("offer".to_string(), AttributeValue::Bool(listing.offer)),
        ("parking".to_string(), AttributeValue::Bool(listing.parking)),
        ("furnished".to_string(), AttributeValue::Bool(listing.furnished)),
        ("image_urls".to_string(), AttributeValue::L(images)),
        ("listing_created_at".to_string(), AttributeValue::S(listing.listing_created_at.clone())),
        ("listing_updated_at".to_string(), AttributeValue::S(listing.listing_updated_at.clone())),
    ])
}

fn listing_from_item(item: &HashMap<String, AttributeValue>) -> Result<Listing, StoreError> {
    let listing_id = item
        .get("SK")
        .and_then(|v| v.as_s().ok())
        .and_then(|sk| sk.strip_prefix(SK_PREFIX))
        .ok_or_else(|| StoreError::Malformed("listing item without SK".to_string()))?
        .to_string();

    let listing_type = item
        .get("listing_type")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| ListingType::parse(s))
        .ok_or_else(|| StoreError::Malformed(format!("listing {} has no valid type", listing_id)))?;

    let image_urls = item
        .get("image_urls")
        .and_then(|v| v.as_l().ok())
        .map(|images| {
            images
                .iter()
                .filter_map(|image| image.as_m().ok())
                .filter_map(|image| {
                    Some(ImageRecord {
                        url: image.get("url")?.as_s().ok()?.to_string(),
                        public_id: image.get("public_id")?.as_s().ok()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Listing {
        listing_id,
        user_ref: string_attr(item, "user_ref"),
        name: string_attr(item, "name"),
        description: string_attr(item, "description"),
        address: string_attr(item, "address"),
        listing_type,
        bedrooms: number_attr(item, "bedrooms"),
        bathrooms: number_attr(item, "bathrooms"),
        regular_price: number_attr(item, "regular_price"),
        discount_price: number_attr(item, "discount_price"),
        offer: bool_attr(item, "offer"),
        parking: bool_attr(item, "parking"),
        furnished: bool_attr(item, "furnished"),
        image_urls,
        listing_created_at: string_attr(item, "listing_created_at"),
        listing_updated_at: string_attr(item, "listing_updated_at"),
    })
}

pub(crate) fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> String {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

pub(crate) fn number_attr<T: std::str::FromStr + Default>(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> T {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .unwrap_or_default()
}

pub(crate) fn bool_attr(item: &HashMap<String, AttributeValue>, name: &str) -> bool {
    item.get(name)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false)
}
