use serde::{Deserialize, Serialize};

use crate::media::{ImageRecord, IncomingImage};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Sale,
    Rent,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Sale => "sale",
            ListingType::Rent => "rent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sale" => Some(ListingType::Sale),
            "rent" => Some(ListingType::Rent),
            _ => None,
        }
    }
}

/// Listing domain model. `image_urls` is in display order; the first image
/// is the cover.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Listing {
    pub listing_id: String,
    pub user_ref: String,
    pub name: String,
    pub description: String,
    pub address: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub regular_price: u64,
    pub discount_price: u64,
    pub offer: bool,
    pub parking: bool,
    pub furnished: bool,
    pub image_urls: Vec<ImageRecord>,
    pub listing_created_at: String,
    pub listing_updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingPayload {
    pub name: String,
    pub description: String,
    pub address: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub regular_price: u64,
    #[serde(default)]
    pub discount_price: u64,
    #[serde(default)]
    pub offer: bool,
    #[serde(default)]
    pub parking: bool,
    #[serde(default)]
    pub furnished: bool,
    #[serde(default)]
    pub image_urls: Vec<IncomingImage>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateListingPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub regular_price: Option<u64>,
    pub discount_price: Option<u64>,
    pub offer: Option<bool>,
    pub parking: Option<bool>,
    pub furnished: Option<bool>,
    // None leaves the stored images untouched
    pub image_urls: Option<Vec<IncomingImage>>,
}

impl UpdateListingPayload {
    /// Apply the scalar fields to `listing`. Images are reconciled separately.
    pub fn apply_fields(&self, listing: &mut Listing) {
        if let Some(name) = &self.name {
            listing.name = name.clone();
        }
        if let Some(description) = &self.description {
            listing.description = description.clone();
        }
        if let Some(address) = &self.address {
            listing.address = address.clone();
        }
        if let Some(listing_type) = self.listing_type {
            listing.listing_type = listing_type;
        }
        if let Some(bedrooms) = self.bedrooms {
            listing.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = self.bathrooms {
            listing.bathrooms = bathrooms;
        }
        if let Some(regular_price) = self.regular_price {
            listing.regular_price = regular_price;
        }
        if let Some(discount_price) = self.discount_price {
            listing.discount_price = discount_price;
        }
        if let Some(offer) = self.offer {
            listing.offer = offer;
        }
        if let Some(parking) = self.parking {
            listing.parking = parking;
        }
        if let Some(furnished) = self.furnished {
            listing.furnished = furnished;
        }
    }
}
