use std::cmp::Ordering;

use super::model::{Listing, ListingType};

pub const DEFAULT_LIMIT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    RegularPrice,
    DiscountPrice,
    Bedrooms,
    Bathrooms,
    Name,
}

impl SortField {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" | "createdAt" => Some(SortField::CreatedAt),
            "regular_price" | "regularPrice" => Some(SortField::RegularPrice),
            "discount_price" | "discountPrice" => Some(SortField::DiscountPrice),
            "bedrooms" => Some(SortField::Bedrooms),
            "bathrooms" => Some(SortField::Bathrooms),
            "name" => Some(SortField::Name),
            _ => None,
        }
    }

    fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        match self {
            SortField::CreatedAt => a.listing_created_at.cmp(&b.listing_created_at),
            SortField::RegularPrice => a.regular_price.cmp(&b.regular_price),
            SortField::DiscountPrice => a.discount_price.cmp(&b.discount_price),
            SortField::Bedrooms => a.bedrooms.cmp(&b.bedrooms),
            SortField::Bathrooms => a.bathrooms.cmp(&b.bathrooms),
            SortField::Name => a.name.cmp(&b.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Public listing search. Flags set to `None` match both values.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub limit: usize,
    pub start_index: usize,
    pub offer: Option<bool>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    pub listing_type: Option<ListingType>,
    pub search_term: String,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            start_index: 0,
            offer: None,
            furnished: None,
            parking: None,
            listing_type: None,
            search_term: String::new(),
            sort: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl ListingQuery {
    /// Build a query from raw query-string values. Unknown or malformed
    /// values fall back to the defaults.
    pub fn from_lookup<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str| match lookup(key) {
            Some("true") => Some(true),
            _ => None,
        };

        Self {
            limit: lookup("limit")
                .and_then(|v| v.parse().ok())
                .filter(|limit: &usize| *limit > 0)
                .unwrap_or(defaults.limit),
            start_index: lookup("start_index")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.start_index),
            offer: flag("offer"),
            furnished: flag("furnished"),
            parking: flag("parking"),
            listing_type: lookup("type").and_then(ListingType::parse),
            search_term: lookup("search_term").unwrap_or_default().trim().to_string(),
            sort: lookup("sort")
                .and_then(SortField::parse)
                .unwrap_or(defaults.sort),
            order: match lookup("order") {
                Some("asc") => SortOrder::Asc,
                _ => SortOrder::Desc,
            },
        }
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        let flag_ok = |wanted: Option<bool>, actual: bool| wanted.map_or(true, |w| w == actual);

        flag_ok(self.offer, listing.offer)
            && flag_ok(self.furnished, listing.furnished)
            && flag_ok(self.parking, listing.parking)
            && self.listing_type.map_or(true, |t| t == listing.listing_type)
            && (self.search_term.is_empty()
                || listing
                    .name
                    .to_lowercase()
                    .contains(&self.search_term.to_lowercase()))
    }
}

/// Filter, sort and page a set of listings.
pub fn apply_query(listings: Vec<Listing>, query: &ListingQuery) -> Vec<Listing> {
    let mut matched: Vec<Listing> = listings.into_iter().filter(|l| query.matches(l)).collect();

    matched.sort_by(|a, b| {
        let ordering = query.sort.compare(a, b);
        match query.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    matched
        .into_iter()
        .skip(query.start_index)
        .take(query.limit)
        .collect()
}
