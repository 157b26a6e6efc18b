use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "listing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Expired,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash, Default)]
#[sqlx(type_name = "listing_category", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ListingCategory {
    #[default]
    ForSale,
    ForRent,
    Offices,
    Land,
}

impl ListingCategory {
    pub const ALL: [ListingCategory; 4] = [
        ListingCategory::ForSale,
        ListingCategory::ForRent,
        ListingCategory::Offices,
        ListingCategory::Land,
    ];

    /// URL slug, as used in `/category/:slug` and the `category` query parameter.
    pub fn slug(&self) -> &'static str {
        match self {
            ListingCategory::ForSale => "for-sale",
            ListingCategory::ForRent => "for-rent",
            ListingCategory::Offices => "offices",
            ListingCategory::Land => "land",
        }
    }

    /// Human readable label used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            ListingCategory::ForSale => "for sale",
            ListingCategory::ForRent => "for rent",
            ListingCategory::Offices => "offices",
            ListingCategory::Land => "land",
        }
    }
}

impl FromStr for ListingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slug = s.trim().to_lowercase();
        ListingCategory::ALL
            .into_iter()
            .find(|category| category.slug() == slug)
            .ok_or_else(|| format!("Unknown listing category: {}", s))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "property_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Villa,
    Office,
    Land,
}

impl PropertyType {
    /// Parses a search filter value. `"all"` and blank input mean "no filter".
    pub fn parse_filter(value: &str) -> Result<Option<PropertyType>, String> {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "" | "all" => Ok(None),
            "apartment" => Ok(Some(PropertyType::Apartment)),
            "house" => Ok(Some(PropertyType::House)),
            "villa" => Ok(Some(PropertyType::Villa)),
            "office" => Ok(Some(PropertyType::Office)),
            "land" => Ok(Some(PropertyType::Land)),
            other => Err(format!("Unknown property type: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ListingImage {
    pub url: String,
    #[serde(default, rename = "publicId", skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(default, rename = "isMain")]
    pub is_main: bool,
}

impl ListingImage {
    pub fn new(url: impl Into<String>, public_id: Option<String>) -> Self {
        ListingImage {
            url: url.into(),
            public_id,
            is_main: false,
        }
    }
}

/// Keeps at most one main image: the first flagged image wins, and when
/// nothing is flagged the first image becomes the main one.
pub fn normalise_main_image(images: &mut [ListingImage]) {
    let main_index = images.iter().position(|image| image.is_main).unwrap_or(0);
    for (index, image) in images.iter_mut().enumerate() {
        image.is_main = index == main_index;
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,

    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: ListingCategory,
    pub property_type: Option<PropertyType>,

    //Address
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub size_sqm: Option<f64>,

    pub images: Json<Vec<ListingImage>>,

    pub expires_at: DateTime<Utc>,
    pub status: ListingStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Active in storage but already past its expiry time.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == ListingStatus::Active && self.expires_at <= now
    }

    /// Status a reader should observe, regardless of whether the sweep has
    /// caught up with this row yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ListingStatus {
        if self.is_stale(now) {
            ListingStatus::Expired
        } else {
            self.status
        }
    }

    pub fn main_image(&self) -> Option<&ListingImage> {
        self.images
            .0
            .iter()
            .find(|image| image.is_main)
            .or_else(|| self.images.0.first())
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::fixtures::listing;
    use super::*;

    #[test]
    fn test_category_slug_roundtrip() {
        for category in ListingCategory::ALL {
            assert_eq!(category.slug().parse::<ListingCategory>(), Ok(category));
        }
        assert!("penthouses".parse::<ListingCategory>().is_err());
        assert_eq!(" For-Rent ".parse::<ListingCategory>(), Ok(ListingCategory::ForRent));
    }

    #[test]
    fn test_category_serde_uses_slug() {
        let json = serde_json::to_string(&ListingCategory::ForSale).unwrap();
        assert_eq!(json, "\"for-sale\"");
        assert_eq!(ListingCategory::ForSale.label(), "for sale");
    }

    #[test]
    fn test_property_type_filter() {
        assert_eq!(PropertyType::parse_filter("all"), Ok(None));
        assert_eq!(PropertyType::parse_filter(""), Ok(None));
        assert_eq!(PropertyType::parse_filter("Villa"), Ok(Some(PropertyType::Villa)));
        assert!(PropertyType::parse_filter("castle").is_err());
    }

    #[test]
    fn test_normalise_main_image() {
        let mut images = vec![
            ListingImage::new("https://res.cloudinary.com/demo/a.jpg", None),
            ListingImage { is_main: true, ..ListingImage::new("https://res.cloudinary.com/demo/b.jpg", None) },
            ListingImage { is_main: true, ..ListingImage::new("https://res.cloudinary.com/demo/c.jpg", None) },
        ];
        normalise_main_image(&mut images);
        let flags: Vec<bool> = images.iter().map(|i| i.is_main).collect();
        assert_eq!(flags, vec![false, true, false]);

        let mut unflagged = vec![
            ListingImage::new("https://res.cloudinary.com/demo/a.jpg", None),
            ListingImage::new("https://res.cloudinary.com/demo/b.jpg", None),
        ];
        normalise_main_image(&mut unflagged);
        assert!(unflagged[0].is_main);
        assert!(!unflagged[1].is_main);

        let mut empty: Vec<ListingImage> = vec![];
        normalise_main_image(&mut empty);
    }

    #[test]
    fn test_effective_status() {
        let now = Utc::now();

        let stale = listing(ListingStatus::Active, now - Duration::minutes(1));
        assert!(stale.is_stale(now));
        assert_eq!(stale.effective_status(now), ListingStatus::Expired);

        let boundary = listing(ListingStatus::Active, now);
        assert_eq!(boundary.effective_status(now), ListingStatus::Expired);

        let live = listing(ListingStatus::Active, now + Duration::days(3));
        assert_eq!(live.effective_status(now), ListingStatus::Active);

        let expired = listing(ListingStatus::Expired, now + Duration::days(3));
        assert_eq!(expired.effective_status(now), ListingStatus::Expired);
    }
}
