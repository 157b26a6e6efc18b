use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::propertymodel::{
    Listing, ListingCategory, ListingImage, ListingStatus, PropertyType,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateListingDto {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 10, max = 5000, message = "Description must be between 10 and 5000 characters"))]
    pub description: String,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,

    pub category: ListingCategory,
    pub property_type: Option<PropertyType>,

    //Address
    #[validate(length(min = 2, max = 100, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 2, max = 100, message = "Country is required"))]
    pub country: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[validate(range(min = 0, max = 100))]
    pub bedrooms: Option<i32>,

    #[validate(range(min = 0, max = 100))]
    pub bathrooms: Option<i32>,

    #[validate(range(min = 0.0))]
    pub size_sqm: Option<f64>,

    pub images: Option<Vec<ListingImage>>,

    /// Defaults to now + the configured listing lifetime.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateListingDto {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 10, max = 5000, message = "Description must be between 10 and 5000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,

    pub category: Option<ListingCategory>,
    pub property_type: Option<PropertyType>,

    #[validate(length(min = 2, max = 100))]
    pub city: Option<String>,

    #[validate(length(min = 2, max = 100))]
    pub country: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[validate(range(min = 0, max = 100))]
    pub bedrooms: Option<i32>,

    #[validate(range(min = 0, max = 100))]
    pub bathrooms: Option<i32>,

    #[validate(range(min = 0.0))]
    pub size_sqm: Option<f64>,

    /// Moving this into the future reactivates an expired listing.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Latitude/longitude bounds, checked alongside `validate()`.
pub fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), String> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err("Latitude must be between -90 and 90".to_string());
        }
    }
    if let Some(lng) = longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err("Longitude must be between -180 and 180".to_string());
        }
    }
    Ok(())
}

/// One entry of `cloudinaryUrls`: either a bare URL or the `{url, publicId}`
/// pair returned by the signed upload client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum UploadedImageRef {
    Url(String),
    Uploaded {
        url: String,
        #[serde(rename = "publicId")]
        public_id: Option<String>,
    },
}

impl UploadedImageRef {
    pub fn url(&self) -> &str {
        match self {
            UploadedImageRef::Url(url) => url,
            UploadedImageRef::Uploaded { url, .. } => url,
        }
    }

    pub fn into_image(self) -> ListingImage {
        match self {
            UploadedImageRef::Url(url) => ListingImage::new(url, None),
            UploadedImageRef::Uploaded { url, public_id } => ListingImage::new(url, public_id),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssociateImagesDto {
    #[serde(rename = "cloudinaryUrls")]
    pub cloudinary_urls: Vec<UploadedImageRef>,
}

impl AssociateImagesDto {
    pub fn into_images(self) -> Result<Vec<ListingImage>, String> {
        if self.cloudinary_urls.is_empty() {
            return Err("At least one image URL is required".to_string());
        }

        self.cloudinary_urls
            .into_iter()
            .map(|image| {
                let url = image.url().trim();
                if url.starts_with("https://") || url.starts_with("http://") {
                    Ok(image.into_image())
                } else {
                    Err(format!("Invalid image URL: {}", url))
                }
            })
            .collect()
    }
}

/// Lenient numeric parse for the price filter. Non-numeric, negative or
/// non-finite input yields `None` and the filter is dropped.
pub fn parse_price_filter(input: &str) -> Option<f64> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchQueryDto {
    pub category: Option<String>,
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingSearchFilters {
    pub category: ListingCategory,
    pub free_text: Option<String>,
    pub property_type: Option<PropertyType>,
    pub max_price: Option<f64>,
}

impl SearchQueryDto {
    /// Unknown categories and property types are rejected; a malformed
    /// `maxPrice` is silently dropped.
    pub fn into_filters(self) -> Result<ListingSearchFilters, String> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => ListingCategory::default(),
            Some(slug) => slug.parse::<ListingCategory>()?,
        };

        let property_type = match self.property_type.as_deref() {
            Some(value) => PropertyType::parse_filter(value)?,
            None => None,
        };

        let free_text = self
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        let max_price = self.max_price.as_deref().and_then(parse_price_filter);

        Ok(ListingSearchFilters {
            category,
            free_text,
            property_type,
            max_price,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListingDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: ListingCategory,
    pub property_type: Option<PropertyType>,
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub size_sqm: Option<f64>,
    pub images: Vec<ListingImage>,
    pub main_image: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingDto {
    pub fn from_listing(listing: &Listing, now: DateTime<Utc>) -> Self {
        ListingDto {
            id: listing.id,
            owner_id: listing.owner_id,
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price,
            category: listing.category,
            property_type: listing.property_type,
            city: listing.city.clone(),
            country: listing.country.clone(),
            latitude: listing.latitude,
            longitude: listing.longitude,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            size_sqm: listing.size_sqm,
            images: listing.images.0.clone(),
            main_image: listing.main_image().map(|image| image.url.clone()),
            expires_at: listing.expires_at,
            status: listing.effective_status(now),
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }

    pub fn from_listings(listings: &[Listing], now: DateTime<Utc>) -> Vec<Self> {
        listings
            .iter()
            .map(|listing| ListingDto::from_listing(listing, now))
            .collect()
    }

    /// Drops entries whose `expires_at` has passed since they were built.
    pub fn retain_live(listings: Vec<ListingDto>, now: DateTime<Utc>) -> Vec<ListingDto> {
        listings
            .into_iter()
            .filter(|listing| listing.expires_at > now)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::propertymodel::fixtures::listing;

    #[test]
    fn test_retain_live_drops_entries_that_expired_after_caching() {
        let built_at = Utc::now();
        let cached = ListingDto::from_listings(
            &[
                listing(ListingStatus::Active, built_at + Duration::minutes(2)),
                listing(ListingStatus::Active, built_at + Duration::days(10)),
            ],
            built_at,
        );
        assert!(cached.iter().all(|dto| dto.status == ListingStatus::Active));

        let later = built_at + Duration::minutes(3);
        let live = ListingDto::retain_live(cached.clone(), later);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, cached[1].id);

        let at_boundary = ListingDto::retain_live(cached.clone(), cached[0].expires_at);
        assert_eq!(at_boundary.len(), 1);
    }

    #[test]
    fn test_parse_price_filter() {
        assert_eq!(parse_price_filter("500000"), Some(500000.0));
        assert_eq!(parse_price_filter(" 1250.5 "), Some(1250.5));
        assert_eq!(parse_price_filter("abc"), None);
        assert_eq!(parse_price_filter(""), None);
        assert_eq!(parse_price_filter("-10"), None);
        assert_eq!(parse_price_filter("NaN"), None);
        assert_eq!(parse_price_filter("inf"), None);
    }

    #[test]
    fn test_search_query_defaults_to_for_sale() {
        let filters = SearchQueryDto::default().into_filters().unwrap();
        assert_eq!(filters.category, ListingCategory::ForSale);
        assert_eq!(filters.free_text, None);
        assert_eq!(filters.property_type, None);
        assert_eq!(filters.max_price, None);
    }

    #[test]
    fn test_search_query_drops_malformed_max_price() {
        let query = SearchQueryDto {
            category: Some("for-rent".to_string()),
            q: Some("  villa ".to_string()),
            property_type: Some("all".to_string()),
            max_price: Some("abc".to_string()),
        };
        let filters = query.into_filters().unwrap();
        assert_eq!(filters.category, ListingCategory::ForRent);
        assert_eq!(filters.free_text.as_deref(), Some("villa"));
        assert_eq!(filters.property_type, None);
        assert_eq!(filters.max_price, None);
    }

    #[test]
    fn test_search_query_rejects_unknown_category() {
        let query = SearchQueryDto {
            category: Some("castles".to_string()),
            ..Default::default()
        };
        assert!(query.into_filters().is_err());
    }

    #[test]
    fn test_search_query_deserializes_wire_names() {
        let query: SearchQueryDto =
            serde_urlencoded::from_str("category=land&q=&type=villa&maxPrice=900000").unwrap();
        let filters = query.into_filters().unwrap();
        assert_eq!(filters.category, ListingCategory::Land);
        assert_eq!(filters.free_text, None);
        assert_eq!(filters.property_type, Some(PropertyType::Villa));
        assert_eq!(filters.max_price, Some(900000.0));
    }

    #[test]
    fn test_associate_images_accepts_both_shapes() {
        let body: AssociateImagesDto = serde_json::from_value(serde_json::json!({
            "cloudinaryUrls": [
                "https://res.cloudinary.com/demo/image/upload/a.jpg",
                { "url": "https://res.cloudinary.com/demo/image/upload/b.jpg", "publicId": "estatehub/properties/b" }
            ]
        }))
        .unwrap();

        let images = body.into_images().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].public_id, None);
        assert_eq!(images[1].public_id.as_deref(), Some("estatehub/properties/b"));
    }

    #[test]
    fn test_associate_images_rejects_empty_and_bad_urls() {
        let empty = AssociateImagesDto { cloudinary_urls: vec![] };
        assert!(empty.into_images().is_err());

        let bad = AssociateImagesDto {
            cloudinary_urls: vec![UploadedImageRef::Url("javascript:alert(1)".to_string())],
        };
        assert!(bad.into_images().is_err());
    }

    #[test]
    fn test_listing_dto_reports_effective_status() {
        let now = Utc::now();
        let stale = listing(ListingStatus::Active, now - Duration::hours(2));
        let dto = ListingDto::from_listing(&stale, now);
        assert_eq!(dto.status, ListingStatus::Expired);

        let value = serde_json::to_value(&dto).unwrap();
        assert_eq!(value["status"], "expired");
        assert!(value.get("expiresAt").is_some());
    }

    #[test]
    fn test_create_listing_validation() {
        let dto = CreateListingDto {
            title: "TV".to_string(),
            description: "short".to_string(),
            price: -1.0,
            category: ListingCategory::ForSale,
            property_type: None,
            city: "Port Louis".to_string(),
            country: "Mauritius".to_string(),
            latitude: Some(120.0),
            longitude: None,
            bedrooms: None,
            bathrooms: None,
            size_sqm: None,
            images: None,
            expires_at: None,
        };
        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("description"));
        assert!(fields.contains_key("price"));

        assert!(validate_coordinates(dto.latitude, dto.longitude).is_err());
        assert!(validate_coordinates(Some(-20.16), Some(57.5)).is_ok());
        assert!(validate_coordinates(None, Some(-181.0)).is_err());
    }
}
