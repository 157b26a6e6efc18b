use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DBClient,
    dtos::propertydtos::{CreateListingDto, ListingSearchFilters, UpdateListingDto},
    models::propertymodel::{normalise_main_image, Listing, ListingCategory, ListingImage, ListingStatus},
};

const LISTING_COLUMNS: &str = r#"
    id, owner_id, title, description, price, category, property_type,
    city, country, latitude, longitude, bedrooms, bathrooms, size_sqm,
    images, expires_at, status, created_at, updated_at
"#;

/// Locks the listing row so concurrent appends apply one after the other.
const LOCK_LISTING_IMAGES: &str = "SELECT images FROM properties WHERE id = $1 FOR UPDATE";

#[async_trait]
pub trait PropertyExt {
    async fn create_listing(
        &self,
        owner_id: Uuid,
        listing_data: CreateListingDto,
        expires_at: DateTime<Utc>,
    ) -> Result<Listing, sqlx::Error>;

    async fn get_listing_by_id(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<Listing>, sqlx::Error>;

    async fn update_listing(
        &self,
        listing_id: Uuid,
        listing_data: UpdateListingDto,
    ) -> Result<Listing, sqlx::Error>;

    async fn delete_listing(
        &self,
        listing_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    /// Live listings (active and not yet past `expires_at`) matching the filters.
    async fn search_listings(
        &self,
        filters: &ListingSearchFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Listing>, sqlx::Error>;

    async fn get_listings_by_category(
        &self,
        category: ListingCategory,
        now: DateTime<Utc>,
    ) -> Result<Vec<Listing>, sqlx::Error>;

    async fn get_all_listings(
        &self,
        status: Option<ListingStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Listing>, sqlx::Error>;

    /// Number of listings the admin listing view pages over.
    async fn count_listings(
        &self,
        status: Option<ListingStatus>,
    ) -> Result<i64, sqlx::Error>;

    async fn add_listing_images(
        &self,
        listing_id: Uuid,
        images: Vec<ListingImage>,
    ) -> Result<Option<Listing>, sqlx::Error>;

    async fn find_stale_listing_ids(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error>;

    /// Flips one listing to `expired`. Returns whether the row changed; a
    /// listing that is already expired is left alone.
    async fn mark_listing_expired(
        &self,
        listing_id: Uuid,
    ) -> Result<bool, sqlx::Error>;
}

/// Escapes `%`, `_` and `\` so free text is matched literally by ILIKE.
pub fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Appends `added` after `existing` and keeps exactly one main image.
pub fn merge_listing_images(existing: Vec<ListingImage>, added: Vec<ListingImage>) -> Vec<ListingImage> {
    let mut images = existing;
    images.extend(added);
    normalise_main_image(&mut images);
    images
}

/// Builds the live-listing search statement.
pub fn build_search_query<'a>(
    filters: &'a ListingSearchFilters,
    now: DateTime<Utc>,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM properties WHERE status = ", LISTING_COLUMNS));
    builder.push_bind(ListingStatus::Active);
    builder.push(" AND expires_at > ");
    builder.push_bind(now);
    builder.push(" AND category = ");
    builder.push_bind(filters.category);

    if let Some(text) = &filters.free_text {
        let pattern = like_pattern(text);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR city ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(property_type) = filters.property_type {
        builder.push(" AND property_type = ");
        builder.push_bind(property_type);
    }

    if let Some(max_price) = filters.max_price {
        builder.push(" AND price <= ");
        builder.push_bind(max_price);
    }

    builder.push(" ORDER BY created_at DESC");
    builder
}

#[async_trait]
impl PropertyExt for DBClient {
    async fn create_listing(
        &self,
        owner_id: Uuid,
        listing_data: CreateListingDto,
        expires_at: DateTime<Utc>,
    ) -> Result<Listing, sqlx::Error> {
        let mut images = listing_data.images.unwrap_or_default();
        normalise_main_image(&mut images);

        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            INSERT INTO properties (
                owner_id, title, description, price, category, property_type,
                city, country, latitude, longitude, bedrooms, bathrooms, size_sqm,
                images, expires_at, status
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16
            ) RETURNING {}
            "#,
            LISTING_COLUMNS
        ))
        .bind(owner_id)
        .bind(listing_data.title)
        .bind(listing_data.description)
        .bind(listing_data.price)
        .bind(listing_data.category)
        .bind(listing_data.property_type)
        .bind(listing_data.city)
        .bind(listing_data.country)
        .bind(listing_data.latitude)
        .bind(listing_data.longitude)
        .bind(listing_data.bedrooms)
        .bind(listing_data.bathrooms)
        .bind(listing_data.size_sqm)
        .bind(Json(images))
        .bind(expires_at)
        .bind(ListingStatus::Active)
        .fetch_one(&self.pool)
        .await?;

        Ok(listing)
    }

    async fn get_listing_by_id(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(&format!(
            "SELECT {} FROM properties WHERE id = $1",
            LISTING_COLUMNS
        ))
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_listing(
        &self,
        listing_id: Uuid,
        listing_data: UpdateListingDto,
    ) -> Result<Listing, sqlx::Error> {
        sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE properties
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                category = COALESCE($5, category),
                property_type = COALESCE($6, property_type),
                city = COALESCE($7, city),
                country = COALESCE($8, country),
                latitude = COALESCE($9, latitude),
                longitude = COALESCE($10, longitude),
                bedrooms = COALESCE($11, bedrooms),
                bathrooms = COALESCE($12, bathrooms),
                size_sqm = COALESCE($13, size_sqm),
                expires_at = COALESCE($14, expires_at),
                status = CASE
                    WHEN $14::timestamptz IS NOT NULL AND $14::timestamptz > NOW() THEN 'active'::listing_status
                    ELSE status
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LISTING_COLUMNS
        ))
        .bind(listing_id)
        .bind(listing_data.title)
        .bind(listing_data.description)
        .bind(listing_data.price)
        .bind(listing_data.category)
        .bind(listing_data.property_type)
        .bind(listing_data.city)
        .bind(listing_data.country)
        .bind(listing_data.latitude)
        .bind(listing_data.longitude)
        .bind(listing_data.bedrooms)
        .bind(listing_data.bathrooms)
        .bind(listing_data.size_sqm)
        .bind(listing_data.expires_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_listing(
        &self,
        listing_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(listing_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_listings(
        &self,
        filters: &ListingSearchFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Listing>, sqlx::Error> {
        let mut builder = build_search_query(filters, now);
        builder
            .build_query_as::<Listing>()
            .fetch_all(&self.pool)
            .await
    }

    async fn get_listings_by_category(
        &self,
        category: ListingCategory,
        now: DateTime<Utc>,
    ) -> Result<Vec<Listing>, sqlx::Error> {
        sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {} FROM properties
            WHERE category = $1 AND status = $2 AND expires_at > $3
            ORDER BY created_at DESC
            "#,
            LISTING_COLUMNS
        ))
        .bind(category)
        .bind(ListingStatus::Active)
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_all_listings(
        &self,
        status: Option<ListingStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Listing>, sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {} FROM properties
            WHERE ($1::listing_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            LISTING_COLUMNS
        ))
        .bind(status)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_listings(
        &self,
        status: Option<ListingStatus>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM properties WHERE ($1::listing_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
    }

    async fn add_listing_images(
        &self,
        listing_id: Uuid,
        images: Vec<ListingImage>,
    ) -> Result<Option<Listing>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, Json<Vec<ListingImage>>>(LOCK_LISTING_IMAGES)
            .bind(listing_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(Json(existing)) = current else {
            return Ok(None);
        };

        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE properties
            SET images = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LISTING_COLUMNS
        ))
        .bind(listing_id)
        .bind(Json(merge_listing_images(existing, images)))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(listing))
    }

    async fn find_stale_listing_ids(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM properties
            WHERE status = $1 AND expires_at <= $2
            "#,
        )
        .bind(ListingStatus::Active)
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_listing_expired(
        &self,
        listing_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE properties
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(ListingStatus::Expired)
        .bind(listing_id)
        .bind(ListingStatus::Active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
