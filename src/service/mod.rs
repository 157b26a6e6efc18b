pub mod listing_expiry;
pub mod media_signature;
