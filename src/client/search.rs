// client/search.rs
use serde::Deserialize;

use crate::{
    dtos::propertydtos::parse_price_filter,
    models::propertymodel::ListingCategory,
};

use super::{error::ClientError, ApiClient};

const ALL_TYPES: &str = "all";

/// What the caller should do after a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Results exist; open the full listing view at `location`.
    Navigate { count: usize, location: String },
    NoResults { message: String },
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    count: usize,
}

/// State of the search form.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchForm {
    pub category: ListingCategory,
    pub search_term: String,
    pub property_type: String,
    pub max_price: String,
    pub error: Option<String>,
}

impl Default for SearchForm {
    fn default() -> Self {
        SearchForm::new(ListingCategory::default())
    }
}

impl SearchForm {
    pub fn new(category: ListingCategory) -> Self {
        SearchForm {
            category,
            search_term: String::new(),
            property_type: ALL_TYPES.to_string(),
            max_price: String::new(),
            error: None,
        }
    }

    /// A price bound belongs to one market segment, so switching category drops it.
    pub fn set_category(&mut self, category: ListingCategory) {
        self.category = category;
        self.max_price.clear();
        self.error = None;
    }

    /// `category` always; `q`, `type` and `maxPrice` only when meaningful.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("category", self.category.slug().to_string())];

        let term = self.search_term.trim();
        if !term.is_empty() {
            params.push(("q", term.to_string()));
        }

        let property_type = self.property_type.trim();
        if !property_type.is_empty() && !property_type.eq_ignore_ascii_case(ALL_TYPES) {
            params.push(("type", property_type.to_lowercase()));
        }

        if let Some(max_price) = parse_price_filter(&self.max_price) {
            params.push(("maxPrice", max_price.to_string()));
        }

        params
    }

    pub fn query_string(&self) -> String {
        serde_urlencoded::to_string(self.query_params()).unwrap_or_default()
    }

    pub fn no_results_message(&self) -> String {
        let term = self.search_term.trim();
        if term.is_empty() {
            format!("No properties found in {}", self.category.label())
        } else {
            format!("No properties found for \"{}\" in {}", term, self.category.label())
        }
    }

    /// Runs the search once. Failures are stored in `error` as well as returned.
    pub async fn submit(&mut self, client: &ApiClient) -> Result<SearchOutcome, ClientError> {
        self.error = None;
        let query = self.query_string();

        match self.fetch(client, &query).await {
            Ok(response) if response.count > 0 => Ok(SearchOutcome::Navigate {
                count: response.count,
                location: format!("/search?{}", query),
            }),
            Ok(_) => Ok(SearchOutcome::NoResults {
                message: self.no_results_message(),
            }),
            Err(e) => {
                tracing::warn!("Search failed: {}", e);
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    async fn fetch(&self, client: &ApiClient, query: &str) -> Result<SearchResponse, ClientError> {
        let url = client.api_url(&format!("/api/properties/search?{}", query));
        let response = client.http().get(url).send().await?;
        ApiClient::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::RawQuery,
        http::{header, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };

    use super::*;
    use crate::client::test_support::{client_for, spawn_server};

    fn search_server(count: usize, seen: Arc<Mutex<Vec<String>>>) -> Router {
        Router::new().route(
            "/api/properties/search",
            get(move |RawQuery(query): RawQuery| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(query.unwrap_or_default());
                    Json(serde_json::json!({ "status": "success", "count": count, "data": [] }))
                }
            }),
        )
    }

    #[test]
    fn test_set_category_resets_price_and_error() {
        let mut form = SearchForm::default();
        form.max_price = "500000".to_string();
        form.error = Some("boom".to_string());
        form.search_term = "villa".to_string();

        form.set_category(ListingCategory::ForRent);

        assert_eq!(form.category, ListingCategory::ForRent);
        assert!(form.max_price.is_empty());
        assert!(form.error.is_none());
        assert_eq!(form.search_term, "villa");
    }

    #[test]
    fn test_query_params_skip_defaults() {
        let form = SearchForm::default();
        assert_eq!(form.query_string(), "category=for-sale");

        let form = SearchForm {
            search_term: "  sea view ".to_string(),
            property_type: "Villa".to_string(),
            max_price: "1500000".to_string(),
            ..SearchForm::new(ListingCategory::Land)
        };
        assert_eq!(
            form.query_string(),
            "category=land&q=sea+view&type=villa&maxPrice=1500000"
        );
    }

    #[test]
    fn test_malformed_max_price_is_not_sent() {
        let form = SearchForm {
            max_price: "abc".to_string(),
            ..SearchForm::default()
        };
        assert!(form.query_params().iter().all(|(key, _)| *key != "maxPrice"));
    }

    #[tokio::test]
    async fn test_no_results_names_term_and_category() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(search_server(0, seen.clone())).await;
        let client = client_for(&base, &base);

        let mut form = SearchForm {
            search_term: "villa".to_string(),
            max_price: "abc".to_string(),
            ..SearchForm::new(ListingCategory::ForSale)
        };
        let outcome = form.submit(&client).await.unwrap();

        match outcome {
            SearchOutcome::NoResults { message } => {
                assert!(message.contains("villa"));
                assert!(message.contains("for sale"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let queries = seen.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0], "category=for-sale&q=villa");
        assert!(!queries[0].contains("maxPrice"));
    }

    #[tokio::test]
    async fn test_results_navigate_to_listing_view() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_server(search_server(3, seen)).await;
        let client = client_for(&base, &base);

        let mut form = SearchForm::new(ListingCategory::Offices);
        let outcome = form.submit(&client).await.unwrap();

        assert_eq!(
            outcome,
            SearchOutcome::Navigate {
                count: 3,
                location: "/search?category=offices".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_term_uses_generic_message() {
        let base = spawn_server(search_server(0, Arc::new(Mutex::new(Vec::new())))).await;
        let client = client_for(&base, &base);

        let mut form = SearchForm::new(ListingCategory::ForRent);
        let outcome = form.submit(&client).await.unwrap();

        assert_eq!(
            outcome,
            SearchOutcome::NoResults {
                message: "No properties found in for rent".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_surfaces_message() {
        let app = Router::new().route(
            "/api/properties/search",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "status": "fail", "message": "database unavailable" })),
                )
            }),
        );
        let base = spawn_server(app).await;
        let client = client_for(&base, &base);

        let mut form = SearchForm::default();
        let err = form.submit(&client).await.unwrap_err();

        assert_eq!(err, ClientError::upstream(Some(500), "database unavailable"));
        assert_eq!(form.error.as_deref(), Some("database unavailable (HTTP 500)"));
    }

    #[tokio::test]
    async fn test_non_json_response_is_an_error() {
        let app = Router::new().route(
            "/api/properties/search",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html>maintenance</html>").into_response() }),
        );
        let base = spawn_server(app).await;
        let client = client_for(&base, &base);

        let mut form = SearchForm::default();
        let err = form.submit(&client).await.unwrap_err();

        assert!(matches!(err, ClientError::UpstreamRequestFailed { status: Some(200), .. }));
        assert!(form.error.unwrap().contains("text/html"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let client = client_for(&base, &base);

        let mut form = SearchForm::default();
        let err = form.submit(&client).await.unwrap_err();

        assert!(matches!(err, ClientError::UpstreamRequestFailed { status: None, .. }));
        assert!(form.error.is_some());
    }
}
