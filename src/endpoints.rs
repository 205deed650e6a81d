//! The dashboard's endpoint URIs.
//!
//! Pages that show a single category take it as a query parameter, see
//! [with_category].

/// The root route which redirects to the overview page.
pub const ROOT: &str = "/";
/// The landing page with ledger-wide totals.
pub const OVERVIEW_VIEW: &str = "/overview";
/// The page for spending by merchant category.
pub const CATEGORIES_VIEW: &str = "/categories";
/// The page for transaction errors and fraud statistics.
pub const FRAUD_VIEW: &str = "/fraud";
/// The page for the spending forecast.
pub const FORECAST_VIEW: &str = "/forecast";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";

/// Append a `category` query parameter to `endpoint_path`.
///
/// The label is percent-encoded since category descriptions contain spaces,
/// commas and ampersands, e.g. "Grocery Stores, Supermarkets".
pub fn with_category(endpoint_path: &str, category: &str) -> String {
    let query = serde_urlencoded::to_string([("category", category)])
        .unwrap_or_else(|_| format!("category={category}"));

    format!("{endpoint_path}?{query}")
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::with_category;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::ROOT);
        assert_endpoint_is_valid_uri(endpoints::OVERVIEW_VIEW);
        assert_endpoint_is_valid_uri(endpoints::CATEGORIES_VIEW);
        assert_endpoint_is_valid_uri(endpoints::FRAUD_VIEW);
        assert_endpoint_is_valid_uri(endpoints::FORECAST_VIEW);
        assert_endpoint_is_valid_uri(endpoints::INTERNAL_ERROR_VIEW);
        assert_endpoint_is_valid_uri(endpoints::STATIC);
    }

    #[test]
    fn encodes_category_label() {
        let uri = with_category(endpoints::FORECAST_VIEW, "Grocery Stores, Supermarkets");

        assert_eq!(uri, "/forecast?category=Grocery+Stores%2C+Supermarkets");
        assert_endpoint_is_valid_uri(&uri);
    }

    #[test]
    fn encodes_ampersand() {
        let uri = with_category(endpoints::CATEGORIES_VIEW, "Bars & Taverns");

        assert_eq!(uri, "/categories?category=Bars+%26+Taverns");
    }
}
