//! Route label extraction for metrics.

use actix_web::HttpRequest;

/// Label used for requests that matched no registered resource.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Extract the route pattern for a request.
///
/// Uses the registered resource pattern so that query strings and unknown
/// paths never create new metric label values.
pub fn extract_route_pattern(req: &HttpRequest) -> String {
    req.match_pattern()
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}
