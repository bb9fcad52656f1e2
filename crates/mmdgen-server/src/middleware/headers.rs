//! Caching headers.
//!
//! Artifacts change in place when their sources change, so clients must
//! revalidate (via `Last-Modified`) instead of trusting a cached copy.

use axum::http::HeaderValue;
use axum::http::header::CACHE_CONTROL;
use tower_http::set_header::SetResponseHeaderLayer;

/// Create layer that adds `Cache-Control: no-cache` unless the response sets one.
pub(crate) fn cache_control_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
}
