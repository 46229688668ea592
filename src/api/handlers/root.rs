use axum::response::IntoResponse;

// axum handler for the root path
pub async fn root() -> impl IntoResponse {
    env!("CARGO_PKG_NAME")
}
