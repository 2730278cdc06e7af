mod engagement;
mod images;
mod upload;

use crate::app::AppState;
use axum::Router;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(upload::router())
        .merge(images::router())
        .merge(engagement::router())
}
