//! Embedded browser front end

use axum::{
    Router,
    response::{Html, IntoResponse},
    routing::get,
};
use http::header;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const SCRIPT_JS: &str = include_str!("../assets/script.js");

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/static/script.js", get(script))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], SCRIPT_JS)
}
