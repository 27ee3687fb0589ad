use axum::{extract::State, response::Html, routing::get, Router};

use crate::state::AppState;

const LOGIN_PAGE: &str = include_str!("../assets/login.html");

pub fn page_routes() -> Router<AppState> {
    Router::new().route("/", get(login_page))
}

pub async fn login_page(State(state): State<AppState>) -> Html<String> {
    Html(render(state.config.frontend_url.as_deref()))
}

fn render(frontend_url: Option<&str>) -> String {
    // A JS literal: either a quoted string or `null`.
    let literal = serde_json::to_string(&frontend_url)
        .unwrap_or_else(|_| "null".into())
        .replace("</", "<\\/");
    LOGIN_PAGE.replace("__FRONTEND_URL__", &literal)
}
