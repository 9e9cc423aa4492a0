use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::{load_session, require_admin, require_auth};
use crate::{admin, assist, authoring, catalog, comments, drafts, flash, settings, views};

pub fn router(state: AppState) -> Router {
    // The two JSON endpoints check the session themselves so that a missing
    // login is reported in the payload rather than as a redirect.
    let public_routes = Router::new()
        .route("/", get(catalog::index))
        .route("/register", get(auth::register_page).post(auth::register_submit))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", get(auth::logout_handler))
        .route("/novel/{id}", get(catalog::novel_page))
        .route("/read/{novel_id}/{number}", get(catalog::read_chapter))
        .route("/author/draft/{id}/save", post(drafts::save_handler))
        .route("/author/ai/assist", post(assist::assist_handler));

    let protected_routes = Router::new()
        .route("/author/dashboard", get(authoring::dashboard_page))
        .route("/author/novel/new", get(authoring::new_novel_page).post(authoring::new_novel_submit))
        .route(
            "/author/novel/{id}/edit",
            get(authoring::edit_novel_page).post(authoring::edit_novel_submit),
        )
        .route("/author/novel/{id}/delete", post(authoring::delete_novel_submit))
        .route(
            "/author/novel/{id}/chapter/new",
            get(authoring::new_chapter_page).post(authoring::new_chapter_submit),
        )
        .route(
            "/author/chapter/{id}/edit",
            get(authoring::edit_chapter_page).post(authoring::edit_chapter_submit),
        )
        .route("/author/chapter/{id}/delete", post(authoring::delete_chapter_submit))
        .route("/author/novel/{id}/drafts", get(drafts::drafts_page))
        .route("/author/novel/{id}/draft/new", get(drafts::new_draft))
        .route("/author/draft/{id}", get(drafts::editor_page))
        .route("/author/draft/{id}/publish", post(drafts::publish_submit))
        .route("/author/draft/{id}/delete", post(drafts::delete_submit))
        .route("/author/settings", get(settings::settings_page).post(settings::settings_submit))
        .route("/comment/{novel_id}", post(comments::comment_submit))
        .route_layer(middleware::from_fn(require_auth));

    let admin_routes = Router::new()
        .route("/admin", get(admin::dashboard_page))
        .route("/admin/user/{id}/role", post(admin::change_role_submit))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .fallback(|| async { (StatusCode::NOT_FOUND, Html(views::not_found("page"))).into_response() })
        .layer(middleware::from_fn(flash::carry))
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
