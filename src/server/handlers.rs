use super::{pages, ApiResponse, AppState, SESSION_COOKIE};
use crate::auth::{self, Session};
use crate::certificate::{self, DetailUrlBuilder};
use crate::error::{CertError, Result};
use crate::owner::OwnerForm;
use crate::resolver;
use crate::search::{self, SearchCriteria};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method},
    response::{Html, IntoResponse, Json, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Local;
use serde::Deserialize;
use tracing::{info, warn};

const DATE_INPUT_HINT: &str = "Enter both dates as YYYY-MM-DD.";

/// Flash message carried across a redirect in the query string
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub msg: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn flash_redirect(path: &str, key: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{}?{}={}", path, key, urlencoding::encode(message)))
}

fn current_session(state: &AppState, jar: &CookieJar) -> Option<Session> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.get(cookie.value()))
}

/// Session or a redirect to the login page
fn require_login(state: &AppState, jar: &CookieJar) -> std::result::Result<Session, Redirect> {
    current_session(state, jar).ok_or_else(|| Redirect::to("/login/"))
}

/// Absolute base URL for links embedded in QR codes
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(public_url) = &state.public_url {
        return public_url.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");

    format!("{}://{}", scheme, host)
}

// ============================================================================
// AUTH
// ============================================================================

/// GET /login/
pub async fn login_page(Query(flash): Query<FlashQuery>) -> Html<String> {
    Html(pages::login(&flash))
}

/// POST /login/
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match auth::authenticate(&state.stores, &form.username, &form.password) {
        Ok(user) => {
            let session_id = state.sessions.login(&user)?;
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);

            Ok((
                jar.add(cookie),
                flash_redirect("/home/", "msg", "Login Successfully"),
            )
                .into_response())
        }
        Err(CertError::AuthFailure) => {
            Ok(flash_redirect("/login/", "error", "Login UnSuccessfully").into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /logout/ only; every other verb is rejected with an empty 405
pub async fn logout(method: Method, State(state): State<AppState>, jar: CookieJar) -> Result<Response> {
    if method != Method::GET {
        return Err(CertError::MethodNotAllowed { allowed: "GET" });
    }

    match jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        Some(session_id) if state.sessions.logout(&session_id) => {
            info!("session ended");
            let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
            Ok((jar, flash_redirect("/login/", "msg", "Logout Successful")).into_response())
        }
        _ => Ok(Redirect::to("/login/").into_response()),
    }
}

// ============================================================================
// OWNER REGISTRATION
// ============================================================================

/// GET /home/
pub async fn home_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Response {
    match require_login(&state, &jar) {
        Ok(session) => Html(pages::home(&session, &OwnerForm::default(), &[], &flash)).into_response(),
        Err(redirect) => redirect.into_response(),
    }
}

/// POST /home/
pub async fn home_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<OwnerForm>,
) -> Result<Response> {
    let session = match require_login(&state, &jar) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect.into_response()),
    };

    match form.validate() {
        Ok(mut owner) => {
            owner.set_provenance("form");
            owner
                .metadata
                .insert("created_by".to_string(), serde_json::json!(session.username));

            let created = state.stores.create_owner(&owner)?;
            info!(id = created.id, user = %session.username, "owner registered");
            Ok(Redirect::to("/search/").into_response())
        }
        Err(CertError::Validation(errors)) => {
            Ok(Html(pages::home(&session, &form, &errors, &FlashQuery::default())).into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /success/
pub async fn success_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    match require_login(&state, &jar) {
        Ok(_) => Html(pages::success()).into_response(),
        Err(redirect) => redirect.into_response(),
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// GET /search/ - merged view of both stores
pub async fn search_page(State(state): State<AppState>) -> Result<Html<String>> {
    let owners = search::filter(&state.stores, &SearchCriteria::default())?;
    Ok(Html(pages::search(&owners, Local::now().date_naive(), None)))
}

/// POST /search/
pub async fn search_submit(
    State(state): State<AppState>,
    Form(criteria): Form<SearchCriteria>,
) -> Result<Html<String>> {
    let today = Local::now().date_naive();

    match search::filter(&state.stores, &criteria) {
        Ok(owners) => Ok(Html(pages::search(&owners, today, None))),
        Err(CertError::Parse(e)) => {
            warn!("rejected search dates: {e}");
            Ok(Html(pages::search(&[], today, Some(DATE_INPUT_HINT))))
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// CERTIFICATE & PUBLIC RECORD
// ============================================================================

/// GET /certificate/:id/
pub async fn certificate_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Html<String>> {
    let urls = DetailUrlBuilder::new(&base_url(&state, &headers));
    let view = certificate::present(
        &state.stores,
        id,
        |owner_id| urls.user_data_url(owner_id),
        state.encoder.as_ref(),
    )?;

    Ok(Html(pages::certificate(&view)))
}

/// GET /user_data/:user_id/
pub async fn user_data_page(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Html<String>> {
    let owner = resolver::resolve(&state.stores, user_id)?;
    Ok(Html(pages::user_data(owner.as_ref())))
}

// ============================================================================
// JSON API
// ============================================================================

/// GET /api/health
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/owners
pub async fn api_owners(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let owners = resolver::merge_all(&state.stores)?;
    Ok(Json(ApiResponse::ok(owners)))
}

/// GET /api/owners/:id
pub async fn api_owner(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    match resolver::resolve(&state.stores, id)? {
        Some(owner) => Ok(Json(ApiResponse::ok(owner))),
        None => Err(CertError::NotFound { id }),
    }
}
