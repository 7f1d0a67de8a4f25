/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use atelier_api::{app::{build_router, AppState}, config::Config};
/// use atelier_shared::{mail::LogMailer, storage::FileStore};
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let documents = FileStore::open(&config.storage.documents_dir).await?;
/// let images = FileStore::open(&config.storage.project_images_dir).await?;
/// let mailer = Arc::new(LogMailer::new(config.mail.from.clone()));
///
/// let app = build_router(AppState::new(pool, config, mailer, documents, images));
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{
        auth::{admin_guard, jwt_auth_layer},
        rate_limit::{password_change_limit, IpRateLimiter},
        security::SecurityHeadersLayer,
    },
};
use atelier_shared::{account::Links, mail::Mailer, storage::FileStore};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    pub config: Arc<Config>,

    /// Outgoing confirmation emails
    pub mailer: Arc<dyn Mailer>,

    /// User documents and admin deposits
    pub documents: FileStore,

    /// Project gallery images
    pub images: FileStore,

    /// Absolute links placed in emails
    pub links: Links,

    /// Per-IP quota on password-change mail
    pub password_change_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: Config,
        mailer: Arc<dyn Mailer>,
        documents: FileStore,
        images: FileStore,
    ) -> Self {
        let links = Links::new(config.mail.public_base_url.clone());
        let password_change_limiter = IpRateLimiter::per_hour(config.api.password_change_per_hour);

        Self {
            db,
            config: Arc::new(config),
            mailer,
            documents,
            images,
            links,
            password_change_limiter,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /health
/// /v1/auth/{register,login,refresh}
/// /v1/account/...                 confirmation links (no token)
/// /v1/projects, /v1/projects/images/:id
/// /v1/me/...                      JWT
/// /v1/admin/...                   JWT + admin role
/// ```
///
/// Upload routes accept bodies up to `api.max_request_bytes`; every other
/// route keeps axum's default limit. `POST /v1/me/password-change` is
/// throttled per client IP.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{account, admin, auth, documents, health, me, projects};

    let upload_limit = state.config.api.max_request_bytes;

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh));

    let account_routes = Router::new()
        .route(
            "/password/confirm/:token",
            get(account::check_password_link).post(account::confirm_password_change),
        )
        .route(
            "/email/confirm-current/:token",
            get(account::confirm_current_email),
        )
        .route("/email/confirm-new/:token", get(account::confirm_new_email));

    let public_project_routes = Router::new()
        .route("/", get(projects::list_projects))
        .route("/images/:id", get(projects::serve_image));

    let me_routes = Router::new()
        .route("/", get(me::profile))
        .route("/dashboard", get(me::dashboard))
        .route("/identity", put(me::update_identity))
        .route(
            "/password-change",
            post(me::request_password_change).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                password_change_limit,
            )),
        )
        .route("/email-change", post(me::request_email_change))
        .route(
            "/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/documents/:id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/documents/:id/download", get(documents::download_document))
        .route("/received/:id/download", get(documents::download_received))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route(
            "/users",
            get(admin::users::list_users).post(admin::users::create_user),
        )
        .route(
            "/users/:id",
            get(admin::users::get_user)
                .put(admin::users::update_user)
                .delete(admin::users::delete_user),
        )
        .route(
            "/documents",
            get(admin::documents::overview).post(admin::documents::deposit),
        )
        .route("/documents/:id", delete(admin::documents::cancel_deposit))
        .route(
            "/documents/:id/download",
            get(admin::documents::download_deposit),
        )
        .route(
            "/user-documents/:id/download",
            get(admin::documents::download_user_document),
        )
        .route(
            "/projects",
            get(admin::projects::list_projects).post(admin::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(admin::projects::get_project)
                .put(admin::projects::update_project)
                .delete(admin::projects::delete_project),
        )
        .route(
            "/projects/images/:id",
            get(admin::projects::serve_image).delete(admin::projects::delete_image),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(axum::middleware::from_fn(admin_guard))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/account", account_routes)
        .nest("/projects", public_project_routes)
        .nest("/me", me_routes)
        .nest("/admin", admin_routes);

    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
