use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use materials_api::{
    config::Config,
    db::{self, PgStore},
    middleware::auth::JwtSecret,
    object_store::LocalStore,
    routes,
    services::{
        categories::CategoryService, cleanup::ContentCleanup, documents::DocumentService,
        media::MediaLifecycle, storage::StorageService, tenancy::TenancyResolver,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let store = Arc::new(PgStore::new(pool.clone()));
    let storage = Arc::new(StorageService::new(
        Arc::new(LocalStore::new(&config.media_dir)?),
        config.public_url.clone(),
    ));
    info!(media_dir = %config.media_dir, "Local object store ready");

    let tenancy = TenancyResolver::new(store.clone());
    let cleanup = ContentCleanup::new(store.clone());
    let categories = CategoryService::new(store.clone(), tenancy.clone());
    let media = MediaLifecycle::new(
        store.clone(),
        storage,
        tenancy.clone(),
        cleanup,
        categories.clone(),
    );
    let documents = DocumentService::new(store, tenancy.clone(), categories.clone());

    let state = AppState {
        db: pool,
        config: config.clone(),
        media,
        documents,
        categories,
        tenancy,
    };

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Materials
        .route(
            "/materials/{kind}",
            get(routes::media::list_media).post(routes::media::create_media),
        )
        .route(
            "/materials/{kind}/bulk",
            patch(routes::media::update_media_bulk).delete(routes::media::delete_media_bulk),
        )
        .route(
            "/materials/{kind}/{id}",
            patch(routes::media::update_media).delete(routes::media::delete_media),
        )
        // Categories
        .route(
            "/categories",
            get(routes::categories::list_categories)
                .post(routes::categories::create_categories)
                .delete(routes::categories::delete_categories),
        )
        .route(
            "/categories/{id}",
            patch(routes::categories::update_category).delete(routes::categories::delete_category),
        )
        // Lessons
        .route(
            "/lessons",
            get(routes::lessons::list_lessons)
                .post(routes::lessons::create_lesson)
                .delete(routes::lessons::delete_lessons),
        )
        .route(
            "/lessons/{id}",
            get(routes::lessons::get_lesson)
                .patch(routes::lessons::update_lesson)
                .delete(routes::lessons::delete_lesson),
        )
        // Courses
        .route(
            "/courses",
            get(routes::courses::list_courses)
                .post(routes::courses::create_course)
                .delete(routes::courses::delete_courses),
        )
        .route(
            "/courses/{id}",
            get(routes::courses::get_course)
                .patch(routes::courses::update_course)
                .delete(routes::courses::delete_course),
        )
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("materials API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
