// Library exports for the API binary, maintenance tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod object_store;
pub mod routes;
pub mod services;
pub mod store;

#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use services::{
    categories::CategoryService, documents::DocumentService, media::MediaLifecycle,
    tenancy::TenancyResolver,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub media: MediaLifecycle,
    pub documents: DocumentService,
    pub categories: CategoryService,
    pub tenancy: TenancyResolver,
}
