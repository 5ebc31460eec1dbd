use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::db::PgStore;
use crate::services::{
    auth::JwtVerifier,
    queue::JobQueue,
    status::StatusService,
    submission::SubmissionService,
};

/// Shared application state passed to the infrastructure route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<JobQueue>,
    pub bulk: BulkApi,
}

/// State of the bulk generation endpoints.
#[derive(Clone)]
pub struct BulkApi {
    pub auth: Arc<JwtVerifier>,
    pub submissions: Arc<SubmissionService>,
    pub status: Arc<StatusService>,
}

impl FromRef<BulkApi> for Arc<JwtVerifier> {
    fn from_ref(api: &BulkApi) -> Self {
        Arc::clone(&api.auth)
    }
}

impl AppState {
    pub fn new(db: PgPool, queue: JobQueue, auth: JwtVerifier, per_task_minutes: f64) -> Self {
        let store = Arc::new(PgStore::new(db.clone()));
        let queue = Arc::new(queue);

        let submissions = SubmissionService::new(
            store.clone(),
            store.clone(),
            queue.clone(),
            per_task_minutes,
        );
        let status = StatusService::new(store, per_task_minutes);

        Self {
            db,
            queue,
            bulk: BulkApi {
                auth: Arc::new(auth),
                submissions: Arc::new(submissions),
                status: Arc::new(status),
            },
        }
    }
}
