use std::sync::Arc;

use exam_core::model::UserId;
use storage::repository::{IdentityProvider, StaticIdentity, Storage};

use crate::Clock;
use crate::error::AppServicesError;
use crate::exam::{ExamResultService, ExamService};

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    exams: Arc<ExamService>,
    results: Arc<ExamResultService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, reporting `user` as the
    /// signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        user: Option<UserId>,
    ) -> Result<Self, AppServicesError> {
        let identity: Arc<dyn IdentityProvider> = Arc::new(StaticIdentity(user));
        let storage = Storage::sqlite(db_url).await?.with_identity(identity);
        Ok(Self::from_storage(clock, &storage))
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self {
            exams: Arc::new(ExamService::from_storage(clock, storage)),
            results: Arc::new(ExamResultService::new(Arc::clone(&storage.exams))),
        }
    }

    #[must_use]
    pub fn exams(&self) -> Arc<ExamService> {
        Arc::clone(&self.exams)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ExamResultService> {
        Arc::clone(&self.results)
    }
}
