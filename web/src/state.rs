use std::sync::Arc;

use erp_query_config::Settings;
use erp_query_db::{DbPool, connect_pool};

use crate::error::Error;

/// The application's state that is available in [`crate::controllers`] and [`crate::middlewares`].
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db_pool: DbPool,
}

impl AppState {
    pub async fn build(settings: Settings) -> Result<Self, Error> {
        let db_pool = connect_pool(&settings.database).await?;

        Ok(Self {
            settings: Arc::new(settings),
            db_pool,
        })
    }
}
