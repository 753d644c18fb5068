pub mod bill;
pub mod subscription;
pub mod user;

use sqlx::PgPool;

/// One persistence handle implementing every repository trait; the use cases
/// only ever see it as `Arc<dyn …Repo>`.
#[derive(Clone)]
pub struct PostgresPersistence {
    pub(crate) pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
