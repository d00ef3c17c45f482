use std::sync::Arc;

use storeguard_core::DlqService;
use storeguard_domain::constants::DLQ_TABLE;
use storeguard_infra::database::{DbManager, SqliteDlqRepository};
use tempfile::TempDir;

/// Temporary migrated database that lives as long as the value.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("storeguard-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// DLQ service over this database.
    pub fn dlq_service(&self) -> Arc<DlqService> {
        let repository = SqliteDlqRepository::new(Arc::clone(&self.manager));
        Arc::new(DlqService::new(Arc::new(repository)))
    }

    /// Row count of the dead-letter table.
    pub fn dlq_rows(&self) -> i64 {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.query_row(&format!("SELECT COUNT(*) FROM {DLQ_TABLE}"), [], |row| row.get(0))
            .expect("count query should succeed")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}
