use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use super::traits::CertificateStore;
use crate::db::{self, repository, DatabaseError};
use crate::models::enums::{EntityType, ProcessingStatus};
use crate::models::{Certificate, CertificatePatch};

/// Certificate store over a single SQLite connection.
pub struct SqliteCertificateStore {
    conn: Mutex<Connection>,
}

impl SqliteCertificateStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (and migrates) the database file.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_memory_database()?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl CertificateStore for SqliteCertificateStore {
    fn insert(&self, certificate: &Certificate) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::insert_certificate(&conn, certificate)
    }

    fn get(&self, id: &str) -> Result<Option<Certificate>, DatabaseError> {
        let conn = self.conn()?;
        repository::get_certificate(&conn, id)
    }

    fn get_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<Certificate>, DatabaseError> {
        let conn = self.conn()?;
        repository::list_certificates_for_entity(&conn, entity_type, entity_id)
    }

    fn list_by_status(&self, statuses: &[ProcessingStatus]) -> Result<Vec<Certificate>, DatabaseError> {
        let conn = self.conn()?;
        repository::list_certificates_by_status(&conn, statuses)
    }

    fn update(&self, id: &str, patch: &CertificatePatch) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        repository::update_certificate(&conn, id, patch)
    }

    fn update_if_status(
        &self,
        id: &str,
        expected: &[ProcessingStatus],
        patch: &CertificatePatch,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn()?;
        repository::update_certificate_if_status(&conn, id, expected, patch)
    }

    fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn()?;
        repository::delete_certificate(&conn, id)
    }
}
