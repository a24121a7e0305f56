use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const CERTIFICATE_COLUMNS: &str = "id, entity_type, entity_id, file_name, storage_ref,
     document_type, certificate_type, display_name, extracted_data, has_extracted_data,
     expiry_date, processing_status, retry_count, max_retries, next_retry_at, last_error,
     last_attempt_at, extracted_at, failed_at, created_at";

pub fn insert_certificate(conn: &Connection, cert: &Certificate) -> Result<(), DatabaseError> {
    let extracted = cert
        .extracted_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO certificates (id, entity_type, entity_id, file_name, storage_ref,
         document_type, certificate_type, display_name, extracted_data, has_extracted_data,
         expiry_date, processing_status, retry_count, max_retries, next_retry_at, last_error,
         last_attempt_at, extracted_at, failed_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            cert.id,
            cert.entity_type.as_str(),
            cert.entity_id,
            cert.file_name,
            cert.storage_ref,
            cert.document_type,
            cert.certificate_type,
            cert.display_name,
            extracted,
            cert.has_extracted_data as i32,
            cert.expiry_date,
            cert.processing_status.as_str(),
            cert.retry_count,
            cert.max_retries,
            cert.next_retry_at.map(format_timestamp),
            cert.last_error,
            cert.last_attempt_at.map(format_timestamp),
            cert.extracted_at.map(format_timestamp),
            cert.failed_at.map(format_timestamp),
            format_timestamp(cert.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_certificate(conn: &Connection, id: &str) -> Result<Option<Certificate>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id], read_row);

    match result {
        Ok(row) => Ok(Some(certificate_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All certificates of one owning entity, oldest upload first.
pub fn list_certificates_for_entity(
    conn: &Connection,
    entity_type: EntityType,
    entity_id: &str,
) -> Result<Vec<Certificate>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CERTIFICATE_COLUMNS} FROM certificates
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at ASC, id ASC"
    ))?;

    let rows = stmt.query_map(params![entity_type.as_str(), entity_id], read_row)?;
    collect_certificates(rows)
}

/// Certificates whose processing status is any of `statuses`.
pub fn list_certificates_by_status(
    conn: &Connection,
    statuses: &[ProcessingStatus],
) -> Result<Vec<Certificate>, DatabaseError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {CERTIFICATE_COLUMNS} FROM certificates
         WHERE processing_status IN ({})
         ORDER BY created_at ASC, id ASC",
        placeholders(1, statuses.len())
    ))?;

    let rows = stmt.query_map(
        params_from_iter(statuses.iter().map(|s| s.as_str())),
        read_row,
    )?;
    collect_certificates(rows)
}

/// Apply a partial update. Fails with `NotFound` when the row is gone.
pub fn update_certificate(
    conn: &Connection,
    id: &str,
    patch: &CertificatePatch,
) -> Result<(), DatabaseError> {
    let updated = update_where(conn, id, patch, &[])?;
    if !updated {
        return Err(DatabaseError::NotFound {
            entity_type: "Certificate".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Conditional update: applies the patch only while `processing_status` is one of
/// `expected`. Returns false when the row is missing or in another state.
pub fn update_certificate_if_status(
    conn: &Connection,
    id: &str,
    expected: &[ProcessingStatus],
    patch: &CertificatePatch,
) -> Result<bool, DatabaseError> {
    if expected.is_empty() {
        return Ok(false);
    }
    update_where(conn, id, patch, expected)
}

pub fn delete_certificate(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let rows = conn.execute("DELETE FROM certificates WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

fn update_where(
    conn: &Connection,
    id: &str,
    patch: &CertificatePatch,
    expected: &[ProcessingStatus],
) -> Result<bool, DatabaseError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(status) = patch.processing_status {
        sets.push("processing_status");
        values.push(Value::Text(status.as_str().into()));
    }
    if let Some(count) = patch.retry_count {
        sets.push("retry_count");
        values.push(Value::Integer(count.into()));
    }
    if let Some(next) = patch.next_retry_at {
        sets.push("next_retry_at");
        values.push(optional_text(next.map(format_timestamp)));
    }
    if let Some(err) = &patch.last_error {
        sets.push("last_error");
        values.push(optional_text(err.clone()));
    }
    if let Some(at) = patch.last_attempt_at {
        sets.push("last_attempt_at");
        values.push(Value::Text(format_timestamp(at)));
    }
    if let Some(data) = &patch.extracted_data {
        sets.push("extracted_data");
        values.push(Value::Text(serde_json::to_string(data)?));
    }
    if let Some(has) = patch.has_extracted_data {
        sets.push("has_extracted_data");
        values.push(Value::Integer(has as i64));
    }
    if let Some(at) = patch.extracted_at {
        sets.push("extracted_at");
        values.push(Value::Text(format_timestamp(at)));
    }
    if let Some(at) = patch.failed_at {
        sets.push("failed_at");
        values.push(Value::Text(format_timestamp(at)));
    }

    let assignments = if sets.is_empty() {
        // Still report whether the row exists (and matches `expected`).
        "id = id".to_string()
    } else {
        sets.iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let id_index = values.len() + 1;
    values.push(Value::Text(id.to_string()));

    let mut sql = format!("UPDATE certificates SET {assignments} WHERE id = ?{id_index}");
    if !expected.is_empty() {
        sql.push_str(&format!(
            " AND processing_status IN ({})",
            placeholders(id_index + 1, expected.len())
        ));
        values.extend(expected.iter().map(|s| Value::Text(s.as_str().into())));
    }

    let rows = conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(rows > 0)
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn optional_text(value: Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s),
        None => Value::Null,
    }
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidTimestamp {
            field: field.into(),
            value: value.into(),
        })
}

fn parse_optional_timestamp(
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    value.map(|v| parse_timestamp(field, &v)).transpose()
}

struct CertificateRow {
    id: String,
    entity_type: String,
    entity_id: String,
    file_name: String,
    storage_ref: String,
    document_type: Option<String>,
    certificate_type: Option<String>,
    display_name: Option<String>,
    extracted_data: Option<String>,
    has_extracted_data: i32,
    expiry_date: Option<String>,
    processing_status: String,
    retry_count: u32,
    max_retries: u32,
    next_retry_at: Option<String>,
    last_error: Option<String>,
    last_attempt_at: Option<String>,
    extracted_at: Option<String>,
    failed_at: Option<String>,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CertificateRow> {
    Ok(CertificateRow {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        file_name: row.get(3)?,
        storage_ref: row.get(4)?,
        document_type: row.get(5)?,
        certificate_type: row.get(6)?,
        display_name: row.get(7)?,
        extracted_data: row.get(8)?,
        has_extracted_data: row.get(9)?,
        expiry_date: row.get(10)?,
        processing_status: row.get(11)?,
        retry_count: row.get(12)?,
        max_retries: row.get(13)?,
        next_retry_at: row.get(14)?,
        last_error: row.get(15)?,
        last_attempt_at: row.get(16)?,
        extracted_at: row.get(17)?,
        failed_at: row.get(18)?,
        created_at: row.get(19)?,
    })
}

fn collect_certificates(
    rows: impl Iterator<Item = rusqlite::Result<CertificateRow>>,
) -> Result<Vec<Certificate>, DatabaseError> {
    let mut certificates = Vec::new();
    for row in rows {
        certificates.push(certificate_from_row(row?)?);
    }
    Ok(certificates)
}

fn certificate_from_row(row: CertificateRow) -> Result<Certificate, DatabaseError> {
    let extracted_data: Option<serde_json::Value> = row
        .extracted_data
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    Ok(Certificate {
        id: row.id,
        entity_type: EntityType::from_str(&row.entity_type)?,
        entity_id: row.entity_id,
        file_name: row.file_name,
        storage_ref: row.storage_ref,
        document_type: row.document_type,
        certificate_type: row.certificate_type,
        display_name: row.display_name,
        extracted_data,
        has_extracted_data: row.has_extracted_data != 0,
        expiry_date: row.expiry_date,
        processing_status: ProcessingStatus::from_str(&row.processing_status)?,
        retry_count: row.retry_count,
        max_retries: row.max_retries,
        next_retry_at: parse_optional_timestamp("next_retry_at", row.next_retry_at)?,
        last_error: row.last_error,
        last_attempt_at: parse_optional_timestamp("last_attempt_at", row.last_attempt_at)?,
        extracted_at: parse_optional_timestamp("extracted_at", row.extracted_at)?,
        failed_at: parse_optional_timestamp("failed_at", row.failed_at)?,
        created_at: parse_timestamp("created_at", &row.created_at)?,
    })
}
