
use super::models::{DocumentRecord, NewDocument};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const DOCUMENT_COLUMNS: &str =
    "id, filename, path, page_count, chunk_count, summary, ingested_at";

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: &NewDocument) -> Result<DocumentRecord> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO documents (id, filename, path, page_count, chunk_count, summary, ingested_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_document.id)
        .bind(&new_document.filename)
        .bind(&new_document.path)
        .bind(new_document.page_count)
        .bind(new_document.chunk_count)
        .bind(&new_document.summary)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create document")?;

        debug!(
            "Registered document {} ({})",
            new_document.id, new_document.filename
        );

        Self::get_by_id(pool, &new_document.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<DocumentRecord>> {
        let result = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by id")?;

        Ok(result)
    }

    #[inline]
    pub async fn find_by_filename(
        pool: &SqlitePool,
        filename: &str,
    ) -> Result<Vec<DocumentRecord>> {
        let results = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE filename = ? ORDER BY ingested_at"
        ))
        .bind(filename)
        .fetch_all(pool)
        .await
        .context("Failed to find documents by filename")?;

        Ok(results)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
        let results = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY ingested_at, filename"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(results)
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
        let rows_affected = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete document")?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    #[inline]
    pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
        let rows_affected = sqlx::query("DELETE FROM documents")
            .execute(pool)
            .await
            .context("Failed to clear documents")?
            .rows_affected();

        Ok(rows_affected)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count documents")?;

        Ok(count)
    }
}
