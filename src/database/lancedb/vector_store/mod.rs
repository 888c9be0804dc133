
use super::{ChunkMetadata, EmbeddingRecord};
use crate::{ContractQaError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const TABLE_NAME: &str = "chunks";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// `1 - cosine distance`; higher is more similar
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Attach to the store at `db_path`, creating it when absent
    ///
    /// An existing table with a different vector dimension is rebuilt only
    /// when it is empty; otherwise opening fails so stored vectors are never
    /// silently discarded.
    #[inline]
    pub async fn open(db_path: &Path, vector_dimension: usize) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            ContractQaError::Database(format!("Failed to create vector database directory: {e}"))
        })?;

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt") || error_msg.contains("malformed") {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        ContractQaError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {e}"
                        ))
                    })?
                } else {
                    return Err(ContractQaError::Database(format!(
                        "Failed to connect to LanceDB: {e}"
                    )));
                }
            }
        };

        let store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension,
        };

        store.initialize_table().await?;

        info!(
            "Vector store ready at {} ({} dimensions)",
            db_path.display(),
            vector_dimension
        );
        Ok(store)
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    /// Create the chunks table, or check the dimension of an existing one
    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| ContractQaError::Database(format!("Failed to list tables: {e}")))?;

        if !table_names.contains(&self.table_name) {
            info!(
                "Creating chunks table with {} dimensions",
                self.vector_dimension
            );
            return self.create_table().await;
        }

        let existing = self.detect_existing_vector_dimension().await?;
        if existing == self.vector_dimension {
            debug!("Attached to existing chunks table");
            return Ok(());
        }

        let rows = self.count_embeddings().await?;
        if rows > 0 {
            return Err(ContractQaError::Database(format!(
                "The index holds {rows} vectors of dimension {existing}, but the embedding model produces {} dimensions. Clear the corpus or switch back to the previous model.",
                self.vector_dimension
            )));
        }

        info!(
            "Vector dimension changed from {} to {} on an empty table, recreating",
            existing, self.vector_dimension
        );
        self.drop_table_if_exists().await?;
        self.create_table().await
    }

    async fn create_table(&self) -> Result<()> {
        self.connection
            .create_empty_table(&self.table_name, self.create_schema())
            .execute()
            .await
            .map_err(|e| ContractQaError::Database(format!("Failed to create table: {e}")))?;
        Ok(())
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| ContractQaError::Database(format!("Failed to get table schema: {e}")))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                ContractQaError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page_number", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ContractQaError::Database(format!("Failed to open table: {e}")))
    }

    /// Store multiple embeddings in one append
    #[inline]
    pub async fn store_embeddings_batch(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        debug!("Storing batch of {} embeddings", records.len());

        let record_batch = self.create_record_batch(records)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table.add(reader).execute().await.map_err(|e| {
            ContractQaError::Database(format!("Failed to insert embeddings: {e}"))
        })?;

        info!("Successfully stored {} embeddings", records.len());
        Ok(())
    }

    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let vector_dim = self.vector_dimension;

        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(ContractQaError::Database(format!(
                "Embedding {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut document_ids = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut page_numbers = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            document_ids.push(record.metadata.document_id.as_str());
            sources.push(record.metadata.source.as_str());
            page_numbers.push(record.metadata.page_number);
            chunk_indices.push(record.metadata.chunk_index);
            contents.push(record.metadata.content.as_str());
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    ContractQaError::Database(format!("Failed to create vector array: {e}"))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(page_numbers)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| ContractQaError::Database(format!("Failed to create record batch: {e}")))
    }

    /// Cosine nearest-neighbour search, most similar first, at most `limit` results
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        debug!("Searching for similar vectors with limit: {}", limit);

        if limit == 0 || self.count_embeddings().await? == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.vector_dimension {
            return Err(ContractQaError::Database(format!(
                "Query vector has {} dimensions, expected {}",
                query_vector.len(),
                self.vector_dimension
            )));
        }

        let table = self.open_table().await?;

        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| {
                ContractQaError::Database(format!("Failed to create vector search: {e}"))
            })?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| ContractQaError::Database(format!("Failed to execute search: {e}")))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results.try_next().await.map_err(|e| {
            ContractQaError::Database(format!("Failed to read result stream: {e}"))
        })? {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        search_results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        search_results.truncate(limit);

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let document_ids = string_column(batch, "document_id")?;
        let sources = string_column(batch, "source")?;
        let page_numbers = u32_column(batch, "page_number")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| {
                let distance =
                    distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                SearchResult {
                    chunk_metadata: ChunkMetadata {
                        document_id: document_ids.value(row).to_string(),
                        source: sources.value(row).to_string(),
                        page_number: page_numbers.value(row),
                        chunk_index: chunk_indices.value(row),
                        content: contents.value(row).to_string(),
                        created_at: created_ats.value(row).to_string(),
                    },
                    similarity_score: 1.0 - distance,
                    distance,
                }
            })
            .collect();

        Ok(results)
    }

    /// Delete all embeddings of one document, returning how many were removed
    #[inline]
    pub async fn delete_document_embeddings(&self, document_id: &str) -> Result<u64> {
        debug!("Deleting embeddings for document: {}", document_id);

        let table = self.open_table().await?;
        let predicate = format!("document_id = '{}'", document_id.replace('\'', "''"));

        let before = self.count_matching(&table, &predicate).await?;
        table.delete(&predicate).await.map_err(|e| {
            ContractQaError::Database(format!("Failed to delete document embeddings: {e}"))
        })?;

        info!("Deleted {} embeddings for document {}", before, document_id);
        Ok(before)
    }

    async fn count_matching(&self, table: &Table, predicate: &str) -> Result<u64> {
        let count = table
            .count_rows(Some(predicate.to_string()))
            .await
            .map_err(|e| ContractQaError::Database(format!("Failed to count rows: {e}")))?;
        Ok(count as u64)
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64> {
        let table = self.open_table().await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| ContractQaError::Database(format!("Failed to count rows: {e}")))?;

        Ok(count as u64)
    }

    /// Remove every embedding, leaving an empty table behind
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        self.drop_table_if_exists().await?;
        self.create_table().await?;
        info!("Cleared all embeddings");
        Ok(())
    }

    /// Move a corrupted store aside so a fresh one can be created
    fn attempt_corruption_recovery(db_path: &Path) -> Result<()> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                ContractQaError::Database(format!("Failed to remove corrupted database: {e}"))
            })?;
        }

        std::fs::create_dir_all(db_path)?;
        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        let table_names = self.connection.table_names().execute().await.map_err(|e| {
            ContractQaError::Database(format!("Failed to list tables for drop: {e}"))
        })?;

        if table_names.contains(&self.table_name) {
            info!("Dropping existing chunks table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| ContractQaError::Database(format!("Failed to drop table: {e}")))?;
        }

        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ContractQaError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| ContractQaError::Database(format!("Invalid {name} column type")))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ContractQaError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| ContractQaError::Database(format!("Invalid {name} column type")))
}
