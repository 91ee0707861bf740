//! LanceDB connection and collection table housekeeping.
//!
//! One Lance table per collection, stored as `<db_dir>/<name>.lance`.
use arrow_array::{RecordBatch, RecordBatchIterator};
use lancedb::{connect, Connection, Table};
use tracing::info;

use ragdb_core::error::{Error, Result};

use crate::schema::{build_arrow_schema, embedding_size_of};
use crate::LanceVectorIndex;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::storage)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(table_names(conn).await?.iter().any(|n| n == name))
}

pub async fn table_names(conn: &Connection) -> Result<Vec<String>> {
    conn.table_names().execute().await.map_err(Error::storage)
}

/// Drop the collection table `name` through the connection.
pub async fn drop_table(conn: &Connection, name: &str) -> Result<()> {
    conn.drop_table(name, &[]).await.map_err(Error::storage)?;
    info!(collection = name, "dropped lance table");
    Ok(())
}

/// SQL predicate selecting one partition.
pub fn partition_filter(file_name: &str) -> String {
    format!("file_name = '{}'", file_name.replace('\'', "''"))
}

impl LanceVectorIndex {
    /// Open the collection table `name`, creating an empty one if absent.
    pub async fn create_or_open(conn: &Connection, name: &str, embedding_size: usize) -> Result<Self> {
        let table = if table_exists(conn, name).await? {
            let table = conn.open_table(name).execute().await.map_err(Error::storage)?;
            check_embedding_size(&table, name, embedding_size).await?;
            table
        } else {
            let schema = build_arrow_schema(embedding_size);
            let iter = RecordBatchIterator::new(Vec::<std::result::Result<RecordBatch, arrow_schema::ArrowError>>::new(), schema);
            let table = conn.create_table(name, Box::new(iter)).execute().await.map_err(Error::storage)?;
            info!(collection = name, embedding_size, "created lance table");
            table
        };
        Ok(Self { table, name: name.to_string(), embedding_size })
    }
}

async fn check_embedding_size(table: &Table, name: &str, expected: usize) -> Result<()> {
    let schema = table.schema().await.map_err(Error::storage)?;
    let actual = embedding_size_of(&schema)
        .ok_or_else(|| Error::InvalidInput(format!("table '{name}' does not have the collection schema")))?;
    if actual != expected {
        return Err(Error::SchemaMismatch { collection: name.to_string(), expected, actual });
    }
    Ok(())
}
