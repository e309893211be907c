//! Row data export as INSERT statements
//!
//! Rows are read page by page with a stable ORDER BY (primary key, or every
//! column when the table has none) so that pages neither skip nor repeat
//! rows, and are written as multi-row INSERT statements.

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::{
    CatalogSession, ColumnDescriptor, SqlValue, join_identifiers, quote_identifier,
};
use crate::error::Result;

use super::sink::ArtifactSink;

/// Produces the data statements of one table
#[async_trait]
pub trait RowEmitter: Send + Sync {
    /// Push the statements that reload the table's rows into `sink`
    ///
    /// # Returns
    /// * `Result<u64>` - Number of rows emitted
    async fn emit_rows(
        &self,
        session: &mut dyn CatalogSession,
        table: &str,
        columns: &[ColumnDescriptor],
        sink: &ArtifactSink,
    ) -> Result<u64>;
}

/// Emits batched `INSERT INTO ... VALUES (..),(..);` statements
#[derive(Debug, Clone)]
pub struct InsertStatementEmitter {
    rows_per_insert: usize,
    page_size: u64,
}

impl InsertStatementEmitter {
    /// Create a new emitter
    ///
    /// # Arguments
    /// * `rows_per_insert` - Maximum rows in one INSERT statement
    /// * `page_size` - Rows fetched per query
    pub fn new(rows_per_insert: usize, page_size: u64) -> Self {
        Self {
            rows_per_insert: rows_per_insert.max(1),
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl RowEmitter for InsertStatementEmitter {
    async fn emit_rows(
        &self,
        session: &mut dyn CatalogSession,
        table: &str,
        columns: &[ColumnDescriptor],
        sink: &ArtifactSink,
    ) -> Result<u64> {
        let insert_columns = insertable_columns(columns);
        if insert_columns.is_empty() {
            return Ok(0);
        }
        let order_by = stable_order(columns);

        let mut offset = 0u64;
        loop {
            let page = session
                .fetch_rows(table, &insert_columns, &order_by, offset, self.page_size)
                .await?;
            let fetched = page.len() as u64;

            for statement in insert_statements(table, &insert_columns, &page, self.rows_per_insert)
            {
                sink.push(statement).await?;
            }

            offset += fetched;
            if fetched < self.page_size {
                break;
            }
        }

        debug!("Emitted {} rows of {}", offset, table);
        Ok(offset)
    }
}

/// Columns that accept explicit values, in ordinal order
pub fn insertable_columns(columns: &[ColumnDescriptor]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| !c.generated)
        .map(|c| c.name.clone())
        .collect()
}

/// Columns giving a deterministic row order
pub fn stable_order(columns: &[ColumnDescriptor]) -> Vec<String> {
    let primary: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.clone())
        .collect();
    if primary.is_empty() {
        insertable_columns(columns)
    } else {
        primary
    }
}

/// Render rows as INSERT statements of at most `rows_per_insert` rows each
///
/// Every statement ends with `;\n`.
pub fn insert_statements(
    table: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
    rows_per_insert: usize,
) -> Vec<String> {
    let prefix = format!(
        "INSERT INTO {} ({}) VALUES ",
        quote_identifier(table),
        join_identifiers(columns)
    );

    rows.chunks(rows_per_insert.max(1))
        .map(|batch| {
            let tuples: Vec<String> = batch
                .iter()
                .map(|row| {
                    let values: Vec<String> = row.iter().map(SqlValue::to_sql_literal).collect();
                    format!("({})", values.join(","))
                })
                .collect();
            format!("{}{};\n", prefix, tuples.join(","))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "int").primary(),
            ColumnDescriptor::new("name", "varchar(64)"),
            ColumnDescriptor {
                generated: true,
                ..ColumnDescriptor::new("name_upper", "varchar(64)")
            },
        ]
    }

    #[test]
    fn test_insertable_columns_skip_generated() {
        assert_eq!(insertable_columns(&columns()), vec!["id", "name"]);
    }

    #[test]
    fn test_stable_order_prefers_primary_key() {
        assert_eq!(stable_order(&columns()), vec!["id"]);

        let no_key = vec![
            ColumnDescriptor::new("a", "int"),
            ColumnDescriptor::new("b", "int"),
        ];
        assert_eq!(stable_order(&no_key), vec!["a", "b"]);
    }

    #[test]
    fn test_insert_statements_batching() {
        let cols = vec!["id".to_string(), "name".to_string()];
        let rows: Vec<Vec<SqlValue>> = (1..=5)
            .map(|i| vec![SqlValue::Int(i), SqlValue::Bytes(format!("n{i}").into_bytes())])
            .collect();

        let statements = insert_statements("users", &cols, &rows, 2);
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0],
            "INSERT INTO `users` (`id`,`name`) VALUES (1,'n1'),(2,'n2');\n"
        );
        assert_eq!(
            statements[2],
            "INSERT INTO `users` (`id`,`name`) VALUES (5,'n5');\n"
        );
    }

    #[test]
    fn test_insert_statements_empty() {
        let cols = vec!["id".to_string()];
        assert!(insert_statements("users", &cols, &[], 100).is_empty());
    }

    #[test]
    fn test_null_values() {
        let cols = vec!["id".to_string(), "note".to_string()];
        let rows = vec![vec![SqlValue::Int(7), SqlValue::Null]];
        assert_eq!(
            insert_statements("t", &cols, &rows, 10)[0],
            "INSERT INTO `t` (`id`,`note`) VALUES (7,NULL);\n"
        );
    }
}
