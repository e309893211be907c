//! MySQL implementation of [`CatalogSession`]

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use tracing::{debug, trace};

use crate::error::{CatalogError, Result};

use super::{
    CatalogSession, ColumnDescriptor, SqlValue, TableDescriptor, TableKind, quote_identifier,
    select_page_query,
};

const LIST_TABLES_QUERY: &str = "SHOW FULL TABLES WHERE Table_type != 'VIEW'";

const COLUMNS_QUERY: &str = "SELECT `COLUMN_NAME`, `COLUMN_TYPE`, `COLUMN_KEY`, `EXTRA` \
     FROM `INFORMATION_SCHEMA`.`COLUMNS` \
     WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? \
     ORDER BY `ORDINAL_POSITION`";

/// Whether an `EXTRA` value marks a generated column
///
/// `DEFAULT_GENERATED` only flags an expression default; such columns
/// still take explicit values.
fn is_generated_column(extra: &str) -> bool {
    let extra = extra.to_ascii_uppercase();
    extra.contains("VIRTUAL GENERATED") || extra.contains("STORED GENERATED")
}

/// A catalog session over one private `mysql_async` connection
pub struct MySqlSession {
    conn: Conn,
}

impl MySqlSession {
    pub fn new(conn: Conn) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CatalogSession for MySqlSession {
    async fn list_tables(&mut self, database: &str) -> Result<Vec<TableDescriptor>> {
        let rows: Vec<(String, String)> = self.conn.query(LIST_TABLES_QUERY).await.map_err(|e| {
            CatalogError::ListTables {
                database: database.to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut tables = Vec::with_capacity(rows.len());
        for (name, table_type) in rows {
            match TableKind::from_table_type(&table_type) {
                Some(kind) => tables.push(TableDescriptor { name, kind }),
                None => debug!("Skipping {} of type {}", name, table_type),
            }
        }
        Ok(tables)
    }

    async fn get_columns(
        &mut self,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        let rows: Vec<(String, String, String, String)> = self
            .conn
            .exec(COLUMNS_QUERY, (database, table))
            .await
            .map_err(|e| CatalogError::Columns {
                table: table.to_string(),
                reason: e.to_string(),
            })?;

        Ok(rows
            .into_iter()
            .map(|(name, declared_type, key, extra)| ColumnDescriptor {
                name,
                declared_type,
                primary_key: key == "PRI",
                generated: is_generated_column(&extra),
            })
            .collect())
    }

    async fn get_create_statement(&mut self, table: &str) -> Result<String> {
        let query = format!("SHOW CREATE TABLE {}", quote_identifier(table));
        let row: Option<(String, String)> =
            self.conn
                .query_first(query)
                .await
                .map_err(|e| CatalogError::CreateStatement {
                    table: table.to_string(),
                    reason: e.to_string(),
                })?;

        match row {
            Some((_, statement)) => Ok(statement),
            None => Err(CatalogError::CreateStatement {
                table: table.to_string(),
                reason: "no result".to_string(),
            }
            .into()),
        }
    }

    async fn get_row_count(&mut self, table: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(1) FROM {}", quote_identifier(table));
        let count: Option<u64> =
            self.conn
                .query_first(query)
                .await
                .map_err(|e| CatalogError::RowCount {
                    table: table.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(count.unwrap_or(0))
    }

    async fn fetch_rows(
        &mut self,
        table: &str,
        columns: &[String],
        order_by: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Vec<SqlValue>>> {
        let query = select_page_query(table, columns, order_by, offset, limit);
        trace!("{}", query);

        let rows: Vec<Row> = self
            .conn
            .query(query)
            .await
            .map_err(|e| CatalogError::FetchRows {
                table: table.to_string(),
                reason: e.to_string(),
            })?;

        Ok(rows
            .into_iter()
            .map(|row| Row::unwrap(row).into_iter().map(SqlValue::from).collect())
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_generated_column() {
        assert!(is_generated_column("VIRTUAL GENERATED"));
        assert!(is_generated_column("STORED GENERATED"));
        assert!(!is_generated_column("DEFAULT_GENERATED"));
        assert!(!is_generated_column("DEFAULT_GENERATED on update CURRENT_TIMESTAMP"));
        assert!(!is_generated_column("auto_increment"));
        assert!(!is_generated_column(""));
    }
}
