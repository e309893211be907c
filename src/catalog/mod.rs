//! Catalog access for table exports
//!
//! This module defines the query interface a table export needs from the
//! database, independent of the driver:
//! - Table and column descriptors read from the catalog
//! - The [`CatalogSession`] trait implemented by one private connection
//! - Identifier quoting shared by every generated statement

use async_trait::async_trait;

use crate::error::Result;

pub mod mysql;
pub mod value;

pub use mysql::MySqlSession;
pub use value::SqlValue;

/// Kind of a catalog entry as reported by `SHOW FULL TABLES`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// A regular table with stored rows
    BaseTable,
    /// A view; never exported
    View,
}

impl TableKind {
    /// Map a `Table_type` value to a kind
    ///
    /// Returns `None` for entries that are neither base tables nor views
    /// (system views, sequences).
    pub fn from_table_type(table_type: &str) -> Option<Self> {
        match table_type {
            "BASE TABLE" => Some(TableKind::BaseTable),
            "VIEW" => Some(TableKind::View),
            _ => None,
        }
    }
}

/// A table read from the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub kind: TableKind,
}

impl TableDescriptor {
    pub fn base_table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::BaseTable,
        }
    }
}

/// A column of a table, in ordinal order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Declared type, e.g. `varchar(255)`
    pub declared_type: String,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
    /// Whether the column is generated (no explicit values allowed)
    pub generated: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            primary_key: false,
            generated: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// Query interface over one private database connection
///
/// Every method maps to one catalog or data query. A session is owned by
/// exactly one task and released with [`CatalogSession::close`].
#[async_trait]
pub trait CatalogSession: Send {
    /// List the tables of `database`, views included
    async fn list_tables(&mut self, database: &str) -> Result<Vec<TableDescriptor>>;

    /// Fetch the ordered column list of a table
    async fn get_columns(&mut self, database: &str, table: &str)
    -> Result<Vec<ColumnDescriptor>>;

    /// Fetch the verbatim `CREATE TABLE` statement, without trailing `;`
    async fn get_create_statement(&mut self, table: &str) -> Result<String>;

    /// Count the rows of a table
    async fn get_row_count(&mut self, table: &str) -> Result<u64>;

    /// Fetch one page of rows
    ///
    /// # Arguments
    /// * `columns` - Columns to select, in output order
    /// * `order_by` - Columns giving the page a stable order
    /// * `offset` - Rows to skip
    /// * `limit` - Maximum rows to return
    async fn fetch_rows(
        &mut self,
        table: &str,
        columns: &[String],
        order_by: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Vec<SqlValue>>>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<()>;

    /// List the base tables of `database`, skipping views
    async fn list_base_tables(&mut self, database: &str) -> Result<Vec<TableDescriptor>> {
        let tables = self.list_tables(database).await?;
        Ok(tables
            .into_iter()
            .filter(|t| t.kind == TableKind::BaseTable)
            .collect())
    }
}

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Build the paged SELECT used to stream rows
pub fn select_page_query(
    table: &str,
    columns: &[String],
    order_by: &[String],
    offset: u64,
    limit: u64,
) -> String {
    let select_list = if columns.is_empty() {
        "*".to_string()
    } else {
        join_identifiers(columns)
    };
    let mut query = format!("SELECT {} FROM {}", select_list, quote_identifier(table));
    if !order_by.is_empty() {
        query.push_str(" ORDER BY ");
        query.push_str(&join_identifiers(order_by));
    }
    query.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    query
}

pub(crate) fn join_identifiers(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(",")
}
