use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DumpError;

/// Structured error information extracted from MySQL driver errors.
///
/// Serialized to JSON when the CLI runs with `--json`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sqlstate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Format MySQL driver errors for the parent module's `Display` impl.
///
/// Server errors render as `MySQL error 1146 (42S02): Table 'x' doesn't exist`.
pub fn format_mysql_error(f: &mut fmt::Formatter<'_>, error: &mysql_async::Error) -> fmt::Result {
    let info = extract_error_info(error);
    let message = info.message.as_deref().unwrap_or("unknown error");

    match (info.code, info.sqlstate.as_deref()) {
        (Some(code), Some(state)) => write!(f, "MySQL error {code} ({state}): {message}"),
        (Some(code), None) => write!(f, "MySQL error {code}: {message}"),
        _ => write!(f, "MySQL error: {message}"),
    }
}

/// Extract structured information from a MySQL driver error.
pub fn extract_error_info(error: &mysql_async::Error) -> ErrorInfo {
    let mut info = ErrorInfo::default();

    match error {
        mysql_async::Error::Server(server) => {
            info.error_type = Some("mysql.server_error".to_string());
            info.code = Some(server.code);
            if !server.state.is_empty() {
                info.sqlstate = Some(server.state.clone());
            }
            info.message = Some(server.message.clone());
        }
        mysql_async::Error::Driver(driver) => {
            info.error_type = Some("mysql.driver_error".to_string());
            info.message = Some(driver.to_string());
        }
        mysql_async::Error::Io(io) => {
            info.error_type = Some("mysql.io_error".to_string());
            info.message = Some(io.to_string());
        }
        other => {
            info.error_type = Some("mysql.other_error".to_string());
            info.message = Some(other.to_string());
        }
    }

    info
}

/// Structured information for any tabledump error
///
/// Driver errors keep their server code and SQLSTATE; every other error is
/// reported with its stage as the type.
pub fn describe_error(error: &DumpError) -> ErrorInfo {
    let error_type = match error {
        DumpError::MySql(e) => return extract_error_info(e),
        DumpError::Connection(_) => "tabledump.connection_error",
        DumpError::Catalog(_) => "tabledump.catalog_error",
        DumpError::Export(_) => "tabledump.export_error",
        DumpError::Config(_) => "tabledump.config_error",
        DumpError::Io(_) => "tabledump.io_error",
        DumpError::Generic(_) => "tabledump.error",
    };

    ErrorInfo {
        error_type: Some(error_type.to_string()),
        message: Some(error.to_string()),
        ..ErrorInfo::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    #[test]
    fn test_error_info_skips_empty_fields() {
        let info = ErrorInfo {
            error_type: Some("mysql.server_error".to_string()),
            code: Some(1146),
            sqlstate: None,
            message: Some("Table 'shop.nope' doesn't exist".to_string()),
        };
        let json = info.to_json_compact().unwrap();
        assert!(json.contains("\"type\":\"mysql.server_error\""));
        assert!(json.contains("\"code\":1146"));
        assert!(!json.contains("sqlstate"));
    }

    #[test]
    fn test_describe_stage_error() {
        let err: DumpError = CatalogError::Columns {
            table: "orders".to_string(),
            reason: "lost connection".to_string(),
        }
        .into();
        let info = describe_error(&err);
        assert_eq!(info.error_type.as_deref(), Some("tabledump.catalog_error"));
        assert!(info.code.is_none());
        assert!(info.message.unwrap().contains("orders"));
    }
}
