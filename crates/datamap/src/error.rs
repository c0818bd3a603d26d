//! Error types for datamap

use thiserror::Error;

/// Result type alias for datamap operations
pub type MapResult<T> = Result<T, MapError>;

/// Error types for mapping, statement generation and execution.
#[derive(Debug, Error)]
pub enum MapError {
    /// Static mapping metadata is invalid (missing key column, duplicate column name, ...).
    ///
    /// Surfaced at first use of the offending type and cached; never retried.
    #[error("Mapping configuration error: {0}")]
    MappingConfiguration(String),

    /// A result set violated the contiguous-by-parent ordering required by graph mapping.
    #[error("Data mapping error: {0}")]
    DataMapping(String),

    /// A column map lacks the columns required for the requested statement shape.
    #[error("Query generation error: {0}")]
    QueryGeneration(String),

    /// A value could not be coerced to or from its database representation.
    #[error("Conversion error on column '{column}': {message}")]
    Conversion { column: String, message: String },

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl MapError {
    /// Create a mapping configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::MappingConfiguration(message.into())
    }

    /// Create a data mapping (sort order) error
    pub fn data_mapping(message: impl Into<String>) -> Self {
        Self::DataMapping(message.into())
    }

    /// Create a query generation error
    pub fn query_generation(message: impl Into<String>) -> Self {
        Self::QueryGeneration(message.into())
    }

    /// Create a conversion error for a specific column
    pub fn conversion(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a mapping configuration error
    pub fn is_mapping_configuration(&self) -> bool {
        matches!(self, Self::MappingConfiguration(_))
    }

    /// Check if this is a data mapping (sort order) error
    pub fn is_data_mapping(&self) -> bool {
        matches!(self, Self::DataMapping(_))
    }

    /// Check if this is a query generation error
    pub fn is_query_generation(&self) -> bool {
        matches!(self, Self::QueryGeneration(_))
    }

    /// Check if this is a conversion error
    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Attach a column name to a conversion error raised without one.
    pub(crate) fn for_column(self, column: &str) -> Self {
        match self {
            Self::Conversion { column: c, message } if c.is_empty() => Self::Conversion {
                column: column.to_string(),
                message,
            },
            other => other,
        }
    }
}
