use thiserror::Error;

/// Failure kinds surfaced by the feature-table pipeline.
///
/// `SchemaMismatch` and `TypeCoercion` abort the build: both signal that an
/// upstream extract is not the file we were promised. `MalformedKey` drops
/// the offending row and the run continues. `ExternalService` only affects
/// the places enrichment; the demographic table can still be produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{table}: expected column '{column}' not found")]
    SchemaMismatch {
        table: &'static str,
        column: &'static str,
    },

    #[error("geography value '{0}' is too short to contain a 6-digit tract code")]
    MalformedKey(String),

    #[error("cannot parse {field} value '{value}' for tract {geography}")]
    TypeCoercion {
        field: &'static str,
        value: String,
        geography: String,
    },

    #[error("places search: {0}")]
    ExternalService(String),
}
