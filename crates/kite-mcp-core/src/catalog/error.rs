#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog fetch failed: {0}")]
    Fetch(String),
    #[error("catalog response was not readable: {0}")]
    Io(String),
    #[error("catalog line {line} could not be parsed: {source}")]
    Parse { line: usize, source: serde_json::Error },
    #[error("catalog refresh failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
