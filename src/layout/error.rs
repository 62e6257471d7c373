/// Conditions that abort a layout call. Everything else the pipeline can
/// recover from is logged and skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid input: no root element")]
    InvalidInput,
    #[error("invalid input: expected a <graph> root element, found <{0}>")]
    UnexpectedRoot(String),
    #[error("unknown layout algorithm: {0}")]
    UnknownAlgorithm(String),
}
