#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("expected {expected} landmarks per snapshot, got {got}")]
    InvalidInput { expected: usize, got: usize },

    #[error("failed to construct NotNan from f32: {1}")]
    ConstructNotNan(#[source] ordered_float::FloatIsNan, f32),

    #[error("failed to parse landmark snapshot")]
    ParseSnapshot(#[source] serde_json::Error),

    #[error("failed to serialize frame report")]
    SerializeReport(#[source] serde_json::Error),

    #[error("unknown move name: {0}")]
    UnknownMove(String),

    #[error("unknown landmark name: {0}")]
    UnknownLandmark(String),

    #[error("failed to convert usize value to landmark kind: {0}")]
    ConvertUSizeToLandmarkKind(usize),

    #[error("failed to convert usize value to move: {0}")]
    ConvertUSizeToMove(usize),

    #[error("visibility threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f32),

    #[error("tolerance {0} must be finite and non-negative, got {1}")]
    InvalidTolerance(&'static str, f32),

    #[error("failed to read config file: {1:?}")]
    ReadConfig(#[source] std::io::Error, std::path::PathBuf),

    #[error("failed to parse config file: {1:?}")]
    ParseConfig(#[source] toml::de::Error, std::path::PathBuf),

    #[error("failed to read input")]
    ReadInput(#[source] std::io::Error),

    #[error("failed to open input file: {1:?}")]
    OpenInput(#[source] std::io::Error, std::path::PathBuf),

    #[error("failed to write frame report")]
    WriteReport(#[source] std::io::Error),

    #[error("cannot dispatch key {0:?}")]
    InvalidKey(String),

    #[error("snapshot reader thread panicked")]
    ReaderPanicked,
}
