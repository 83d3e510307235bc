pub mod driver;
pub mod importer;
pub mod transform;

pub mod errors {
    use std::path::PathBuf;

    use dxfmerge_io::IoError;
    use serde::Serialize;
    use thiserror::Error;

    /// 整次合并运行的失败。只有这些错误会让运行整体失败。
    #[derive(Debug, Error)]
    pub enum MergeError {
        #[error("no source files were given")]
        NoSources,
        #[error("no files were successfully merged ({attempted} attempted)")]
        NothingMerged { attempted: usize },
        #[error("failed to persist merged document to {path:?}: {source}")]
        Persist {
            path: PathBuf,
            #[source]
            source: IoError,
        },
        #[error("merged document references undefined layers: {}", layers.join(", "))]
        InvalidTarget { layers: Vec<String> },
    }

    /// 单个源文件失败的原因。只让该源进入 `Failed`，运行继续。
    #[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
    #[serde(tag = "reason", content = "message", rename_all = "snake_case")]
    pub enum SourceFailure {
        #[error("source could not be read: {0}")]
        Unreadable(String),
        #[error("source uses an unsupported feature: {0}")]
        Unsupported(String),
    }

    impl From<&IoError> for SourceFailure {
        fn from(err: &IoError) -> Self {
            match err {
                IoError::UnsupportedFeature(_) => Self::Unsupported(err.to_string()),
                _ => Self::Unreadable(err.to_string()),
            }
        }
    }
}

pub use driver::{MergeDriver, MergeOptions, MergeReport, RunTotals, SourceOutcome, SourceState};
pub use errors::{MergeError, SourceFailure};
pub use importer::{Diagnostic, ImportOptions, ImportReport, Importer, MergeStats, import};
pub use transform::{CollapseReport, collapse_to_group};
