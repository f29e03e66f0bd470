use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Could not access directory '{path}'. {error:?}")]
    TargetUnreadable {
        path: String,
        error: std::io::Error,
    },
    #[error("'{path}' is not a directory.")]
    TargetNotDirectory { path: String },
    #[error(transparent)]
    ReportError(#[from] super::report::ReportError),
}
