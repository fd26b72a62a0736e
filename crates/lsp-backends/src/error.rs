use thiserror::Error;

/// Adapter-specific failures that aren't already covered by [`lsp_core::Error`], convertible
/// into it so they surface through `Session::create` without callers matching two enums.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unsupported option for this backend: {0}")]
    UnsupportedOption(String),
    #[error(transparent)]
    Core(#[from] lsp_core::Error),
}

impl From<BackendError> for lsp_core::Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::UnsupportedOption(msg) => lsp_core::Error::Configuration(msg),
            BackendError::Core(err) => err,
        }
    }
}
