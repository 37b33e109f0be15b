pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] mermaid_mend_core::Error),

    #[error("Invalid placeholder class `{class}`: use letters, digits, `-` or `_`")]
    InvalidPlaceholderClass { class: String },

    #[error("Invalid placeholder rules: {message}")]
    InvalidPlaceholderRules { message: String },

    #[error("HTML rewrite failed: {message}")]
    Rewrite { message: String },

    #[error("Invalid config JSON: {message}")]
    InvalidConfigJson { message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<lol_html::errors::RewritingError> for Error {
    fn from(value: lol_html::errors::RewritingError) -> Self {
        Self::Rewrite {
            message: value.to_string(),
        }
    }
}
