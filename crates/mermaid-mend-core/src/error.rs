pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid viewBox `{raw}`: expected four finite numbers")]
    InvalidViewBox { raw: String },

    #[error("Invalid correction policy: {message}")]
    InvalidPolicy { message: String },
}
