use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Search failed: {message}")]
    Search {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Operation failed: {message}")]
    Operation {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Wrap a read-path engine failure, keeping the original cause.
    pub fn search(source: anyhow::Error) -> Self {
        Error::Search { message: source.to_string(), source }
    }

    /// Wrap a write-path engine failure, keeping the original cause.
    pub fn operation(source: anyhow::Error) -> Self {
        Error::Operation { message: source.to_string(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrappers_name_the_failing_path() {
        let read = Error::search(anyhow::anyhow!("boom"));
        assert!(read.to_string().starts_with("Search failed"));
        let write = Error::operation(anyhow::anyhow!("boom"));
        assert!(write.to_string().starts_with("Operation failed"));
    }
}
