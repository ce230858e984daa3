use std::fmt;

use thiserror::Error;

pub type CityTagResult<T> = Result<T, CityTagError>;

#[derive(Debug, Error)]
pub enum CityTagError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider rejected request (code {code}): {message}")]
    Api { code: String, message: String },
    #[error("malformed ciphertext ({0})")]
    MalformedCiphertext(&'static str),
    #[error("payload serialization failed")]
    Serialize(#[from] serde_json::Error),
    #[error("provider login response did not include a session token")]
    MissingToken,
    #[error("{0}")]
    Message(String),
}

impl CityTagError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn display_chain(&self) -> DisplayChainedError<'_> {
        DisplayChainedError { inner: self }
    }
}

pub struct DisplayChainedError<'a> {
    inner: &'a (dyn std::error::Error + 'static),
}

impl fmt::Debug for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self.inner);

        while let Some(err) = current {
            if first {
                first = false;
            } else {
                write!(f, " -> ")?;
            }

            write!(f, "{err}")?;
            current = err.source();
        }

        Ok(())
    }
}

impl fmt::Display for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
