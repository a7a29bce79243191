use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Construction(String),

    #[error("policy compilation error: {0}")]
    PolicyCompile(String),

    #[error("policy evaluation error: {0}")]
    PolicyEval(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
