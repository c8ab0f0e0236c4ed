use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraciError {
    #[error("not connected to the simulation")]
    NotConnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command 0x{command:02x} failed with status 0x{status:02x}: {description}")]
    CommandFailed {
        command: u8,
        status: u8,
        description: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown object '{0}'")]
    UnknownObject(String),
}

pub type TraciResult<T> = Result<T, TraciError>;
