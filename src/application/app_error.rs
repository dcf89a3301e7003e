use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found")]
    NotFound,

    /// Transport failure, timeout or 5xx from the payment platform.
    #[error("Payment platform unavailable: {0}")]
    RemoteUnavailable(String),

    /// The payment platform answered with a 4xx (other than 404).
    #[error("Payment platform rejected the request: {0}")]
    RemoteRejected(String),

    /// A remote payload that cannot be mapped onto a local record.
    #[error("Malformed remote object: {0}")]
    MalformedRemote(String),

    /// A write was accepted remotely but the remote state never reflected it.
    #[error("Remote change not confirmed: {0}")]
    NotConfirmed(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidArgument,
    NotFound,
    RemoteUnavailable,
    RemoteRejected,
    MalformedRemote,
    NotConfirmed,
    Unauthorized,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            ErrorCode::RemoteRejected => "REMOTE_REJECTED",
            ErrorCode::MalformedRemote => "MALFORMED_REMOTE",
            ErrorCode::NotConfirmed => "NOT_CONFIRMED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::RemoteUnavailable(_) => ErrorCode::RemoteUnavailable,
            AppError::RemoteRejected(_) => ErrorCode::RemoteRejected,
            AppError::MalformedRemote(_) => ErrorCode::MalformedRemote,
            AppError::NotConfirmed(_) => ErrorCode::NotConfirmed,
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
