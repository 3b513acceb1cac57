/// How a reachable endpoint rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// No such process (supervisor `BAD_NAME`).
    BadName,
    /// Stop requested for a process that is not running.
    NotRunning,
    /// Start requested for a process that is already running.
    AlreadyStarted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Endpoint unreachable or the transport deadline expired. Retryable.
    #[error("transport unavailable ({endpoint}): {message}")]
    TransportUnavailable { endpoint: String, message: String },

    /// Endpoint reachable, operation rejected. Not retryable as is.
    #[error("remote fault ({kind:?}): {message}")]
    RemoteFault { kind: FaultKind, message: String },

    #[error("timed out waiting for {what}")]
    Timeout { what: String },

    #[error("malformed reply: {0}")]
    Decode(String),

    /// Request could not be built; nothing was sent.
    #[error("cannot encode request: {0}")]
    Encode(String),
}

impl RpcError {
    pub fn unavailable(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn fault(kind: FaultKind, message: impl Into<String>) -> Self {
        Self::RemoteFault {
            kind,
            message: message.into(),
        }
    }

    pub fn from_status(endpoint: &str, status: &tonic::Status) -> Self {
        use tonic::Code;

        let message = status.message().to_string();
        match status.code() {
            Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                Self::unavailable(endpoint, message)
            }
            Code::NotFound => Self::fault(FaultKind::BadName, message),
            Code::FailedPrecondition => Self::fault(FaultKind::NotRunning, message),
            Code::AlreadyExists => Self::fault(FaultKind::AlreadyStarted, message),
            _ => Self::fault(FaultKind::Rejected, message),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportUnavailable { .. })
    }

    pub fn is_bad_name(&self) -> bool {
        matches!(
            self,
            Self::RemoteFault {
                kind: FaultKind::BadName,
                ..
            }
        )
    }

    pub fn is_not_running(&self) -> bool {
        matches!(
            self,
            Self::RemoteFault {
                kind: FaultKind::NotRunning,
                ..
            }
        )
    }
}
