use deepsearch_core::{CapabilityId, Error, InvocationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    InvalidConfig,
    Unreachable,
    RemoteRejected,
    MalformedResponse,
}

impl ErrorCode {
    pub(crate) fn of(e: &Error) -> Self {
        match e {
            Error::InvalidArguments(_) => Self::InvalidParams,
            Error::InvalidConfig(_) => Self::InvalidConfig,
            Error::Unreachable(_) => Self::Unreachable,
            Error::RemoteRejected { .. } => Self::RemoteRejected,
            Error::MalformedSnapshot(_) => Self::MalformedResponse,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::InvalidConfig => "invalid_config",
            Self::Unreachable => "unreachable",
            Self::RemoteRejected => "remote_rejected",
            Self::MalformedResponse => "malformed_response",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::Unreachable | Self::MalformedResponse => true,
            // Depends on the status; see `hint`.
            Self::RemoteRejected => false,
            Self::InvalidParams | Self::InvalidConfig => false,
        }
    }
}

pub(crate) fn hint(capability: CapabilityId, e: &Error) -> &'static str {
    match e {
        Error::InvalidArguments(_) => "Check the tool arguments against the tool's input schema.",
        Error::InvalidConfig(_) => "Fix the server configuration and restart the server.",
        Error::Unreachable(_) => {
            "The search service could not be reached in time. Check network connectivity (and DEEPSEARCH_ENDPOINT if set), then retry."
        }
        Error::MalformedSnapshot(_) => {
            "The service returned a response that could not be interpreted. Retry; if it persists, the API may have changed."
        }
        Error::RemoteRejected { status, .. } => match *status {
            401 | 403 => {
                "Check that an API key is configured (--api-key or DEEPSEARCH_API_KEY) and that it is valid."
            }
            402 => "The account has no remaining credits.",
            404 if capability == CapabilityId::DeepResearcherCheck => {
                "The task id is unknown or has expired. Start a new task with deep_researcher_start."
            }
            404 => "The endpoint path was not found. Check DEEPSEARCH_ENDPOINT if set.",
            429 => "Rate limited. Wait before retrying, or request fewer results.",
            500..=599 => "The search service had an internal problem. Retry later.",
            _ => "Check the tool arguments; the service refused this request.",
        },
    }
}

/// Error envelope for a failed invocation. The message leads with the capability name and
/// carries the remote status code when there is one.
pub(crate) fn error_result(capability: CapabilityId, e: &Error) -> InvocationResult {
    let code = ErrorCode::of(e);
    tracing::warn!(
        capability = capability.as_str(),
        code = code.as_str(),
        retryable = code.retryable(),
        "capability invocation failed"
    );
    let name = capability.descriptor().display_name;
    InvocationResult::error(format!(
        "{name} failed: {e}\nHint: {}",
        hint(capability, e)
    ))
}

/// Benign "nothing found" result. Not an error.
pub(crate) fn no_result(what: impl std::fmt::Display) -> InvocationResult {
    InvocationResult::text(format!("{what} Try a broader or rephrased query."))
}
