use thiserror::Error;

/// Top-level error type for the `camfleet-api` crate.
///
/// Covers every failure mode of a Media / Media2 SOAP exchange:
/// transport, device-side faults, authentication and response decoding.
/// `camfleet-core` maps these into per-device apply diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Non-success HTTP status that did not carry a SOAP fault.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Device rejected the WS-Security token (HTTP 401/403 or `ter:NotAuthorized`).
    #[error("Not authorized: {message}")]
    NotAuthorized { message: String },

    // ── SOAP ────────────────────────────────────────────────────────
    /// Device answered with a SOAP fault.
    #[error("SOAP fault {code}: {reason}")]
    SoapFault { code: String, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Response body did not contain the expected element.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Operation not offered by this service generation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

impl Error {
    /// Returns `true` if the device could not be reached at all.
    pub fn is_connect(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` if the request ran out of time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the device rejected our credentials.
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized { .. })
    }

    /// Render the error together with its full `source()` chain.
    ///
    /// reqwest hides the OS-level cause ("Connection refused", "No route
    /// to host") behind several layers; callers that classify failures by
    /// message need the whole chain.
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        message
    }
}
