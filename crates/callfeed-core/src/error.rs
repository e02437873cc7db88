use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallfeedError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// No usable phone number could be derived from the webhook payload.
    #[error("Phone number missing from payload")]
    PhoneMissing,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

impl CallfeedError {
    /// Short error code string sent to clients in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CallfeedError::Config(_) => "CONFIG_ERROR",
            CallfeedError::PhoneMissing => "PHONE_MISSING",
            CallfeedError::InvalidPayload(_) => "INVALID_PAYLOAD",
            CallfeedError::AuthFailed(_) => "AUTH_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, CallfeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CallfeedError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(CallfeedError::PhoneMissing.code(), "PHONE_MISSING");
        assert_eq!(CallfeedError::InvalidPayload("x".into()).code(), "INVALID_PAYLOAD");
        assert_eq!(CallfeedError::AuthFailed("x".into()).code(), "AUTH_FAILED");
    }
}
