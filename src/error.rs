//! Error types for the bridge.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BridgeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream {
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            BridgeError::config("bad port").to_string(),
            "Configuration error: bad port"
        );
        assert_eq!(
            BridgeError::upstream("connection refused").to_string(),
            "Upstream error: connection refused"
        );
    }

    #[test]
    fn test_toml_errors_convert() {
        let err = toml::from_str::<toml::Value>("not = = toml").unwrap_err();
        let bridge: BridgeError = err.into();
        assert!(bridge.to_string().starts_with("TOML parse error"));
    }
}
