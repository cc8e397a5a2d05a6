use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid store key '{0}'")]
    InvalidKey(String),

    #[error("Failed to read stored value '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write stored value '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored value '{key}' is corrupted: {message}")]
    Corrupted { key: String, message: String },

    #[error("Failed to serialize value for '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => {
                "The store namespace or user id contains unsupported characters."
            }
            Self::Read { .. } => {
                "Unable to read the profile store. Check that the store directory is readable."
            }
            Self::Write { .. } => {
                "Unable to write to the profile store. Check disk space and file permissions."
            }
            Self::Corrupted { .. } => {
                "A stored profile entry is corrupted. Run `ai-barber signout` to clear the \
                 current user, or delete the named entry from the store directory."
            }
            Self::Serialization { .. } => {
                "Internal error preparing profile data. Please report this issue."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_corrupted_is_corrupted() {
        let corrupted = StoreError::Corrupted {
            key: "barber_user".to_string(),
            message: "expected value".to_string(),
        };
        assert!(corrupted.is_corrupted());
        assert!(corrupted.recovery_hint().contains("signout"));

        let read = StoreError::Read {
            key: "barber_user".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!read.is_corrupted());
        assert!(!read.recovery_hint().is_empty());
    }
}
