use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: '{value}'")]
pub struct InvalidEnumValue {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnumValue {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
});

str_enum!(CardMediaType {
    Jpeg => "image/jpeg",
    Png => "image/png",
});

impl CardMediaType {
    /// Parse a media type as declared by an upload (`Content-Type` style).
    ///
    /// Case-insensitive; parameters such as `; charset=...` are ignored.
    pub fn from_declared(declared: &str) -> Result<Self, InvalidEnumValue> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        essence.parse()
    }
}

str_enum!(PrecautionSource {
    Model => "model",
    Fallback => "fallback",
});

str_enum!(CardStatus {
    Empty => "empty",
    Processing => "processing",
    Ready => "ready",
    Failed => "failed",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn message_role_round_trip() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            assert_eq!(MessageRole::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn message_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = MessageRole::from_str("system").unwrap_err();
        assert_eq!(err.field, "MessageRole");
        assert_eq!(err.value, "system");
    }

    #[test]
    fn card_status_serializes_snake_case() {
        let json = serde_json::to_string(&CardStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert_eq!(CardStatus::from_str("ready").unwrap(), CardStatus::Ready);
    }

    #[test]
    fn declared_media_types_accepted() {
        assert_eq!(CardMediaType::from_declared("image/jpeg").unwrap(), CardMediaType::Jpeg);
        assert_eq!(CardMediaType::from_declared("image/png").unwrap(), CardMediaType::Png);
        assert_eq!(CardMediaType::from_declared("IMAGE/PNG").unwrap(), CardMediaType::Png);
        assert_eq!(
            CardMediaType::from_declared(" image/jpeg ; q=1").unwrap(),
            CardMediaType::Jpeg
        );
    }

    #[test]
    fn other_media_types_rejected() {
        for declared in ["image/gif", "application/pdf", "image/webp", "", "text/plain"] {
            assert!(
                CardMediaType::from_declared(declared).is_err(),
                "{declared} should be rejected"
            );
        }
    }
}
