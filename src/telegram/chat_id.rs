//! Strictly numeric chat identifier.
//!
//! The Bot API answers "chat not found" when `chat_id` is sent as a JSON
//! string, so the identifier is an integer on the wire. Text coming from
//! outside (query strings, environment) is converted with [`str::parse`] and
//! rejected when it is not a number; deserialization never accepts text.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors produced when converting text into a [`ChatId`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatIdError {
    #[error("Chat identifier is empty")]
    Empty,

    #[error("Chat identifier must be an integer, got '{0}'")]
    NotNumeric(String),
}

/// Identifier of a Telegram chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl FromStr for ChatId {
    type Err = ChatIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChatIdError::Empty);
        }
        s.parse()
            .map(Self)
            .map_err(|_| ChatIdError::NotNumeric(s.to_owned()))
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ChatIdVisitor;

impl Visitor<'_> for ChatIdVisitor {
    type Value = ChatId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer chat identifier")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(ChatId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(ChatId)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Err(E::invalid_type(Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for ChatId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_i64(ChatIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_converted_explicitly() {
        assert_eq!("123456".parse::<ChatId>(), Ok(ChatId(123_456)));
        assert_eq!(" -100200 ".parse::<ChatId>(), Ok(ChatId(-100_200)));
    }

    #[test]
    fn test_non_numeric_text_is_rejected() {
        assert_eq!("".parse::<ChatId>(), Err(ChatIdError::Empty));
        assert_eq!(
            "12ab".parse::<ChatId>(),
            Err(ChatIdError::NotNumeric("12ab".to_owned()))
        );
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&ChatId(123_456)).unwrap();
        assert_eq!(json, "123456");
    }

    #[test]
    fn test_deserialize_rejects_string() {
        assert_eq!(serde_json::from_str::<ChatId>("123456").unwrap(), ChatId(123_456));
        assert!(serde_json::from_str::<ChatId>("\"123456\"").is_err());
    }
}
