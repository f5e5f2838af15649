use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// SIP request method.
///
/// Method names are case-sensitive on the wire (RFC 3261 Section 7.1);
/// anything not in the known set is carried as [`Method::Extension`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Method {
    #[default]
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Info,
    Prack,
    Subscribe,
    Notify,
    Refer,
    Message,
    Update,
    Publish,
    Extension(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Info => "INFO",
            Method::Prack => "PRACK",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Update => "UPDATE",
            Method::Publish => "PUBLISH",
            Method::Extension(name) => name,
        }
    }

    /// Build a method from its wire name, mapping unknown tokens to
    /// [`Method::Extension`].
    pub fn from_token(token: &str) -> Self {
        match token {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "REGISTER" => Method::Register,
            "OPTIONS" => Method::Options,
            "INFO" => Method::Info,
            "PRACK" => Method::Prack,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "REFER" => Method::Refer,
            "MESSAGE" => Method::Message,
            "UPDATE" => Method::Update,
            "PUBLISH" => Method::Publish,
            other => Method::Extension(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = !s.is_empty() && s.bytes().all(crate::types::is_token_char);
        if !valid {
            return Err(Error::Parse {
                context: "Method".to_string(),
                position: 0,
                detail: format!("'{}' is not a method token", s),
            });
        }
        Ok(Method::from_token(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_extension() {
        assert_eq!("REGISTER".parse::<Method>().unwrap(), Method::Register);
        assert_eq!(
            "FOO".parse::<Method>().unwrap(),
            Method::Extension("FOO".to_string())
        );
        // case matters
        assert_eq!(
            "invite".parse::<Method>().unwrap(),
            Method::Extension("invite".to_string())
        );
        assert!("BAD METHOD".parse::<Method>().is_err());
        assert_eq!(Method::Cancel.to_string(), "CANCEL");
    }
}
