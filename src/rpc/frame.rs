//! Wire frames exchanged with the gateway.
//!
//! Every message on the socket is a JSON object with four required fields:
//!
//! ```text
//! { "m": <message type>, "i": <correlation id>, "n": "<name>", "o": "<payload>" }
//! ```
//!
//! The payload is itself a JSON document encoded as a string. The codec never
//! looks inside it.

/// Kind of a [Frame], carried in the `m` field.
///
/// [MessageType::Error] is only used as a routing signal by the client. Values
/// the gateway may add in the future are kept as [MessageType::Other] and are
/// written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Request,
    Reply,
    Subscribe,
    Event,
    Unsubscribe,
    Error,
    Other(i64),
}

impl MessageType {
    pub fn code(self) -> i64 {
        match self {
            Self::Request => 0,
            Self::Reply => 1,
            Self::Subscribe => 2,
            Self::Event => 3,
            Self::Unsubscribe => 4,
            Self::Error => 5,
            Self::Other(code) => code,
        }
    }

    /// Returns true for the message types the gateway uses to answer a request.
    pub fn is_response(self) -> bool {
        matches!(self, Self::Reply | Self::Error)
    }
}

impl From<i64> for MessageType {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Request,
            1 => Self::Reply,
            2 => Self::Subscribe,
            3 => Self::Event,
            4 => Self::Unsubscribe,
            5 => Self::Error,
            code => Self::Other(code),
        }
    }
}

impl serde::Serialize for MessageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.code().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for MessageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Self::from)
    }
}

/// A single message exchanged with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Frame {
    #[serde(rename = "m")]
    pub message_type: MessageType,
    /// Correlation id. Requests from this client use non-negative even ids.
    #[serde(rename = "i")]
    pub id: i64,
    #[serde(rename = "n")]
    pub name: String,
    /// JSON encoded payload. May be empty.
    #[serde(rename = "o")]
    pub payload: String,
}

/// Error returned from [Frame::parse].
#[derive(Debug, thiserror::Error)]
#[error("Invalid frame {text:?}")]
pub struct FrameParseError {
    pub text: String,
    #[source]
    pub error: serde_json::Error,
}

impl Frame {
    /// Build a request frame calling the endpoint `name` with `params` as
    /// the JSON encoded payload.
    pub fn request(
        name: impl Into<String>,
        params: &impl serde::Serialize,
        id: i64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_type: MessageType::Request,
            id,
            name: name.into(),
            payload: serde_json::to_string(params)?,
        })
    }

    /// Parse the outer envelope of a frame received from the gateway.
    pub fn parse(text: &str) -> Result<Self, FrameParseError> {
        serde_json::from_str(text).map_err(|error| FrameParseError {
            text: text.to_owned(),
            error,
        })
    }

    /// Serialize the frame into its wire representation.
    pub fn build(&self) -> String {
        // A struct of plain strings and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Returns true if the gateway flagged this frame as an error.
    pub fn is_error(&self) -> bool {
        self.message_type == MessageType::Error
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.build())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn request_wire_format() {
        let frame = Frame::request("GetProducts", &serde_json::json!({ "OMSId": 1 }), 4).unwrap();
        assert_eq!(
            frame.build(),
            r#"{"m":0,"i":4,"n":"GetProducts","o":"{\"OMSId\":1}"}"#
        );
    }

    #[test]
    fn parse_reply() {
        let frame = Frame::parse(r#"{"m":1,"i":2,"n":"X","o":"{\"a\":1}"}"#).unwrap();
        assert_eq!(
            frame,
            Frame {
                message_type: MessageType::Reply,
                id: 2,
                name: "X".to_string(),
                payload: r#"{"a":1}"#.to_string(),
            }
        );
    }

    #[test]
    fn parse_error_tag() {
        let frame = Frame::parse(r#"{"m":5,"i":2,"n":"X","o":"not checked"}"#).unwrap();
        assert!(frame.is_error());
        assert_eq!(frame.payload, "not checked");
    }

    #[test]
    fn unknown_message_type_passes_through() {
        let text = r#"{"m":9,"i":7,"n":"Future","o":""}"#;
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.message_type, MessageType::Other(9));
        assert_eq!(frame.build(), text);
    }

    #[test]
    fn wide_message_type_passes_through() {
        let text = r#"{"m":256,"i":3,"n":"Future","o":""}"#;
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.message_type, MessageType::Other(256));
        assert_eq!(frame.build(), text);
    }

    #[test]
    fn negative_id() {
        let frame = Frame::parse(r#"{"m":3,"i":-1,"n":"TickerDataUpdateEvent","o":"[]"}"#).unwrap();
        assert_eq!(frame.id, -1);
        assert_eq!(frame.message_type, MessageType::Event);
    }

    #[test]
    fn missing_field() {
        let err = Frame::parse(r#"{"m":1,"i":2,"n":"X"}"#).unwrap_err();
        assert_eq!(err.text, r#"{"m":1,"i":2,"n":"X"}"#);
    }

    #[test]
    fn not_json() {
        assert!(Frame::parse("hello").is_err());
    }

    #[test_strategy::proptest]
    fn message_type_code(code: i64) {
        prop_assert_eq!(MessageType::from(code).code(), code);
    }
}
