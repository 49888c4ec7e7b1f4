//! Default WebSocket transport.
//!
//! The client itself only needs a [Sink] of outbound text frames and a
//! [Stream] of inbound ones. This module provides both for a WebSocket URL.
//! TLS and reconnection are left to the caller.
use async_tungstenite::tungstenite::{self, Message};
use futures::prelude::*;

use crate::utils::DynError;

/// Failure of the underlying connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}")]
    Connect {
        url: String,
        #[source]
        error: DynError,
    },
    #[error("Failed to send frame")]
    Send(#[source] DynError),
    #[error("Failed to receive frame")]
    Receive(#[source] DynError),
}

/// Open a WebSocket connection to `url` and split it into a text sink and a
/// text stream.
///
/// Binary messages that hold valid UTF-8 are passed on as text. Control
/// messages are dropped.
pub async fn connect(
    url: &str,
) -> Result<
    (
        impl Sink<String, Error = tungstenite::Error> + Send + Unpin + 'static,
        impl Stream<Item = Result<String, tungstenite::Error>> + Send + Unpin + 'static,
    ),
    TransportError,
> {
    let (socket, _response) = async_tungstenite::async_std::connect_async(url)
        .await
        .map_err(|error| TransportError::Connect {
            url: url.to_owned(),
            error: DynError::new(error),
        })?;
    tracing::debug!(url, "websocket connected");

    let (sink, stream) = socket.split();
    let sink = sink.with(|text: String| {
        future::ready(Ok::<_, tungstenite::Error>(Message::text(text)))
    });
    let stream = stream.try_filter_map(|message| future::ready(Ok(into_text(message))));
    Ok((sink, stream))
}

fn into_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.as_str().to_owned()),
        Message::Binary(data) => String::from_utf8(data.to_vec()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn text_messages_only() {
        assert_eq!(into_text(Message::text("{}")), Some("{}".to_string()));
        assert_eq!(
            into_text(Message::binary(b"{\"m\":1}".to_vec())),
            Some("{\"m\":1}".to_string())
        );
        assert_eq!(into_text(Message::binary(vec![0xff, 0xfe])), None);
    }

    #[async_std::test]
    async fn connect_refused() {
        let result = connect("ws://127.0.0.1:1/WSGateway/").await;
        match result {
            Err(TransportError::Connect { url, .. }) => {
                assert_eq!(url, "ws://127.0.0.1:1/WSGateway/")
            }
            Err(error) => panic!("Unexpected error {:?}", error),
            Ok(_) => panic!("Connected to closed port"),
        }
    }
}
