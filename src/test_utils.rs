use futures::channel::mpsc;
use futures::prelude::*;

use crate::rpc::Frame;
use crate::{Client, Config};

/// In-memory stand-in for the gateway end of a connection.
///
/// Dropping it ends the inbound stream of the client.
#[derive(Debug)]
pub struct TestGateway {
    requests: mpsc::UnboundedReceiver<String>,
    responses: mpsc::UnboundedSender<String>,
}

impl TestGateway {
    /// Create a client with `config` and open it on an in-memory channel.
    pub fn connect(config: Config) -> (Client, Self) {
        let (request_sender, requests) = mpsc::unbounded::<String>();
        let (responses, response_receiver) = mpsc::unbounded::<String>();
        let client = Client::new(config);
        client.open_with(request_sender, response_receiver.map(Ok::<_, std::io::Error>));
        (
            client,
            Self {
                requests,
                responses,
            },
        )
    }

    /// Wait for the next frame sent by the client.
    pub async fn next_request(&mut self) -> Frame {
        let text = self.requests.next().await.expect("Client went away");
        Frame::parse(&text).expect("Client sent invalid frame")
    }

    pub fn send(&self, frame: &Frame) {
        self.send_text(&frame.build());
    }

    pub fn send_text(&self, text: &str) {
        self.responses
            .unbounded_send(text.to_owned())
            .expect("Client stopped reading");
    }
}

/// Wire text of a frame, built by hand.
pub fn frame_text(message_type: i64, id: i64, name: &str, payload: &str) -> String {
    serde_json::json!({ "m": message_type, "i": id, "n": name, "o": payload }).to_string()
}
