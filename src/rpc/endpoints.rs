//! Named gateway methods.
//!
//! Every configured endpoint name gets an [EndpointMethod] that calls it with
//! `{"OMSId": 1}` unless other parameters are given and decodes the response
//! payload on a best effort basis, see [EndpointResponse].
use serde_json::Value;
use std::collections::HashMap;

use super::client::{CallError, Client};
use super::frame::Frame;

/// Endpoint names a [crate::Config] generates methods for by default.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    // System
    "Ping",
    "GetOMSs",
    // Products and instruments
    "GetProduct",
    "GetProducts",
    "GetInstrument",
    "GetInstruments",
    // Market data
    "GetL2Snapshot",
    "GetLevel1",
    "GetTickerHistory",
    "GetLastTrades",
    "SubscribeLevel1",
    "UnsubscribeLevel1",
    "SubscribeLevel2",
    "UnsubscribeLevel2",
    "SubscribeTrades",
    "UnsubscribeTrades",
    "SubscribeTicker",
    "UnsubscribeTicker",
    // Authentication
    "WebAuthenticateUser",
    "AuthenticateUser",
    "Authenticate2FA",
    "LogOut",
    "RegisterNewUser",
    "ResetPassword",
    // User
    "GetUserInfo",
    "SetUserInfo",
    "GetUserConfig",
    "SetUserConfig",
    "GetUserAccounts",
    "GetUserPermissions",
    // Account
    "GetAccountInfo",
    "GetAccountPositions",
    "GetAccountTrades",
    "GetAccountTransactions",
    "SubscribeAccountEvents",
    // Orders
    "SendOrder",
    "CancelOrder",
    "CancelAllOrders",
    "CancelReplaceOrder",
    "ModifyOrder",
    "GetOpenOrders",
    "GetOrderStatus",
    "GetOrderFee",
    "GetOrderHistory",
    "GetOrdersHistory",
    "GetTradesHistory",
    // Deposits, withdrawals and transfers
    "GetDepositInfo",
    "GetDepositTickets",
    "CreateDepositTicket",
    "GetDepositRequestInfoTemplate",
    "GetAllDepositRequestInfoTemplates",
    "GetWithdrawTemplateTypes",
    "GetWithdrawTemplate",
    "GetWithdrawFee",
    "GetWithdrawTickets",
    "CreateWithdrawTicket",
    "TransferFunds",
    "GetTransfers",
];

/// Parameters used when an endpoint is called without any.
pub fn default_params() -> Value {
    serde_json::json!({ "OMSId": 1 })
}

/// Error of [Client::invoke].
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Unknown endpoint {name}")]
    UnknownEndpoint { name: String },
    #[error(transparent)]
    Call(#[from] CallError),
}

/// Decoded response of an endpoint call.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointResponse {
    /// The payload is a JSON document.
    Json(Value),
    /// The payload is not empty but not JSON either.
    Raw(String),
    /// The payload is empty. Holds the whole response frame.
    Frame(Frame),
}

impl EndpointResponse {
    pub fn from_frame(frame: Frame) -> Self {
        match serde_json::from_str(&frame.payload) {
            Ok(value) => Self::Json(value),
            Err(_) if !frame.payload.is_empty() => Self::Raw(frame.payload),
            Err(_) => Self::Frame(frame),
        }
    }

    /// The response as a JSON value. Raw payloads become strings and frames
    /// become their wire object.
    pub fn into_json(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Raw(payload) => Value::String(payload),
            Self::Frame(frame) => serde_json::to_value(frame).unwrap_or(Value::Null),
        }
    }
}

/// Method bound to one endpoint name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointMethod {
    name: String,
}

impl EndpointMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call<P>(
        &self,
        client: &Client,
        params: Option<&P>,
    ) -> Result<EndpointResponse, CallError>
    where
        P: serde::Serialize,
    {
        let response = match params {
            Some(params) => client.call_async(&self.name, params),
            None => client.call_async(&self.name, &default_params()),
        };
        Ok(EndpointResponse::from_frame(response.await?))
    }
}

/// Endpoint methods by name.
#[derive(Debug, Clone, Default)]
pub struct EndpointTable {
    methods: HashMap<String, EndpointMethod>,
}

impl EndpointTable {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let methods = names
            .iter()
            .map(|name| {
                let name = name.as_ref().to_owned();
                (name.clone(), EndpointMethod { name })
            })
            .collect();
        Self { methods }
    }

    pub fn get(&self, name: &str) -> Option<&EndpointMethod> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Endpoint names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names = self.methods.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

/// An [EndpointMethod] bound to a [Client], returned by [Client::endpoint].
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    client: &'a Client,
    method: &'a EndpointMethod,
}

impl<'a> Endpoint<'a> {
    pub(crate) fn new(client: &'a Client, method: &'a EndpointMethod) -> Self {
        Self { client, method }
    }

    pub fn name(&self) -> &str {
        self.method.name()
    }

    /// Call the endpoint with `params` or with `{"OMSId": 1}` if `params` is
    /// `None`.
    pub async fn call(self, params: Option<Value>) -> Result<EndpointResponse, CallError> {
        self.method.call(self.client, params.as_ref()).await
    }

    /// Call the endpoint with typed parameters.
    pub async fn call_with<P: serde::Serialize>(
        self,
        params: &P,
    ) -> Result<EndpointResponse, CallError> {
        self.method.call(self.client, Some(params)).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rpc::frame::MessageType;
    use crate::test_utils::TestGateway;
    use crate::Config;

    fn reply(payload: &str) -> Frame {
        Frame {
            message_type: MessageType::Reply,
            id: 0,
            name: "GetProducts".to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn json_payload() {
        assert_eq!(
            EndpointResponse::from_frame(reply(r#"[{"ProductId":1}]"#)),
            EndpointResponse::Json(serde_json::json!([{ "ProductId": 1 }]))
        );
    }

    #[test]
    fn raw_payload() {
        assert_eq!(
            EndpointResponse::from_frame(reply("not json")),
            EndpointResponse::Raw("not json".to_string())
        );
    }

    #[test]
    fn empty_payload_keeps_frame() {
        assert_eq!(
            EndpointResponse::from_frame(reply("")),
            EndpointResponse::Frame(reply(""))
        );
    }

    #[test]
    fn default_names_are_unique() {
        let table = EndpointTable::new(DEFAULT_ENDPOINTS);
        assert_eq!(table.len(), DEFAULT_ENDPOINTS.len());
        assert!(table.contains("GetInstruments"));
        assert!(!table.contains("Level1UpdateEvent"));
    }

    #[async_std::test]
    async fn default_params_sent() {
        let (client, mut gateway) = TestGateway::connect(Config::default());
        let endpoint = client.endpoint("GetProducts").unwrap();
        let response = endpoint.call(None);
        let (response, request) = futures::join!(response, async {
            let request = gateway.next_request().await;
            gateway.send(&Frame {
                id: request.id,
                ..reply(r#"{"ok":true}"#)
            });
            request
        });

        assert_eq!(request.name, "GetProducts");
        assert_eq!(request.payload, r#"{"OMSId":1}"#);
        assert_eq!(
            response.unwrap(),
            EndpointResponse::Json(serde_json::json!({ "ok": true }))
        );
    }

    #[async_std::test]
    async fn explicit_params_sent() {
        let (client, mut gateway) = TestGateway::connect(Config::default());
        let params = serde_json::json!({ "OMSId": 1, "InstrumentId": 5 });
        let response = client.invoke("SubscribeLevel1", Some(params));
        let (response, request) = futures::join!(response, async {
            let request = gateway.next_request().await;
            gateway.send(&Frame {
                id: request.id,
                name: request.name.clone(),
                ..reply("")
            });
            request
        });

        assert_eq!(request.payload, r#"{"InstrumentId":5,"OMSId":1}"#);
        assert!(matches!(response.unwrap(), EndpointResponse::Frame(_)));
    }

    #[async_std::test]
    async fn unknown_endpoint() {
        let config = Config::default().endpoints(vec!["GetProducts"]);
        let (client, _gateway) = TestGateway::connect(config);
        assert!(client.endpoint("GetInstruments").is_none());
        match client.invoke("GetInstruments", None).await {
            Err(EndpointError::UnknownEndpoint { name }) => assert_eq!(name, "GetInstruments"),
            result => panic!("Unexpected result {:?}", result),
        }
        assert_eq!(client.pending_count(), 0);
    }

    #[async_std::test]
    async fn error_frame_rejects() {
        let (client, mut gateway) = TestGateway::connect(Config::default());
        let response = client.invoke("SendOrder", None);
        let (response, _) = futures::join!(response, async {
            let request = gateway.next_request().await;
            gateway.send(&Frame {
                message_type: MessageType::Error,
                id: request.id,
                ..reply(r#"{"errormsg":"Not authorized"}"#)
            });
        });
        match response {
            Err(EndpointError::Call(CallError::Protocol(frame))) => {
                assert_eq!(frame.payload, r#"{"errormsg":"Not authorized"}"#)
            }
            result => panic!("Unexpected result {:?}", result),
        }
    }
}
