//! Typed values decoded from gateway event payloads.
//!
//! The gateway sends objects for Level1 and order events and arrays of
//! positional arrays for Level2 and trade updates. Every field of an object
//! payload is optional so any object decodes. Fields not modelled here are
//! kept in `extra`.
use serde_json::Value;
use std::convert::TryFrom;

/// Error converting a positional payload entry.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Entry has {actual} fields, expected at least {expected}")]
    TooShort { actual: usize, expected: usize },
    #[error("Field {field} has unexpected value {value}")]
    InvalidField { field: &'static str, value: Value },
}

/// Best bid/offer and session statistics for an instrument.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Level1 {
    #[serde(rename = "OMSId")]
    pub oms_id: Option<u64>,
    pub instrument_id: Option<u64>,
    pub best_bid: Option<f64>,
    pub best_offer: Option<f64>,
    pub last_traded_px: Option<f64>,
    pub last_traded_qty: Option<f64>,
    pub last_trade_time: Option<u64>,
    pub session_open: Option<f64>,
    pub session_high: Option<f64>,
    pub session_low: Option<f64>,
    pub session_close: Option<f64>,
    pub volume: Option<f64>,
    pub time_stamp: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Order book changes for one instrument.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(transparent)]
pub struct Level2 {
    pub entries: Vec<Level2Entry>,
}

/// A single order book change.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(try_from = "Vec<Value>")]
pub struct Level2Entry {
    pub md_update_id: u64,
    pub accounts: u64,
    pub action_date_time: u64,
    /// 0 new, 1 update, 2 delete
    pub action_type: u64,
    pub last_trade_price: f64,
    pub orders: u64,
    pub price: f64,
    pub instrument_id: u64,
    pub quantity: f64,
    /// 0 buy, 1 sell
    pub side: u64,
}

impl TryFrom<Vec<Value>> for Level2Entry {
    type Error = ModelError;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        let fields = Positional::new(&values, 10)?;
        Ok(Self {
            md_update_id: fields.u64(0, "MDUpdateId")?,
            accounts: fields.u64(1, "Accounts")?,
            action_date_time: fields.u64(2, "ActionDateTime")?,
            action_type: fields.u64(3, "ActionType")?,
            last_trade_price: fields.f64(4, "LastTradePrice")?,
            orders: fields.u64(5, "Orders")?,
            price: fields.f64(6, "Price")?,
            instrument_id: fields.u64(7, "ProductPairCode")?,
            quantity: fields.f64(8, "Quantity")?,
            side: fields.u64(9, "Side")?,
        })
    }
}

/// Public trades for one instrument.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(transparent)]
pub struct Trade {
    pub entries: Vec<TradeEntry>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(try_from = "Vec<Value>")]
pub struct TradeEntry {
    pub trade_id: u64,
    pub instrument_id: u64,
    pub quantity: f64,
    pub price: f64,
    pub order1: u64,
    pub order2: u64,
    pub trade_time: u64,
    pub direction: u64,
    pub taker_side: u64,
    pub block_trade: bool,
    /// Only sent by newer gateway versions.
    pub client_order_id: Option<u64>,
}

impl TryFrom<Vec<Value>> for TradeEntry {
    type Error = ModelError;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        let fields = Positional::new(&values, 10)?;
        let block_trade = match &values[9] {
            Value::Bool(block_trade) => *block_trade,
            Value::Number(n) => n.as_u64() == Some(1),
            value => {
                return Err(ModelError::InvalidField {
                    field: "BlockTrade",
                    value: value.clone(),
                })
            }
        };
        Ok(Self {
            trade_id: fields.u64(0, "TradeId")?,
            instrument_id: fields.u64(1, "ProductPairCode")?,
            quantity: fields.f64(2, "Quantity")?,
            price: fields.f64(3, "Price")?,
            order1: fields.u64(4, "Order1")?,
            order2: fields.u64(5, "Order2")?,
            trade_time: fields.u64(6, "TradeTime")?,
            direction: fields.u64(7, "Direction")?,
            taker_side: fields.u64(8, "TakerSide")?,
            block_trade,
            client_order_id: values.get(10).and_then(Value::as_u64),
        })
    }
}

/// State of one of the user's orders.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    pub order_id: Option<u64>,
    pub side: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<f64>,
    pub instrument: Option<u64>,
    pub account: Option<u64>,
    pub order_type: Option<String>,
    pub client_order_id: Option<u64>,
    pub order_state: Option<String>,
    pub receive_time: Option<u64>,
    pub orig_quantity: Option<f64>,
    pub quantity_executed: Option<f64>,
    pub avg_price: Option<f64>,
    pub change_reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

struct Positional<'a> {
    values: &'a [Value],
}

impl<'a> Positional<'a> {
    fn new(values: &'a [Value], expected: usize) -> Result<Self, ModelError> {
        if values.len() < expected {
            return Err(ModelError::TooShort {
                actual: values.len(),
                expected,
            });
        }
        Ok(Self { values })
    }

    fn u64(&self, index: usize, field: &'static str) -> Result<u64, ModelError> {
        let value = &self.values[index];
        value.as_u64().ok_or_else(|| ModelError::InvalidField {
            field,
            value: value.clone(),
        })
    }

    fn f64(&self, index: usize, field: &'static str) -> Result<f64, ModelError> {
        let value = &self.values[index];
        value.as_f64().ok_or_else(|| ModelError::InvalidField {
            field,
            value: value.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level1_keeps_unknown_fields() {
        let level1: Level1 = serde_json::from_str(
            r#"{"OMSId":1,"InstrumentId":5,"BestBid":6423.57,"BestOffer":6436.53,"CurrentDayNumTrades":8529}"#,
        )
        .unwrap();
        assert_eq!(level1.instrument_id, Some(5));
        assert_eq!(level1.oms_id, Some(1));
        assert_eq!(level1.best_offer, Some(6436.53));
        assert_eq!(level1.last_traded_px, None);
        assert_eq!(level1.extra["CurrentDayNumTrades"], 8529);
    }

    #[test]
    fn level2_positional() {
        let level2: Level2 =
            serde_json::from_str("[[2403,1,1534862990343,0,6423.57,1,6423.57,1,0.5,0]]").unwrap();
        assert_eq!(level2.entries.len(), 1);
        let entry = &level2.entries[0];
        assert_eq!(entry.md_update_id, 2403);
        assert_eq!(entry.instrument_id, 1);
        assert_eq!(entry.quantity, 0.5);
        assert_eq!(entry.side, 0);
    }

    #[test]
    fn level2_entry_too_short() {
        let err = serde_json::from_str::<Level2>("[[1,2,3]]").unwrap_err();
        assert!(err.to_string().contains("expected at least 10"), "{}", err);
    }

    #[test]
    fn trade_optional_client_order_id() {
        let trade: Trade = serde_json::from_str(
            "[[1,2,0.1,100.5,11,12,1534862990343,0,1,false],[2,2,0.2,101,13,14,1534862990344,1,0,true,77]]",
        )
        .unwrap();
        assert_eq!(trade.entries[0].client_order_id, None);
        assert!(!trade.entries[0].block_trade);
        assert_eq!(trade.entries[1].client_order_id, Some(77));
        assert!(trade.entries[1].block_trade);
    }

    #[test]
    fn order_state_event() {
        let order: Order = serde_json::from_str(
            r#"{"Side":"Sell","OrderId":9849,"Price":35000,"Quantity":1,"Instrument":1,"Account":4,"OrderType":"Limit","OrderState":"Working","DisplayQuantity":1}"#,
        )
        .unwrap();
        assert_eq!(order.order_id, Some(9849));
        assert_eq!(order.order_state.as_deref(), Some("Working"));
        assert_eq!(order.extra["DisplayQuantity"], 1);
    }

    #[test]
    fn any_object_decodes() {
        let order: Order = serde_json::from_str(r#"{"Side":"Buy","OrderState":"Working"}"#).unwrap();
        assert_eq!(order.order_id, None);
        assert_eq!(order.side.as_deref(), Some("Buy"));

        let level1: Level1 = serde_json::from_str("{}").unwrap();
        assert_eq!(level1.instrument_id, None);
    }
}
