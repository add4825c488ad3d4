//! Raw Bitget v2 mix (USDT-M futures) payload schemas.
//!
//! Strict at the boundary: required fields must be present, unknown fields are
//! ignored. Loosely-typed numeric fields use `RawDecimal`/`RawTimestamp` and are
//! coerced by the normalizer, never trusted as-is.

use serde::Deserialize;
use serde_json::Value;

use tradeport_domain::{RawDecimal, RawFundingRate, RawTimestamp, TriggerKind};

/// Response envelope of every Bitget REST call.
#[derive(Debug, Clone, Deserialize)]
pub struct BitgetEnvelope {
    /// Response code ("00000" for success)
    pub code: String,
    /// Response message
    #[serde(default)]
    pub msg: String,
    /// Request time
    #[serde(default, rename = "requestTime")]
    pub request_time: Option<i64>,
    /// Data payload
    #[serde(default)]
    pub data: Option<Value>,
}

/// `GET /api/v2/mix/market/contracts`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetContract {
    /// Exchange id, e.g. "XRPUSDT"
    pub symbol: String,
    /// Base coin
    pub base_coin: String,
    /// Quote coin
    pub quote_coin: String,
    /// "perpetual", "delivery"
    pub symbol_type: String,
    /// "normal" when tradable
    pub symbol_status: String,
    /// Amount decimal places
    pub volume_place: RawDecimal,
    /// Price decimal places
    pub price_place: RawDecimal,
    /// Minimum order amount
    #[serde(default)]
    pub min_trade_num: Option<RawDecimal>,
}

impl BitgetContract {
    /// Perpetual swap contract.
    pub fn is_swap(&self) -> bool {
        self.symbol_type == "perpetual"
    }

    /// Currently accepting orders.
    pub fn is_active(&self) -> bool {
        self.symbol_status == "normal"
    }
}

/// `GET /api/v2/mix/account/account`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetSymbolAccount {
    /// Margin coin
    pub margin_coin: String,
    /// "crossed" or "isolated"
    pub margin_mode: String,
    /// "one_way_mode" or "hedge_mode"
    pub pos_mode: String,
}

/// `GET /api/v2/mix/market/current-fund-rate`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetFundRate {
    /// Exchange id
    pub symbol: String,
    /// Current funding rate
    pub funding_rate: RawDecimal,
    /// Next settlement time (ms)
    pub next_update: RawTimestamp,
}

impl From<BitgetFundRate> for RawFundingRate {
    fn from(raw: BitgetFundRate) -> Self {
        RawFundingRate {
            symbol: raw.symbol,
            funding_rate: raw.funding_rate,
            funding_date: raw.next_update,
        }
    }
}

/// `GET /api/v2/mix/market/ticker`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetTicker {
    /// Exchange id
    pub symbol: String,
    /// Last traded price
    pub last_pr: RawDecimal,
}

/// `GET /api/v2/mix/account/accounts`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetAccount {
    /// Margin coin, e.g. "USDT"
    pub margin_coin: String,
    /// Available for new orders
    pub available: RawDecimal,
    /// Total equity
    pub account_equity: RawDecimal,
}

/// `GET /api/v2/mix/position/all-position`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetPosition {
    /// Exchange id
    pub symbol: String,
    /// "long" or "short"
    pub hold_side: String,
    /// Open contracts
    pub total: RawDecimal,
    /// Average entry price
    pub open_price_avg: RawDecimal,
    /// Leverage
    pub leverage: RawDecimal,
    /// "isolated" or "crossed"
    pub margin_mode: String,
    /// "one_way_mode" or "hedge_mode"
    pub pos_mode: String,
    /// Mark price
    pub mark_price: RawDecimal,
}

/// `GET /api/v2/mix/order/orders-plan-pending`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetPlanOrders {
    /// Pending plan orders (null when there are none)
    #[serde(default)]
    pub entrusted_list: Option<Vec<BitgetPlanOrder>>,
}

/// One pending plan order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetPlanOrder {
    /// Exchange order id
    pub order_id: String,
    /// Exchange id
    pub symbol: String,
    /// "profit_plan", "loss_plan", "pos_profit", "pos_loss", "normal_plan", ...
    pub plan_type: String,
    /// Side of the triggered order
    #[serde(default)]
    pub side: Option<String>,
    /// Fixed size, empty for whole-position triggers
    #[serde(default)]
    pub size: Option<RawDecimal>,
    /// Trigger price
    pub trigger_price: RawDecimal,
}

impl BitgetPlanOrder {
    /// Take-profit/stop-loss kind; `None` for other plan types.
    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        match self.plan_type.as_str() {
            "profit_plan" | "pos_profit" => Some(TriggerKind::TakeProfit),
            "loss_plan" | "pos_loss" => Some(TriggerKind::StopLoss),
            _ => None,
        }
    }
}

/// `POST /api/v2/mix/order/place-order`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetPlacedOrder {
    /// Exchange order id
    pub order_id: String,
    /// Client order id
    #[serde(default)]
    pub client_oid: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contract_schema() {
        let contract: BitgetContract = serde_json::from_value(json!({
            "symbol": "XRPUSDT",
            "baseCoin": "XRP",
            "quoteCoin": "USDT",
            "symbolType": "perpetual",
            "symbolStatus": "normal",
            "volumePlace": "0",
            "pricePlace": "4",
            "minTradeNum": "1",
            "makerFeeRate": "0.0002"
        }))
        .unwrap();

        assert!(contract.is_swap());
        assert!(contract.is_active());
        assert_eq!(contract.volume_place, RawDecimal::from("0"));
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let result = serde_json::from_value::<BitgetFundRate>(json!({
            "symbol": "BTCUSDT",
            "fundingRate": "0.0001"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_fund_rate_into_raw() {
        let rate: BitgetFundRate = serde_json::from_value(json!({
            "symbol": "BTCUSDT",
            "fundingRate": "0.0001",
            "fundingRateInterval": "8",
            "nextUpdate": "1700000000000"
        }))
        .unwrap();

        let raw = RawFundingRate::from(rate);
        assert_eq!(raw.symbol, "BTCUSDT");
        assert_eq!(raw.funding_date, RawTimestamp::Text("1700000000000".to_string()));
    }

    #[test]
    fn test_plan_kinds() {
        let orders: BitgetPlanOrders = serde_json::from_value(json!({
            "entrustedList": [
                {"orderId": "1", "symbol": "XRPUSDT", "planType": "pos_profit", "triggerPrice": "0.6"},
                {"orderId": "2", "symbol": "XRPUSDT", "planType": "pos_loss", "triggerPrice": "0.45"},
                {"orderId": "3", "symbol": "XRPUSDT", "planType": "normal_plan", "triggerPrice": "0.5"}
            ],
            "endId": "3"
        }))
        .unwrap();

        let kinds: Vec<_> = orders
            .entrusted_list
            .unwrap()
            .iter()
            .map(BitgetPlanOrder::trigger_kind)
            .collect();
        assert_eq!(kinds, vec![Some(TriggerKind::TakeProfit), Some(TriggerKind::StopLoss), None]);
    }

    #[test]
    fn test_empty_plan_list_is_null() {
        let orders: BitgetPlanOrders =
            serde_json::from_value(json!({"entrustedList": null, "endId": null})).unwrap();
        assert!(orders.entrusted_list.is_none());
    }
}
