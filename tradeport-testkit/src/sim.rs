//! In-memory Bitget v2 mix simulator.
//!
//! A [`Transport`] answering the USDT-M futures endpoints the Bitget binding
//! uses with Bitget-shaped `data` payloads. Market orders fill immediately at
//! the configured price. Position-level TP/SL presets become `pos_profit` and
//! `pos_loss` plan orders that disappear with their position.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use tradeport_connectors::{codes, endpoints, PRODUCT_TYPE};
use tradeport_exec::{Auth, Method, RawRequest, Transport, TransportError, TransportResult};

/// Raw Bitget codes the simulator answers with besides the binding's table.
pub mod rejections {
    /// Required parameter missing
    pub const PARAM_EMPTY: &str = "40019";
    /// Parameter has an invalid value
    pub const PARAM_INVALID: &str = "40020";
    /// Unknown symbol
    pub const SYMBOL_NOT_FOUND: &str = "40034";
    /// Unsigned request to an account endpoint
    pub const API_KEY_MISSING: &str = "40037";
    /// Symbol no longer trading
    pub const SYMBOL_OFFLINE: &str = "40309";
    /// Not enough available margin
    pub const INSUFFICIENT_BALANCE: &str = "40762";
    /// TP/SL price on the wrong side of the fill
    pub const BAD_TPSL_PRICE: &str = "40915";
    /// Mode change refused while positions are open
    pub const POSITION_OPEN: &str = "40920";
    /// Reduce-only order without a position to reduce
    pub const NO_POSITION: &str = "22002";
    /// Order size below the contract minimum
    pub const BELOW_MIN_SIZE: &str = "45111";
}

use rejections::*;

/// Leverage of a symbol nobody has configured yet
pub const DEFAULT_LEVERAGE: u32 = 10;

/// Starting USDT equity
pub const DEFAULT_EQUITY: Decimal = dec!(1000);

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldSide {
    Long,
    Short,
}

impl HoldSide {
    /// Position side an opening order of `side` builds.
    fn opened_by(side: &str) -> TransportResult<Self> {
        match side {
            "buy" => Ok(HoldSide::Long),
            "sell" => Ok(HoldSide::Short),
            other => Err(api(PARAM_INVALID, format!("Parameter side error: {}", other))),
        }
    }

    fn opposite(self) -> Self {
        match self {
            HoldSide::Long => HoldSide::Short,
            HoldSide::Short => HoldSide::Long,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            HoldSide::Long => "long",
            HoldSide::Short => "short",
        }
    }

    fn exit_side(self) -> &'static str {
        match self {
            HoldSide::Long => "sell",
            HoldSide::Short => "buy",
        }
    }
}

#[derive(Debug, Clone)]
struct SimContract {
    id: String,
    base: String,
    volume_place: u32,
    price_place: u32,
    min_trade: Decimal,
    status: &'static str,
}

#[derive(Debug, Clone)]
struct SimPosition {
    symbol: String,
    hold_side: HoldSide,
    size: Decimal,
    entry: Decimal,
    leverage: u32,
    margin_mode: String,
}

#[derive(Debug, Clone)]
struct SimPlan {
    order_id: String,
    symbol: String,
    hold_side: HoldSide,
    plan_type: &'static str,
    trigger_price: Decimal,
}

struct SimState {
    contracts: Vec<SimContract>,
    prices: HashMap<String, Decimal>,
    funding: Vec<Value>,
    equity: Decimal,
    hedged: bool,
    leverage: HashMap<String, u32>,
    margin_modes: HashMap<String, String>,
    positions: Vec<SimPosition>,
    plans: Vec<SimPlan>,
    next_order: u64,
    drop_stop_loss: bool,
    fail_next: Option<TransportError>,
    requests: Vec<String>,
    closed: bool,
    close_calls: usize,
}

fn api(code: &str, msg: impl Into<String>) -> TransportError {
    TransportError::Api {
        code: code.to_string(),
        msg: msg.into(),
    }
}

fn text(request: &RawRequest, key: &str) -> TransportResult<String> {
    match request.params.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(api(PARAM_EMPTY, format!("Parameter {} cannot be empty", key))),
    }
}

fn decimal(request: &RawRequest, key: &str) -> TransportResult<Decimal> {
    text(request, key)?
        .parse()
        .map_err(|_| api(PARAM_INVALID, format!("Parameter {} error", key)))
}

fn optional_decimal(request: &RawRequest, key: &str) -> TransportResult<Option<Decimal>> {
    match request.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => decimal(request, key).map(Some),
    }
}

impl SimState {
    fn handle(&mut self, request: &RawRequest) -> TransportResult<Value> {
        if text(request, "productType")? != PRODUCT_TYPE {
            return Err(api(PARAM_INVALID, "Parameter productType error"));
        }

        let public = matches!(
            request.path.as_str(),
            endpoints::CONTRACTS | endpoints::CURRENT_FUND_RATE | endpoints::TICKER
        );
        if !public && request.auth != Auth::Private {
            return Err(api(API_KEY_MISSING, "ACCESS_KEY header is required"));
        }

        match (request.method, request.path.as_str()) {
            (Method::Get, endpoints::CONTRACTS) => Ok(self.contracts()),
            (Method::Get, endpoints::CURRENT_FUND_RATE) => Ok(Value::Array(self.funding.clone())),
            (Method::Get, endpoints::TICKER) => self.ticker(request),
            (Method::Get, endpoints::ACCOUNTS) => Ok(self.accounts()),
            (Method::Get, endpoints::ACCOUNT) => self.account(request),
            (Method::Get, endpoints::ALL_POSITION) => self.all_positions(request),
            (Method::Get, endpoints::ORDERS_PLAN_PENDING) => self.pending_plans(request),
            (Method::Post, endpoints::PLACE_ORDER) => self.place_order(request),
            (Method::Post, endpoints::SET_LEVERAGE) => self.set_leverage(request),
            (Method::Post, endpoints::SET_MARGIN_MODE) => self.set_margin_mode(request),
            (Method::Post, endpoints::SET_POSITION_MODE) => self.set_position_mode(request),
            (_, path) => Err(TransportError::Http {
                status: 404,
                body: format!("no route for {}", path),
            }),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn contract(&self, id: &str) -> TransportResult<&SimContract> {
        self.contracts
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| api(SYMBOL_NOT_FOUND, "The symbol does not exist"))
    }

    fn price(&self, id: &str) -> TransportResult<Decimal> {
        self.prices
            .get(id)
            .copied()
            .ok_or_else(|| api(SYMBOL_NOT_FOUND, "The symbol does not exist"))
    }

    fn leverage_of(&self, id: &str) -> u32 {
        self.leverage.get(id).copied().unwrap_or(DEFAULT_LEVERAGE)
    }

    fn margin_mode_of(&self, id: &str) -> &str {
        self.margin_modes.get(id).map(String::as_str).unwrap_or("crossed")
    }

    fn position_index(&self, id: &str, hold_side: HoldSide) -> Option<usize> {
        self.positions
            .iter()
            .position(|p| p.symbol == id && p.hold_side == hold_side)
    }

    fn available(&self) -> Decimal {
        let used: Decimal = self
            .positions
            .iter()
            .map(|p| p.size * p.entry / Decimal::from(p.leverage))
            .sum();
        self.equity - used
    }

    fn next_order_id(&mut self) -> String {
        self.next_order += 1;
        (1_180_000_000_000 + self.next_order).to_string()
    }

    // =========================================================================
    // Market data
    // =========================================================================

    fn contracts(&self) -> Value {
        self.contracts
            .iter()
            .map(|c| {
                json!({
                    "symbol": c.id,
                    "baseCoin": c.base,
                    "quoteCoin": "USDT",
                    "symbolType": "perpetual",
                    "symbolStatus": c.status,
                    "volumePlace": c.volume_place.to_string(),
                    "pricePlace": c.price_place.to_string(),
                    "minTradeNum": c.min_trade.to_string(),
                    "supportMarginCoins": ["USDT"]
                })
            })
            .collect()
    }

    fn ticker(&self, request: &RawRequest) -> TransportResult<Value> {
        let id = text(request, "symbol")?;
        let price = self.price(&id)?;
        Ok(json!([{
            "symbol": id,
            "lastPr": price.to_string(),
            "ts": Utc::now().timestamp_millis().to_string()
        }]))
    }

    // =========================================================================
    // Account
    // =========================================================================

    fn accounts(&self) -> Value {
        json!([{
            "marginCoin": "USDT",
            "locked": "0",
            "available": self.available().to_string(),
            "accountEquity": self.equity.to_string(),
            "usdtEquity": self.equity.to_string()
        }])
    }

    fn account(&self, request: &RawRequest) -> TransportResult<Value> {
        let id = text(request, "symbol")?;
        self.contract(&id)?;
        if text(request, "marginCoin")? != "USDT" {
            return Err(api(PARAM_INVALID, "Parameter marginCoin error"));
        }

        Ok(json!({
            "marginCoin": "USDT",
            "locked": "0",
            "available": self.available().to_string(),
            "accountEquity": self.equity.to_string(),
            "marginMode": self.margin_mode_of(&id),
            "posMode": if self.hedged { "hedge_mode" } else { "one_way_mode" },
            "crossedMarginLeverage": self.leverage_of(&id)
        }))
    }

    fn all_positions(&self, request: &RawRequest) -> TransportResult<Value> {
        text(request, "marginCoin")?;
        let pos_mode = if self.hedged { "hedge_mode" } else { "one_way_mode" };

        let mut positions = Vec::with_capacity(self.positions.len());
        for p in &self.positions {
            positions.push(json!({
                "marginCoin": "USDT",
                "symbol": p.symbol,
                "holdSide": p.hold_side.as_str(),
                "total": p.size.to_string(),
                "available": p.size.to_string(),
                "openPriceAvg": p.entry.to_string(),
                "leverage": p.leverage.to_string(),
                "marginMode": p.margin_mode,
                "posMode": pos_mode,
                "markPrice": self.price(&p.symbol)?.to_string()
            }));
        }
        Ok(Value::Array(positions))
    }

    fn pending_plans(&self, request: &RawRequest) -> TransportResult<Value> {
        let id = text(request, "symbol")?;
        if text(request, "planType")? != "profit_loss" {
            return Err(api(PARAM_INVALID, "Parameter planType error"));
        }

        let plans: Vec<Value> = self
            .plans
            .iter()
            .filter(|p| p.symbol == id)
            .map(|p| {
                json!({
                    "orderId": p.order_id,
                    "symbol": p.symbol,
                    "planType": p.plan_type,
                    "triggerPrice": p.trigger_price.to_string(),
                    "side": p.hold_side.exit_side(),
                    "posSide": p.hold_side.as_str(),
                    "size": "",
                    "planStatus": "live"
                })
            })
            .collect();

        if plans.is_empty() {
            Ok(json!({"entrustedList": null, "endId": null}))
        } else {
            Ok(json!({"entrustedList": plans, "endId": null}))
        }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    fn place_order(&mut self, request: &RawRequest) -> TransportResult<Value> {
        let id = text(request, "symbol")?;
        let contract = self.contract(&id)?.clone();
        if contract.status != "normal" {
            return Err(api(SYMBOL_OFFLINE, "The symbol has been removed"));
        }
        text(request, "marginCoin")?;
        let margin_mode = text(request, "marginMode")?;

        let size = decimal(request, "size")?;
        if size.normalize().scale() > contract.volume_place {
            return Err(api(PARAM_INVALID, "The order size precision is wrong"));
        }
        if size < contract.min_trade {
            return Err(api(
                BELOW_MIN_SIZE,
                format!("The minimum order quantity is {}", contract.min_trade),
            ));
        }

        let direction = HoldSide::opened_by(&text(request, "side")?)?;
        let order_id = self.next_order_id();
        let placed = json!({
            "orderId": order_id,
            "clientOid": request.params.get("clientOid").cloned().unwrap_or(Value::Null)
        });

        match text(request, "orderType")?.as_str() {
            "market" => {},
            "limit" => {
                // Rests on the book and never fills.
                decimal(request, "price")?;
                text(request, "force")?;
                return Ok(placed);
            },
            other => return Err(api(PARAM_INVALID, format!("Parameter orderType error: {}", other))),
        }

        let price = self.price(&id)?;
        if self.hedged {
            match text(request, "tradeSide")?.as_str() {
                "open" => self.open(&id, direction, size, price, &margin_mode, request)?,
                "close" => {
                    if self.position_index(&id, direction).is_none() {
                        return Err(api(NO_POSITION, "No position to close"));
                    }
                    self.reduce(&id, direction, size, price);
                },
                other => return Err(api(PARAM_INVALID, format!("Parameter tradeSide error: {}", other))),
            }
        } else {
            let reduce_only = request.params.get("reduceOnly").and_then(Value::as_str) == Some("YES");
            let opposite = direction.opposite();
            let has_opposite = self.position_index(&id, opposite).is_some();

            if reduce_only {
                if !has_opposite {
                    return Err(api(NO_POSITION, "No position to close"));
                }
                self.reduce(&id, opposite, size, price);
            } else if has_opposite {
                let remainder = self.reduce(&id, opposite, size, price);
                if !remainder.is_zero() {
                    self.open(&id, direction, remainder, price, &margin_mode, request)?;
                }
            } else {
                self.open(&id, direction, size, price, &margin_mode, request)?;
            }
        }

        debug!(symbol = %id, side = direction.as_str(), size = %size, price = %price, "Simulated fill");
        Ok(placed)
    }

    fn open(
        &mut self,
        id: &str,
        hold_side: HoldSide,
        size: Decimal,
        price: Decimal,
        margin_mode: &str,
        request: &RawRequest,
    ) -> TransportResult<()> {
        let take_profit = optional_decimal(request, "presetStopSurplusPrice")?;
        let stop_loss = optional_decimal(request, "presetStopLossPrice")?;

        let bracketed = match hold_side {
            HoldSide::Long => {
                take_profit.map_or(true, |tp| tp > price) && stop_loss.map_or(true, |sl| sl < price)
            },
            HoldSide::Short => {
                take_profit.map_or(true, |tp| tp < price) && stop_loss.map_or(true, |sl| sl > price)
            },
        };
        if !bracketed {
            return Err(api(BAD_TPSL_PRICE, "The take profit or stop loss price is invalid"));
        }

        let leverage = self.leverage_of(id);
        let required = size * price / Decimal::from(leverage);
        if required > self.available() {
            return Err(api(INSUFFICIENT_BALANCE, "The order amount exceeds the balance"));
        }

        match self.position_index(id, hold_side) {
            Some(index) => {
                let position = &mut self.positions[index];
                position.entry = (position.entry * position.size + price * size) / (position.size + size);
                position.size += size;
            },
            None => self.positions.push(SimPosition {
                symbol: id.to_string(),
                hold_side,
                size,
                entry: price,
                leverage,
                margin_mode: margin_mode.to_string(),
            }),
        }

        if let Some(tp) = take_profit {
            self.replace_plan(id, hold_side, "pos_profit", tp);
        }
        if let Some(sl) = stop_loss {
            if !self.drop_stop_loss {
                self.replace_plan(id, hold_side, "pos_loss", sl);
            }
        }
        Ok(())
    }

    /// Reduce a position, realizing PnL. Returns the size left unfilled.
    fn reduce(&mut self, id: &str, hold_side: HoldSide, size: Decimal, price: Decimal) -> Decimal {
        let Some(index) = self.position_index(id, hold_side) else {
            return size;
        };

        let position = &mut self.positions[index];
        let filled = size.min(position.size);
        let pnl = match hold_side {
            HoldSide::Long => (price - position.entry) * filled,
            HoldSide::Short => (position.entry - price) * filled,
        };
        position.size -= filled;
        self.equity += pnl;

        if self.positions[index].size.is_zero() {
            self.positions.remove(index);
            self.plans.retain(|p| !(p.symbol == id && p.hold_side == hold_side));
        }
        size - filled
    }

    fn replace_plan(&mut self, id: &str, hold_side: HoldSide, plan_type: &'static str, trigger_price: Decimal) {
        self.plans
            .retain(|p| !(p.symbol == id && p.hold_side == hold_side && p.plan_type == plan_type));
        let order_id = self.next_order_id();
        self.plans.push(SimPlan {
            order_id,
            symbol: id.to_string(),
            hold_side,
            plan_type,
            trigger_price,
        });
    }

    // =========================================================================
    // Account settings
    // =========================================================================

    fn set_leverage(&mut self, request: &RawRequest) -> TransportResult<Value> {
        let id = text(request, "symbol")?;
        self.contract(&id)?;
        text(request, "marginCoin")?;
        let leverage: u32 = text(request, "leverage")?
            .parse()
            .map_err(|_| api(PARAM_INVALID, "Parameter leverage error"))?;
        if !(1..=125).contains(&leverage) {
            return Err(api(PARAM_INVALID, "Parameter leverage error"));
        }

        if self.leverage_of(&id) == leverage {
            return Err(api(codes::LEVERAGE_UNCHANGED, "The leverage is unchanged"));
        }

        self.leverage.insert(id.clone(), leverage);
        for position in self.positions.iter_mut().filter(|p| p.symbol == id) {
            position.leverage = leverage;
        }

        Ok(json!({
            "symbol": id,
            "marginCoin": "USDT",
            "longLeverage": leverage.to_string(),
            "shortLeverage": leverage.to_string(),
            "marginMode": self.margin_mode_of(&id)
        }))
    }

    fn set_margin_mode(&mut self, request: &RawRequest) -> TransportResult<Value> {
        let id = text(request, "symbol")?;
        self.contract(&id)?;
        text(request, "marginCoin")?;
        let mode = text(request, "marginMode")?;
        if mode != "isolated" && mode != "crossed" {
            return Err(api(PARAM_INVALID, "Parameter marginMode error"));
        }

        if self.margin_mode_of(&id) == mode {
            return Err(api(codes::MARGIN_MODE_UNCHANGED, "The margin mode is unchanged"));
        }
        if self.positions.iter().any(|p| p.symbol == id) {
            return Err(api(POSITION_OPEN, "Margin mode cannot be changed with open positions"));
        }

        self.margin_modes.insert(id.clone(), mode.clone());
        Ok(json!({"symbol": id, "marginCoin": "USDT", "marginMode": mode}))
    }

    fn set_position_mode(&mut self, request: &RawRequest) -> TransportResult<Value> {
        let hedged = match text(request, "posMode")?.as_str() {
            "hedge_mode" => true,
            "one_way_mode" => false,
            _ => return Err(api(PARAM_INVALID, "Parameter posMode error")),
        };

        if self.hedged == hedged {
            return Err(api(codes::POSITION_MODE_UNCHANGED, "The position mode is unchanged"));
        }
        if !self.positions.is_empty() {
            return Err(api(POSITION_OPEN, "Position mode cannot be changed with open positions"));
        }

        self.hedged = hedged;
        Ok(json!({"posMode": if hedged { "hedge_mode" } else { "one_way_mode" }}))
    }
}

// =============================================================================
// Simulator
// =============================================================================

/// In-memory Bitget USDT-M futures venue.
///
/// Seeded with BTC, ETH and XRP perpetuals plus a delisted LUNA contract, a
/// funding snapshot settling four hours from construction (and one stale
/// record), and 1000 USDT of equity.
pub struct BitgetSimulator {
    state: Mutex<SimState>,
}

impl BitgetSimulator {
    /// Exchange identifier.
    pub const EXCHANGE_ID: &'static str = "bitget";

    /// Create a seeded venue.
    pub fn new() -> Self {
        let next_update = Utc::now() + Duration::hours(4);

        let simulator = Self {
            state: Mutex::new(SimState {
                contracts: Vec::new(),
                prices: HashMap::new(),
                funding: Vec::new(),
                equity: DEFAULT_EQUITY,
                hedged: false,
                leverage: HashMap::new(),
                margin_modes: HashMap::new(),
                positions: Vec::new(),
                plans: Vec::new(),
                next_order: 0,
                drop_stop_loss: false,
                fail_next: None,
                requests: Vec::new(),
                closed: false,
                close_calls: 0,
            }),
        };

        simulator
            .with_contract("BTC", 4, 1, dec!(0.0001), dec!(65000.0))
            .with_contract("ETH", 2, 2, dec!(0.01), dec!(3000.00))
            .with_contract("XRP", 0, 4, dec!(1), dec!(0.5000))
            .with_delisted_contract("LUNA", dec!(0.0001))
            .with_funding("BTCUSDT", dec!(0.0001), next_update)
            .with_funding("ETHUSDT", dec!(0.00005), next_update)
            .with_funding("XRPUSDT", dec!(-0.00002), next_update)
            .with_funding("LUNAUSDT", dec!(0.0003), next_update)
            .with_funding("DOGEUSDT", dec!(0.0001), Utc::now() - Duration::hours(4))
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// List a tradable `BASEUSDT` perpetual.
    pub fn with_contract(
        self,
        base: &str,
        volume_place: u32,
        price_place: u32,
        min_trade: Decimal,
        price: Decimal,
    ) -> Self {
        self.list(base, volume_place, price_place, min_trade, price, "normal")
    }

    /// List a `BASEUSDT` perpetual that no longer accepts orders.
    pub fn with_delisted_contract(self, base: &str, price: Decimal) -> Self {
        self.list(base, 0, 4, Decimal::ONE, price, "off")
    }

    fn list(
        self,
        base: &str,
        volume_place: u32,
        price_place: u32,
        min_trade: Decimal,
        price: Decimal,
        status: &'static str,
    ) -> Self {
        {
            let mut state = self.lock();
            let id = format!("{}USDT", base);
            state.contracts.retain(|c| c.id != id);
            state.prices.insert(id.clone(), price);
            state.contracts.push(SimContract {
                id,
                base: base.to_string(),
                volume_place,
                price_place,
                min_trade,
                status,
            });
        }
        self
    }

    /// Add a funding record.
    pub fn with_funding(self, id: &str, rate: Decimal, next_update: DateTime<Utc>) -> Self {
        self.with_raw_funding(json!({
            "symbol": id,
            "fundingRate": rate.to_string(),
            "fundingRateInterval": "8",
            "nextUpdate": next_update.timestamp_millis().to_string()
        }))
    }

    /// Add a funding record verbatim, well-formed or not.
    pub fn with_raw_funding(self, record: Value) -> Self {
        self.lock().funding.push(record);
        self
    }

    /// Drop every funding record.
    pub fn without_funding(self) -> Self {
        self.lock().funding.clear();
        self
    }

    /// Replace the account equity.
    pub fn with_equity(self, equity: Decimal) -> Self {
        self.lock().equity = equity;
        self
    }

    /// Start the account in hedge mode with `id` on isolated margin.
    pub fn with_hedge_account(self, id: &str) -> Self {
        {
            let mut state = self.lock();
            state.hedged = true;
            state.margin_modes.insert(id.to_string(), "isolated".to_string());
        }
        self
    }

    /// Move the price of `id`.
    pub fn set_price(&self, id: &str, price: Decimal) {
        self.lock().prices.insert(id.to_string(), price);
    }

    /// Accept stop-loss presets without creating their plan order.
    pub fn drop_stop_loss_presets(&self, drop: bool) {
        self.lock().drop_stop_loss = drop;
    }

    /// Fail the next request, whatever its path.
    pub fn set_fail_next(&self, error: TransportError) {
        self.lock().fail_next = Some(error);
    }

    /// Open positions across all symbols.
    pub fn open_positions(&self) -> usize {
        self.lock().positions.len()
    }

    /// Pending plan orders across all symbols.
    pub fn pending_plans(&self) -> usize {
        self.lock().plans.len()
    }

    /// Current USDT equity.
    pub fn equity(&self) -> Decimal {
        self.lock().equity
    }

    /// Requests received for one path.
    pub fn request_count(&self, path: &str) -> usize {
        self.lock().requests.iter().filter(|p| *p == path).count()
    }

    /// Number of `close()` calls.
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }
}

impl Default for BitgetSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for BitgetSimulator {
    fn exchange_id(&self) -> &str {
        Self::EXCHANGE_ID
    }

    async fn send(&self, request: RawRequest) -> TransportResult<Value> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.requests.push(request.path.clone());

        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        state.handle(&request)
    }

    async fn close(&self) -> TransportResult<()> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.closed = true;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: &str, size: &str) -> RawRequest {
        RawRequest::post(endpoints::PLACE_ORDER)
            .param("productType", PRODUCT_TYPE)
            .param("symbol", "XRPUSDT")
            .param("marginCoin", "USDT")
            .param("marginMode", "isolated")
            .param("size", size)
            .param("side", side)
            .param("orderType", "market")
    }

    fn code(result: TransportResult<Value>) -> String {
        match result {
            Err(TransportError::Api { code, .. }) => code,
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_account_endpoints_require_signing() {
        let sim = BitgetSimulator::new();
        let unsigned = RawRequest::get(endpoints::ACCOUNTS).param("productType", PRODUCT_TYPE);
        assert_eq!(code(sim.send(unsigned).await), API_KEY_MISSING);
    }

    #[tokio::test]
    async fn test_market_fill_and_reduce_only_close() {
        let sim = BitgetSimulator::new();
        sim.send(order("buy", "5")).await.unwrap();
        assert_eq!(sim.open_positions(), 1);

        let close = order("sell", "5").param("reduceOnly", "YES");
        sim.send(close.clone()).await.unwrap();
        assert_eq!(sim.open_positions(), 0);

        assert_eq!(code(sim.send(close).await), NO_POSITION);
    }

    #[tokio::test]
    async fn test_presets_follow_their_position() {
        let sim = BitgetSimulator::new();
        let entry = order("buy", "5")
            .param("presetStopSurplusPrice", "0.6")
            .param("presetStopLossPrice", "0.45");
        sim.send(entry).await.unwrap();
        assert_eq!(sim.pending_plans(), 2);

        sim.send(order("sell", "5").param("reduceOnly", "YES")).await.unwrap();
        assert_eq!(sim.pending_plans(), 0);
    }

    #[tokio::test]
    async fn test_presets_on_wrong_side_rejected() {
        let sim = BitgetSimulator::new();
        let entry = order("buy", "5").param("presetStopSurplusPrice", "0.4");
        assert_eq!(code(sim.send(entry).await), BAD_TPSL_PRICE);
        assert_eq!(sim.open_positions(), 0);
    }

    #[tokio::test]
    async fn test_same_value_setters_report_no_change() {
        let sim = BitgetSimulator::new();
        let leverage = RawRequest::post(endpoints::SET_LEVERAGE)
            .param("productType", PRODUCT_TYPE)
            .param("symbol", "XRPUSDT")
            .param("marginCoin", "USDT")
            .param("leverage", "3");

        sim.send(leverage.clone()).await.unwrap();
        assert_eq!(code(sim.send(leverage).await), codes::LEVERAGE_UNCHANGED);
    }

    #[tokio::test]
    async fn test_realized_pnl_moves_equity() {
        let sim = BitgetSimulator::new();
        sim.send(order("sell", "100")).await.unwrap();
        sim.set_price("XRPUSDT", dec!(0.4));
        sim.send(order("buy", "100").param("reduceOnly", "YES")).await.unwrap();

        assert_eq!(sim.equity(), dec!(1010));
    }

    #[tokio::test]
    async fn test_size_checks() {
        let sim = BitgetSimulator::new();
        assert_eq!(code(sim.send(order("buy", "0.5")).await), PARAM_INVALID);
        assert_eq!(code(sim.send(order("buy", "100000")).await), INSUFFICIENT_BALANCE);
    }

    #[tokio::test]
    async fn test_closed_simulator_refuses_requests() {
        let sim = BitgetSimulator::new();
        sim.close().await.unwrap();
        let err = sim.send(order("buy", "5")).await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
        assert_eq!(sim.close_calls(), 1);
    }
}
