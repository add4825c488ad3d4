//! Bitget USDT-M perpetual swap binding.
//!
//! Implements [`ExchangePort`] on top of any [`Transport`] speaking the Bitget
//! v2 mix API: the signed REST client in production, the simulator in the
//! contract suite, a scripted stub in unit tests.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tradeport_domain::{
    canonical_symbol, exact_decimal, normalize_instrument, Balance, CanonicalSymbol, ClientConfig,
    DomainError, FundingRateRecord, Instrument, Leverage, MarginMode, Market, MarketType, Order,
    OrderParams, OrderSide, OrderType, Params, PortResult, Position, PositionSide, Quantity,
    QuoteFamily, RawDecimal, RawFundingRate, Ticker, TpslRequest, TriggerKind, TriggerOrder, ValueError,
};
use tradeport_exec::{
    active_swap_symbols, select_funding_rates, ExchangePort, ExecError, ExecResult, Gateway,
    Operation, RateLimiter, RawRequest, RejectionPolicy, Transport,
};

use crate::bitget_rest::BitgetRestClient;
use crate::bitget_types::{
    BitgetAccount, BitgetContract, BitgetFundRate, BitgetPlacedOrder, BitgetPlanOrder,
    BitgetPlanOrders, BitgetPosition, BitgetSymbolAccount, BitgetTicker,
};

// =============================================================================
// Constants
// =============================================================================

/// Product type of USDT-margined perpetuals
pub const PRODUCT_TYPE: &str = "USDT-FUTURES";

/// Bitget v2 mix endpoints.
pub mod endpoints {
    /// Contract metadata
    pub const CONTRACTS: &str = "/api/v2/mix/market/contracts";
    /// Funding rates of every contract
    pub const CURRENT_FUND_RATE: &str = "/api/v2/mix/market/current-fund-rate";
    /// Ticker
    pub const TICKER: &str = "/api/v2/mix/market/ticker";
    /// Futures accounts
    pub const ACCOUNTS: &str = "/api/v2/mix/account/accounts";
    /// Futures account of one symbol, with its margin and position mode
    pub const ACCOUNT: &str = "/api/v2/mix/account/account";
    /// Leverage setter
    pub const SET_LEVERAGE: &str = "/api/v2/mix/account/set-leverage";
    /// Margin-mode setter
    pub const SET_MARGIN_MODE: &str = "/api/v2/mix/account/set-margin-mode";
    /// Position-mode setter
    pub const SET_POSITION_MODE: &str = "/api/v2/mix/account/set-position-mode";
    /// Open positions
    pub const ALL_POSITION: &str = "/api/v2/mix/position/all-position";
    /// Order placement
    pub const PLACE_ORDER: &str = "/api/v2/mix/order/place-order";
    /// Pending plan (trigger) orders
    pub const ORDERS_PLAN_PENDING: &str = "/api/v2/mix/order/orders-plan-pending";
}

/// Bitget rejection codes the port treats specially.
pub mod codes {
    /// Throttling: HTTP-style 429 and the 407xx frequency-limit family
    pub const THROTTLED: [&str; 6] = ["429", "40700", "40701", "40702", "40703", "40704"];
    /// Leverage already at the requested value
    pub const LEVERAGE_UNCHANGED: &str = "40871";
    /// Margin mode already at the requested value
    pub const MARGIN_MODE_UNCHANGED: &str = "40872";
    /// Position mode already at the requested value
    pub const POSITION_MODE_UNCHANGED: &str = "40873";
}

/// Rejection policy of the Bitget binding.
pub fn rejection_policy() -> RejectionPolicy {
    let policy = RejectionPolicy::new()
        .already_applied(Operation::SetLeverage, codes::LEVERAGE_UNCHANGED)
        .already_applied(Operation::SetMarginMode, codes::MARGIN_MODE_UNCHANGED)
        .already_applied(Operation::SetPositionMode, codes::POSITION_MODE_UNCHANGED);

    codes::THROTTLED.iter().fold(policy, |policy, code| policy.throttled(*code))
}

/// Observations made after a TPSL open before giving up
const TPSL_OBSERVATIONS: u32 = 3;

/// Spacing of those observations
const TPSL_OBSERVATION_INTERVAL: Duration = Duration::from_millis(200);

fn margin_mode_wire(mode: MarginMode) -> &'static str {
    match mode {
        MarginMode::Isolated => "isolated",
        MarginMode::Cross => "crossed",
    }
}

// =============================================================================
// Bitget Exchange
// =============================================================================

/// Bitget binding of the exchange port.
///
/// Order payloads depend on the symbol's margin mode and on the account's
/// position mode. Both are read from the account the first time a symbol
/// needs them, then tracked in memory as this connection changes them.
/// Changes made by another client after that are not seen.
pub struct BitgetExchange<T: Transport> {
    gateway: Gateway<T>,
    family: QuoteFamily,
    /// Perpetual markets by canonical symbol, replaced on every load
    markets: RwLock<BTreeMap<CanonicalSymbol, Market>>,
    margin_modes: RwLock<HashMap<CanonicalSymbol, MarginMode>>,
    /// Hedge mode, `None` until read or set
    hedged: RwLock<Option<bool>>,
    tpsl_observations: u32,
    tpsl_interval: Duration,
}

impl<T: Transport> BitgetExchange<T> {
    /// Build the binding around a transport.
    pub fn new(transport: T, limiter: RateLimiter) -> Self {
        Self {
            gateway: Gateway::new(transport, limiter, rejection_policy()),
            family: QuoteFamily::USDT,
            markets: RwLock::new(BTreeMap::new()),
            margin_modes: RwLock::new(HashMap::new()),
            hedged: RwLock::new(None),
            tpsl_observations: TPSL_OBSERVATIONS,
            tpsl_interval: TPSL_OBSERVATION_INTERVAL,
        }
    }

    /// Build the binding with a ceiling in operations per second.
    ///
    /// # Errors
    /// Returns `ExecError::Config` if the ceiling is 0.
    pub fn with_rate_limit(transport: T, ops_per_second: u32) -> ExecResult<Self> {
        Ok(Self::new(transport, RateLimiter::per_second(ops_per_second)?))
    }

    /// Override how TPSL opens are confirmed.
    pub fn with_tpsl_confirmation(mut self, observations: u32, interval: Duration) -> Self {
        self.tpsl_observations = observations.max(1);
        self.tpsl_interval = interval;
        self
    }

    /// Request pipeline.
    pub fn gateway(&self) -> &Gateway<T> {
        &self.gateway
    }

    fn exchange(&self) -> &str {
        self.gateway.exchange_id()
    }

    fn invalid(&self, symbol: &str, err: ValueError) -> DomainError {
        DomainError::validation(self.exchange(), Some(symbol), err)
    }

    fn public(&self, path: &str) -> RawRequest {
        RawRequest::get(path).param("productType", PRODUCT_TYPE)
    }

    fn private_get(&self, path: &str) -> RawRequest {
        self.public(path).signed()
    }

    fn private_post(&self, path: &str) -> RawRequest {
        RawRequest::post(path).param("productType", PRODUCT_TYPE)
    }

    // =========================================================================
    // Markets
    // =========================================================================

    async fn ensure_markets(&self) -> PortResult<()> {
        if self.markets.read().await.is_empty() {
            self.load_markets().await?;
        }
        Ok(())
    }

    async fn market(&self, symbol: &CanonicalSymbol) -> PortResult<Market> {
        self.ensure_markets().await?;
        self.markets.read().await.get(symbol).cloned().ok_or_else(|| {
            DomainError::validation(self.exchange(), Some(symbol.to_string()), "unknown market")
        })
    }

    fn to_market(&self, contract: &BitgetContract) -> PortResult<Market> {
        let pair = format!("{}/{}", contract.base_coin, contract.quote_coin);
        let symbol = canonical_symbol(&pair, self.family).map_err(|e| self.invalid(&contract.symbol, e))?;

        let instrument = normalize_instrument(
            symbol,
            &contract.volume_place,
            &contract.price_place,
            Decimal::ONE,
            contract.min_trade_num.as_ref(),
            self.exchange(),
        )?;

        Ok(Market {
            id: contract.symbol.clone(),
            swap: contract.is_swap(),
            active: contract.is_active(),
            instrument,
        })
    }

    // =========================================================================
    // Payload conversion
    // =========================================================================

    fn to_position(&self, raw: &BitgetPosition) -> PortResult<Option<Position>> {
        let invalid = |e: ValueError| self.invalid(&raw.symbol, e);

        let contracts = exact_decimal(&raw.total).map_err(invalid)?;
        if contracts.is_zero() {
            return Ok(None);
        }

        let side = match raw.hold_side.as_str() {
            "long" => PositionSide::Long,
            "short" => PositionSide::Short,
            other => return Err(invalid(ValueError::InvalidVariant(format!("hold side '{}'", other)))),
        };
        let leverage = exact_decimal(&raw.leverage)
            .map_err(invalid)?
            .trunc()
            .to_u32()
            .ok_or_else(|| invalid(ValueError::InvalidLeverage(format!("{:?}", raw.leverage))))?;
        let mark_price = exact_decimal(&raw.mark_price).map_err(invalid)?;

        Ok(Some(Position {
            symbol: canonical_symbol(&raw.symbol, self.family).map_err(invalid)?,
            side,
            contracts: Quantity::new(contracts).map_err(invalid)?,
            entry_price: exact_decimal(&raw.open_price_avg).map_err(invalid)?,
            notional: contracts * mark_price,
            leverage,
            hedged: raw.pos_mode == "hedge_mode",
            margin_mode: raw.margin_mode.parse().map_err(invalid)?,
        }))
    }

    fn to_trigger(&self, raw: &BitgetPlanOrder) -> PortResult<Option<TriggerOrder>> {
        let Some(kind) = raw.trigger_kind() else {
            return Ok(None);
        };
        let invalid = |e: ValueError| self.invalid(&raw.symbol, e);

        let side = raw.side.as_deref().map(str::parse::<OrderSide>).transpose().map_err(invalid)?;
        let amount = raw
            .size
            .as_ref()
            .filter(|size| !matches!(size, RawDecimal::Text(s) if s.is_empty()))
            .map(exact_decimal)
            .transpose()
            .map_err(invalid)?
            .filter(|size| !size.is_zero());

        Ok(Some(TriggerOrder {
            id: raw.order_id.clone(),
            symbol: canonical_symbol(&raw.symbol, self.family).map_err(invalid)?,
            kind,
            side,
            trigger_price: exact_decimal(&raw.trigger_price).map_err(invalid)?,
            amount,
            reduce_only: true,
        }))
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn order_request(
        &self,
        market: &Market,
        side: OrderSide,
        order_type: OrderType,
        amount: Quantity,
        params: &OrderParams,
    ) -> PortResult<(RawRequest, Decimal)> {
        let instrument = &market.instrument;
        let label = instrument.symbol.to_string();

        let size = instrument.round_amount(amount.as_decimal());
        if size.is_zero() {
            return Err(DomainError::validation(
                self.exchange(),
                Some(&label),
                format!("amount {} is below the step {}", amount, instrument.amount_step()),
            ));
        }

        let (margin_mode, hedged) = self.account_modes(&instrument.symbol).await?;
        let mut request = self
            .private_post(endpoints::PLACE_ORDER)
            .param("symbol", market.id.as_str())
            .param("marginMode", margin_mode_wire(margin_mode))
            .param("marginCoin", instrument.symbol.settle())
            .param("size", size.to_string())
            .param("orderType", order_type.as_str());

        if hedged {
            // Hedge mode names the position direction, not the fill direction.
            let (side, trade_side) = if params.close || params.reduce_only {
                (side.opposite(), "close")
            } else {
                (side, "open")
            };
            request = request.param("side", side.as_str()).param("tradeSide", trade_side);
        } else {
            request = request.param("side", side.as_str());
            if params.reduce_only || params.close {
                request = request.param("reduceOnly", "YES");
            }
        }

        if order_type == OrderType::Limit {
            let price = params.price.ok_or_else(|| {
                DomainError::validation(self.exchange(), Some(&label), "limit order without price")
            })?;
            request = request
                .param("price", instrument.round_price(price).to_string())
                .param("force", "gtc");
        }

        if let Some(client_oid) = &params.client_order_id {
            request = request.param("clientOid", client_oid.as_str());
        }

        Ok((request.merge(&params.extra), size))
    }

    /// Margin mode of `symbol` and whether the account is in hedge mode.
    ///
    /// Whatever this connection has not set or read yet is fetched from the
    /// symbol's account; known values are never overwritten by the fetch.
    async fn account_modes(&self, symbol: &CanonicalSymbol) -> PortResult<(MarginMode, bool)> {
        let known_mode = self.margin_modes.read().await.get(symbol).copied();
        let known_hedged = *self.hedged.read().await;
        if let (Some(mode), Some(hedged)) = (known_mode, known_hedged) {
            return Ok((mode, hedged));
        }

        let label = symbol.to_string();
        let request = self
            .private_get(endpoints::ACCOUNT)
            .param("symbol", symbol.market_id())
            .param("marginCoin", symbol.settle());
        let account: BitgetSymbolAccount = self
            .gateway
            .fetch(Operation::AccountModes, Some(&label), request)
            .await?;
        let fetched_mode: MarginMode = account.margin_mode.parse().map_err(|e| self.invalid(&label, e))?;
        let fetched_hedged = account.pos_mode == "hedge_mode";
        debug!(symbol = %symbol, margin_mode = %fetched_mode, hedged = fetched_hedged, "Account modes read");

        let mode = *self.margin_modes.write().await.entry(symbol.clone()).or_insert(fetched_mode);
        let hedged = *self.hedged.write().await.get_or_insert(fetched_hedged);
        Ok((mode, hedged))
    }

    async fn confirm_tpsl(&self, symbol: &CanonicalSymbol) -> PortResult<()> {
        let mut observed = (0, 0);

        for attempt in 0..self.tpsl_observations {
            if attempt > 0 {
                tokio::time::sleep(self.tpsl_interval).await;
            }

            let triggers = self.get_trigger_orders(symbol).await?;
            let take_profits = triggers.iter().filter(|t| t.kind == TriggerKind::TakeProfit).count();
            observed = (take_profits, triggers.len() - take_profits);
            if observed == (1, 1) {
                return Ok(());
            }
            debug!(symbol = %symbol, attempt, ?observed, "TPSL triggers not settled");
        }

        Err(DomainError::rejected(
            self.exchange(),
            Some(symbol.to_string()),
            format!(
                "broken TPSL invariant: observed {} take-profit and {} stop-loss orders",
                observed.0, observed.1
            ),
        ))
    }
}

impl BitgetExchange<BitgetRestClient> {
    /// Connect to Bitget over signed REST.
    ///
    /// # Errors
    /// Returns `ExecError::Config` for a non-swap default market, a missing
    /// passphrase, or a zero rate limit.
    pub fn connect(config: &ClientConfig, ops_per_second: u32, timeout: Duration) -> ExecResult<Self> {
        if config.default_market_type() != MarketType::Swap {
            return Err(ExecError::Config(format!(
                "Bitget binding trades swaps, not {}",
                config.default_market_type().as_str()
            )));
        }

        let transport = BitgetRestClient::new(config)?.with_timeout(timeout);
        info!(testnet = config.testnet(), ops_per_second, "Bitget port connected");
        Self::with_rate_limit(transport, ops_per_second)
    }
}

#[async_trait]
impl<T: Transport> ExchangePort for BitgetExchange<T> {
    fn exchange_id(&self) -> &str {
        self.exchange()
    }

    async fn load_markets(&self) -> PortResult<()> {
        let items: Vec<Value> = self
            .gateway
            .fetch(Operation::LoadMarkets, None, self.public(endpoints::CONTRACTS))
            .await?;

        let mut markets: BTreeMap<CanonicalSymbol, Market> = BTreeMap::new();
        let mut skipped = 0usize;
        for item in items {
            let id = item.get("symbol").and_then(Value::as_str).unwrap_or("?").to_string();
            let market = serde_json::from_value::<BitgetContract>(item)
                .map_err(|e| self.gateway.mapper().invalid_payload(Operation::LoadMarkets, Some(&id), e))
                .and_then(|contract| {
                    // Delivery contracts share coins with the perpetual.
                    if contract.is_swap() {
                        self.to_market(&contract).map(Some)
                    } else {
                        Ok(None)
                    }
                });

            match market {
                Ok(Some(market)) => {
                    if let Some(existing) = markets.get(market.symbol()) {
                        warn!(symbol = %id, kept = %existing.id, "Skipping duplicate contract");
                        skipped += 1;
                        continue;
                    }
                    markets.insert(market.symbol().clone(), market);
                },
                Ok(None) => {},
                Err(e) => {
                    warn!(symbol = %id, error = %e, "Skipping contract");
                    skipped += 1;
                },
            }
        }

        info!(exchange = self.exchange(), count = markets.len(), skipped, "Markets loaded");
        *self.markets.write().await = markets;
        Ok(())
    }

    async fn get_funding_usdt_rates(&self, is_active: bool) -> PortResult<Vec<FundingRateRecord>> {
        self.ensure_markets().await?;

        let active = if is_active {
            Some(active_swap_symbols(self.markets.read().await.values(), self.family))
        } else {
            None
        };

        let items: Vec<Value> = self
            .gateway
            .fetch(Operation::FundingRates, None, self.public(endpoints::CURRENT_FUND_RATE))
            .await?;

        let mut raw = Vec::with_capacity(items.len());
        for item in items {
            let symbol = item.get("symbol").and_then(Value::as_str).map(str::to_string);
            let rate: BitgetFundRate = serde_json::from_value(item).map_err(|e| {
                self.gateway.mapper().invalid_payload(Operation::FundingRates, symbol.as_deref(), e)
            })?;
            raw.push(RawFundingRate::from(rate));
        }

        let records = select_funding_rates(&raw, self.exchange(), self.family, Utc::now(), active.as_ref())?;
        debug!(exchange = self.exchange(), count = records.len(), "Funding rates selected");
        Ok(records)
    }

    async fn get_ticker(&self, symbol: &CanonicalSymbol) -> PortResult<Ticker> {
        let label = symbol.to_string();
        let request = self.public(endpoints::TICKER).param("symbol", symbol.market_id());

        let tickers: Vec<BitgetTicker> = self.gateway.fetch(Operation::Ticker, Some(&label), request).await?;
        let ticker = tickers
            .first()
            .ok_or_else(|| DomainError::validation(self.exchange(), Some(&label), "empty ticker"))?;

        Ok(Ticker {
            symbol: symbol.clone(),
            last_price: exact_decimal(&ticker.last_pr).map_err(|e| self.invalid(&label, e))?,
        })
    }

    async fn get_instrument_info(&self, symbol: &CanonicalSymbol) -> PortResult<Instrument> {
        Ok(self.market(symbol).await?.instrument)
    }

    async fn get_positions(&self, symbols: &BTreeSet<CanonicalSymbol>) -> PortResult<Vec<Position>> {
        let request = self
            .private_get(endpoints::ALL_POSITION)
            .param("marginCoin", self.family.settle);

        let raw: Option<Vec<BitgetPosition>> =
            self.gateway.fetch(Operation::Positions, None, request).await?;

        let mut positions = Vec::new();
        for item in raw.unwrap_or_default() {
            if let Some(position) = self.to_position(&item)? {
                if symbols.is_empty() || symbols.contains(&position.symbol) {
                    positions.push(position);
                }
            }
        }
        Ok(positions)
    }

    async fn get_trigger_orders(&self, symbol: &CanonicalSymbol) -> PortResult<Vec<TriggerOrder>> {
        let label = symbol.to_string();
        let request = self
            .private_get(endpoints::ORDERS_PLAN_PENDING)
            .param("symbol", symbol.market_id())
            .param("planType", "profit_loss");

        let raw: BitgetPlanOrders = self
            .gateway
            .fetch(Operation::TriggerOrders, Some(&label), request)
            .await?;

        let mut triggers = Vec::new();
        for item in raw.entrusted_list.unwrap_or_default() {
            if let Some(trigger) = self.to_trigger(&item)? {
                if &trigger.symbol == symbol {
                    triggers.push(trigger);
                }
            }
        }
        Ok(triggers)
    }

    async fn get_balance(&self, asset: &str) -> PortResult<Balance> {
        let accounts: Vec<BitgetAccount> = self
            .gateway
            .fetch(Operation::Balance, None, self.private_get(endpoints::ACCOUNTS))
            .await?;

        let asset = asset.to_ascii_uppercase();
        match accounts.iter().find(|a| a.margin_coin.eq_ignore_ascii_case(&asset)) {
            Some(account) => Ok(Balance {
                free: exact_decimal(&account.available).map_err(|e| self.invalid(&asset, e))?,
                total: exact_decimal(&account.account_equity).map_err(|e| self.invalid(&asset, e))?,
                asset,
            }),
            None => Ok(Balance {
                asset,
                free: Decimal::ZERO,
                total: Decimal::ZERO,
            }),
        }
    }

    async fn create_order(
        &self,
        symbol: &CanonicalSymbol,
        side: OrderSide,
        order_type: OrderType,
        amount: Quantity,
        params: Option<OrderParams>,
    ) -> PortResult<Order> {
        let params = params.unwrap_or_default();
        let market = self.market(symbol).await?;
        let (request, size) = self.order_request(&market, side, order_type, amount, &params).await?;

        let label = symbol.to_string();
        let placed: BitgetPlacedOrder = self
            .gateway
            .fetch(Operation::CreateOrder, Some(&label), request)
            .await?;

        info!(
            exchange = self.exchange(),
            order_id = %placed.order_id,
            symbol = %symbol,
            side = %side,
            size = %size,
            reduce_only = params.reduce_only,
            "Order submitted"
        );

        Ok(Order {
            id: placed.order_id,
            client_order_id: placed.client_oid.or(params.client_order_id),
            symbol: symbol.clone(),
            side,
            order_type,
            amount: size,
            price: params.price,
            reduce_only: params.reduce_only,
        })
    }

    async fn create_tpsl_position(&self, request: &TpslRequest) -> PortResult<()> {
        let label = request.symbol.to_string();
        if !request.triggers_are_ordered() {
            return Err(DomainError::validation(
                self.exchange(),
                Some(&label),
                format!(
                    "{} entry needs {} (take profit {}, stop loss {})",
                    request.side,
                    match request.side {
                        OrderSide::Buy => "stop_loss < take_profit",
                        OrderSide::Sell => "take_profit < stop_loss",
                    },
                    request.take_profit,
                    request.stop_loss
                ),
            ));
        }

        let market = self.market(&request.symbol).await?;
        let instrument = &market.instrument;
        let params = OrderParams {
            price: request.price.map(|p| p.as_decimal()),
            client_order_id: Some(Uuid::now_v7().to_string()),
            ..OrderParams::default()
        };

        let (raw, _) = self
            .order_request(&market, request.side, request.order_type, request.amount, &params)
            .await?;
        let raw = raw
            .param(
                "presetStopSurplusPrice",
                instrument.round_price(request.take_profit.as_decimal()).to_string(),
            )
            .param(
                "presetStopLossPrice",
                instrument.round_price(request.stop_loss.as_decimal()).to_string(),
            );

        let placed: BitgetPlacedOrder = self
            .gateway
            .fetch(Operation::CreateTpsl, Some(&label), raw)
            .await?;

        info!(
            exchange = self.exchange(),
            order_id = %placed.order_id,
            symbol = %label,
            side = %request.side,
            take_profit = %request.take_profit,
            stop_loss = %request.stop_loss,
            "TPSL position submitted"
        );

        // Presets of a resting limit entry only materialize on fill.
        if request.order_type == OrderType::Limit {
            return Ok(());
        }
        self.confirm_tpsl(&request.symbol).await
    }

    async fn set_leverage(&self, leverage: Leverage, symbol: &CanonicalSymbol) -> PortResult<()> {
        let label = symbol.to_string();
        let (_, hedged) = self.account_modes(symbol).await?;
        let hold_sides: &[Option<&str>] = if hedged {
            &[Some("long"), Some("short")]
        } else {
            &[None]
        };

        for hold_side in hold_sides {
            let mut request = self
                .private_post(endpoints::SET_LEVERAGE)
                .param("symbol", symbol.market_id())
                .param("marginCoin", symbol.settle())
                .param("leverage", leverage.value().to_string());
            if let Some(hold_side) = hold_side {
                request = request.param("holdSide", *hold_side);
            }
            self.gateway.apply(Operation::SetLeverage, Some(&label), request).await?;
        }
        Ok(())
    }

    async fn set_margin_mode(
        &self,
        margin_mode: MarginMode,
        symbol: &CanonicalSymbol,
        params: Option<&Params>,
    ) -> PortResult<()> {
        let label = symbol.to_string();
        let mut request = self
            .private_post(endpoints::SET_MARGIN_MODE)
            .param("symbol", symbol.market_id())
            .param("marginCoin", symbol.settle())
            .param("marginMode", margin_mode_wire(margin_mode));
        if let Some(params) = params {
            request = request.merge(params);
        }

        self.gateway.apply(Operation::SetMarginMode, Some(&label), request).await?;
        self.margin_modes.write().await.insert(symbol.clone(), margin_mode);
        Ok(())
    }

    async fn set_position_mode(&self, hedged: bool, symbol: Option<&CanonicalSymbol>) -> PortResult<()> {
        let label = symbol.map(ToString::to_string);
        let request = self
            .private_post(endpoints::SET_POSITION_MODE)
            .param("posMode", if hedged { "hedge_mode" } else { "one_way_mode" });

        self.gateway
            .apply(Operation::SetPositionMode, label.as_deref(), request)
            .await?;
        *self.hedged.write().await = Some(hedged);
        Ok(())
    }

    async fn close(&self) -> PortResult<()> {
        self.gateway.close().await
    }
}

// =============================================================================
// Tests
// =============================================================================
