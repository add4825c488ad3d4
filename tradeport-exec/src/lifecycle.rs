//! TPSL position lifecycle observation and scoped port teardown.
//!
//! ```text
//! NoPosition → Opening → OpenWithTriggers → Closing → NoPosition
//! ```
//!
//! `Opening` and `Closing` are never reported by the exchange. Callers poll
//! positions and trigger orders; these helpers package that polling. They
//! only read, they never place or cancel orders.

use futures_util::future::BoxFuture;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

use tradeport_domain::{CanonicalSymbol, DomainError, PortResult, Position, TriggerKind, TriggerOrder};

use crate::ports::ExchangePort;

/// Observed TPSL state of one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// No position and no trigger orders
    NoPosition,
    /// One position guarded by exactly one take-profit and one stop-loss
    OpenWithTriggers {
        /// The open position
        position: Box<Position>,
        /// Take-profit trigger
        take_profit: Box<TriggerOrder>,
        /// Stop-loss trigger
        stop_loss: Box<TriggerOrder>,
    },
    /// Anything else (in transit, half-created, or orphaned triggers)
    Inconsistent {
        /// Open positions
        positions: usize,
        /// Pending take-profit orders
        take_profits: usize,
        /// Pending stop-loss orders
        stop_losses: usize,
    },
}

impl LifecycleState {
    /// Classify a snapshot of positions and trigger orders.
    pub fn classify(mut positions: Vec<Position>, triggers: Vec<TriggerOrder>) -> Self {
        let (mut take_profits, mut stop_losses): (Vec<_>, Vec<_>) =
            triggers.into_iter().partition(|t| t.kind == TriggerKind::TakeProfit);

        let counts = (positions.len(), take_profits.len(), stop_losses.len());
        if counts == (0, 0, 0) {
            return LifecycleState::NoPosition;
        }
        if counts == (1, 1, 1) {
            if let (Some(position), Some(take_profit), Some(stop_loss)) =
                (positions.pop(), take_profits.pop(), stop_losses.pop())
            {
                return LifecycleState::OpenWithTriggers {
                    position: Box::new(position),
                    take_profit: Box::new(take_profit),
                    stop_loss: Box::new(stop_loss),
                };
            }
        }

        LifecycleState::Inconsistent {
            positions: counts.0,
            take_profits: counts.1,
            stop_losses: counts.2,
        }
    }

    /// Whether the symbol is flat with no leftover triggers.
    pub fn is_flat(&self) -> bool {
        matches!(self, LifecycleState::NoPosition)
    }
}

/// Observe the current TPSL state of `symbol`.
pub async fn observe_lifecycle<P>(port: &P, symbol: &CanonicalSymbol) -> PortResult<LifecycleState>
where
    P: ExchangePort + ?Sized,
{
    let positions = port.get_positions(&BTreeSet::from([symbol.clone()])).await?;
    let triggers = port.get_trigger_orders(symbol).await?;
    Ok(LifecycleState::classify(positions, triggers))
}

/// Poll until `symbol` is flat, up to `attempts` observations `interval` apart.
///
/// Returns the last observed state; callers check [`LifecycleState::is_flat`].
pub async fn await_flat<P>(
    port: &P,
    symbol: &CanonicalSymbol,
    attempts: u32,
    interval: Duration,
) -> PortResult<LifecycleState>
where
    P: ExchangePort + ?Sized,
{
    let mut state = observe_lifecycle(port, symbol).await?;
    for attempt in 1..attempts {
        if state.is_flat() {
            break;
        }
        debug!(symbol = %symbol, attempt, ?state, "Waiting for flat");
        tokio::time::sleep(interval).await;
        state = observe_lifecycle(port, symbol).await?;
    }
    Ok(state)
}

/// Run `body` against `port`, then close the port on every exit path.
///
/// The body's error wins over a close error.
///
/// ```rust,ignore
/// let ticker = scoped(port, |p| Box::pin(async move { p.get_ticker(&symbol).await })).await?;
/// ```
pub async fn scoped<P, R, E, F>(port: P, body: F) -> Result<R, E>
where
    P: ExchangePort,
    E: From<DomainError>,
    F: for<'a> FnOnce(&'a P) -> BoxFuture<'a, Result<R, E>>,
{
    let result = body(&port).await;
    let closed = port.close().await;

    match (result, closed) {
        (Err(err), _) => Err(err),
        (Ok(_), Err(err)) => Err(E::from(err)),
        (Ok(value), Ok(())) => Ok(value),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tradeport_domain::{MarginMode, PositionSide, Quantity};

    fn xrp() -> CanonicalSymbol {
        CanonicalSymbol::parse("XRP/USDT:USDT").unwrap()
    }

    fn position() -> Position {
        Position {
            symbol: xrp(),
            side: PositionSide::Long,
            contracts: Quantity::new(dec!(5)).unwrap(),
            entry_price: dec!(0.5),
            notional: dec!(2.5),
            leverage: 3,
            hedged: false,
            margin_mode: MarginMode::Isolated,
        }
    }

    fn trigger(kind: TriggerKind, price: Decimal) -> TriggerOrder {
        TriggerOrder {
            id: format!("{:?}", kind),
            symbol: xrp(),
            kind,
            side: None,
            trigger_price: price,
            amount: None,
            reduce_only: true,
        }
    }

    #[test]
    fn test_classify_states() {
        assert_eq!(LifecycleState::classify(vec![], vec![]), LifecycleState::NoPosition);

        let open = LifecycleState::classify(
            vec![position()],
            vec![
                trigger(TriggerKind::StopLoss, dec!(0.45)),
                trigger(TriggerKind::TakeProfit, dec!(0.6)),
            ],
        );
        match open {
            LifecycleState::OpenWithTriggers {
                take_profit,
                stop_loss,
                ..
            } => {
                assert_eq!(take_profit.trigger_price, dec!(0.6));
                assert_eq!(stop_loss.trigger_price, dec!(0.45));
            },
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_half_created_pair_is_inconsistent() {
        let state =
            LifecycleState::classify(vec![position()], vec![trigger(TriggerKind::TakeProfit, dec!(0.6))]);
        assert_eq!(
            state,
            LifecycleState::Inconsistent {
                positions: 1,
                take_profits: 1,
                stop_losses: 0
            }
        );
        assert!(!state.is_flat());
    }

    #[test]
    fn test_orphaned_triggers_are_not_flat() {
        let state = LifecycleState::classify(vec![], vec![trigger(TriggerKind::StopLoss, dec!(0.45))]);
        assert!(!state.is_flat());
    }
}
