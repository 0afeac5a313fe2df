// =============================================================================
// Strategy Engine — EMA crossover + RSI filter + ATR-sized exits
// =============================================================================
//
// Evaluates one symbol's bar series and produces at most one Signal.
//
// Pipeline:
//   1. Require >= 3 bars.
//   2. Compute fast/slow EMA on closes, RSI on closes, ATR on bars.
//   3. Require last RSI and last ATR to be defined (warm-up finished).
//   4. Fast crosses ABOVE slow and RSI >= rsi_long_min  => LONG
//        stop   = entry - sl_mult * ATR
//        target = entry + tp_mult * ATR
//   5. Otherwise fast crosses BELOW slow and RSI <= rsi_short_max => SHORT
//        stop   = entry + sl_mult * ATR
//        target = entry - tp_mult * ATR
//
// Entry is always the close of the last bar.  Thresholds are inclusive.
// =============================================================================

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::StrategyParams;
use crate::error::BotError;
use crate::indicators::atr::calculate_atr;
use crate::indicators::ema::calculate_ema;
use crate::indicators::rsi::calculate_rsi;
use crate::market_data::{closes, Candle};
use crate::signals::{crossed_above, crossed_below};
use crate::types::{Direction, Signal};

/// Fewest bars that give the crossover detector two points to compare.
pub const MIN_BARS: usize = 3;

// =============================================================================
// Indicator snapshot
// =============================================================================

/// The last two EMA points plus the latest RSI / ATR / close of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub prev_fast: Option<f64>,
    pub now_fast: f64,
    pub prev_slow: Option<f64>,
    pub now_slow: f64,
    pub rsi: f64,
    pub atr: f64,
    pub last_close: f64,
}

impl IndicatorSnapshot {
    /// Compute all indicators over `candles` and keep only what the decision
    /// needs.  Fails with `InsufficientHistory` while anything is still
    /// warming up.
    pub fn compute(
        symbol: &str,
        candles: &[Candle],
        params: &StrategyParams,
    ) -> Result<Self, BotError> {
        let insufficient = |reason: String| BotError::InsufficientHistory {
            symbol: symbol.to_string(),
            reason,
        };

        if candles.len() < MIN_BARS {
            return Err(insufficient(format!(
                "{} bars < {MIN_BARS}",
                candles.len()
            )));
        }

        let closes = closes(candles);
        let ema_fast = calculate_ema(&closes, params.ema_fast);
        let ema_slow = calculate_ema(&closes, params.ema_slow);
        let rsi = calculate_rsi(&closes, params.rsi_period);
        let atr = calculate_atr(candles, params.atr_period);

        let rsi = rsi
            .last()
            .copied()
            .flatten()
            .ok_or_else(|| insufficient(format!("RSI({}) not ready", params.rsi_period)))?;
        let atr = atr
            .last()
            .copied()
            .flatten()
            .ok_or_else(|| insufficient(format!("ATR({}) not ready", params.atr_period)))?;

        let (prev_fast, now_fast) = last_two(&ema_fast)
            .ok_or_else(|| insufficient(format!("EMA({}) empty", params.ema_fast)))?;
        let (prev_slow, now_slow) = last_two(&ema_slow)
            .ok_or_else(|| insufficient(format!("EMA({}) empty", params.ema_slow)))?;

        let last_close = closes[closes.len() - 1];

        Ok(Self {
            prev_fast,
            now_fast,
            prev_slow,
            now_slow,
            rsi,
            atr,
            last_close,
        })
    }

    /// Direction implied by this snapshot, upward cross first.
    pub fn direction(&self, params: &StrategyParams) -> Option<Direction> {
        if crossed_above(self.prev_fast, self.now_fast, self.prev_slow, self.now_slow)
            && self.rsi >= params.rsi_long_min
        {
            return Some(Direction::Long);
        }
        if crossed_below(self.prev_fast, self.now_fast, self.prev_slow, self.now_slow)
            && self.rsi <= params.rsi_short_max
        {
            return Some(Direction::Short);
        }
        None
    }
}

fn last_two(series: &[f64]) -> Option<(Option<f64>, f64)> {
    let now = *series.last()?;
    let prev = series.len().checked_sub(2).map(|i| series[i]);
    Some((prev, now))
}

/// `(stop_loss, take_profit)` around `entry` for `direction`.
pub fn exit_levels(
    direction: Direction,
    entry: f64,
    atr: f64,
    params: &StrategyParams,
) -> (f64, f64) {
    let sl_dist = params.sl_atr_multiplier * atr;
    let tp_dist = params.tp_atr_multiplier * atr;
    match direction {
        Direction::Long => (entry - sl_dist, entry + tp_dist),
        Direction::Short => (entry + sl_dist, entry - tp_dist),
    }
}

// =============================================================================
// Strategy Engine
// =============================================================================

pub struct StrategyEngine;

impl StrategyEngine {
    /// Evaluate a single symbol's bars (oldest first).
    ///
    /// `Ok(None)` means the indicators are ready but no entry condition holds.
    pub fn evaluate_symbol(
        symbol: &str,
        candles: &[Candle],
        params: &StrategyParams,
        now: DateTime<Utc>,
    ) -> Result<Option<Signal>, BotError> {
        let snap = IndicatorSnapshot::compute(symbol, candles, params)?;

        let Some(direction) = snap.direction(params) else {
            debug!(
                symbol,
                fast = snap.now_fast,
                slow = snap.now_slow,
                rsi = snap.rsi,
                "no entry condition"
            );
            return Ok(None);
        };

        let entry = snap.last_close;
        let (stop_loss, take_profit) = exit_levels(direction, entry, snap.atr, params);

        Ok(Some(Signal {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            direction,
            entry,
            stop_loss,
            take_profit,
            rsi: snap.rsi,
            atr: snap.atr,
            timestamp: now,
        }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Bars whose closes follow `closes`; open = previous close, wicks 0.5.
    pub(crate) fn bars_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                let t = i as i64 * 60_000;
                Candle::new(
                    t,
                    open,
                    open.max(close) + 0.5,
                    open.min(close) - 0.5,
                    close,
                    10.0,
                    t + 59_999,
                )
            })
            .collect()
    }

    /// 200 closes: a slow decline over bars 0..100, a 188/192 chop until bar
    /// 149, a +10.4 jump at bar 150, then flat.  EMA(21) crosses above EMA(50)
    /// exactly at bar 150, where RSI(14) is 60.06.
    pub(crate) fn upward_cross_closes() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..150)
            .map(|i| match i {
                i if i < 100 => 200.0 - 0.1 * i as f64,
                i if i % 2 == 1 => 192.0,
                _ => 188.0,
            })
            .collect();
        let jumped = closes[149] + 10.4;
        closes.extend(std::iter::repeat(jumped).take(50));
        closes
    }

    /// Mirror image around 200: EMA(21) crosses below EMA(50) at bar 150,
    /// RSI(14) there is 39.94.
    fn downward_cross_closes() -> Vec<f64> {
        upward_cross_closes().iter().map(|c| 400.0 - c).collect()
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_773_130_000, 0).unwrap()
    }

    #[test]
    fn too_few_bars_is_insufficient_history() {
        let bars = bars_from_closes(&[1.0, 2.0]);
        let res = StrategyEngine::evaluate_symbol("BTCUSDT", &bars, &StrategyParams::default(), now());
        assert!(matches!(res, Err(BotError::InsufficientHistory { .. })));
    }

    #[test]
    fn rsi_warm_up_is_insufficient_history() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let bars = bars_from_closes(&closes);
        let res = StrategyEngine::evaluate_symbol("BTCUSDT", &bars, &StrategyParams::default(), now());
        assert!(matches!(res, Err(BotError::InsufficientHistory { .. })));
    }

    #[test]
    fn engineered_upward_cross_fires_exactly_one_long_at_bar_150() {
        let closes = upward_cross_closes();
        let bars = bars_from_closes(&closes);
        let params = StrategyParams {
            rsi_long_min: 60.0,
            ..StrategyParams::default()
        };

        let mut fired = Vec::new();
        for end in MIN_BARS - 1..bars.len() {
            if let Ok(Some(signal)) =
                StrategyEngine::evaluate_symbol("BTCUSDT", &bars[..=end], &params, now())
            {
                fired.push((end, signal));
            }
        }

        assert_eq!(fired.len(), 1, "expected exactly one signal, got {}", fired.len());
        let (idx, signal) = &fired[0];
        assert_eq!(*idx, 150);
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.entry, closes[150]);
        assert!(signal.stop_loss < signal.entry);
        assert!(signal.take_profit > signal.entry);
        assert!(signal.rsi >= 60.0);
        assert!((signal.rsi - 60.0).abs() < 0.1, "rsi at cross was {}", signal.rsi);
    }

    #[test]
    fn long_threshold_is_inclusive() {
        let closes = upward_cross_closes();
        let bars = bars_from_closes(&closes[..=150]);
        let rsi_at_cross = calculate_rsi(&closes[..=150], 14)[150].unwrap();

        let params = StrategyParams {
            rsi_long_min: rsi_at_cross,
            ..StrategyParams::default()
        };
        let signal = StrategyEngine::evaluate_symbol("BTCUSDT", &bars, &params, now())
            .unwrap()
            .expect("LONG at the exact threshold");
        assert_eq!(signal.direction, Direction::Long);

        let stricter = StrategyParams {
            rsi_long_min: rsi_at_cross + 1e-9,
            ..StrategyParams::default()
        };
        assert!(StrategyEngine::evaluate_symbol("BTCUSDT", &bars, &stricter, now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn long_exit_levels_use_atr_multipliers() {
        let closes = upward_cross_closes();
        let bars = bars_from_closes(&closes[..=150]);
        let params = StrategyParams::default();
        let signal = StrategyEngine::evaluate_symbol("BTCUSDT", &bars, &params, now())
            .unwrap()
            .unwrap();

        let atr = calculate_atr(&bars, params.atr_period)[150].unwrap();
        assert_eq!(signal.atr, atr);
        assert!((signal.stop_loss - (signal.entry - 1.0 * atr)).abs() < 1e-9);
        assert!((signal.take_profit - (signal.entry + 1.5 * atr)).abs() < 1e-9);
        assert_eq!(signal.timestamp, now());
    }

    #[test]
    fn downward_cross_fires_short() {
        let closes = downward_cross_closes();
        let bars = bars_from_closes(&closes[..=150]);
        let signal = StrategyEngine::evaluate_symbol("ETHUSDT", &bars, &StrategyParams::default(), now())
            .unwrap()
            .expect("SHORT");
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.symbol, "ETHUSDT");
        assert_eq!(signal.entry, closes[150]);
        assert!(signal.stop_loss > signal.entry);
        assert!(signal.take_profit < signal.entry);
        assert!((signal.rsi - 40.0).abs() < 0.1, "rsi at cross was {}", signal.rsi);
    }

    #[test]
    fn short_blocked_when_rsi_above_threshold() {
        let closes = downward_cross_closes();
        let bars = bars_from_closes(&closes[..=150]);
        let params = StrategyParams {
            rsi_short_max: 1.0,
            ..StrategyParams::default()
        };
        assert!(StrategyEngine::evaluate_symbol("ETHUSDT", &bars, &params, now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn no_cross_means_no_signal() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 + 0.05 * i as f64).collect();
        let bars = bars_from_closes(&closes);
        assert!(StrategyEngine::evaluate_symbol("BTCUSDT", &bars, &StrategyParams::default(), now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn snapshot_reads_last_two_points() {
        let closes = upward_cross_closes();
        let bars = bars_from_closes(&closes[..=150]);
        let params = StrategyParams::default();
        let snap = IndicatorSnapshot::compute("BTCUSDT", &bars, &params).unwrap();

        let fast = calculate_ema(&closes[..=150], params.ema_fast);
        let slow = calculate_ema(&closes[..=150], params.ema_slow);
        assert_eq!(snap.prev_fast, Some(fast[149]));
        assert_eq!(snap.now_fast, fast[150]);
        assert_eq!(snap.prev_slow, Some(slow[149]));
        assert_eq!(snap.now_slow, slow[150]);
        assert!(snap.prev_fast.unwrap() < snap.prev_slow.unwrap());
        assert!(snap.now_fast > snap.now_slow);
    }

    #[test]
    fn exit_levels_mirror_by_direction() {
        let params = StrategyParams::default();
        assert_eq!(exit_levels(Direction::Long, 100.0, 2.0, &params), (98.0, 103.0));
        assert_eq!(exit_levels(Direction::Short, 100.0, 2.0, &params), (102.0, 97.0));
    }
}
