//! Table row models
//!
//! Field names follow the snake_case column names of the hosted tables.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod tables {
    pub const TRADES: &str = "trades";
    pub const PERFORMANCE_SNAPSHOTS: &str = "performance_snapshots";
    pub const WINRATE_SNAPSHOTS: &str = "winrate_snapshots";
    pub const BOT_LOGS: &str = "bot_logs";
    pub const BALANCE_SNAPSHOTS: &str = "balance_snapshots";
    pub const CURRENT_BALANCE: &str = "current_balance";
}

/// Fixed primary key of the single `current_balance` row
pub const CURRENT_BALANCE_ID: i64 = 1;
pub const INITIAL_USDT: f64 = 10_000.0;
pub const INITIAL_BTC: f64 = 0.0;

/// `type` column of a trade. Values other than BUY/SELL are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TradeSide {
    Buy,
    Sell,
    Other(String),
}

impl TradeSide {
    pub fn as_str(&self) -> &str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
            TradeSide::Other(value) => value,
        }
    }
}

impl From<String> for TradeSide {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "BUY" => TradeSide::Buy,
            "SELL" => TradeSide::Sell,
            _ => TradeSide::Other(value),
        }
    }
}

impl From<TradeSide> for String {
    fn from(side: TradeSide) -> Self {
        side.as_str().to_string()
    }
}

/// `status` column of a trade. Values other than OPEN/CLOSED are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TradeStatus {
    Open,
    Closed,
    Other(String),
}

impl TradeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
            TradeStatus::Other(value) => value,
        }
    }
}

impl From<String> for TradeStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "OPEN" => TradeStatus::Open,
            "CLOSED" => TradeStatus::Closed,
            _ => TradeStatus::Other(value),
        }
    }
}

impl From<TradeStatus> for String {
    fn from(status: TradeStatus) -> Self {
        status.as_str().to_string()
    }
}

/// `null` reads as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Trade ids are text; numeric ids are read as their decimal form
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!("invalid trade id: {}", other))),
    }
}

/// One executed trade (row in `trades`)
///
/// Only `id`, `type` and `status` are required when reading; every other
/// column may be missing or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// Open time, milliseconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<i64>,
    pub status: TradeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_trend: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_testnet: bool,
    /// Exchange-side order id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    /// Milliseconds between signal and fill
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Trade {
    /// New open trade with no exit data
    pub fn open(
        id: &str,
        symbol: &str,
        side: TradeSide,
        quantity: f64,
        entry_price: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            side,
            quantity: Some(quantity),
            entry_price: Some(entry_price),
            exit_price: None,
            stop_loss: None,
            take_profit: None,
            timestamp: Some(timestamp),
            close_time: None,
            status: TradeStatus::Open,
            pnl: None,
            close_reason: None,
            signal_score: None,
            counter_trend: None,
            is_testnet: false,
            trade_id: None,
            execution_delay: None,
            updated_at: None,
        }
    }
}

/// Fields written when a trade closes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TradeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
}

impl TradeUpdate {
    pub fn close(exit_price: f64, close_time: i64, pnl: f64, close_reason: &str) -> Self {
        Self {
            exit_price: Some(exit_price),
            close_time: Some(close_time),
            status: Some(TradeStatus::Closed),
            pnl: Some(pnl),
            close_reason: Some(close_reason.to_string()),
        }
    }
}

/// Patch body for an update: the changed fields plus `updated_at`
#[derive(Debug, Serialize)]
pub(crate) struct TradePatch<'a> {
    #[serde(flatten)]
    pub update: &'a TradeUpdate,
    pub updated_at: String,
}

/// Aggregate stats as tracked by the bot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    pub total_trades: u32,
    pub total_wins: u32,
    pub total_losses: u32,
    pub win_rate: f64,
    pub net_profit: f64,
    pub balance_usdt: Option<f64>,
    pub balance_btc: Option<f64>,
    pub max_drawdown: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub consecutive_losses: u32,
}

/// Row in `performance_snapshots`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: i64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub winrate: f64,
    pub total_pnl: f64,
    pub balance_usdt: f64,
    pub balance_btc: f64,
    pub max_drawdown: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub consecutive_losses: u32,
}

impl PerformanceSnapshot {
    pub fn from_stats(stats: &PerformanceStats, timestamp: i64) -> Self {
        Self {
            id: None,
            timestamp,
            total_trades: stats.total_trades,
            winning_trades: stats.total_wins,
            losing_trades: stats.total_losses,
            winrate: stats.win_rate,
            total_pnl: stats.net_profit,
            balance_usdt: stats.balance_usdt.unwrap_or(INITIAL_USDT),
            balance_btc: stats.balance_btc.unwrap_or(INITIAL_BTC),
            max_drawdown: stats.max_drawdown,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            largest_win: stats.best_trade,
            largest_loss: stats.worst_trade,
            consecutive_losses: stats.consecutive_losses,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WinrateBucket {
    pub trades: u32,
    pub wins: u32,
    pub winrate: f64,
}

/// Rolling win-rate windows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WinrateStats {
    pub last_1h: WinrateBucket,
    pub last_4h: WinrateBucket,
    pub last_24h: WinrateBucket,
    pub last_7d: WinrateBucket,
    pub last_30d: WinrateBucket,
}

/// Row in `winrate_snapshots`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinrateSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: i64,
    pub winrate_1h: f64,
    pub winrate_4h: f64,
    pub winrate_24h: f64,
    pub winrate_7d: f64,
    pub winrate_30d: f64,
    pub trades_1h: u32,
    pub trades_4h: u32,
    pub trades_24h: u32,
    pub trades_7d: u32,
    pub trades_30d: u32,
    pub wins_1h: u32,
    pub wins_4h: u32,
    pub wins_24h: u32,
    pub wins_7d: u32,
    pub wins_30d: u32,
}

impl WinrateSnapshot {
    pub fn from_stats(stats: &WinrateStats, timestamp: i64) -> Self {
        Self {
            id: None,
            timestamp,
            winrate_1h: stats.last_1h.winrate,
            winrate_4h: stats.last_4h.winrate,
            winrate_24h: stats.last_24h.winrate,
            winrate_7d: stats.last_7d.winrate,
            winrate_30d: stats.last_30d.winrate,
            trades_1h: stats.last_1h.trades,
            trades_4h: stats.last_4h.trades,
            trades_24h: stats.last_24h.trades,
            trades_7d: stats.last_7d.trades,
            trades_30d: stats.last_30d.trades,
            wins_1h: stats.last_1h.wins,
            wins_4h: stats.last_4h.wins,
            wins_24h: stats.last_24h.wins,
            wins_7d: stats.last_7d.wins,
            wins_30d: stats.last_30d.wins,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Row in `bot_logs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: LogLevel,
    pub message: String,
    pub data: Option<Value>,
}

/// Row in `balance_snapshots`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: i64,
    pub usdt: f64,
    pub btc: f64,
    pub total_value_usdt: f64,
}

/// The singleton row in `current_balance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentBalanceRow {
    pub id: i64,
    pub usdt: f64,
    pub btc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Simulated wallet holdings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(rename = "USDT")]
    pub usdt: f64,
    #[serde(rename = "BTC")]
    pub btc: f64,
}

impl Balance {
    pub const INITIAL: Balance = Balance {
        usdt: INITIAL_USDT,
        btc: INITIAL_BTC,
    };
}

impl Default for Balance {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl From<&CurrentBalanceRow> for Balance {
    fn from(row: &CurrentBalanceRow) -> Self {
        Self {
            usdt: row.usdt,
            btc: row.btc,
        }
    }
}
