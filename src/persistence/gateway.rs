//! Persistence Gateway
//!
//! Each public operation maps one domain object onto one table call. The
//! `try_*` variants surface errors; the plain variants log them and return the
//! operation's fallback value instead, whether the backend is missing or the
//! call failed. The two causes are counted separately in [`FallbackStats`].

use super::models::*;
use super::query::{Filter, Order, Query};
use super::{PersistenceError, PersistenceResult, TableBackend};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Filter that matches every trade; the REST layer refuses unfiltered deletes
const MATCH_ALL_TRADES_ID: &str = "never_match_this";

/// Counts of fallback values handed out, by cause
#[derive(Debug, Default)]
pub struct FallbackStats {
    unconfigured: AtomicU64,
    remote_error: AtomicU64,
}

impl FallbackStats {
    /// Fallbacks returned because no backend is configured
    pub fn unconfigured(&self) -> u64 {
        self.unconfigured.load(Ordering::Relaxed)
    }

    /// Fallbacks returned because a backend call failed
    pub fn remote_errors(&self) -> u64 {
        self.remote_error.load(Ordering::Relaxed)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_row<T: Serialize>(value: &T) -> PersistenceResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Decode rows one at a time; rows that do not fit `T` are logged and skipped
fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value(row) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(table, id = %id, error = %e, "Skipping undecodable row");
                    None
                }
            }
        })
        .collect()
}

fn decode_first<T: DeserializeOwned>(rows: Vec<Value>) -> PersistenceResult<Option<T>> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

pub struct PersistenceGateway {
    backend: Option<Arc<dyn TableBackend>>,
    stats: FallbackStats,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("stats", &self.stats)
            .finish()
    }
}

impl PersistenceGateway {
    pub fn new(backend: Option<Arc<dyn TableBackend>>) -> Self {
        Self {
            backend,
            stats: FallbackStats::default(),
        }
    }

    /// Gateway without a backend; every operation returns its fallback
    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn stats(&self) -> &FallbackStats {
        &self.stats
    }

    fn backend(&self) -> PersistenceResult<&dyn TableBackend> {
        self.backend
            .as_deref()
            .ok_or(PersistenceError::Unconfigured)
    }

    /// Resolve `result`, substituting `fallback` and logging the cause on error
    fn or_fallback<T>(
        &self,
        operation: &'static str,
        result: PersistenceResult<T>,
        fallback: T,
    ) -> T {
        match result {
            Ok(value) => value,
            Err(PersistenceError::Unconfigured) => {
                self.stats.unconfigured.fetch_add(1, Ordering::Relaxed);
                warn!(operation, fallback = "unconfigured", "Backend not configured, skipping");
                fallback
            }
            Err(e) => {
                self.stats.remote_error.fetch_add(1, Ordering::Relaxed);
                error!(
                    operation,
                    fallback = "remote_error",
                    error = %e,
                    "Backend operation failed"
                );
                fallback
            }
        }
    }

    // ---- trades ----

    pub async fn try_save_trade(&self, trade: &Trade) -> PersistenceResult<Option<Trade>> {
        let backend = self.backend()?;
        let rows = backend.insert(tables::TRADES, vec![to_row(trade)?]).await?;
        debug!(trade_id = %trade.id, symbol = %trade.symbol, "Saved trade");
        decode_first(rows)
    }

    /// Insert a new trade row. `None` when the backend is unavailable.
    pub async fn save_trade(&self, trade: &Trade) -> Option<Trade> {
        let result = self.try_save_trade(trade).await;
        self.or_fallback("save_trade", result, None)
    }

    pub async fn try_update_trade(
        &self,
        trade_id: &str,
        update: &TradeUpdate,
    ) -> PersistenceResult<Option<Trade>> {
        let backend = self.backend()?;
        let patch = TradePatch {
            update,
            updated_at: Utc::now().to_rfc3339(),
        };
        let rows = backend
            .update(tables::TRADES, to_row(&patch)?, &[Filter::eq("id", trade_id)])
            .await?;

        if rows.is_empty() {
            debug!(trade_id, "Trade update matched no rows");
        } else {
            debug!(trade_id, "Updated trade");
        }
        decode_first(rows)
    }

    /// Apply close-out fields to the trade with `trade_id`
    pub async fn update_trade(&self, trade_id: &str, update: &TradeUpdate) -> Option<Trade> {
        let result = self.try_update_trade(trade_id, update).await;
        self.or_fallback("update_trade", result, None)
    }

    pub async fn try_get_trades_in_time_range(
        &self,
        start_time: i64,
        end_time: i64,
    ) -> PersistenceResult<Vec<Trade>> {
        let backend = self.backend()?;
        let query = Query::new()
            .filter(Filter::gte("timestamp", start_time))
            .filter(Filter::lte("timestamp", end_time))
            .filter(Filter::eq("status", TradeStatus::Closed.as_str()))
            .order(Order::asc("timestamp"));

        let rows = backend.select(tables::TRADES, &query).await?;
        Ok(decode_rows(tables::TRADES, rows))
    }

    /// Closed trades opened within `[start_time, end_time]`, oldest first
    pub async fn get_trades_in_time_range(&self, start_time: i64, end_time: i64) -> Vec<Trade> {
        let result = self.try_get_trades_in_time_range(start_time, end_time).await;
        self.or_fallback("get_trades_in_time_range", result, Vec::new())
    }

    pub async fn try_get_all_trades(&self) -> PersistenceResult<Vec<Trade>> {
        let backend = self.backend()?;
        let query = Query::new().order(Order::desc("timestamp"));
        let rows = backend.select(tables::TRADES, &query).await?;
        Ok(decode_rows(tables::TRADES, rows))
    }

    /// Every trade, newest first
    pub async fn get_all_trades(&self) -> Vec<Trade> {
        let result = self.try_get_all_trades().await;
        self.or_fallback("get_all_trades", result, Vec::new())
    }

    pub async fn try_delete_all_trades(&self) -> PersistenceResult<usize> {
        let backend = self.backend()?;
        let count = backend
            .delete(tables::TRADES, &[Filter::neq("id", MATCH_ALL_TRADES_ID)])
            .await?;
        info!(count, "Deleted all trades");
        Ok(count)
    }

    /// Remove every trade row; returns how many were deleted
    pub async fn delete_all_trades(&self) -> Option<usize> {
        let result = self.try_delete_all_trades().await.map(Some);
        self.or_fallback("delete_all_trades", result, None)
    }

    // ---- snapshots ----

    pub async fn try_save_performance_snapshot(
        &self,
        stats: &PerformanceStats,
    ) -> PersistenceResult<Option<PerformanceSnapshot>> {
        let backend = self.backend()?;
        let snapshot = PerformanceSnapshot::from_stats(stats, now_millis());
        let rows = backend
            .insert(tables::PERFORMANCE_SNAPSHOTS, vec![to_row(&snapshot)?])
            .await?;
        decode_first(rows)
    }

    pub async fn save_performance_snapshot(
        &self,
        stats: &PerformanceStats,
    ) -> Option<PerformanceSnapshot> {
        let result = self.try_save_performance_snapshot(stats).await;
        self.or_fallback("save_performance_snapshot", result, None)
    }

    pub async fn try_save_winrate_snapshot(
        &self,
        stats: &WinrateStats,
    ) -> PersistenceResult<Option<WinrateSnapshot>> {
        let backend = self.backend()?;
        let snapshot = WinrateSnapshot::from_stats(stats, now_millis());
        let rows = backend
            .insert(tables::WINRATE_SNAPSHOTS, vec![to_row(&snapshot)?])
            .await?;
        decode_first(rows)
    }

    pub async fn save_winrate_snapshot(&self, stats: &WinrateStats) -> Option<WinrateSnapshot> {
        let result = self.try_save_winrate_snapshot(stats).await;
        self.or_fallback("save_winrate_snapshot", result, None)
    }

    pub async fn try_save_balance_snapshot(
        &self,
        usdt: f64,
        btc: f64,
        total_value_usdt: f64,
    ) -> PersistenceResult<Option<BalanceSnapshot>> {
        let backend = self.backend()?;
        let snapshot = BalanceSnapshot {
            id: None,
            timestamp: now_millis(),
            usdt,
            btc,
            total_value_usdt,
        };
        let rows = backend
            .insert(tables::BALANCE_SNAPSHOTS, vec![to_row(&snapshot)?])
            .await?;
        decode_first(rows)
    }

    pub async fn save_balance_snapshot(
        &self,
        usdt: f64,
        btc: f64,
        total_value_usdt: f64,
    ) -> Option<BalanceSnapshot> {
        let result = self.try_save_balance_snapshot(usdt, btc, total_value_usdt).await;
        self.or_fallback("save_balance_snapshot", result, None)
    }

    // ---- logs ----

    pub async fn try_save_log(
        &self,
        level: LogLevel,
        message: &str,
        data: Option<Value>,
    ) -> PersistenceResult<()> {
        let backend = self.backend()?;
        let entry = LogEntry {
            timestamp: now_millis(),
            level,
            message: message.to_string(),
            data,
        };
        backend.insert(tables::BOT_LOGS, vec![to_row(&entry)?]).await?;
        Ok(())
    }

    /// Fire-and-forget log write. Silent when no backend is configured.
    pub async fn save_log(&self, level: LogLevel, message: &str, data: Option<Value>) {
        if !self.is_configured() {
            self.stats.unconfigured.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let result = self.try_save_log(level, message, data).await;
        self.or_fallback("save_log", result, ());
    }

    // ---- current balance ----

    pub async fn try_get_current_balance(&self) -> PersistenceResult<Balance> {
        let backend = self.backend()?;
        let query = Query::new()
            .filter(Filter::eq("id", CURRENT_BALANCE_ID))
            .limit(1);
        let rows = backend.select(tables::CURRENT_BALANCE, &query).await?;

        match decode_first::<CurrentBalanceRow>(rows)? {
            Some(row) => Ok(Balance::from(&row)),
            None => {
                info!("No current balance row, initializing to {:?}", Balance::INITIAL);
                self.try_update_current_balance(Balance::INITIAL.usdt, Balance::INITIAL.btc)
                    .await?;
                Ok(Balance::INITIAL)
            }
        }
    }

    /// Current wallet holdings, creating the row with the initial balance if missing
    pub async fn get_current_balance(&self) -> Balance {
        let result = self.try_get_current_balance().await;
        self.or_fallback("get_current_balance", result, Balance::INITIAL)
    }

    pub async fn try_update_current_balance(
        &self,
        usdt: f64,
        btc: f64,
    ) -> PersistenceResult<Option<CurrentBalanceRow>> {
        let backend = self.backend()?;
        let row = CurrentBalanceRow {
            id: CURRENT_BALANCE_ID,
            usdt,
            btc,
            updated_at: Some(Utc::now().to_rfc3339()),
        };
        let rows = backend
            .upsert(tables::CURRENT_BALANCE, vec![to_row(&row)?])
            .await?;
        debug!(usdt, btc, "Updated current balance");
        decode_first(rows)
    }

    pub async fn update_current_balance(&self, usdt: f64, btc: f64) -> Option<CurrentBalanceRow> {
        let result = self.try_update_current_balance(usdt, btc).await;
        self.or_fallback("update_current_balance", result, None)
    }

    /// Force the balance row back to the initial holdings
    pub async fn reset_balance(&self) -> Option<CurrentBalanceRow> {
        let result = self
            .try_update_current_balance(Balance::INITIAL.usdt, Balance::INITIAL.btc)
            .await;
        if result.is_ok() {
            info!("Balance reset to {:?}", Balance::INITIAL);
        }
        self.or_fallback("reset_balance", result, None)
    }
}
