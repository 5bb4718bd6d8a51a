use confluence_core::{CycleResult, CycleStatus, Symbol, SummaryReport, Totals};
use metrics::{counter, gauge, histogram};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::collections::HashMap;

const TOP_K: usize = 5;
const MIN_SUCCESS_RATE: f64 = 0.8;
const MAX_AVG_CYCLE_TIME_S: f64 = 5.0;
const MIN_WIN_RATE: f64 = 0.5;
const MAX_PEAK_MEMORY_MB: f64 = 1024.0;
const MAX_AVG_CPU_PCT: f64 = 80.0;

/// Folds a stream of [`CycleResult`] into totals, rankings and health
/// recommendations per §4.9, and exports the same data as `metrics` gauges
/// and counters for the prometheus scrape endpoint.
pub struct MetricsAggregator {
    totals: Totals,
    win_count: u64,
    cycle_time_sum_ms: u64,
    by_strategy_pnl: HashMap<SmolStr, Decimal>,
    by_symbol_pnl: HashMap<Symbol, Decimal>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            totals: Totals::default(),
            win_count: 0,
            cycle_time_sum_ms: 0,
            by_strategy_pnl: HashMap::new(),
            by_symbol_pnl: HashMap::new(),
        }
    }

    /// Fold one more `CycleResult` into the running aggregate and publish
    /// it to the metrics facade. Order-independent by design: callers may
    /// feed results from multiple workers in any order.
    pub fn record(&mut self, result: &CycleResult) {
        self.totals.cycles += 1;
        self.cycle_time_sum_ms += result.execution_time_ms;

        let symbol_label = result.symbol.as_str().to_string();
        let timeframe_label = result.timeframe.to_string();

        counter!(
            "execution_cycles_total",
            "symbol" => symbol_label.clone(),
            "timeframe" => timeframe_label.clone(),
        )
        .increment(1);
        histogram!(
            "execution_cycle_time_seconds",
            "symbol" => symbol_label.clone(),
            "timeframe" => timeframe_label.clone(),
        )
        .record(result.execution_time_ms as f64 / 1000.0);

        match result.status {
            CycleStatus::Success => {
                self.totals.success += 1;
                self.totals.pnl += result.pnl;
                self.totals.trades += result.trades_count as u64;
                if result.win_rate >= MIN_WIN_RATE {
                    self.win_count += 1;
                }
                *self.by_strategy_pnl.entry(result.strategy_id.clone()).or_default() += result.pnl;
                *self.by_symbol_pnl.entry(result.symbol.clone()).or_default() += result.pnl;

                gauge!(
                    "execution_pnl",
                    "symbol" => symbol_label.clone(),
                    "timeframe" => timeframe_label.clone(),
                )
                .set(result.pnl.try_into().unwrap_or(0.0));
                counter!(
                    "execution_trades_total",
                    "symbol" => symbol_label,
                    "timeframe" => timeframe_label,
                )
                .increment(result.trades_count as u64);
            }
            CycleStatus::Failed => {
                self.totals.fail += 1;
                counter!(
                    "execution_cycle_errors_total",
                    "symbol" => symbol_label,
                    "timeframe" => timeframe_label,
                )
                .increment(1);
            }
        }
    }

    fn top_strategies(&self) -> Vec<(SmolStr, Decimal)> {
        let mut ranked: Vec<_> = self.by_strategy_pnl.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(TOP_K);
        ranked
    }

    fn best_worst_by_symbol(&self) -> (Vec<(Symbol, Decimal)>, Vec<(Symbol, Decimal)>) {
        let mut ranked: Vec<_> = self.by_symbol_pnl.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let best = ranked.iter().take(TOP_K).cloned().collect();
        let mut worst = ranked;
        worst.sort_by(|a, b| a.1.cmp(&b.1));
        worst.truncate(TOP_K);
        (best, worst)
    }

    fn win_rate(&self) -> f64 {
        if self.totals.success == 0 {
            return 0.0;
        }
        self.win_count as f64 / self.totals.success as f64
    }

    fn avg_cycle_time_s(&self) -> f64 {
        if self.totals.cycles == 0 {
            return 0.0;
        }
        (self.cycle_time_sum_ms as f64 / self.totals.cycles as f64) / 1000.0
    }

    fn success_rate(&self) -> f64 {
        if self.totals.cycles == 0 {
            return 1.0;
        }
        self.totals.success as f64 / self.totals.cycles as f64
    }

    /// Thresholds from §4.9. `peak_rss_mb`/`avg_cpu_pct` come from the most
    /// recent `ExecutionSummary`, since resource sampling belongs to C6.
    fn recommendations(&self, peak_rss_mb: f64, avg_cpu_pct: f64) -> Vec<String> {
        let mut out = Vec::new();
        if self.success_rate() < MIN_SUCCESS_RATE {
            out.push(format!(
                "cycle success rate {:.1}% is below the {:.0}% target; inspect recent failures",
                self.success_rate() * 100.0,
                MIN_SUCCESS_RATE * 100.0
            ));
        }
        if self.avg_cycle_time_s() > MAX_AVG_CYCLE_TIME_S {
            out.push(format!(
                "average cycle time {:.2}s exceeds {:.0}s; consider reducing max_workers contention or evaluator cost",
                self.avg_cycle_time_s(),
                MAX_AVG_CYCLE_TIME_S
            ));
        }
        if self.win_rate() < MIN_WIN_RATE {
            out.push(format!(
                "win rate {:.1}% is below {:.0}%; review strategy parameters",
                self.win_rate() * 100.0,
                MIN_WIN_RATE * 100.0
            ));
        }
        if self.totals.pnl < Decimal::ZERO {
            out.push("total PnL is negative across the recorded cycles".to_string());
        }
        if peak_rss_mb > MAX_PEAK_MEMORY_MB {
            out.push(format!(
                "peak memory {:.0}MB exceeds {:.0}MB; check for leaking caches",
                peak_rss_mb, MAX_PEAK_MEMORY_MB
            ));
        }
        if avg_cpu_pct > MAX_AVG_CPU_PCT {
            out.push(format!(
                "average CPU {:.1}% exceeds {:.0}%; consider lowering max_workers",
                avg_cpu_pct, MAX_AVG_CPU_PCT
            ));
        }
        out
    }

    pub fn summary(&self, peak_rss_mb: f64, avg_cpu_pct: f64) -> SummaryReport {
        let (best_by_symbol, worst_by_symbol) = self.best_worst_by_symbol();
        SummaryReport {
            totals: self.totals,
            top_strategies: self.top_strategies(),
            best_by_symbol,
            worst_by_symbol,
            win_rate: self.win_rate(),
            recommendations: self.recommendations(peak_rss_mb, avg_cpu_pct),
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_core::Timeframe;
    use rust_decimal_macros::dec;

    fn result(symbol: &str, strategy_id: &str, pnl: Decimal, status: CycleStatus, win_rate: f64) -> CycleResult {
        CycleResult {
            cycle_id: "c".into(),
            symbol: Symbol::from(symbol),
            timeframe: Timeframe::H1,
            execution_time_ms: 100,
            pnl,
            trades_count: 1,
            win_rate,
            strategy_id: strategy_id.into(),
            status,
            error_msg: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn totals_accumulate_across_results() {
        let mut agg = MetricsAggregator::new();
        agg.record(&result("BTCUSDT", "s1", dec!(10), CycleStatus::Success, 1.0));
        agg.record(&result("ETHUSDT", "s1", dec!(-5), CycleStatus::Success, 0.0));
        agg.record(&result("BTCUSDT", "s1", dec!(0), CycleStatus::Failed, 0.0));

        let report = agg.summary(0.0, 0.0);
        assert_eq!(report.totals.cycles, 3);
        assert_eq!(report.totals.success, 2);
        assert_eq!(report.totals.fail, 1);
        assert_eq!(report.totals.pnl, dec!(5));
    }

    #[test]
    fn recommends_on_negative_total_pnl() {
        let mut agg = MetricsAggregator::new();
        agg.record(&result("BTCUSDT", "s1", dec!(-100), CycleStatus::Success, 0.0));
        let report = agg.summary(0.0, 0.0);
        assert!(report.recommendations.iter().any(|r| r.contains("negative")));
    }

    #[test]
    fn recommends_on_high_peak_memory() {
        let agg = MetricsAggregator::new();
        let report = agg.summary(2048.0, 0.0);
        assert!(report.recommendations.iter().any(|r| r.contains("memory")));
    }

    #[test]
    fn best_and_worst_by_symbol_are_ranked() {
        let mut agg = MetricsAggregator::new();
        agg.record(&result("BTCUSDT", "s1", dec!(50), CycleStatus::Success, 1.0));
        agg.record(&result("ETHUSDT", "s1", dec!(-50), CycleStatus::Success, 0.0));
        let report = agg.summary(0.0, 0.0);
        assert_eq!(report.best_by_symbol[0].0, Symbol::from("BTCUSDT"));
        assert_eq!(report.worst_by_symbol[0].0, Symbol::from("ETHUSDT"));
    }
}
