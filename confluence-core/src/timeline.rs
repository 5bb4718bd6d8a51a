use crate::{bar::OHLCVBar, symbol::Symbol, timeframe::Timeframe};
use serde::{Deserialize, Serialize};

/// Ordered, deduplicated intersection of per-symbol timestamp sets for a
/// fixed timeframe, produced by `SymbolSynchronizer` once per sync session.
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MasterTimeline {
    pub timeframe: Timeframe,
    pub timestamps: Vec<i64>,
    pub start: i64,
    pub end: i64,
    pub total_periods: usize,
    /// Sync quality in `[0, 100]`, rounded to the nearest integer for display.
    pub sync_quality: f64,
}

impl MasterTimeline {
    /// Build from an already sorted, deduplicated, strictly increasing
    /// sequence of intersection timestamps.
    pub fn new(timeframe: Timeframe, timestamps: Vec<i64>, sync_quality: f64) -> Self {
        let start = timestamps.first().copied().unwrap_or_default();
        let end = timestamps.last().copied().unwrap_or_default();
        let total_periods = timestamps.len();
        Self {
            timeframe,
            timestamps,
            start,
            end,
            total_periods,
            sync_quality: sync_quality.clamp(0.0, 100.0),
        }
    }

    pub fn is_strictly_increasing(&self) -> bool {
        self.timestamps.windows(2).all(|w| w[0] < w[1])
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Per-`(symbol, timeframe)` subset of raw bars whose timestamps fall in the
/// current [`MasterTimeline`]. Invariant: `len(aligned) <= len(raw)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlignedSeries {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub bars: Vec<OHLCVBar>,
}

impl AlignedSeries {
    /// Build an [`AlignedSeries`] by index-filtering `raw` to the timestamps
    /// present in `timeline`. `raw` must already be sorted ascending by
    /// timestamp (guaranteed by `TimeSeriesStore::range`).
    pub fn align(symbol: Symbol, timeline: &MasterTimeline, raw: &[OHLCVBar]) -> Self {
        let mut bars = Vec::with_capacity(timeline.len());
        let mut raw_iter = raw.iter().peekable();
        for &ts in &timeline.timestamps {
            while let Some(bar) = raw_iter.peek() {
                if bar.timestamp_ms < ts {
                    raw_iter.next();
                } else {
                    break;
                }
            }
            if let Some(bar) = raw_iter.peek() {
                if bar.timestamp_ms == ts {
                    bars.push(**bar);
                }
            }
        }
        Self {
            symbol,
            timeframe: timeline.timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(ts: i64) -> OHLCVBar {
        OHLCVBar::new(ts, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)).unwrap()
    }

    #[test]
    fn align_keeps_only_timeline_timestamps() {
        let timeline = MasterTimeline::new(Timeframe::H1, vec![1, 2, 3], 90.0);
        let raw = vec![bar(0), bar(1), bar(2), bar(3), bar(4)];
        let aligned = AlignedSeries::align(Symbol::from("BTCUSDT"), &timeline, &raw);
        assert_eq!(aligned.len(), 3);
        assert_eq!(
            aligned.bars.iter().map(|b| b.timestamp_ms).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn align_is_idempotent() {
        let timeline = MasterTimeline::new(Timeframe::H1, vec![1, 2, 3], 90.0);
        let raw = vec![bar(1), bar(2), bar(3)];
        let once = AlignedSeries::align(Symbol::from("BTCUSDT"), &timeline, &raw);
        let twice = AlignedSeries::align(Symbol::from("BTCUSDT"), &timeline, &once.bars);
        assert_eq!(once, twice);
    }

    #[test]
    fn timeline_strictly_increasing_check() {
        let ok = MasterTimeline::new(Timeframe::H1, vec![1, 2, 3], 90.0);
        assert!(ok.is_strictly_increasing());
        let bad = MasterTimeline::new(Timeframe::H1, vec![1, 1, 3], 90.0);
        assert!(!bad.is_strictly_increasing());
    }
}
