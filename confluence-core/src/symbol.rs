use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Interned trading-pair identifier, e.g. `"BTCUSDT"`.
///
/// Backed by [`SmolStr`] so short symbols (the overwhelming majority) never
/// touch the heap, mirroring how `jackbot-instrument` represents exchange
/// names.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct Symbol(SmolStr);

impl Symbol {
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(SmolStr::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_without_allocating_for_short_symbols() {
        let a = Symbol::from("BTCUSDT");
        let b = Symbol::from("BTCUSDT".to_string());
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "BTCUSDT");
    }
}
