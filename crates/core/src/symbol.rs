//! Symbol normalization.
//!
//! Order flow arrives with venue-specific spellings of the same instrument
//! (`BTCUSDT.P`, `BTC/USDT:USDT`, `BTC-USDT-SWAP`). Constraint lookups are keyed
//! by the bare concatenated pair, so every spelling is reduced to that form.
//! Callers keep the original string for correlation; only lookups use the
//! normalized key.

const BUILTIN_SUFFIXES: &[&str] = &[".P", "-PERP", "_PERP", "-SWAP", "_SWAP", "PERP"];
const SEPARATORS: &[char] = &['/', '-', '_'];

#[derive(Debug, Clone, Default)]
pub struct SymbolNormalizer {
    extra_suffixes: Vec<String>,
}

impl SymbolNormalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds venue-specific suffixes on top of the built-in set.
    #[must_use]
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_suffixes.extend(
            suffixes
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty()),
        );
        self
    }

    /// Returns the lookup key for `symbol`.
    ///
    /// # Examples
    /// ```
    /// use quantgate_core::SymbolNormalizer;
    ///
    /// let n = SymbolNormalizer::new();
    /// assert_eq!(n.normalize("BTCUSDT.P"), "BTCUSDT");
    /// assert_eq!(n.normalize("eth/usdt:usdt"), "ETHUSDT");
    /// assert_eq!(n.normalize("SOL-USDT-SWAP"), "SOLUSDT");
    /// ```
    #[must_use]
    pub fn normalize(&self, symbol: &str) -> String {
        let mut key = symbol.trim().to_uppercase();

        // ccxt-style settlement marker: BASE/QUOTE:SETTLE
        if let Some(idx) = key.find(':') {
            key.truncate(idx);
        }

        loop {
            let stripped = self
                .extra_suffixes
                .iter()
                .map(String::as_str)
                .chain(BUILTIN_SUFFIXES.iter().copied())
                .find(|suffix| key.len() > suffix.len() && key.ends_with(suffix));
            match stripped {
                Some(suffix) => key.truncate(key.len() - suffix.len()),
                None => break,
            }
        }

        key.retain(|c| !SEPARATORS.contains(&c));
        key
    }
}
