use serde::{Serialize, Deserialize};

/// Token counts reported for one model invocation.
///
/// `prompt_tokens` is the freshly computed prompt portion. Providers with
/// prompt caching report tokens written to / read from their cache separately.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cache_creation_tokens: u32,
    pub cache_read_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            ..Self::default()
        }
    }

    pub fn with_cache(mut self, creation: u32, read: u32) -> Self {
        self.cache_creation_tokens = creation;
        self.cache_read_tokens = read;
        self
    }

    pub fn has_cache_activity(&self) -> bool {
        self.cache_creation_tokens > 0 || self.cache_read_tokens > 0
    }

    /// Prompt tokens after the cache-billing adjustment:
    /// `base + floor(creation * write) + floor(read * read_multiplier)`.
    pub fn billed_prompt_tokens(&self, billing: &CacheBilling) -> u32 {
        if !self.has_cache_activity() {
            return self.prompt_tokens;
        }
        let creation = (f64::from(self.cache_creation_tokens) * billing.write_multiplier).floor();
        let read = (f64::from(self.cache_read_tokens) * billing.read_multiplier).floor();
        self.prompt_tokens + creation as u32 + read as u32
    }
}

/// Multipliers applied to cache-written and cache-read prompt tokens.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CacheBilling {
    pub write_multiplier: f64,
    pub read_multiplier: f64,
}

impl CacheBilling {
    pub const WRITE_MULTIPLIER: f64 = 1.25;
    pub const READ_MULTIPLIER: f64 = 0.1;
}

impl Default for CacheBilling {
    fn default() -> Self {
        Self {
            write_multiplier: Self::WRITE_MULTIPLIER,
            read_multiplier: Self::READ_MULTIPLIER,
        }
    }
}

/// Per-million-token prices for a model.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub currency: String,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.0,
            output_per_million: 0.0,
            currency: "USD".to_string(),
        }
    }
}

impl ModelPricing {
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (f64::from(prompt_tokens) * self.input_per_million
            + f64::from(completion_tokens) * self.output_per_million)
            / 1_000_000.0
    }
}

/// Aggregate usage of one agent run.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct UsageReport {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub total_price: f64,
    pub currency: String,
    /// Number of model invocations folded into this report.
    pub invocations: u32,
}

/// Running totals across every model invocation of a run. Updated once per
/// invocation, never per chunk.
#[derive(Debug, Clone, Default)]
pub struct UsageAccumulator {
    billing: CacheBilling,
    pricing: ModelPricing,
    report: UsageReport,
}

impl UsageAccumulator {
    pub fn new(billing: CacheBilling, pricing: ModelPricing) -> Self {
        let report = UsageReport {
            currency: pricing.currency.clone(),
            ..UsageReport::default()
        };
        Self { billing, pricing, report }
    }

    /// Fold one invocation's usage in and return the price of that invocation.
    pub fn add(&mut self, usage: &TokenUsage) -> f64 {
        let prompt = usage.billed_prompt_tokens(&self.billing);
        let completion = usage.completion_tokens;
        let price = self.pricing.cost(prompt, completion);

        self.report.prompt_tokens += u64::from(prompt);
        self.report.completion_tokens += u64::from(completion);
        self.report.total_tokens += u64::from(prompt) + u64::from(completion);
        self.report.total_price += price;
        self.report.invocations += 1;
        price
    }

    pub fn currency(&self) -> &str {
        &self.pricing.currency
    }

    pub fn report(&self) -> UsageReport {
        self.report.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_creation_is_billed_at_write_multiplier() {
        let usage = TokenUsage::new(100, 0).with_cache(40, 0);
        assert_eq!(usage.billed_prompt_tokens(&CacheBilling::default()), 150);
    }

    #[test]
    fn cache_reads_are_billed_at_read_multiplier() {
        let usage = TokenUsage::new(100, 0).with_cache(0, 1000);
        assert_eq!(usage.billed_prompt_tokens(&CacheBilling::default()), 200);
    }

    #[test]
    fn adjustment_floors_fractional_tokens() {
        // 3 * 1.25 = 3.75, 7 * 0.1 = 0.7
        let usage = TokenUsage::new(10, 0).with_cache(3, 7);
        assert_eq!(usage.billed_prompt_tokens(&CacheBilling::default()), 13);
    }

    #[test]
    fn no_cache_activity_keeps_raw_count() {
        let usage = TokenUsage::new(321, 5);
        assert_eq!(usage.billed_prompt_tokens(&CacheBilling::default()), 321);
    }

    #[test]
    fn accumulator_totals_are_monotonic() {
        let pricing = ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
            currency: "USD".into(),
        };
        let mut acc = UsageAccumulator::new(CacheBilling::default(), pricing);
        let deltas = [
            TokenUsage::new(1_000, 200),
            TokenUsage::new(0, 0),
            TokenUsage::new(500, 50).with_cache(400, 0),
        ];
        let mut previous = acc.report();
        for delta in &deltas {
            acc.add(delta);
            let current = acc.report();
            assert!(current.total_tokens >= previous.total_tokens);
            assert!(current.total_price >= previous.total_price);
            previous = current;
        }
        let report = acc.report();
        assert_eq!(report.invocations, 3);
        assert_eq!(report.prompt_tokens, 1_000 + 500 + 500);
        assert_eq!(report.completion_tokens, 250);
        assert_eq!(report.currency, "USD");
        let expected = (2_000.0 * 3.0 + 250.0 * 15.0) / 1_000_000.0;
        assert!((report.total_price - expected).abs() < 1e-12);
    }
}
