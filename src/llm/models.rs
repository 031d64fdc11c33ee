//! Model pricing
//!
//! Per-1K-token prices used to estimate the cost of a completion.

use regex::Regex;
use std::sync::LazyLock;

use crate::llm::traits::TokenUsage;

/// Price per 1K tokens in USD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

const PRICING: &[(&str, ModelPricing)] = &[
    ("gpt-4-1106-preview", ModelPricing { input: 0.01, output: 0.03 }),
    ("gpt-4", ModelPricing { input: 0.03, output: 0.06 }),
    ("gpt-4-32k", ModelPricing { input: 0.06, output: 0.12 }),
    ("gpt-3.5-turbo", ModelPricing { input: 0.0015, output: 0.002 }),
    ("gpt-3.5-turbo-16k", ModelPricing { input: 0.003, output: 0.004 }),
    ("claude-2", ModelPricing { input: 0.008, output: 0.024 }),
    ("claude-3-haiku", ModelPricing { input: 0.00025, output: 0.00125 }),
    ("claude-3-sonnet", ModelPricing { input: 0.003, output: 0.015 }),
    ("claude-3-opus", ModelPricing { input: 0.015, output: 0.075 }),
];

// Snapshot suffixes: `gpt-4-0613`, `claude-3-haiku-20240307`
static DATED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d{4}|\d{8})$").expect("static regex"));

/// Model name with any dated snapshot suffix removed
pub fn model_base(model: &str) -> &str {
    match DATED_SUFFIX.find(model) {
        Some(m) => &model[..m.start()],
        None => model,
    }
}

/// Find the pricing entry for a model
pub fn find_pricing(model: &str) -> Option<ModelPricing> {
    let base = model_base(model);
    PRICING
        .iter()
        .find(|(name, _)| *name == base)
        .map(|(_, pricing)| *pricing)
}

/// Estimate the cost of a completion; `NaN` when usage or pricing is unknown
pub fn estimate_cost(model: &str, usage: Option<TokenUsage>) -> f64 {
    match (usage, find_pricing(model)) {
        (Some(usage), Some(pricing)) => {
            f64::from(usage.prompt_tokens) / 1000.0 * pricing.input
                + f64::from(usage.completion_tokens) / 1000.0 * pricing.output
        }
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_base() {
        assert_eq!(model_base("gpt-4-0613"), "gpt-4");
        assert_eq!(model_base("claude-3-haiku-20240307"), "claude-3-haiku");
        assert_eq!(model_base("gpt-4-1106-preview"), "gpt-4-1106-preview");
    }

    #[test]
    fn test_estimate_cost() {
        let usage = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
        };
        let cost = estimate_cost("gpt-4-0613", Some(usage));
        assert!((cost - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_cost_is_nan() {
        let usage = TokenUsage::default();
        assert!(estimate_cost("llama-3", Some(usage)).is_nan());
        assert!(estimate_cost("gpt-4", None).is_nan());
    }
}
