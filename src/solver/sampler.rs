use serde::{Deserialize, Serialize};

/// Sampler settings handed to the external solver.
///
/// Defaults raise `adapt_delta` and `max_treedepth` above the usual NUTS defaults (0.8 and 10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    pub chains: usize,
    pub iterations: usize, // per chain, warmup included
    pub warmup: usize,
    pub adapt_delta: f64,   // target acceptance rate
    pub max_treedepth: u32, // maximum tree depth of the NUTS recursion
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            iterations: 2000,
            warmup: 1000,
            adapt_delta: 0.99,
            max_treedepth: 15,
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Number of post-warmup draws each chain returns.
    #[inline] pub fn draws_per_chain(&self) -> usize { self.iterations.saturating_sub(self.warmup) }

    /// Describe the first invalid setting, if any.
    pub(crate) fn problem(&self) -> Option<String> {
        if self.chains == 0 {
            Some("sampler.chains must be at least 1".into())
        } else if self.iterations <= self.warmup {
            Some(format!("sampler.iterations ({}) must exceed sampler.warmup ({})", self.iterations, self.warmup))
        } else if !(self.adapt_delta > 0.0 && self.adapt_delta < 1.0) {
            Some(format!("sampler.adapt_delta ({}) must lie in (0, 1)", self.adapt_delta))
        } else if self.max_treedepth == 0 {
            Some("sampler.max_treedepth must be at least 1".into())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SamplerConfig::default();
        assert_eq!(config.problem(), None);
        assert_eq!(config.draws_per_chain(), 1000);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SamplerConfig = serde_json::from_str(r#"{ "chains": 2, "seed": 7 }"#).unwrap();
        assert_eq!(config.chains, 2);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.adapt_delta, 0.99);
    }

    #[test]
    fn invalid_settings_are_described() {
        let config = SamplerConfig { iterations: 500, warmup: 500, ..Default::default() };
        assert!(config.problem().unwrap().contains("must exceed"));

        let config = SamplerConfig { adapt_delta: 1.0, ..Default::default() };
        assert!(config.problem().unwrap().contains("adapt_delta"));
    }
}
