use std::sync::LazyLock;

use tiktoken_rs::CoreBPE;

static CL100K: LazyLock<CoreBPE> =
    LazyLock::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base ranks are bundled with tiktoken-rs"));

/// Text to token-count estimation
pub trait TokenEstimator: Send + Sync + std::fmt::Debug {
    fn estimate(&self, text: &str) -> usize;
}

/// Estimator backed by the `cl100k_base` encoding used by the GPT-3.5/4 chat models
#[derive(Debug, Clone, Copy, Default)]
pub struct Cl100kEstimator;

impl TokenEstimator for Cl100kEstimator {
    fn estimate(&self, text: &str) -> usize {
        CL100K.encode_with_special_tokens(text).len()
    }
}
