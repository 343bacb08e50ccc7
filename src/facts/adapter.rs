//! Combines a true-fact provider with a falsifier behind a coin flip.

use std::sync::Arc;

use futures::future::BoxFuture;
use rand::Rng;
use tracing::debug;

use super::{Fact, FactError, FactSource, gemini::Falsifier, ninjas::TrueFactProvider};

/// Decides whether the next fact should be falsified.
pub trait CoinFlip: Send + Sync {
    fn fiction(&self) -> bool;
}

/// Coin backed by the thread-local RNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomCoin {
    probability: f64,
}

impl RandomCoin {
    /// `probability` is the chance of producing fiction, clamped to `[0, 1]`.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.5
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }
}

impl Default for RandomCoin {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl CoinFlip for RandomCoin {
    fn fiction(&self) -> bool {
        rand::rng().random_bool(self.probability)
    }
}

#[derive(Clone)]
pub struct FactAdapter {
    provider: Arc<dyn TrueFactProvider>,
    falsifier: Arc<dyn Falsifier>,
    coin: Arc<dyn CoinFlip>,
}

impl FactAdapter {
    pub fn new(provider: Arc<dyn TrueFactProvider>, falsifier: Arc<dyn Falsifier>) -> Self {
        Self {
            provider,
            falsifier,
            coin: Arc::new(RandomCoin::default()),
        }
    }

    pub fn with_coin(mut self, coin: Arc<dyn CoinFlip>) -> Self {
        self.coin = coin;
        self
    }

    async fn produce(&self) -> Result<Fact, FactError> {
        let true_fact = self.provider.true_fact().await?;

        if !self.coin.fiction() {
            return Ok(Fact::truth(true_fact));
        }

        let rewrite = self.falsifier.falsify(true_fact.clone()).await?;
        debug!(original = %true_fact, "falsified fact");
        Ok(Fact::fiction(rewrite, true_fact))
    }
}

impl FactSource for FactAdapter {
    fn fetch_fact(&self) -> BoxFuture<'static, Result<Fact, FactError>> {
        let adapter = self.clone();
        Box::pin(async move { adapter.produce().await })
    }
}
