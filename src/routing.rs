//! Operation → model routing and the single fallback substitution.

use std::fmt;
use std::future::Future;

use crate::config::{Config, TierModels};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    QuickProfile,
    DeepProfile,
    DailyForecast,
    Calendar,
    AdvisorReply,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::QuickProfile,
        Operation::DeepProfile,
        Operation::DailyForecast,
        Operation::Calendar,
        Operation::AdvisorReply,
    ];

    pub fn tier(self) -> ModelTier {
        match self {
            Operation::QuickProfile | Operation::DeepProfile => ModelTier::Pro,
            Operation::DailyForecast | Operation::Calendar | Operation::AdvisorReply => {
                ModelTier::Fast
            }
        }
    }

    pub fn temperature(self) -> f32 {
        match self {
            Operation::QuickProfile => 0.2,
            Operation::DeepProfile | Operation::Calendar => 0.3,
            Operation::DailyForecast => 0.4,
            Operation::AdvisorReply => 0.6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::QuickProfile => "quick_profile",
            Operation::DeepProfile => "deep_profile",
            Operation::DailyForecast => "daily_forecast",
            Operation::Calendar => "calendar",
            Operation::AdvisorReply => "advisor_reply",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    Pro,
    Fast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    pub tier: ModelTier,
    pub primary: String,
    pub fallback: String,
}

/// Resolved route for every operation
#[derive(Debug, Clone)]
pub struct RoutingTable {
    pro: TierModels,
    fast: TierModels,
}

impl RoutingTable {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pro: config.gemini.pro.clone(),
            fast: config.gemini.fast.clone(),
        }
    }

    pub fn route(&self, op: Operation) -> ModelRoute {
        let tier = op.tier();
        let models = match tier {
            ModelTier::Pro => &self.pro,
            ModelTier::Fast => &self.fast,
        };
        ModelRoute {
            tier,
            primary: models.primary.clone(),
            fallback: models.fallback.clone(),
        }
    }
}

/// Run `call` against the primary model; if that fails because the model is
/// overloaded, run it once more against the fallback. Any other failure, and
/// whatever the fallback returns, is passed through unchanged.
pub async fn with_fallback<T, F, Fut>(op: Operation, route: &ModelRoute, call: F) -> Result<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match call(route.primary.clone()).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            tracing::warn!(
                operation = %op,
                primary = %route.primary,
                fallback = %route.fallback,
                "Primary model unavailable ({}), retrying with fallback model",
                e
            );
            call(route.fallback.clone()).await
        }
        Err(e) => Err(e),
    }
}
