use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{GuideError, Result};
use crate::models::{
    AdvisorContext, CalendarCategory, CalendarEvent, CalendarResponse, ChatMessage, DailyForecast,
    DeepProfile, Profile, QuickProfile, YearMonth,
};
use crate::prompts::{self, Clock, SystemClock};
use crate::routing::{Operation, RoutingTable, with_fallback};
use crate::schema::Shape;
use crate::transport::{GeminiTransport, GenerateRequest, Transport};

/// Shown in place of an advisor reply that came back without text
pub const ADVISOR_EMPTY_REPLY: &str = "Связь со звездами нестабильна. Повторите позже.";

/// Builds requests for the five content operations and sends them through
/// the routing table's fallback policy.
pub struct RequestGateway {
    tx: Arc<dyn Transport>,
    routes: RoutingTable,
    clock: Arc<dyn Clock>,
}

impl RequestGateway {
    pub fn new(tx: Arc<dyn Transport>, routes: RoutingTable, clock: Arc<dyn Clock>) -> Self {
        Self { tx, routes, clock }
    }

    /// Gateway over the Gemini REST transport with the system clock
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(GeminiTransport::new(config.clone())),
            RoutingTable::from_config(config),
            Arc::new(SystemClock),
        )
    }

    pub async fn request_quick_profile(&self, profile: &Profile) -> Result<QuickProfile> {
        profile.validate()?;
        self.generate_structured(
            Operation::QuickProfile,
            prompts::quick_profile(profile),
            &Shape::quick_profile(),
        )
        .await
    }

    pub async fn request_deep_profile(&self, profile: &Profile) -> Result<DeepProfile> {
        profile.validate()?;
        self.generate_structured(
            Operation::DeepProfile,
            prompts::deep_profile(profile, self.clock.today()),
            &Shape::deep_profile(),
        )
        .await
    }

    pub async fn request_daily_forecast(
        &self,
        profile: &Profile,
        date: NaiveDate,
    ) -> Result<DailyForecast> {
        profile.validate()?;
        self.generate_structured(
            Operation::DailyForecast,
            prompts::daily_forecast(profile, date),
            &Shape::daily_forecast(),
        )
        .await
    }

    pub async fn request_calendar(
        &self,
        profile: &Profile,
        category: &CalendarCategory,
        month: YearMonth,
    ) -> Result<Vec<CalendarEvent>> {
        profile.validate()?;
        let response: CalendarResponse = self
            .generate_structured(
                Operation::Calendar,
                prompts::calendar(profile, category, month),
                &Shape::calendar(),
            )
            .await?;
        Ok(response.events)
    }

    /// Free-text advisor turn. `history` holds the turns before `new_message`.
    pub async fn request_advisor_reply(
        &self,
        history: &[ChatMessage],
        new_message: &str,
        context: &AdvisorContext,
    ) -> Result<String> {
        let op = Operation::AdvisorReply;
        let prompt = prompts::advisor_transcript(history, new_message, context)?;
        let instruction = prompts::advisor_instruction(self.clock.today());

        let text = self.generate_text(op, prompt, instruction, None).await?;
        match text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => {
                tracing::warn!(operation = %op, "Advisor returned no text");
                Ok(ADVISOR_EMPTY_REPLY.to_string())
            }
        }
    }

    async fn generate_structured<T: DeserializeOwned>(
        &self,
        op: Operation,
        prompt: String,
        shape: &Shape,
    ) -> Result<T> {
        let instruction = prompts::system_instruction(self.clock.today());
        let text = self
            .generate_text(op, prompt, instruction, Some(shape.to_schema()))
            .await?
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GuideError::EmptyResult {
                operation: op.to_string(),
            })?;

        let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            GuideError::Provider(format!("Failed to parse {op} reply as JSON: {e}"))
        })?;
        shape.validate(&value)?;
        serde_json::from_value(value).map_err(|e| {
            GuideError::Provider(format!("Failed to deserialize {op} reply: {e}"))
        })
    }

    async fn generate_text(
        &self,
        op: Operation,
        prompt: String,
        system_instruction: String,
        response_schema: Option<serde_json::Value>,
    ) -> Result<Option<String>> {
        let route = self.routes.route(op);
        let request = GenerateRequest {
            model: route.primary.clone(),
            prompt,
            system_instruction,
            response_schema,
            temperature: op.temperature(),
        };

        let response = with_fallback(op, &route, |model| {
            let req = GenerateRequest {
                model,
                ..request.clone()
            };
            async move {
                tracing::info!(operation = %op, model = %req.model, "Requesting content");
                self.tx.generate(&req).await
            }
        })
        .await?;

        tracing::debug!(operation = %op, model = %response.model, "Content received");
        Ok(response.text)
    }
}
