//! Shared test data and a scripted transport.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{GuideError, Result};
use crate::models::{Gender, Profile};
use crate::prompts::Clock;
use crate::transport::{GenerateRequest, GenerateResponse, Transport};

pub fn anna() -> Profile {
    Profile {
        name: "Анна".to_string(),
        maiden_name: None,
        birth_date: "1990-05-14".to_string(),
        birth_time: "08:30".to_string(),
        birth_place: "Москва".to_string(),
        current_city: "Москва".to_string(),
        gender: Gender::Female,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub fn quick_profile_json() -> Value {
    json!({
        "natalChart": {
            "sunSign": "Телец",
            "moonSign": "Водолей",
            "ascendant": "Рак",
            "planets": [
                {"planet": "Солнце", "sign": "Телец", "house": 11, "degree": 23, "retrograde": false,
                 "logic": "14 мая Солнце проходит третью декаду Тельца"},
                {"planet": "Луна", "sign": "Водолей", "house": 8, "degree": 2, "retrograde": false},
                {"planet": "Сатурн", "sign": "Козерог", "house": 7, "degree": 24, "retrograde": true}
            ],
            "summary": "Устойчивая, практичная натура с сильной интуицией.",
            "progressScales": {
                "missing": [{"label": "Гибкость", "value": 30, "color": "#f87171"}],
                "excess": [{"label": "Упрямство", "value": 80, "color": "#fbbf24"}],
                "workOn": [],
                "focusOn": [{"label": "Творчество", "value": 65, "color": "#a78bfa"}]
            },
            "elements": {"fire": 1, "earth": 4, "air": 3, "water": 2},
            "calculationLogic": "Асцендент определён по времени 08:30 для широты Москвы."
        },
        "numerology": {
            "lifePath": 1,
            "destinyNumber": 5,
            "soulNumber": 7,
            "matrixDescription": "Лидер, ищущий свободу."
        },
        "artifacts": {
            "stones": ["изумруд", "агат"],
            "activityField": "архитектура",
            "sports": ["плавание"],
            "hobbies": ["керамика"],
            "bestCity": "Санкт-Петербург"
        }
    })
}

pub fn daily_forecast_json(date: &str) -> Value {
    json!({
        "date": date,
        "lunarPhase": "Растущая Луна",
        "lunarDay": 9,
        "moonPhaseDescription": "Растущая",
        "mood": "собранное",
        "energyScale": {"value": 64, "difficulty": "средний", "description": "Ровный день."},
        "warnings": [{"type": "conflict", "title": "Споры", "advice": "Не спорьте с начальством."}],
        "recommendations": {
            "career": "Завершайте начатое.",
            "love": "Больше внимания близким.",
            "health": "Прогулка вечером.",
            "spirituality": "Медитация.",
            "haircut": "Неблагоприятно.",
            "sports": "Йога.",
            "nutrition": "Лёгкая пища.",
            "activity": "Планирование.",
            "communication": "Слушайте больше."
        },
        "justification": "Луна в Деве гармонизирует Солнце в Тельце."
    })
}

pub fn deep_profile_json(year: i32) -> Value {
    let months: Vec<Value> = (1..=12)
        .map(|i| json!({"month": format!("Месяц {i} {year}"), "prediction": "Стабильность."}))
        .collect();
    json!({
        "fatefulMoments": [
            {"period": format!("Весна {year}"), "event": "Переезд", "description": "Смена места.", "type": "career"},
            {"period": format!("Лето {year}"), "event": "Встреча", "description": "Новые связи.", "type": "love"},
            {"period": format!("Осень {year}"), "event": "Обучение", "description": "Рост.", "type": "spiritual"}
        ],
        "yearlyForecast": months
    })
}

pub fn calendar_json(days: &[&str]) -> Value {
    let events: Vec<Value> = days
        .iter()
        .enumerate()
        .map(|(i, day)| {
            json!({
                "date": day,
                "status": if i % 2 == 0 { "favorable" } else { "unfavorable" },
                "comment": "Лунный день."
            })
        })
        .collect();
    json!({ "events": events })
}

/// What the scripted transport answers for one call
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Empty,
    Unavailable,
    Failure(String),
    /// Never answers
    Pending,
}

impl Reply {
    pub fn json(value: Value) -> Self {
        Reply::Text(value.to_string())
    }
}

/// Transport answering from per-model queues and recording every request
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, model: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.model).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        self.requests
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .push(req.clone());

        let reply = self
            .replies
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .get_mut(&req.model)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(Reply::Text(text)) => Ok(GenerateResponse {
                model: req.model.clone(),
                text: Some(text),
            }),
            Some(Reply::Empty) => Ok(GenerateResponse {
                model: req.model.clone(),
                text: None,
            }),
            Some(Reply::Unavailable) => Err(GuideError::ProviderUnavailable {
                model: req.model.clone(),
                message: "The model is overloaded. Please try again later.".to_string(),
            }),
            Some(Reply::Failure(message)) => Err(GuideError::Provider(message)),
            Some(Reply::Pending) => std::future::pending().await,
            None => Err(GuideError::Provider(format!(
                "No more mock responses for {}",
                req.model
            ))),
        }
    }
}
