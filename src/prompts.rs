use chrono::{Datelike, NaiveDate};

use crate::error::Result;
use crate::models::{AdvisorContext, CalendarCategory, ChatMessage, ChatRole, Profile, YearMonth};

/// Source of "today" for prompts that anchor to the current date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

const MONTHS_RU: [&str; 12] = [
    "Январь", "Февраль", "Март", "Апрель", "Май", "Июнь", "Июль", "Август", "Сентябрь",
    "Октябрь", "Ноябрь", "Декабрь",
];

pub fn month_name(month: u32) -> &'static str {
    MONTHS_RU[(month.clamp(1, 12) - 1) as usize]
}

/// Persona and grounding rules shared by every operation
pub fn system_instruction(today: NaiveDate) -> String {
    format!(
        "Ты - опытный эзотерический и астрологический помощник. Текущая дата: {}. Текущий год: {}. \
При расчёте натальной карты СТРОГО учитывай точное время и место рождения пользователя, используя \
астрономические правила, а не приблизительные оценки, чтобы верно определить асцендент и знак Луны \
на переходных датах. Камни, сферу деятельности, спорт, хобби и лучший город для жизни подбирай по силе \
планет. Отвечай строго в запрошенном JSON формате, без лишнего текста. Заполняй все поля.",
        today.format("%d.%m.%Y"),
        today.year()
    )
}

const ADVISOR_PERSONA: &str = "Ты - Небесный Проводник. Говоришь прямо, без загадок и лишних слов, \
не выходишь за рамки роли. Даёшь точные советы и чёткие рекомендации, опираясь СТРОГО на системный \
контекст данных пользователя (натальную карту, нумерологию, прогноз на день). Отвечай максимально \
персонально и уточняй детали, если их не хватает.";

pub fn advisor_instruction(today: NaiveDate) -> String {
    format!("{ADVISOR_PERSONA}\n\n{}", system_instruction(today))
}

fn birth_line(profile: &Profile) -> String {
    format!(
        "{}, рожд. {} в {}, город: {}",
        profile.name, profile.birth_date, profile.birth_time, profile.birth_place
    )
}

pub fn quick_profile(profile: &Profile) -> String {
    format!(
        "Рассчитай точную натальную карту, нумерологическое ядро и камни силы для: {}. \
В нумерологии рассчитай Число Жизненного Пути, Число Судьбы и Число Души. \
Камни, сферу деятельности, спорт, хобби и лучший город для жизни подбери по анализу планет.",
        birth_line(profile)
    )
}

pub fn deep_profile(profile: &Profile, today: NaiveDate) -> String {
    let year = today.year();
    format!(
        "Построй прогноз на 12 месяцев строго на {year} год, начиная с текущего месяца ({} {year}), \
и выдели 3-5 ключевых вех судьбы для: {}. В прогнозе указывай актуальный год \
(например, \"Июнь {year}\").",
        month_name(today.month()),
        birth_line(profile)
    )
}

pub fn daily_forecast(profile: &Profile, date: NaiveDate) -> String {
    format!(
        "Создай дневной прогноз на {} для человека (рожд. {} в {}, место {}, текущий город {}). \
Учти лунные сутки и фазу Луны на эту дату. Поле date заполни значением {}. \
Дай рекомендации ровно по всем 9 категориям (haircut, sports, nutrition, health, love, career, \
communication, spirituality, activity).",
        date.format("%Y-%m-%d"),
        profile.birth_date,
        profile.birth_time,
        profile.birth_place,
        profile.current_city,
        date.format("%Y-%m-%d")
    )
}

pub fn calendar(profile: &Profile, category: &CalendarCategory, month: YearMonth) -> String {
    format!(
        "Создай персональный календарь для сферы '{category}' на месяц '{month}' \
({} {}) для человека (рожд. {} {} {}). Выбери 5-7 ключевых дней строго внутри этого месяца, \
даты в формате ГГГГ-ММ-ДД, статус favorable или unfavorable.",
        month_name(month.month()),
        month.year(),
        profile.birth_date,
        profile.birth_time,
        profile.birth_place
    )
}

fn speaker(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "Пользователь",
        ChatRole::Assistant => "Проводник",
    }
}

/// Context block, the transcript so far, then the new user line
pub fn advisor_transcript(
    history: &[ChatMessage],
    new_message: &str,
    context: &AdvisorContext,
) -> Result<String> {
    let context_json = serde_json::to_string_pretty(context)?;
    let transcript = history
        .iter()
        .map(|m| format!("{}: {}", speaker(m.role), m.text))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "[СИСТЕМНЫЙ КОНТЕКСТ ДАННЫХ ПОЛЬЗОВАТЕЛЯ]:\n{context_json}\n\n[ИСТОРИЯ ДИАЛОГА]:\n{transcript}\n\
Пользователь: {new_message}\nПроводник:"
    ))
}
