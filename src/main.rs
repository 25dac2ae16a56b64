use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use celestial_guide::GuideError;
use celestial_guide::config::Config;
use celestial_guide::models::{CalendarCategory, ChatRole, Gender, Profile, YearMonth};
use celestial_guide::session::{Session, View};

type Input = Lines<BufReader<Stdin>>;

const CONNECTION_NOTICE: &str = "Ошибка соединения. Лимит запросов исчерпан или нет сети.";
const DEEP_NOTICE: &str = "Не удалось загрузить прогноз. Попробуйте еще раз.";
const CALENDAR_NOTICE: &str = "Не удалось построить календарь. Попробуйте еще раз.";

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for the conversation, logs go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    let mut session = celestial_guide::open_session(&config);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", "✦ Небесный Проводник ✦".bright_purple().bold());
    if session.restore() {
        if let Some(profile) = session.store().profile() {
            println!("С возвращением, {}.", profile.name.bold());
        }
        show(&session, "chart");
    } else {
        println!("Введите {} чтобы начать, {} для списка команд.", "profile".cyan(), "help".cyan());
    }

    loop {
        prompt("> ")?;
        let Some(line) = input.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map(|(c, r)| (c, r.trim()))
            .unwrap_or((line, ""));

        match command {
            "" => continue,
            "help" => print_help(),
            "profile" => {
                session.open_form();
                let profile = match read_profile(&mut input).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        println!("{} {}", "✗".red(), e);
                        continue;
                    }
                };
                let date = session.selected_date();
                println!("{}", "Рассчитываю карту и прогноз...".dimmed());
                match session.submit_profile(profile, date).await {
                    Ok(()) => show(&session, "chart"),
                    Err(e) => notice(&e, CONNECTION_NOTICE),
                }
            }
            "day" => match rest.parse() {
                Ok(date) => match session.select_date(date).await {
                    Ok(()) => show(&session, "daily"),
                    Err(e) => notice(&e, DEEP_NOTICE),
                },
                Err(_) => println!("{}", "Формат даты: ГГГГ-ММ-ДД".yellow()),
            },
            "deep" => {
                println!("{}", "Заглядываю в будущее...".dimmed());
                match session.run_deep_analysis().await {
                    Ok(()) => show(&session, "fateful"),
                    Err(e) => notice(&e, DEEP_NOTICE),
                }
            }
            "calendar" => {
                let mut parts = rest.split_whitespace();
                let (Some(category), Some(month)) = (parts.next(), parts.next()) else {
                    println!("{}", "calendar <haircut|shopping|business|health> <ГГГГ-ММ>".yellow());
                    continue;
                };
                let month: YearMonth = match month.parse() {
                    Ok(month) => month,
                    Err(e) => {
                        println!("{} {}", "✗".red(), e);
                        continue;
                    }
                };
                match session
                    .query_calendar(CalendarCategory::from(category), month)
                    .await
                {
                    Ok(()) => show(&session, "calendar"),
                    Err(e) => notice(&e, CALENDAR_NOTICE),
                }
            }
            "ask" => {
                if session.store().profile().is_none() {
                    println!("{}", "Сначала заполните профиль: profile".yellow());
                    continue;
                }
                match session.send_chat(rest).await {
                    Ok(()) => {
                        if let Some(reply) = session.store().chat().last() {
                            if reply.role == ChatRole::Assistant {
                                println!("{} {}", "Проводник:".bright_purple(), reply.text);
                            }
                        }
                    }
                    Err(e) => notice(&e, CONNECTION_NOTICE),
                }
            }
            "show" => show(&session, if rest.is_empty() { "chart" } else { rest }),
            "logout" => {
                session
                    .sign_out()
                    .context("Failed to remove the saved session")?;
                println!("{}", "Сессия завершена.".dimmed());
            }
            "quit" | "exit" => break,
            other => println!("{} {}", "Неизвестная команда:".yellow(), other),
        }
    }

    tracing::info!("main: input closed, view was {:?}", session.view());
    Ok(())
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text.bright_black());
    std::io::stdout().flush()?;
    Ok(())
}

fn notice(error: &GuideError, message: &str) {
    match error {
        GuideError::MissingState(what) => {
            println!("{} {}", "Сначала нужен".yellow(), what)
        }
        GuideError::InvalidProfile(detail) => println!("{} {}", "✗".red(), detail),
        GuideError::Configuration(detail) => println!("{} {}", "✗ Настройка:".red(), detail),
        GuideError::Busy => println!("{}", "Подождите, идёт расчёт...".yellow()),
        _ => println!("{} {}", "✗".red(), message),
    }
}

async fn ask_line(input: &mut Input, label: &str) -> Result<String> {
    prompt(&format!("{label}: "))?;
    match input.next_line().await? {
        Some(line) => Ok(line.trim().to_string()),
        None => bail!("input closed"),
    }
}

async fn read_profile(input: &mut Input) -> Result<Profile> {
    let name = ask_line(input, "Имя").await?;
    let maiden_name = ask_line(input, "Девичья фамилия (необязательно)").await?;
    let birth_date = ask_line(input, "Дата рождения (ГГГГ-ММ-ДД)").await?;
    let birth_time = ask_line(input, "Время рождения (ЧЧ:ММ)").await?;
    let birth_place = ask_line(input, "Место рождения").await?;
    let current_city = ask_line(input, "Текущий город").await?;
    let gender = match ask_line(input, "Пол (м/ж/другое)").await?.to_lowercase().as_str() {
        "м" | "m" | "male" | "мужской" => Gender::Male,
        "ж" | "f" | "female" | "женский" => Gender::Female,
        _ => Gender::Other,
    };

    let profile = Profile {
        name,
        maiden_name: Some(maiden_name).filter(|m| !m.is_empty()),
        birth_date,
        birth_time,
        birth_place: birth_place.clone(),
        current_city: if current_city.is_empty() {
            birth_place
        } else {
            current_city
        },
        gender,
    };
    profile.validate()?;
    Ok(profile)
}

fn print_help() {
    let rows = [
        ("profile", "заполнить анкету и рассчитать карту"),
        ("day <ГГГГ-ММ-ДД>", "прогноз на другой день"),
        ("deep", "вехи судьбы и прогноз на год"),
        ("calendar <сфера> <ГГГГ-ММ>", "ключевые дни месяца"),
        ("ask <вопрос>", "спросить Проводника"),
        ("show [daily|chart|fateful|calendar|chat]", "показать сохранённое"),
        ("logout", "забыть профиль"),
        ("quit", "выйти"),
    ];
    for (command, about) in rows {
        println!("  {:<44} {}", command.cyan(), about);
    }
}

fn show(session: &Session, section: &str) {
    let store = session.store();
    if session.view() != View::Dashboard && store.profile().is_none() {
        println!("{}", "Профиль не заполнен.".dimmed());
        return;
    }

    match section {
        "chart" => {
            if let (Some(chart), Some(numbers), Some(artifacts)) =
                (store.natal_chart(), store.numerology(), store.artifacts())
            {
                println!(
                    "{} {}  {} {}  {} {}",
                    "☉".yellow(),
                    chart.sun_sign,
                    "☽".bright_blue(),
                    chart.moon_sign,
                    "ASC".magenta(),
                    chart.ascendant
                );
                for p in &chart.planets {
                    let retro = if p.retrograde { " ℞" } else { "" };
                    println!("  {:<10} {:<12} {:>2}° дом {}{}", p.planet, p.sign, p.degree, p.house, retro);
                }
                println!("  Стихия: {}", chart.elements.dominant());
                println!("  {}", chart.summary.italic());
                println!(
                    "{} путь {} · судьба {} · душа {}",
                    "Нумерология:".bold(),
                    numbers.life_path,
                    numbers.destiny_number,
                    numbers.soul_number
                );
                println!("  Камни: {}", artifacts.stones.join(", "));
                println!("  Город силы: {}", artifacts.best_city);
            }
            show(session, "daily");
        }
        "daily" => {
            if let Some(day) = store.daily_forecast() {
                let energy = format!("{}%", day.energy_scale.value);
                let energy = match day.energy_scale.difficulty_level() {
                    0..=4 => energy.green(),
                    5..=7 => energy.yellow(),
                    _ => energy.red(),
                };
                println!(
                    "{} {} · {} · {}-й лунный день · энергия {}",
                    "Прогноз".bold(),
                    day.date,
                    day.lunar_phase,
                    day.lunar_day,
                    energy
                );
                for warning in &day.warnings {
                    println!("  {} {}: {}", "⚠".red(), warning.title, warning.advice);
                }
                for (slot, advice) in day.recommendations.entries() {
                    println!("  {:<14} {}", slot.cyan(), advice);
                }
            }
        }
        "fateful" => match (store.fateful_moments(), store.yearly_forecast()) {
            (Some(moments), Some(months)) => {
                for m in moments {
                    println!("{} {} · {}: {}", "★".yellow(), m.period, m.event.bold(), m.description);
                }
                for m in months {
                    println!("  {:<16} {}", m.month.cyan(), m.prediction);
                }
            }
            _ => println!("{}", "Глубокий анализ ещё не запускался: deep".dimmed()),
        },
        "calendar" => {
            if store.calendar().is_empty() {
                println!("{}", "Календарь пуст: calendar <сфера> <ГГГГ-ММ>".dimmed());
            }
            for event in store.calendar() {
                let status = if event.is_favorable() {
                    "●".green()
                } else {
                    "●".red()
                };
                println!("  {} {} {}", status, event.date, event.comment);
            }
        }
        "chat" => {
            for message in store.chat() {
                match message.role {
                    ChatRole::User => println!("{} {}", "Вы:".bold(), message.text),
                    ChatRole::Assistant => {
                        println!("{} {}", "Проводник:".bright_purple(), message.text)
                    }
                }
            }
        }
        other => println!("{} {}", "Неизвестный раздел:".yellow(), other),
    }
}
