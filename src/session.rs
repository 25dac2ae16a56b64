//! User-facing triggers: what happens when the profile form is submitted, a
//! date is picked, deep analysis or a calendar is requested, or a chat line is
//! sent.

use chrono::NaiveDate;
use std::ops::{Deref, DerefMut};

use crate::error::{GuideError, Result};
use crate::gateway::RequestGateway;
use crate::models::{CalendarCategory, ChatMessage, Profile, YearMonth};
use crate::store::SessionStore;

/// Appended to the conversation when an advisor turn fails
pub const CHAT_INTERRUPTED: &str = "Космическая связь прервана. Попробуйте еще раз через мгновение.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Welcome,
    Form,
    Loading,
    Dashboard,
}

pub struct Session {
    store: SessionStore,
    gateway: RequestGateway,
    view: View,
    loading: bool,
    selected_date: NaiveDate,
}

impl Session {
    pub fn new(store: SessionStore, gateway: RequestGateway, today: NaiveDate) -> Self {
        Self {
            store,
            gateway,
            view: View::Welcome,
            loading: false,
            selected_date: today,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    /// Restore a saved session, landing on the dashboard if there was one
    pub fn restore(&mut self) -> bool {
        let restored = self.store.load();
        if restored {
            self.view = View::Dashboard;
        }
        restored
    }

    pub fn open_form(&mut self) {
        self.view = View::Form;
    }

    /// Mark a call as in flight. The returned guard clears the flag when it is
    /// dropped, including when the caller abandons the trigger future.
    fn begin(&mut self) -> Result<InFlight<'_>> {
        if self.loading {
            return Err(GuideError::Busy);
        }
        self.loading = true;
        Ok(InFlight {
            previous: self.view,
            session: self,
        })
    }

    fn current_profile(&self) -> Result<Profile> {
        self.store
            .profile()
            .cloned()
            .ok_or(GuideError::MissingState("a profile"))
    }

    /// Fetch the quick profile and the forecast for `date` together. Both must
    /// succeed; otherwise the store is left untouched and the form is shown again.
    pub async fn submit_profile(&mut self, profile: Profile, date: NaiveDate) -> Result<()> {
        profile.validate()?;
        let mut s = self.begin()?;
        s.view = View::Loading;

        let result = tokio::try_join!(
            s.gateway.request_quick_profile(&profile),
            s.gateway.request_daily_forecast(&profile, date),
        );

        match result {
            Ok((quick, forecast)) => {
                s.store.set_profile(profile);
                s.store.set_quick_profile(quick);
                s.store.set_daily_forecast(forecast);
                if let Err(e) = s.store.save() {
                    tracing::warn!("Could not persist session: {}", e);
                }
                s.selected_date = date;
                s.view = View::Dashboard;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Profile analysis failed: {}", e);
                s.view = View::Form;
                Err(e)
            }
        }
    }

    /// Re-fetch the daily forecast for another date; the result is not persisted
    pub async fn select_date(&mut self, date: NaiveDate) -> Result<()> {
        let profile = self.current_profile()?;
        let mut s = self.begin()?;
        let forecast = s.gateway.request_daily_forecast(&profile, date).await?;
        s.store.set_daily_forecast(forecast);
        s.selected_date = date;
        Ok(())
    }

    /// Fetch fateful moments and the yearly forecast, replacing earlier ones
    pub async fn run_deep_analysis(&mut self) -> Result<()> {
        let profile = self.current_profile()?;
        let mut s = self.begin()?;
        let deep = s.gateway.request_deep_profile(&profile).await?;
        s.store.set_deep_profile(deep);
        s.store.save()
    }

    /// Replace the calendar with key days for `category` in `month`
    pub async fn query_calendar(
        &mut self,
        category: CalendarCategory,
        month: YearMonth,
    ) -> Result<()> {
        let profile = self.current_profile()?;
        if self.store.natal_chart().is_none() {
            return Err(GuideError::MissingState("a natal chart"));
        }
        let mut s = self.begin()?;
        let events = s.gateway.request_calendar(&profile, &category, month).await?;
        s.store.replace_calendar(events);
        Ok(())
    }

    /// One advisor turn. A failed call is reported inside the conversation
    /// instead of as an error.
    pub async fn send_chat(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let mut s = self.begin()?;

        let history = s.store.chat().to_vec();
        let context = s.store.advisor_context();
        s.store.push_chat(ChatMessage::user(text));

        let reply = match s
            .gateway
            .request_advisor_reply(&history, text, &context)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Advisor turn failed: {}", e);
                CHAT_INTERRUPTED.to_string()
            }
        };
        s.store.push_chat(ChatMessage::assistant(reply));
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.view = View::Welcome;
        self.loading = false;
        self.store.clear()
    }
}

/// Exclusive access to a session while one call is in flight
struct InFlight<'a> {
    session: &'a mut Session,
    previous: View,
}

impl Deref for InFlight<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session
    }
}

impl DerefMut for InFlight<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.loading = false;
        if self.session.view == View::Loading {
            self.session.view = self.previous;
        }
    }
}
