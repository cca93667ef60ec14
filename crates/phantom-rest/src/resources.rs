//! Resource endpoints. All of them go through the refresh-aware pipeline.

use tracing::instrument;

use phantom_core::Result;
use phantom_core::error::InvalidInputError;
use phantom_core::models::{
    CalendarConnect, CalendarDisconnect, CalendarStatus, Category, ChatHistory, ChatReply, Event, EventPatch, EventQuery, NewEvent, Preferences,
    PreferencesPatch,
};

use crate::api::ApiClient;
use crate::endpoints::{
    self, CATEGORIES, CHAT, CHAT_HISTORY, ChatRequest, EVENTS, GOOGLE_CALENDAR_CONNECT,
    GOOGLE_CALENDAR_DISCONNECT, GOOGLE_CALENDAR_STATUS, PREFERENCES, PREFERENCES_UPDATE,
};
use crate::pipeline::ApiRequest;

impl ApiClient {
    // ========================================================================
    // Events
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let mut request = ApiRequest::get(EVENTS);
        for (key, value) in query.to_pairs() {
            request = request.query(key, value);
        }
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    pub async fn get_event(&self, id: i64) -> Result<Event> {
        self.send_json(ApiRequest::get(endpoints::event(id))).await
    }

    #[instrument(skip(self, event), fields(title = %event.title))]
    pub async fn create_event(&self, event: &NewEvent) -> Result<Event> {
        event.validate()?;
        self.send_json(ApiRequest::post(EVENTS).json(event)?).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_event(&self, id: i64, patch: &EventPatch) -> Result<Event> {
        if patch.is_empty() {
            return Err(InvalidInputError::Other {
                message: "Nothing to update".to_string(),
            }
            .into());
        }
        patch.validate()?;
        self.send_json(ApiRequest::patch(endpoints::event(id)).json(patch)?)
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, id: i64) -> Result<()> {
        self.send(ApiRequest::delete(endpoints::event(id))).await?;
        Ok(())
    }

    // ========================================================================
    // Categories
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.send_json(ApiRequest::get(CATEGORIES)).await
    }

    // ========================================================================
    // Chat
    // ========================================================================

    /// Send a message to the scheduling assistant.
    #[instrument(skip(self, message))]
    pub async fn send_chat(&self, message: &str) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(InvalidInputError::Missing { field: "Message" }.into());
        }
        self.send_json(ApiRequest::post(CHAT).json(&ChatRequest { message })?)
            .await
    }

    /// Most recent chat exchanges, newest first.
    #[instrument(skip(self))]
    pub async fn chat_history(&self, limit: u32) -> Result<ChatHistory> {
        self.send_json(ApiRequest::get(CHAT_HISTORY).query("limit", limit))
            .await
    }

    // ========================================================================
    // Preferences
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn preferences(&self) -> Result<Preferences> {
        self.send_json(ApiRequest::get(PREFERENCES)).await
    }

    #[instrument(skip(self))]
    pub async fn update_preferences(&self, patch: &PreferencesPatch) -> Result<Preferences> {
        if patch.is_empty() {
            return Err(InvalidInputError::Other {
                message: "Nothing to update".to_string(),
            }
            .into());
        }
        self.send_json(ApiRequest::put(PREFERENCES_UPDATE).json(patch)?)
            .await
    }

    // ========================================================================
    // Google Calendar
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn google_calendar_status(&self) -> Result<CalendarStatus> {
        self.send_json(ApiRequest::get(GOOGLE_CALENDAR_STATUS)).await
    }

    /// Begin linking a Google account. Returns the URL the user must open
    /// to grant access.
    #[instrument(skip(self))]
    pub async fn google_calendar_connect(&self) -> Result<CalendarConnect> {
        self.send_json(ApiRequest::get(GOOGLE_CALENDAR_CONNECT)).await
    }

    #[instrument(skip(self))]
    pub async fn google_calendar_disconnect(&self) -> Result<CalendarDisconnect> {
        self.send_json(ApiRequest::post(GOOGLE_CALENDAR_DISCONNECT))
            .await
    }
}
