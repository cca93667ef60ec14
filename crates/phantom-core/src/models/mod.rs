//! Resource types exchanged with the scheduling API.
//!
//! These mirror the backend's JSON shapes. Fields that some endpoints omit
//! are optional so one type serves both list and detail responses.

mod calendar;
mod category;
mod chat;
mod event;
mod preferences;

pub use calendar::{CalendarConnect, CalendarDisconnect, CalendarStatus};
pub use category::Category;
pub use chat::{ChatExchange, ChatHistory, ChatReply};
pub use event::{Event, EventPatch, EventQuery, NewEvent};
pub use preferences::{Preferences, PreferencesPatch};
