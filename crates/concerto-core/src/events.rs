//! Process-wide event bus. Handlers run synchronously on the
//! firing task; a handler that returns an error is logged and never
//! propagated to the caller, except for `osu_error` whose own handler
//! must never recurse into another `osu_error` fire.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::ids::UserId;

#[derive(Debug, Clone)]
pub enum Event {
    UserUpdate {
        user_id: UserId,
    },
    BotMessage {
        text: String,
        target: String,
    },
    Restrict {
        user_id: UserId,
        reason: String,
        autoban: bool,
        until: Option<DateTime<Utc>>,
    },
    Silence {
        user_id: UserId,
        duration_s: u64,
        reason: String,
    },
    Announcement {
        text: String,
    },
    OsuError {
        user_id: UserId,
        payload: Vec<u8>,
    },
    Shutdown,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::UserUpdate { .. } => "user_update",
            Event::BotMessage { .. } => "bot_message",
            Event::Restrict { .. } => "restrict",
            Event::Silence { .. } => "silence",
            Event::Announcement { .. } => "announcement",
            Event::OsuError { .. } => "osu_error",
            Event::Shutdown => "shutdown",
        }
    }
}

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<&'static str, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &'static str, handler: Handler) {
        self.handlers.write().await.entry(name).or_default().push(handler);
    }

    /// Invokes every handler registered for this event's name,
    /// synchronously, in registration order. Unknown event names (no
    /// handlers registered) are silently ignored. A handler that
    /// panics while handling `osu_error` is caught and logged, never
    /// re-fired as another `osu_error` — the event is itself an error
    /// reporter and must not recurse.
    pub async fn fire(&self, event: Event) {
        let name = event.name();
        let handlers = self.handlers.read().await.get(name).cloned().unwrap_or_default();
        for handler in handlers {
            if name == "osu_error" {
                let event_ref = &event;
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handler(event_ref);
                }));
                if result.is_err() {
                    tracing::error!("osu_error handler panicked; not re-firing");
                }
            } else {
                handler(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn registered_handler_is_invoked_on_matching_fire() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.register(
            "announcement",
            Arc::new(move |_event: &Event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await;

        bus.fire(Event::Announcement {
            text: "hi".to_owned(),
        })
        .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn firing_an_event_with_no_handlers_is_a_no_op() {
        let bus = EventBus::new();
        bus.fire(Event::Shutdown).await;
    }

    #[tokio::test]
    async fn handlers_for_different_events_do_not_cross_fire() {
        let bus = EventBus::new();
        let hit = Arc::new(AtomicUsize::new(0));
        let hit_clone = hit.clone();
        bus.register(
            "silence",
            Arc::new(move |_event: &Event| {
                hit_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await;

        bus.fire(Event::Announcement {
            text: "hi".to_owned(),
        })
        .await;

        assert_eq!(hit.load(Ordering::SeqCst), 0);
    }
}
