use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::debug;

use crate::WorkflowEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            raised_at: Utc::now(),
        }
    }
}

#[derive(Default)]
struct Slot {
    current: Option<Notification>,
    // Bumped on every show/clear; a dismissal only applies to its own generation.
    generation: u64,
    dismiss_task: Option<JoinHandle<()>>,
}

pub struct NotificationManager {
    ttl: Duration,
    slot: Arc<Mutex<Slot>>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl NotificationManager {
    pub fn new(ttl: Duration, events: broadcast::Sender<WorkflowEvent>) -> Self {
        Self {
            ttl,
            slot: Arc::new(Mutex::new(Slot::default())),
            events,
        }
    }

    pub async fn show(&self, kind: NotificationKind, text: impl Into<String>) {
        let notification = Notification::new(kind, text);
        let mut slot = self.slot.lock().await;
        slot.generation += 1;
        let generation = slot.generation;
        if let Some(task) = slot.dismiss_task.take() {
            task.abort();
        }
        slot.current = Some(notification.clone());

        let shared_slot = Arc::clone(&self.slot);
        let events = self.events.clone();
        let ttl = self.ttl;
        slot.dismiss_task = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut slot = shared_slot.lock().await;
            if slot.generation != generation {
                return;
            }
            slot.current = None;
            slot.dismiss_task = None;
            debug!(generation, "notification dismissed");
            let _ = events.send(WorkflowEvent::Notification(None));
        }));

        debug!(kind = %notification.kind, text = %notification.text, "notification shown");
        let _ = self
            .events
            .send(WorkflowEvent::Notification(Some(notification)));
    }

    pub async fn clear(&self) {
        let mut slot = self.slot.lock().await;
        slot.generation += 1;
        if let Some(task) = slot.dismiss_task.take() {
            task.abort();
        }
        if slot.current.take().is_some() {
            let _ = self.events.send(WorkflowEvent::Notification(None));
        }
    }

    pub async fn current(&self) -> Option<Notification> {
        self.slot.lock().await.current.clone()
    }
}
