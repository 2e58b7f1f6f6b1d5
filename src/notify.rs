//! Notification side-channel: capped history plus simulated email dispatch.
//!
//! Purely derived effect: a notification failure must never block or roll
//! back the repository operation that raised it, so callers log and move on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident;
use crate::store::KvStore;
use crate::user::User;

pub const HISTORY_KEY: &str = "pharma_notifications";
pub const PREFS_KEY: &str = "pharma_notification_prefs";

const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Email,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Deviation,
    Capa,
    Task,
    Audit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub channel: Channel,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub recipient: String,
}

/// Per-user dispatch preferences. Everything defaults to enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub email_on_critical_deviation: bool,
    pub email_on_capa_assignment: bool,
    pub email_on_overdue_task: bool,
    pub system_alerts_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            email_on_critical_deviation: true,
            email_on_capa_assignment: true,
            email_on_overdue_task: true,
            system_alerts_enabled: true,
        }
    }
}

#[derive(Clone)]
pub struct NotificationCenter {
    store: Arc<dyn KvStore>,
    capacity: usize,
}

impl NotificationCenter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn KvStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    pub fn preferences(&self) -> Result<Preferences> {
        match self.store.get(PREFS_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| Error::Storage(format!("notification preferences corrupt: {e}"))),
            None => Ok(Preferences::default()),
        }
    }

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        self.store.set(PREFS_KEY, &serde_json::to_string(prefs)?)
    }

    /// Record a notification, choosing the channel from the rule table:
    /// critical deviations, CAPA assignments and overdue high-priority
    /// tasks go out as (simulated) email when the matching preference is
    /// enabled; everything else stays system-only.
    pub fn notify(
        &self,
        user: &User,
        category: Category,
        priority: Priority,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Notification> {
        let prefs = self.preferences()?;
        let email = (category == Category::Deviation
            && priority == Priority::Critical
            && prefs.email_on_critical_deviation)
            || (category == Category::Capa && prefs.email_on_capa_assignment)
            || (category == Category::Task
                && priority == Priority::High
                && prefs.email_on_overdue_task);

        let notification = Notification {
            id: ident::record_id("ntf")?,
            channel: if email { Channel::Email } else { Channel::System },
            category,
            priority,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
            is_read: false,
            recipient: user.email.clone(),
        };

        let mut history = self.list()?;
        history.insert(0, notification.clone());
        history.truncate(self.capacity);
        self.save(&history)?;

        if email {
            tracing::info!(
                target: "pharmaqualify::email",
                to = %notification.recipient,
                subject = %format!("CRITICAL QUALITY ALERT: {}", notification.title),
                "simulated email dispatch"
            );
        }
        Ok(notification)
    }

    pub fn list(&self) -> Result<Vec<Notification>> {
        match self.store.get(HISTORY_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| Error::Storage(format!("notification history corrupt: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    pub fn mark_read(&self, id: &str) -> Result<()> {
        let mut history = self.list()?;
        let slot = history
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::NotFound { entity: "Notification", id: id.to_string() })?;
        slot.is_read = true;
        self.save(&history)
    }

    fn save(&self, history: &[Notification]) -> Result<()> {
        self.store.set(HISTORY_KEY, &serde_json::to_string(history)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::user::Role;

    fn center() -> NotificationCenter {
        NotificationCenter::with_capacity(Arc::new(MemoryStore::new()), 3)
    }

    fn recipient() -> User {
        User::new("admin", "Site Admin", Role::Admin, "QA", "qa@example.com")
    }

    #[test]
    fn critical_deviation_goes_out_as_email() {
        let center = center();
        let n = center
            .notify(&recipient(), Category::Deviation, Priority::Critical, "Critical Event", "msg")
            .unwrap();
        assert_eq!(n.channel, Channel::Email);
        assert_eq!(n.recipient, "qa@example.com");
    }

    #[test]
    fn low_severity_stays_system_only() {
        let center = center();
        let n = center
            .notify(&recipient(), Category::Deviation, Priority::High, "Event", "msg")
            .unwrap();
        assert_eq!(n.channel, Channel::System);
    }

    #[test]
    fn disabled_preference_downgrades_to_system() {
        let center = center();
        let prefs = Preferences { email_on_critical_deviation: false, ..Default::default() };
        center.save_preferences(&prefs).unwrap();

        let n = center
            .notify(&recipient(), Category::Deviation, Priority::Critical, "Event", "msg")
            .unwrap();
        assert_eq!(n.channel, Channel::System);
    }

    #[test]
    fn capa_assignment_emails_at_any_priority() {
        let center = center();
        let n = center
            .notify(&recipient(), Category::Capa, Priority::Low, "CAPA Assigned", "msg")
            .unwrap();
        assert_eq!(n.channel, Channel::Email);
    }

    #[test]
    fn history_is_capped_newest_first() {
        let center = center();
        for n in 0..4 {
            center
                .notify(&recipient(), Category::Task, Priority::Low, format!("t{n}"), "msg")
                .unwrap();
        }
        let history = center.list().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].title, "t3");
        assert_eq!(history[2].title, "t1");
    }

    #[test]
    fn mark_read_flips_the_flag() {
        let center = center();
        let n = center
            .notify(&recipient(), Category::Task, Priority::Low, "t", "msg")
            .unwrap();
        center.mark_read(&n.id).unwrap();
        assert!(center.list().unwrap()[0].is_read);
        assert!(center.mark_read("missing").is_err());
    }
}
