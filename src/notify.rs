//! Transient notification queue for outcome banners.
//!
//! Notices expire after a fixed TTL and the queue is bounded; when full, the
//! oldest notice is dropped. Expired entries are pruned lazily on access.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Clone)]
pub struct NoticeBoard {
    queue: Arc<Mutex<VecDeque<Notice>>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for NoticeBoard {
    fn default() -> Self { Self::new(Duration::from_secs(5), 16) }
}

impl NoticeBoard {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { queue: Arc::new(Mutex::new(VecDeque::new())), ttl, capacity: capacity.max(1) }
    }

    pub fn push(&self, level: NoticeLevel, message: impl Into<String>) -> Uuid {
        let now = Instant::now();
        let notice = Notice { id: Uuid::new_v4(), level, message: message.into(), expires_at: now + self.ttl };
        let id = notice.id;
        debug!(target: "notify", ?level, message = %notice.message, "notice");
        let mut q = self.queue.lock();
        q.retain(|n| n.expires_at > now);
        while q.len() >= self.capacity {
            q.pop_front();
        }
        q.push_back(notice);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid { self.push(NoticeLevel::Success, message) }
    pub fn error(&self, message: impl Into<String>) -> Uuid { self.push(NoticeLevel::Error, message) }
    pub fn info(&self, message: impl Into<String>) -> Uuid { self.push(NoticeLevel::Info, message) }

    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut q = self.queue.lock();
        let before = q.len();
        q.retain(|n| n.id != id);
        q.len() != before
    }

    /// Live notices, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut q = self.queue.lock();
        q.retain(|n| n.expires_at > now);
        q.iter().cloned().collect()
    }

    /// Remove and return every live notice.
    pub fn drain(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut q = self.queue.lock();
        q.drain(..).filter(|n| n.expires_at > now).collect()
    }

    pub fn len(&self) -> usize { self.active().len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
