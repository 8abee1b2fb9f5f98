//! Chat flood protection
//!
//! Chat is the only free-form channel between players, so it gets a fixed
//! window rate limit per connection. Game actions need no limit: each one is
//! accepted at most once per round anyway.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::types::ConnId;

/// How often stale limiter entries are swept
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Chat lines one connection sent in its current window
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    lines: u32,
}

impl Window {
    fn open(now: Instant) -> Self {
        Self {
            started: now,
            lines: 1,
        }
    }
}

/// Per-connection chat budget, shared by all games
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<ConnId, Window>>>,
    lines_per_window: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(10))
    }
}

impl RateLimiter {
    pub fn new(lines_per_window: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            lines_per_window,
            window,
        }
    }

    /// Count one chat line from `conn`. False once its budget is spent.
    pub async fn check(&self, conn: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let Some(current) = windows.get_mut(conn) else {
            windows.insert(conn.to_string(), Window::open(now));
            return true;
        };
        if now.duration_since(current.started) >= self.window {
            *current = Window::open(now);
            return true;
        }
        if current.lines >= self.lines_per_window {
            return false;
        }
        current.lines += 1;
        true
    }

    /// Drop the budget of a closed connection
    pub async fn forget(&self, conn: &str) {
        self.windows.write().await.remove(conn);
    }

    /// Drop budgets nobody has used for two windows
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let stale_after = self.window * 2;
        self.windows
            .write()
            .await
            .retain(|_, w| now.duration_since(w.started) < stale_after);
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.windows.read().await.len()
    }
}

/// Spawn a background task that periodically sweeps the limiter
pub fn spawn_cleanup(limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}
