//! Per-request context and the clock operations read "now" from.

use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDateTime};
use uuid::Uuid;

use crate::schema::format_timestamp;

/// Who is acting, and a request id that ties log lines and spans together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub operator: String,
    pub request_id: Uuid,
}

impl RequestContext {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            request_id: Uuid::new_v4(),
        }
    }
}

/// Source of the timestamps written into sheets.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// `now()` in the sheets' timestamp format.
    fn timestamp(&self) -> String {
        format_timestamp(self.now())
    }
}

/// Local wall-clock time, which is what operators see in the sheets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += Duration::seconds(secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}
