use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use tokio::task::JoinHandle;

use crate::models::{AlertTrigger, DigestKind};

use super::dispatcher::NotificationDispatcher;

/// One buffered digest item: the trigger plus a pre-rendered summary line,
/// so flushing never has to re-fetch the report
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub trigger: AlertTrigger,
    pub line: String,
}

/// Per-subscriber digest accumulators keyed by `(user_id, kind)`
///
/// Appends from concurrent trigger events are serialized per map; a flush
/// swaps a buffer out whole, so triggers arriving mid-flush land in the
/// fresh buffer for the next cycle — none dropped, none double-delivered.
#[derive(Default)]
pub struct DigestBuffers {
    buffers: Mutex<HashMap<(String, DigestKind), Vec<DigestEntry>>>,
    last_flushed: Mutex<HashMap<(String, DigestKind), DateTime<Utc>>>,
}

/// When digests go out, in the subscriber's local time
#[derive(Debug, Clone, Copy)]
pub struct DigestSchedule {
    /// Hour of day (0-23) daily digests are sent
    pub daily_send_hour: u32,
    /// Day of week weekly digests are sent (0 = Monday)
    pub weekly_send_weekday: u32,
    /// Hour of day weekly digests are sent
    pub weekly_send_hour: u32,
}

impl Default for DigestSchedule {
    fn default() -> Self {
        Self { daily_send_hour: 8, weekly_send_weekday: 0, weekly_send_hour: 8 }
    }
}

impl DigestBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one entry. An unseen `(user, kind)` buffer starts its cycle
    /// here: nothing goes out before the next scheduled send instant.
    pub fn append(&self, kind: DigestKind, entry: DigestEntry, now: DateTime<Utc>) {
        let key = (entry.trigger.user_id.clone(), kind);
        {
            let mut last_flushed = self.last_flushed.lock().unwrap_or_else(|e| e.into_inner());
            last_flushed.entry(key.clone()).or_insert(now);
        }
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        buffers.entry(key).or_default().push(entry);
    }

    pub fn pending(&self, user_id: &str, kind: DigestKind) -> usize {
        let buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        buffers.get(&(user_id.to_string(), kind)).map_or(0, Vec::len)
    }

    /// Swap out every buffer of `kind` whose local send time has passed
    /// since its last flush
    ///
    /// `offset_of` maps a user id to their UTC offset in minutes.
    pub fn take_due<F>(
        &self,
        kind: DigestKind,
        now: DateTime<Utc>,
        schedule: DigestSchedule,
        offset_of: F,
    ) -> Vec<(String, Vec<DigestEntry>)>
    where
        F: Fn(&str) -> i32,
    {
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        let mut last_flushed = self.last_flushed.lock().unwrap_or_else(|e| e.into_inner());

        let due_keys: Vec<(String, DigestKind)> = buffers
            .iter()
            .filter(|((user, k), entries)| {
                *k == kind && !entries.is_empty() && {
                    let offset = offset_of(user);
                    let scheduled =
                        most_recent_send_instant(kind, now, schedule, offset);
                    match scheduled {
                        Some(scheduled) => last_flushed
                            .get(&(user.clone(), kind))
                            .is_some_and(|flushed| *flushed < scheduled),
                        None => false,
                    }
                }
            })
            .map(|(key, _)| key.clone())
            .collect();

        due_keys
            .into_iter()
            .filter_map(|key| {
                let entries = buffers.remove(&key)?;
                last_flushed.insert(key.clone(), now);
                Some((key.0, entries))
            })
            .collect()
    }
}

/// The most recent scheduled send instant at or before `now`, in UTC
fn most_recent_send_instant(
    kind: DigestKind,
    now: DateTime<Utc>,
    schedule: DigestSchedule,
    utc_offset_minutes: i32,
) -> Option<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)?;
    let local_now = now.with_timezone(&offset);
    let (send_hour, step_days) = match kind {
        DigestKind::Daily => (schedule.daily_send_hour, 1),
        DigestKind::Weekly => (schedule.weekly_send_hour, 7),
    };

    let mut scheduled = offset
        .with_ymd_and_hms(local_now.year(), local_now.month(), local_now.day(), send_hour, 0, 0)
        .single()?;

    if kind == DigestKind::Weekly {
        let days_back = (local_now.weekday().num_days_from_monday() + 7
            - schedule.weekly_send_weekday % 7)
            % 7;
        scheduled -= ChronoDuration::days(days_back as i64);
    }
    if scheduled > local_now {
        scheduled -= ChronoDuration::days(step_days);
    }
    Some(scheduled.with_timezone(&Utc))
}

/// Periodic timer that releases deferred sends and flushes due digest
/// buffers — a single task per engine, so flushes for one digest kind
/// never overlap
pub struct DigestScheduler {
    dispatcher: Arc<NotificationDispatcher>,
    tick: Duration,
}

impl DigestScheduler {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, tick: Duration) -> Self {
        Self { dispatcher, tick }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.dispatcher.on_tick(Utc::now()).await;
            }
        })
    }
}
