use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, TimeZone, Timelike, Utc};
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::models::{
    AlertTrigger, DeliveryState, DigestKind, EngineEvent, LostPetReport, QuietHours,
    SubscriberContact,
};
use crate::services::{AlertRepository, ChannelKind, NotificationChannel, RenderedMessage};

use super::digest::{DigestBuffers, DigestEntry, DigestSchedule};
use super::template::{report_vars, TemplateSet};

/// Retry and timeout policy for channel sends
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per channel before a transient failure is treated
    /// as permanent
    pub max_attempts: u32,
    /// First backoff delay; doubles on each subsequent attempt
    pub base_backoff: Duration,
    /// Upper bound on a single channel send
    pub send_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// A send held back by the subscriber's quiet hours, released by the
/// scheduler at the window's end
#[derive(Debug, Clone)]
struct DeferredSend {
    release_at: DateTime<Utc>,
    trigger: AlertTrigger,
    report: LostPetReport,
}

/// Fans triggered alerts out to delivery channels
///
/// Immediate triggers render and send now (or defer through quiet hours);
/// digest triggers accumulate in per-subscriber buffers the scheduler
/// flushes. Transient channel errors retry with exponential backoff up to
/// the attempt cap; permanent errors suppress that channel for the
/// subscriber until their contact info is updated.
pub struct NotificationDispatcher {
    channels: HashMap<ChannelKind, Arc<dyn NotificationChannel>>,
    contacts: RwLock<HashMap<String, SubscriberContact>>,
    suppressed: Mutex<HashSet<(String, ChannelKind)>>,
    /// Trigger keys whose alert counters were already bumped
    counted: Mutex<HashSet<(String, String)>>,
    deferred: Mutex<Vec<DeferredSend>>,
    digests: DigestBuffers,
    templates: TemplateSet,
    schedule: DigestSchedule,
    retry: RetryPolicy,
    alerts: Arc<dyn AlertRepository>,
    events: broadcast::Sender<EngineEvent>,
}

impl NotificationDispatcher {
    pub fn new(
        channels: Vec<Arc<dyn NotificationChannel>>,
        alerts: Arc<dyn AlertRepository>,
        templates: TemplateSet,
        schedule: DigestSchedule,
        retry: RetryPolicy,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            channels: channels.into_iter().map(|c| (c.kind(), c)).collect(),
            contacts: RwLock::new(HashMap::new()),
            suppressed: Mutex::new(HashSet::new()),
            counted: Mutex::new(HashSet::new()),
            deferred: Mutex::new(Vec::new()),
            digests: DigestBuffers::new(),
            templates,
            schedule,
            retry,
            alerts,
            events,
        }
    }

    /// Register or update a subscriber's contact info. Clears any channel
    /// suppressions for them — a permanent failure stands only until the
    /// subscriber corrects their details.
    pub fn update_contact(&self, contact: SubscriberContact) {
        let user_id = contact.user_id.clone();
        {
            let mut contacts = self.contacts.write().unwrap_or_else(|e| e.into_inner());
            contacts.insert(user_id.clone(), contact);
        }
        let mut suppressed = self.suppressed.lock().unwrap_or_else(|e| e.into_inner());
        suppressed.retain(|(user, _)| *user != user_id);
    }

    /// Route one trigger per its frequency flags
    pub async fn enqueue(&self, trigger: AlertTrigger, report: &LostPetReport, now: DateTime<Utc>) {
        if trigger.frequency.daily_digest {
            self.buffer_digest(DigestKind::Daily, &trigger, report, now);
        }
        if trigger.frequency.weekly_digest {
            self.buffer_digest(DigestKind::Weekly, &trigger, report, now);
        }
        if !trigger.frequency.immediate_notification {
            return;
        }

        if let Some(release_at) = self.quiet_window_end(&trigger.user_id, now) {
            tracing::info!(
                trigger_id = %trigger.id,
                user_id = %trigger.user_id,
                %release_at,
                "inside quiet hours, deferring send"
            );
            let mut deferred = self.deferred.lock().unwrap_or_else(|e| e.into_inner());
            deferred.push(DeferredSend { release_at, trigger, report: report.clone() });
            return;
        }

        self.deliver_now(&trigger, report).await;
    }

    /// Scheduler entry point: release quiet-hour deferrals whose window
    /// ended and flush due digest buffers
    pub async fn on_tick(&self, now: DateTime<Utc>) {
        let released: Vec<DeferredSend> = {
            let mut deferred = self.deferred.lock().unwrap_or_else(|e| e.into_inner());
            let (ready, waiting): (Vec<_>, Vec<_>) =
                deferred.drain(..).partition(|d| d.release_at <= now);
            *deferred = waiting;
            ready
        };
        for send in released {
            self.deliver_now(&send.trigger, &send.report).await;
        }

        self.flush_digests(DigestKind::Daily, now).await;
        self.flush_digests(DigestKind::Weekly, now).await;
    }

    /// Flush every due buffer of one digest kind into a single batched
    /// message per subscriber
    pub async fn flush_digests(&self, kind: DigestKind, now: DateTime<Utc>) {
        let due = self.digests.take_due(kind, now, self.schedule, |user| {
            let contacts = self.contacts.read().unwrap_or_else(|e| e.into_inner());
            contacts
                .get(user)
                .and_then(|c| c.quiet_hours)
                .map_or(0, |q| q.utc_offset_minutes)
        });

        for (user_id, entries) in due {
            let kind_name = match kind {
                DigestKind::Daily => "daily",
                DigestKind::Weekly => "weekly",
            };
            let lines: Vec<String> =
                entries.iter().map(|e| format!("- {}", e.line)).collect();
            let message = self.templates.digest.render(&[
                ("digestKind", kind_name.to_string()),
                ("count", entries.len().to_string()),
                ("lines", lines.join("\n")),
            ]);

            // Union of channel flags across the batched triggers
            let mut channels = crate::models::AlertChannels { email: false, sms: false, push: false };
            for entry in &entries {
                channels.email |= entry.trigger.channels.email;
                channels.sms |= entry.trigger.channels.sms;
                channels.push |= entry.trigger.channels.push;
            }

            tracing::info!(
                user_id = %user_id,
                kind = kind_name,
                triggers = entries.len(),
                "flushing digest"
            );
            let delivered = self.send_to_channels(&user_id, channels, &message, &entries).await;
            if delivered {
                for entry in &entries {
                    self.count_trigger(&entry.trigger).await;
                }
            }
        }
    }

    /// Number of triggers waiting in a subscriber's digest buffer
    pub fn pending_digest(&self, user_id: &str, kind: DigestKind) -> usize {
        self.digests.pending(user_id, kind)
    }

    async fn deliver_now(&self, trigger: &AlertTrigger, report: &LostPetReport) {
        let message = self.templates.alert_match.render(&report_vars(report));
        let entries = [DigestEntry { trigger: trigger.clone(), line: String::new() }];
        let delivered =
            self.send_to_channels(&trigger.user_id, trigger.channels, &message, &entries).await;
        if delivered {
            self.count_trigger(trigger).await;
        }
    }

    /// Attempt delivery on each enabled, unsuppressed channel. Channels
    /// fail independently; returns whether at least one delivered.
    async fn send_to_channels(
        &self,
        user_id: &str,
        flags: crate::models::AlertChannels,
        message: &RenderedMessage,
        triggers: &[DigestEntry],
    ) -> bool {
        let contact = {
            let contacts = self.contacts.read().unwrap_or_else(|e| e.into_inner());
            contacts.get(user_id).cloned()
        };
        let Some(contact) = contact else {
            tracing::warn!(user_id, "no contact info registered, dropping send");
            return false;
        };

        let mut any_delivered = false;
        for (kind, recipient) in enabled_recipients(&contact, flags) {
            if self.is_suppressed(user_id, kind) {
                tracing::debug!(user_id, channel = kind.as_str(), "channel suppressed, skipping");
                continue;
            }
            let Some(channel) = self.channels.get(&kind) else {
                continue;
            };

            match self.send_with_retry(channel.as_ref(), &recipient, message).await {
                Ok(()) => {
                    any_delivered = true;
                    for entry in triggers {
                        self.emit(EngineEvent::TriggerDelivered {
                            trigger_id: entry.trigger.id.clone(),
                            alert_id: entry.trigger.alert_id.clone(),
                            report_id: entry.trigger.report_id.clone(),
                            channel: kind.as_str().to_string(),
                        });
                    }
                }
                Err((state, reason)) => {
                    tracing::warn!(
                        user_id,
                        channel = kind.as_str(),
                        %reason,
                        "delivery failed, suppressing channel"
                    );
                    self.suppress(user_id, kind);
                    for entry in triggers {
                        self.emit(EngineEvent::TriggerFailed {
                            trigger_id: entry.trigger.id.clone(),
                            alert_id: entry.trigger.alert_id.clone(),
                            report_id: entry.trigger.report_id.clone(),
                            channel: kind.as_str().to_string(),
                            state,
                            reason: reason.clone(),
                        });
                    }
                }
            }
        }
        any_delivered
    }

    /// Bounded, backed-off channel send. A transient failure that exhausts
    /// the attempt cap is treated as permanent.
    async fn send_with_retry(
        &self,
        channel: &dyn NotificationChannel,
        recipient: &str,
        message: &RenderedMessage,
    ) -> Result<(), (DeliveryState, String)> {
        let mut backoff = self.retry.base_backoff;
        for attempt in 1..=self.retry.max_attempts {
            let outcome = match timeout(self.retry.send_timeout, channel.send(recipient, message))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => crate::services::SendOutcome::TransientError("send timed out".to_string()),
            };

            match outcome {
                crate::services::SendOutcome::Delivered => return Ok(()),
                crate::services::SendOutcome::PermanentError(reason) => {
                    return Err((DeliveryState::FailedPermanent, reason));
                }
                crate::services::SendOutcome::TransientError(reason) => {
                    if attempt == self.retry.max_attempts {
                        return Err((
                            DeliveryState::FailedPermanent,
                            format!("retries exhausted: {}", reason),
                        ));
                    }
                    tracing::debug!(
                        channel = channel.kind().as_str(),
                        attempt,
                        %reason,
                        "transient send failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    /// Bump the originating alert's counters exactly once per
    /// `(alert_id, report_id)` pair
    async fn count_trigger(&self, trigger: &AlertTrigger) {
        let fresh = {
            let mut counted = self.counted.lock().unwrap_or_else(|e| e.into_inner());
            counted.insert(trigger.dedup_key())
        };
        if !fresh {
            return;
        }
        if let Err(e) = self.alerts.record_trigger(&trigger.alert_id, trigger.matched_at).await {
            tracing::warn!(alert_id = %trigger.alert_id, error = %e, "failed to record trigger");
        }
    }

    fn buffer_digest(
        &self,
        kind: DigestKind,
        trigger: &AlertTrigger,
        report: &LostPetReport,
        now: DateTime<Utc>,
    ) {
        let line = format!(
            "{} {} near {} ({})",
            report.color,
            report.species,
            report.location.address,
            report.date_time_lost_found.format("%Y-%m-%d"),
        );
        self.digests.append(kind, DigestEntry { trigger: trigger.clone(), line }, now);
    }

    fn is_suppressed(&self, user_id: &str, kind: ChannelKind) -> bool {
        let suppressed = self.suppressed.lock().unwrap_or_else(|e| e.into_inner());
        suppressed.contains(&(user_id.to_string(), kind))
    }

    fn suppress(&self, user_id: &str, kind: ChannelKind) {
        let mut suppressed = self.suppressed.lock().unwrap_or_else(|e| e.into_inner());
        suppressed.insert((user_id.to_string(), kind));
    }

    /// If the subscriber is currently inside their quiet window, the UTC
    /// instant the window ends
    fn quiet_window_end(&self, user_id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let contacts = self.contacts.read().unwrap_or_else(|e| e.into_inner());
        let quiet = contacts.get(user_id)?.quiet_hours?;
        quiet_window_end(&quiet, now)
    }

    fn emit(&self, event: EngineEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

/// Channels enabled on the trigger for which the subscriber has an address
fn enabled_recipients(
    contact: &SubscriberContact,
    flags: crate::models::AlertChannels,
) -> Vec<(ChannelKind, String)> {
    let mut out = Vec::new();
    if flags.email {
        if let Some(email) = &contact.email {
            out.push((ChannelKind::Email, email.clone()));
        }
    }
    if flags.sms {
        if let Some(phone) = &contact.phone {
            out.push((ChannelKind::Sms, phone.clone()));
        }
    }
    if flags.push {
        if let Some(token) = &contact.push_token {
            out.push((ChannelKind::Push, token.clone()));
        }
    }
    out
}

/// End of the current quiet window in UTC, or None when outside it
fn quiet_window_end(quiet: &QuietHours, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(quiet.utc_offset_minutes * 60)?;
    let local = now.with_timezone(&offset);
    let hour = local.hour();

    let inside = if quiet.start_hour <= quiet.end_hour {
        hour >= quiet.start_hour && hour < quiet.end_hour
    } else {
        hour >= quiet.start_hour || hour < quiet.end_hour
    };
    if !inside {
        return None;
    }

    let mut end = offset
        .with_ymd_and_hms(local.year(), local.month(), local.day(), quiet.end_hour, 0, 0)
        .single()?;
    if end <= local {
        end += ChronoDuration::days(1);
    }
    Some(end.with_timezone(&Utc))
}
