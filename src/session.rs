use crate::identity::{Identity, UserId};
use crate::models::{DayView, MarkPastPreview, SessionStatus, SessionView, StatsResponse, UserRecord};
use crate::plan::{Clock, PLAN_DAYS, PlanDay, date_from_day, format_long_date, parse_start_date, today_plan_day};
use crate::progress::ProgressStore;
use crate::readings::ReadingCatalog;
use crate::stats::build_stats_at;
use crate::storage::RecordStore;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub type SharedSession = Arc<Mutex<SessionController>>;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    IdentityChanged(Option<Identity>),
    /// The record for `uid` changed; its content is read when handled.
    RecordChanged { uid: UserId },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Sign in to track your reading")]
    NotSignedIn,

    #[error("Please enter a valid date")]
    InvalidInput(String),

    #[error("{0}")]
    ConfirmationRequired(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub default_start: NaiveDate,
    pub persist_attempts: u32,
    pub persist_backoff: Duration,
}

/// Live subscription to one user's record. Dropping it stops delivery.
pub struct RecordSubscription {
    uid: UserId,
    latest: watch::Receiver<Option<UserRecord>>,
    task: JoinHandle<()>,
}

impl RecordSubscription {
    pub fn spawn(
        uid: UserId,
        mut updates: watch::Receiver<Option<UserRecord>>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let latest = updates.clone();
        let task_uid = uid.clone();
        let task = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                updates.borrow_and_update();
                let event = SessionEvent::RecordChanged {
                    uid: task_uid.clone(),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        });
        Self { uid, latest, task }
    }

    pub fn uid(&self) -> &UserId {
        &self.uid
    }

    /// The newest record the store has published, which may be newer than
    /// the change that queued the event being handled.
    pub fn latest(&self) -> Option<UserRecord> {
        self.latest.borrow().clone()
    }
}

impl Drop for RecordSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The signed-in user's session: progress, display cursor and the record
/// subscription, mutated one event at a time.
pub struct SessionController {
    store: Arc<dyn RecordStore>,
    catalog: Arc<ReadingCatalog>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    events: mpsc::UnboundedSender<SessionEvent>,
    status: SessionStatus,
    identity: Option<Identity>,
    progress: ProgressStore,
    current_day: Option<PlanDay>,
    subscription: Option<RecordSubscription>,
    notice: Option<String>,
    unsaved: bool,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn RecordStore>,
        catalog: Arc<ReadingCatalog>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            settings,
            events,
            status: SessionStatus::SignedOut,
            identity: None,
            progress: ProgressStore::new(),
            current_day: None,
            subscription: None,
            notice: None,
            unsaved: false,
        }
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::IdentityChanged(Some(identity)) => self.on_signed_in(identity).await,
            SessionEvent::IdentityChanged(None) => self.on_signed_out(),
            SessionEvent::RecordChanged { uid } => self.on_record_changed(uid),
        }
    }

    async fn on_signed_in(&mut self, identity: Identity) {
        if let Some(active) = &self.identity {
            if active.uid == identity.uid {
                debug!(uid = %identity.uid, "identity already active");
                self.identity = Some(identity);
                return;
            }
            self.on_signed_out();
        }

        info!(uid = %identity.uid, "loading session");
        self.status = SessionStatus::Loading;
        self.notice = None;
        self.unsaved = false;

        let updates = self.store.subscribe(&identity.uid).await;
        self.subscription = Some(RecordSubscription::spawn(
            identity.uid.clone(),
            updates,
            self.events.clone(),
        ));

        match self.store.get(&identity.uid).await {
            Ok(Some(record)) => self.progress.replace_with_record(record),
            Ok(None) => {
                debug!(uid = %identity.uid, "no saved progress, starting fresh");
                self.progress.clear();
            }
            Err(err) => {
                error!(uid = %identity.uid, "failed to load progress: {err}");
                self.progress.clear();
                self.notice = Some(format!("Your saved progress could not be loaded: {err}"));
            }
        }

        self.identity = Some(identity);
        self.status = SessionStatus::Active;
        self.current_day = Some(self.today());
        info!(
            completed = self.progress.completed_count(),
            day = %self.today(),
            "session active"
        );
    }

    fn on_signed_out(&mut self) {
        if self.status == SessionStatus::SignedOut && self.identity.is_none() {
            return;
        }
        if let Some(identity) = self.identity.take() {
            info!(uid = %identity.uid, "session closed");
        }
        self.subscription = None;
        self.progress.clear();
        self.current_day = None;
        self.notice = None;
        self.unsaved = false;
        self.status = SessionStatus::SignedOut;
    }

    fn on_record_changed(&mut self, uid: UserId) {
        let record = match &self.subscription {
            Some(subscription) if self.status == SessionStatus::Active && *subscription.uid() == uid => {
                subscription.latest()
            }
            _ => {
                debug!(uid = %uid, "ignoring update for inactive record");
                return;
            }
        };
        if self.unsaved {
            debug!(uid = %uid, "local changes not yet saved, keeping them over the stored record");
            return;
        }
        match record {
            Some(record) => {
                self.progress.replace_with_record(record);
                debug!(completed = self.progress.completed_count(), "progress refreshed");
            }
            None => debug!(uid = %uid, "record removed remotely, keeping local progress"),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn current_day(&self) -> Option<PlanDay> {
        self.current_day
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn effective_start(&self) -> NaiveDate {
        self.progress.effective_start(self.settings.default_start)
    }

    fn today(&self) -> PlanDay {
        today_plan_day(self.clock.today(), self.effective_start())
    }

    fn active_day(&self) -> Result<PlanDay, SessionError> {
        match (self.status, self.current_day) {
            (SessionStatus::Active, Some(day)) => Ok(day),
            _ => Err(SessionError::NotSignedIn),
        }
    }

    /// Moves the cursor by `delta`; a target outside the plan leaves it put.
    pub fn navigate(&mut self, delta: i64) -> Result<PlanDay, SessionError> {
        let current = self.active_day()?;
        let day = current.offset(delta).unwrap_or(current);
        self.current_day = Some(day);
        Ok(day)
    }

    pub fn go_to_today(&mut self) -> Result<PlanDay, SessionError> {
        self.active_day()?;
        let day = self.today();
        self.current_day = Some(day);
        Ok(day)
    }

    /// Flips the shown day and saves; returns the new completion state.
    pub async fn toggle_current(&mut self) -> Result<bool, SessionError> {
        let day = self.active_day()?;
        let completed = self.progress.toggle(day);
        debug!(%day, completed, "toggled day");
        self.persist().await;
        Ok(completed)
    }

    pub async fn change_start_date(&mut self, input: &str) -> Result<NaiveDate, SessionError> {
        self.active_day()?;
        let start = parse_start_date(input).ok_or_else(|| SessionError::InvalidInput(input.to_owned()))?;
        self.progress.set_start_override(start);
        info!(%start, "start date changed");
        self.persist().await;
        self.go_to_today()?;
        Ok(start)
    }

    pub fn mark_past_preview(&self) -> Result<MarkPastPreview, SessionError> {
        self.active_day()?;
        let days_to_mark = self.today().get();
        Ok(MarkPastPreview {
            days_to_mark,
            message: format!("This will mark days 1-{days_to_mark} as complete. Are you sure?"),
        })
    }

    /// Marks day 1 through today. Nothing happens without `confirmed`.
    pub async fn mark_past_complete(&mut self, confirmed: bool) -> Result<usize, SessionError> {
        let preview = self.mark_past_preview()?;
        if !confirmed {
            return Err(SessionError::ConfirmationRequired(preview.message));
        }
        let added = self.progress.mark_range(1, i64::from(preview.days_to_mark));
        info!(added, through = preview.days_to_mark, "marked past days complete");
        self.persist().await;
        Ok(added)
    }

    pub fn stats(&self) -> Result<StatsResponse, SessionError> {
        self.active_day()?;
        Ok(build_stats_at(self.clock.today(), &self.progress, self.settings.default_start))
    }

    pub fn view(&self) -> SessionView {
        let active = self.status == SessionStatus::Active;
        let start = self.effective_start();
        SessionView {
            status: self.status,
            email: self.identity.as_ref().map(|identity| identity.email.clone()),
            start_date: active.then(|| start.to_string()),
            day: self
                .current_day
                .filter(|_| active)
                .map(|day| self.day_view(day, start)),
            stats: self.stats().ok(),
            notice: self.notice.clone(),
        }
    }

    fn day_view(&self, day: PlanDay, start: NaiveDate) -> DayView {
        let reading = self.catalog.get(day);
        let progress = (f64::from(day.get()) / f64::from(PLAN_DAYS) * 100.0).round();
        DayView {
            day,
            label: reading.label.clone(),
            text: reading.text.clone(),
            date: format_long_date(date_from_day(i64::from(day.get()), start)),
            completed: self.progress.is_completed(day),
            progress_percent: progress as u8,
            has_prev: day > PlanDay::FIRST,
            has_next: day < PlanDay::LAST,
        }
    }

    /// Writes the whole record, retrying with linear backoff. A final
    /// failure keeps local state, leaves a notice for the UI and holds off
    /// remote updates until a later write succeeds.
    async fn persist(&mut self) {
        let Some(uid) = self.identity.as_ref().map(|identity| identity.uid.clone()) else {
            return;
        };
        let record = self.progress.to_record();
        let attempts = self.settings.persist_attempts.max(1);

        for attempt in 1..=attempts {
            match self.store.set(&uid, &record).await {
                Ok(()) => {
                    self.notice = None;
                    self.unsaved = false;
                    return;
                }
                Err(err) if attempt < attempts => {
                    warn!(attempt, "failed to save progress, retrying: {err}");
                    tokio::time::sleep(self.settings.persist_backoff * attempt).await;
                }
                Err(err) => {
                    error!(attempts, "giving up saving progress: {err}");
                    self.notice = Some(format!("Your progress could not be saved: {err}"));
                    self.unsaved = true;
                }
            }
        }
    }
}

/// Relays identity changes into the session queue, starting with the
/// identity current at registration.
pub fn forward_identity(
    mut identity: watch::Receiver<Option<Identity>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let current = identity.borrow_and_update().clone();
        if events.send(SessionEvent::IdentityChanged(current)).is_err() {
            return;
        }
        while identity.changed().await.is_ok() {
            let next = identity.borrow_and_update().clone();
            if events.send(SessionEvent::IdentityChanged(next)).is_err() {
                break;
            }
        }
    })
}

/// Handles queued events one at a time, each to completion.
pub async fn run_event_loop(session: SharedSession, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        session.lock().await.handle_event(event).await;
    }
}
