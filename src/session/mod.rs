//! The session lifecycle manager.
//!
//! One `SessionManager` instance corresponds to one "tab": it caches the
//! current session in memory, persists it through the shared store, arms
//! the hard-expiry timer, coordinates concurrent refreshes through a
//! single-flight slot, and mirrors changes made by other instances of the
//! same store.

mod activity;
mod single_flight;

pub use activity::ActivitySignal;
pub use single_flight::SingleFlight;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::expiration::ExpiryTimer;
use crate::refresh::{self, RefreshClient, RefreshError};
use crate::storage::{SharedStore, StoredSession};
use crate::tokens::{self, TokenBundle};

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No session established")]
    NoSession,
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

/// In-page signal consumed by UI collaborators; `LoggedOut` fires on every
/// `logout` call, on hard expiry, on a failed proactive refresh, and when
/// another instance ends the shared session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { role: Option<String> },
    LoggedOut,
    Refreshed,
}

/// The cached current session. `role` is always derived from the access
/// token's own claims, never read back from storage.
#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    expires_at: DateTime<Utc>,
    refresh_token: Option<String>,
    role: Option<String>,
}

struct Inner {
    client: RefreshClient,
    config: Config,
    /// Bumped on every session end; an in-flight refresh that started
    /// under an older epoch must not commit (logout wins).
    epoch: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
    /// Identifies this instance's writes in the shared store's change
    /// stream, so it never reacts to its own persistence.
    id: Uuid,
    in_flight: SingleFlight<String, RefreshError>,
    ready: watch::Sender<bool>,
    session: Mutex<Option<Session>>,
    shutdown: CancellationToken,
    store: SharedStore,
    timer: ExpiryTimer,
}

pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(config: Config, store: SharedStore) -> Self {
        let (ready, _) = watch::channel(false);
        let (events, _) = broadcast::channel(16);
        let client = RefreshClient::new(&config.endpoint.refresh_url);

        Self {
            inner: Arc::new(Inner {
                client,
                config,
                epoch: AtomicU64::new(0),
                events,
                id: Uuid::new_v4(),
                in_flight: SingleFlight::new(),
                ready,
                session: Mutex::new(None),
                shutdown: CancellationToken::new(),
                store,
                timer: ExpiryTimer::new(),
            }),
        }
    }

    /// Run the initial restore and begin mirroring foreign store changes.
    ///
    /// Readiness flips to `true` once the restore has settled, including
    /// the one refresh attempted when the persisted session is already
    /// past its expiry.
    pub async fn start(&self) {
        self.spawn_store_listener();
        Self::resync(&self.inner).await;
        self.inner.ready.send_replace(true);
        debug!(
            authenticated = self.is_authenticated(),
            "Initial session restore complete"
        );
    }

    /// Establish a session from a normalized token bundle.
    ///
    /// An undecodable access token makes this a no-op: no partial session
    /// is ever established.
    pub fn login(&self, bundle: TokenBundle) {
        let claims = match tokens::decode(&bundle.access_token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Login bundle carried an undecodable access token, ignoring");
                return;
            }
        };

        let expires_at = claims.expires_at().unwrap_or_else(|| {
            Utc::now() + chrono_dur(self.inner.config.timing.default_ttl)
        });
        let session = Session {
            access_token: bundle.access_token,
            expires_at,
            refresh_token: bundle.refresh_token,
            role: claims.role(),
        };

        let inner = &self.inner;
        inner.store.persist(inner.id, &snapshot_of(&session));
        *inner.session.lock().unwrap() = Some(session.clone());
        Self::arm_expiry(inner, expires_at);

        info!(role = ?session.role, expires_at = %expires_at, "Session established");
        let _ = inner.events.send(SessionEvent::LoggedIn { role: session.role });
    }

    /// End the session: cancel the expiry timer, clear the store, drop the
    /// cached session, broadcast `LoggedOut`. Idempotent beyond the
    /// broadcast, which fires once per call.
    pub fn logout(&self) {
        Self::end_session(&self.inner, "logout requested");
    }

    /// The contract used by every authenticated API caller.
    ///
    /// Returns the cached token without touching the network while it is
    /// more than `refresh_margin` from expiry; otherwise joins (or starts)
    /// the single-flight refresh. A refresh failure on this path is
    /// surfaced to the caller and does NOT end the session; yanking a
    /// user out mid-interaction is reserved for the proactive paths.
    pub async fn ensure_valid_access(&self) -> Result<String, AuthError> {
        let margin = chrono_dur(self.inner.config.timing.refresh_margin);
        {
            let session = self.inner.session.lock().unwrap();
            match session.as_ref() {
                None => return Err(AuthError::NoSession),
                Some(s) if s.expires_at - Utc::now() > margin => {
                    return Ok(s.access_token.clone())
                }
                Some(_) => {}
            }
        }

        Ok(Self::join_refresh(&self.inner).await?)
    }

    /// Force a refresh, joining one already in flight.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        Ok(Self::join_refresh(&self.inner).await?)
    }

    /// Report a user-interaction signal.
    ///
    /// Within `activity_window` of expiry this triggers a background
    /// refresh; if that refresh fails the session is ended immediately
    /// rather than left stale until the hard timer.
    pub fn notify_activity(&self, signal: ActivitySignal) {
        let window = chrono_dur(self.inner.config.timing.activity_window);
        let near_expiry = {
            let session = self.inner.session.lock().unwrap();
            match session.as_ref() {
                None => return,
                Some(s) => s.expires_at - Utc::now() <= window,
            }
        };
        if !near_expiry {
            return;
        }

        debug!(signal = signal.as_str(), "Activity near expiry, refreshing in the background");
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else { return };
            match Self::join_refresh(&inner).await {
                Ok(_) => {}
                // The session already ended elsewhere, nothing to do
                Err(RefreshError::Superseded) => {}
                Err(e) => {
                    warn!(error = %e, "Activity-triggered refresh failed, ending session");
                    Self::end_session(&inner, "proactive refresh failed");
                }
            }
        });
    }

    /// Subscribe to session events (the in-page logout broadcast).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// True once the initial restore has completed. Distinguishes "not
    /// yet determined" from "determined unauthenticated".
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Wait for the initial restore to complete.
    pub async fn ready(&self) {
        let mut rx = self.inner.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.lock().unwrap().is_some()
    }

    /// Upper-cased role of the current session, if any.
    pub fn role(&self) -> Option<String> {
        self.inner
            .session
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|s| s.role.clone())
    }

    /// Release the store subscription, the expiry timer, and any spawned
    /// background work. Also runs on drop.
    pub fn dispose(&self) {
        self.inner.shutdown.cancel();
        self.inner.timer.cancel();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Attach to the single-flight refresh, starting one if none is in
    /// flight.
    async fn join_refresh(inner: &Arc<Inner>) -> Result<String, RefreshError> {
        let weak = Arc::downgrade(inner);
        let op = inner.in_flight.join(move || Self::run_refresh(weak));
        op.await
    }

    /// The refresh operation shared by every attached caller.
    ///
    /// Holds only a weak reference across the network await so a disposed
    /// manager cannot be kept alive (or resurrected) by a late response.
    async fn run_refresh(weak: Weak<Inner>) -> Result<String, RefreshError> {
        let (client, refresh_token, default_ttl, epoch_at_start) = {
            let inner = weak.upgrade().ok_or(RefreshError::Superseded)?;
            let refresh_token = inner
                .session
                .lock()
                .unwrap()
                .as_ref()
                .and_then(|s| s.refresh_token.clone())
                .or_else(|| inner.store.read().refresh_token);
            (
                inner.client.clone(),
                refresh_token,
                inner.config.timing.default_ttl,
                inner.epoch.load(Ordering::SeqCst),
            )
        };

        let grant = client.refresh(refresh_token.as_deref()).await?;
        let claims = tokens::decode(&grant.access_token)?;
        let expires_at = refresh::resolve_expiry(&grant, &claims, default_ttl);

        let inner = weak.upgrade().ok_or(RefreshError::Superseded)?;
        if inner.epoch.load(Ordering::SeqCst) != epoch_at_start {
            debug!("Logout won over an in-flight refresh, discarding the new grant");
            return Err(RefreshError::Superseded);
        }

        let session = Session {
            access_token: grant.access_token.clone(),
            expires_at,
            // Rotation: keep the old refresh token when none was returned
            refresh_token: grant.refresh_token.or(refresh_token),
            role: claims.role(),
        };
        inner.store.persist(inner.id, &snapshot_of(&session));
        *inner.session.lock().unwrap() = Some(session);
        Self::arm_expiry(&inner, expires_at);

        debug!(expires_at = %expires_at, "Access token refreshed");
        let _ = inner.events.send(SessionEvent::Refreshed);
        Ok(grant.access_token)
    }

    /// Re-run the restore procedure against the persisted store: used for
    /// the initial restore and whenever another instance changes the
    /// store.
    async fn resync(inner: &Arc<Inner>) {
        let snapshot = inner.store.read();
        let was_authenticated = inner.session.lock().unwrap().is_some();

        let (Some(token), Some(expires_ms)) = (snapshot.access_token, snapshot.expires_at) else {
            Self::drop_cached_session(inner, was_authenticated, "nothing persisted");
            return;
        };
        let Some(expires_at) = DateTime::from_timestamp_millis(expires_ms) else {
            Self::drop_cached_session(inner, was_authenticated, "unreadable expiry");
            return;
        };

        if expires_at <= Utc::now() {
            debug!("Persisted session already expired, attempting refresh");
            if let Err(e) = Self::join_refresh(inner).await {
                debug!(error = %e, "Refresh of expired persisted session failed");
                inner.store.clear(inner.id);
                Self::drop_cached_session(inner, was_authenticated, "expired and refresh failed");
            }
            return;
        }

        // Role is re-derived from the token itself on every restore
        let role = match tokens::decode(&token) {
            Ok(claims) => claims.role(),
            Err(e) => {
                warn!(error = %e, "Persisted access token is undecodable, treating session as absent");
                Self::drop_cached_session(inner, was_authenticated, "undecodable token");
                return;
            }
        };

        *inner.session.lock().unwrap() = Some(Session {
            access_token: token,
            expires_at,
            refresh_token: snapshot.refresh_token,
            role,
        });
        Self::arm_expiry(inner, expires_at);
        debug!(expires_at = %expires_at, "Session restored from store");
    }

    /// Forget the cached session without touching the store (the store is
    /// already empty, foreign, or deliberately left alone). Broadcasts
    /// `LoggedOut` only on an authenticated → unauthenticated transition.
    fn drop_cached_session(inner: &Arc<Inner>, was_authenticated: bool, reason: &str) {
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.timer.cancel();
        *inner.session.lock().unwrap() = None;
        if was_authenticated {
            info!(reason, "Session ended by external change");
            let _ = inner.events.send(SessionEvent::LoggedOut);
        }
    }

    /// End the session locally: clear the store, drop the cache, broadcast.
    fn end_session(inner: &Arc<Inner>, reason: &str) {
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.timer.cancel();
        inner.store.clear(inner.id);
        let had_session = inner.session.lock().unwrap().take().is_some();
        if had_session {
            info!(reason, "Session ended");
        }
        let _ = inner.events.send(SessionEvent::LoggedOut);
    }

    /// Arm the hard-expiry timer; firing unconditionally ends the session.
    fn arm_expiry(inner: &Arc<Inner>, deadline: DateTime<Utc>) {
        let weak = Arc::downgrade(inner);
        inner.timer.arm(deadline, move || async move {
            if let Some(inner) = weak.upgrade() {
                Self::end_session(&inner, "access token expired");
            }
        });
    }

    /// Mirror changes other instances make to the shared store.
    fn spawn_store_listener(&self) {
        let mut rx = self.inner.store.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    change = rx.recv() => match change {
                        Ok(change) => {
                            let Some(inner) = weak.upgrade() else { break };
                            if change.source == inner.id {
                                continue;
                            }
                            debug!(source = %change.source, "Store changed by another instance, resyncing");
                            Self::resync(&inner).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            let Some(inner) = weak.upgrade() else { break };
                            warn!(skipped, "Store change stream lagged, resyncing");
                            Self::resync(&inner).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn snapshot_of(session: &Session) -> StoredSession {
    StoredSession {
        access_token: Some(session.access_token.clone()),
        expires_at: Some(session.expires_at.timestamp_millis()),
        last_activity: Some(Utc::now().timestamp_millis()),
        refresh_token: session.refresh_token.clone(),
    }
}

fn chrono_dur(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}
