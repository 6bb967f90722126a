//! Sessions and per-user progress.
//!
//! Login is a stub: each provider maps to one fixed user. Provider accounts
//! (google, facebook) carry a `UserProfile`; guests and the admin do not, so
//! profile mutations on their sessions are no-ops.
//!
//! The daily streak is evaluated once, whenever a profile is loaded into a
//! session (login, or a session restored from storage).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{EventId, TopicId, User, UserProfile, UserProvider};
use crate::storage::{ProfileRepo, StorageError};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown or expired session")]
    UnknownSession,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
    pub profile: Option<UserProfile>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.user.provider == UserProvider::Admin
    }
}

pub fn stub_user(provider: UserProvider) -> User {
    let (id, name, avatar_url) = match provider {
        UserProvider::Google => ("user-google-123", "Al-Khwarizmi", "https://i.pravatar.cc/150?u=khwarizmi"),
        UserProvider::Facebook => ("user-facebook-456", "Ibn Battuta", "https://i.pravatar.cc/150?u=battuta"),
        UserProvider::Admin => ("user-admin-001", "Site Admin", "https://i.pravatar.cc/150?u=admin"),
        UserProvider::Guest => ("user-guest-789", "Guest", ""),
    };
    User { id: id.into(), name: name.into(), avatar_url: avatar_url.into(), provider }
}

/// Same calendar day: unchanged. Previous calendar day: +1. Anything else: back to 1.
/// Returns whether the profile changed.
pub fn apply_daily_streak(profile: &mut UserProfile, now: DateTime<Utc>) -> bool {
    let today = now.date_naive();
    let last = profile.last_login.date_naive();
    if last == today {
        return false;
    }
    if last.succ_opt() == Some(today) {
        profile.daily_streak += 1;
    } else {
        profile.daily_streak = 1;
    }
    profile.last_login = now;
    true
}

/// Live tokens. Filled from storage on first use so restored tokens and new
/// logins end up in the same record.
#[derive(Default)]
struct SessionTable {
    loaded: bool,
    by_token: HashMap<String, User>,
}

pub struct SessionStore {
    sessions: RwLock<SessionTable>,
    /// user id -> profile, shared by every session of that user
    profiles: RwLock<HashMap<String, UserProfile>>,
    repo: Arc<dyn ProfileRepo>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn ProfileRepo>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(SessionTable::default()),
            profiles: RwLock::new(HashMap::new()),
            repo,
            clock,
        }
    }

    /// Stored profile (or a fresh one) with today's streak applied and saved.
    /// An unreadable record yields a fresh profile that is not written back.
    #[instrument(level = "debug", skip(self))]
    async fn load_profile(&self, user_id: &str) -> UserProfile {
        let mut profile = match self.repo.load_profile(user_id).await {
            Ok(Some(p)) => p,
            Ok(None) => UserProfile::new(user_id),
            Err(e) => {
                error!(target: "profile", %user_id, error = %e, "Failed to load profile; using defaults");
                return UserProfile::new(user_id);
            }
        };
        if apply_daily_streak(&mut profile, self.clock.now()) {
            info!(target: "profile", %user_id, streak = profile.daily_streak, "Daily streak updated");
        }
        if let Err(e) = self.repo.save_profile(&profile).await {
            error!(target: "profile", %user_id, error = %e, "Failed to save profile");
        }
        profile
    }

    async fn attach_profile(&self, user: &User) -> Option<UserProfile> {
        if !user.provider.tracks_progress() {
            return None;
        }
        let profile = self.load_profile(&user.id).await;
        self.profiles.write().await.insert(user.id.clone(), profile.clone());
        Some(profile)
    }

    /// The session table, merged with the stored record the first time it is touched.
    /// An unreadable record is logged and treated as empty; the next login replaces it.
    async fn table(&self) -> RwLockWriteGuard<'_, SessionTable> {
        let mut table = self.sessions.write().await;
        if !table.loaded {
            match self.repo.load_sessions().await {
                Ok(Some(stored)) => {
                    for (token, user) in stored {
                        table.by_token.entry(token).or_insert(user);
                    }
                }
                Ok(None) => {}
                Err(e) => error!(target: "profile", error = %e, "Stored sessions unreadable; starting empty"),
            }
            table.loaded = true;
        }
        table
    }

    /// Save `next` and only then make it the live table.
    async fn commit(&self, table: &mut SessionTable, next: HashMap<String, User>) -> Result<(), SessionError> {
        self.repo.save_sessions(&next).await?;
        table.by_token = next;
        Ok(())
    }

    /// A user holds one token at a time: logging in again replaces the previous one.
    #[instrument(level = "info", skip(self))]
    pub async fn login(&self, provider: UserProvider) -> Result<Session, SessionError> {
        let user = stub_user(provider);
        let profile = self.attach_profile(&user).await;
        let token = Uuid::new_v4().to_string();

        let mut table = self.table().await;
        let mut next = table.by_token.clone();
        next.retain(|_, u| u.id != user.id);
        next.insert(token.clone(), user.clone());
        self.commit(&mut table, next).await?;

        info!(target: "profile", user_id = %user.id, ?provider, "Logged in");
        Ok(Session { token, user, profile })
    }

    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        let mut table = self.table().await;
        let Some(user) = table.by_token.get(token).cloned() else { return Ok(()) };
        let mut next = table.by_token.clone();
        next.remove(token);
        self.commit(&mut table, next).await?;
        info!(target: "profile", user_id = %user.id, "Logged out");
        Ok(())
    }

    /// Look a session up, restoring it (and its profile) from storage after a restart.
    pub async fn session(&self, token: &str) -> Result<Session, SessionError> {
        let user = self.table().await.by_token.get(token).cloned().ok_or(SessionError::UnknownSession)?;
        if user.provider.tracks_progress() && !self.profiles.read().await.contains_key(&user.id) {
            self.attach_profile(&user).await;
        }
        let profile = self.profiles.read().await.get(&user.id).cloned();
        Ok(Session { token: token.to_string(), user, profile })
    }

    /// Apply `f` to a copy of the session's profile; the copy replaces the live
    /// profile once it is saved, so a failed save leaves nothing changed.
    /// Sessions without a profile are left alone and yield `None`.
    async fn update_profile<F>(&self, token: &str, f: F) -> Result<Option<UserProfile>, SessionError>
    where
        F: FnOnce(&mut UserProfile) -> bool,
    {
        let user = self.session(token).await?.user;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(&user.id) else { return Ok(None) };
        let mut next = profile.clone();
        if f(&mut next) {
            self.repo.save_profile(&next).await?;
            *profile = next;
        }
        Ok(Some(profile.clone()))
    }

    #[instrument(level = "info", skip(self, token))]
    pub async fn mark_event_completed(&self, token: &str, event_id: EventId) -> Result<Option<UserProfile>, SessionError> {
        self.update_profile(token, |p| {
            if p.completed_event_ids.contains(&event_id) {
                return false;
            }
            p.completed_event_ids.push(event_id);
            true
        })
        .await
    }

    #[instrument(level = "info", skip(self, token))]
    pub async fn update_quiz_score(&self, token: &str, score: u32) -> Result<Option<UserProfile>, SessionError> {
        let now = self.clock.now();
        self.update_profile(token, |p| {
            let stats = &mut p.global_quiz_stats;
            stats.high_score = stats.high_score.max(score);
            stats.last_score = score;
            stats.last_played = now;
            true
        })
        .await
    }

    #[instrument(level = "debug", skip(self, token))]
    pub async fn set_last_viewed_location(
        &self,
        token: &str,
        topic_id: TopicId,
        event_id: EventId,
    ) -> Result<Option<UserProfile>, SessionError> {
        self.update_profile(token, |p| {
            p.last_viewed_topic_id = Some(topic_id);
            p.last_viewed_event_id = Some(event_id);
            true
        })
        .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::LocalBackend;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Settable clock so a test can move across days.
    pub(crate) struct FixedClock(pub Mutex<DateTime<Utc>>);

    impl FixedClock {
        pub(crate) fn at(y: i32, m: u32, d: u32) -> Self {
            Self(Mutex::new(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()))
        }

        fn set(&self, y: i32, m: u32, d: u32) {
            *self.0.lock().unwrap() = Utc.with_ymd_and_hms(y, m, d, 23, 30, 0).unwrap();
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    fn profile_last_seen(d: u32, streak: u32) -> UserProfile {
        let mut p = UserProfile::new("u");
        p.last_login = day(d);
        p.daily_streak = streak;
        p
    }

    #[test]
    fn streak_same_day_is_unchanged() {
        let mut p = profile_last_seen(10, 4);
        assert!(!apply_daily_streak(&mut p, day(10)));
        assert_eq!(p.daily_streak, 4);
        assert_eq!(p.last_login, day(10));
    }

    #[test]
    fn streak_next_day_increments() {
        let mut p = profile_last_seen(10, 4);
        assert!(apply_daily_streak(&mut p, day(11)));
        assert_eq!(p.daily_streak, 5);
        assert_eq!(p.last_login, day(11));
    }

    #[test]
    fn streak_gap_resets_to_one() {
        let mut p = profile_last_seen(10, 4);
        apply_daily_streak(&mut p, day(15));
        assert_eq!(p.daily_streak, 1);
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let mut p = UserProfile::new("u");
        p.last_login = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap();
        p.daily_streak = 2;
        apply_daily_streak(&mut p, Utc.with_ymd_and_hms(2024, 3, 1, 0, 1, 0).unwrap());
        assert_eq!(p.daily_streak, 3);
    }

    #[test]
    fn fresh_profile_starts_at_one() {
        let mut p = UserProfile::new("u");
        apply_daily_streak(&mut p, day(1));
        assert_eq!(p.daily_streak, 1);
    }

    fn store(dir: &TempDir, clock: Arc<FixedClock>) -> SessionStore {
        SessionStore::new(Arc::new(LocalBackend::new(dir.path())), clock)
    }

    #[tokio::test]
    async fn login_loads_profile_for_provider_accounts_only() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir, Arc::new(FixedClock::at(2024, 5, 1)));

        let google = sessions.login(UserProvider::Google).await.unwrap();
        assert_eq!(google.user.id, "user-google-123");
        assert_eq!(google.profile.as_ref().unwrap().daily_streak, 1);

        let admin = sessions.login(UserProvider::Admin).await.unwrap();
        assert!(admin.is_admin());
        assert!(admin.profile.is_none());

        let guest = sessions.login(UserProvider::Guest).await.unwrap();
        assert!(guest.profile.is_none());
        assert_eq!(sessions.mark_event_completed(&guest.token, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn streak_across_logins() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::at(2024, 5, 1));
        let sessions = store(&dir, clock.clone());

        sessions.login(UserProvider::Facebook).await.unwrap();
        clock.set(2024, 5, 2);
        let s = sessions.login(UserProvider::Facebook).await.unwrap();
        assert_eq!(s.profile.unwrap().daily_streak, 2);

        clock.set(2024, 5, 7);
        let s = sessions.login(UserProvider::Facebook).await.unwrap();
        assert_eq!(s.profile.unwrap().daily_streak, 1);
    }

    #[tokio::test]
    async fn mark_event_completed_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir, Arc::new(FixedClock::at(2024, 5, 1)));
        let s = sessions.login(UserProvider::Google).await.unwrap();

        sessions.mark_event_completed(&s.token, 7).await.unwrap();
        sessions.mark_event_completed(&s.token, 3).await.unwrap();
        let p = sessions.mark_event_completed(&s.token, 7).await.unwrap().unwrap();
        assert_eq!(p.completed_event_ids, vec![7, 3]);
    }

    #[tokio::test]
    async fn quiz_score_keeps_the_high_score() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::at(2024, 5, 1));
        let sessions = store(&dir, clock.clone());
        let s = sessions.login(UserProvider::Google).await.unwrap();

        sessions.update_quiz_score(&s.token, 500).await.unwrap();
        let p = sessions.update_quiz_score(&s.token, 200).await.unwrap().unwrap();
        assert_eq!(p.global_quiz_stats.high_score, 500);
        assert_eq!(p.global_quiz_stats.last_score, 200);
        assert_eq!(p.global_quiz_stats.last_played, clock.now());
    }

    #[tokio::test]
    async fn progress_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::at(2024, 5, 1));
        let token = {
            let sessions = store(&dir, clock.clone());
            let s = sessions.login(UserProvider::Google).await.unwrap();
            sessions.set_last_viewed_location(&s.token, 4, 12).await.unwrap();
            s.token
        };

        let restarted = store(&dir, clock);
        let s = restarted.session(&token).await.unwrap();
        let p = s.profile.unwrap();
        assert_eq!(p.last_viewed_topic_id, Some(4));
        assert_eq!(p.last_viewed_event_id, Some(12));
    }

    #[tokio::test]
    async fn logout_forgets_the_token() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir, Arc::new(FixedClock::at(2024, 5, 1)));
        let s = sessions.login(UserProvider::Google).await.unwrap();

        sessions.logout(&s.token).await.unwrap();
        assert!(matches!(sessions.session(&s.token).await, Err(SessionError::UnknownSession)));
        assert!(matches!(
            sessions.update_quiz_score(&s.token, 1).await,
            Err(SessionError::UnknownSession)
        ));
    }

    #[tokio::test]
    async fn logging_in_again_replaces_the_previous_token() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir, Arc::new(FixedClock::at(2024, 5, 1)));

        let first = sessions.login(UserProvider::Guest).await.unwrap();
        for _ in 0..50 {
            sessions.login(UserProvider::Guest).await.unwrap();
        }
        let last = sessions.login(UserProvider::Guest).await.unwrap();
        sessions.login(UserProvider::Google).await.unwrap();

        assert_eq!(sessions.sessions.read().await.by_token.len(), 2);
        assert!(matches!(sessions.session(&first.token).await, Err(SessionError::UnknownSession)));
        assert_eq!(sessions.session(&last.token).await.unwrap().user.id, "user-guest-789");

        // one sessions record plus the google profile
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn restored_tokens_survive_new_logins() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::at(2024, 5, 1));
        let google = store(&dir, clock.clone()).login(UserProvider::Google).await.unwrap();

        let restarted = store(&dir, clock);
        restarted.login(UserProvider::Admin).await.unwrap();
        assert_eq!(restarted.session(&google.token).await.unwrap().user.id, "user-google-123");
    }

    /// Local storage whose profile writes can be switched off.
    struct FlakyProfiles {
        inner: LocalBackend,
        fail_saves: AtomicBool,
    }

    #[async_trait]
    impl ProfileRepo for FlakyProfiles {
        async fn load_sessions(&self) -> Result<Option<HashMap<String, User>>, StorageError> {
            self.inner.load_sessions().await
        }

        async fn save_sessions(&self, sessions: &HashMap<String, User>) -> Result<(), StorageError> {
            self.inner.save_sessions(sessions).await
        }

        async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StorageError> {
            self.inner.load_profile(user_id).await
        }

        async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            self.inner.save_profile(profile).await
        }
    }

    #[tokio::test]
    async fn failed_profile_save_leaves_the_profile_unchanged() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(FlakyProfiles { inner: LocalBackend::new(dir.path()), fail_saves: AtomicBool::new(false) });
        let sessions = SessionStore::new(repo.clone(), Arc::new(FixedClock::at(2024, 5, 1)));
        let s = sessions.login(UserProvider::Google).await.unwrap();

        repo.fail_saves.store(true, Ordering::SeqCst);
        assert!(matches!(sessions.mark_event_completed(&s.token, 42).await, Err(SessionError::Storage(_))));
        assert!(matches!(sessions.update_quiz_score(&s.token, 300).await, Err(SessionError::Storage(_))));
        let p = sessions.session(&s.token).await.unwrap().profile.unwrap();
        assert!(p.completed_event_ids.is_empty());
        assert_eq!(p.global_quiz_stats.high_score, 0);

        repo.fail_saves.store(false, Ordering::SeqCst);
        let p = sessions.mark_event_completed(&s.token, 42).await.unwrap().unwrap();
        assert_eq!(p.completed_event_ids, vec![42]);
    }
}
