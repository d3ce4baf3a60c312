use crate::auth::{extract_session_id, strip_fragment};
use crate::client::{ApiClient, DEFAULT_HISTORY_LIMIT};
use crate::errors::{StoreError, SyncError};
use crate::models::{
    ChatMessage, Habit, HabitLog, LeaderboardEntry, NewHabit, NewHabitLog, ScoreUpdate, User,
};
use crate::state::{Collection, Store};
use crate::stats::{build_profile_stats, rank_of, todays_logs, ProfileStats};
use tracing::{debug, info, warn};

const STATS_LOG_LIMIT: u32 = 1000;

#[derive(Clone)]
pub struct SyncContext {
    store: Store,
    api: ApiClient,
}

impl SyncContext {
    pub fn new(store: Store, api: ApiClient) -> Self {
        Self { store, api }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// An expired or missing session clears the local store rather than
    /// failing.
    pub async fn restore_session(&self) -> Result<Option<User>, SyncError> {
        match self.api.current_user().await? {
            Some(user) => {
                self.store.set_user(user.clone()).await?;
                debug!(user = %user.id, "session restored");
                Ok(Some(user))
            }
            None => {
                self.store.reset().await?;
                Ok(None)
            }
        }
    }

    pub async fn login_with_redirect(&self, url: &str) -> Result<User, SyncError> {
        let session_id = extract_session_id(url).ok_or(SyncError::InvalidRedirect)?;
        debug!(redirect = strip_fragment(url), "exchanging session id");
        let session = self.api.exchange_session(&session_id).await?;
        let user = self.api.get_user(&session.id).await?;
        self.store.set_user(user.clone()).await?;
        info!(user = %user.id, "signed in");
        Ok(user)
    }

    /// Always clears local state, even if the server call fails.
    pub async fn logout(&self) -> Result<(), SyncError> {
        if let Err(err) = self.api.logout().await {
            warn!("server logout failed, clearing local state anyway: {err}");
        }
        self.store.reset().await?;
        info!("signed out");
        Ok(())
    }

    pub async fn refresh_all(&self) -> Result<Option<User>, SyncError> {
        let Some(user) = self.restore_session().await? else {
            return Ok(None);
        };
        self.load_habits().await?;
        self.load_chat(DEFAULT_HISTORY_LIMIT).await?;
        Ok(Some(user))
    }

    pub async fn refresh_profile(&self) -> Result<User, SyncError> {
        let user = self.require_user().await?;
        let fresh = self.api.get_user(&user.id).await?;
        self.store.set_user(fresh.clone()).await?;
        Ok(fresh)
    }

    pub async fn refresh_score(&self) -> Result<ScoreUpdate, SyncError> {
        let user = self.require_user().await?;
        let update = self.api.update_user_score(&user.id).await?;
        self.refresh_profile().await?;
        info!(score = update.score, title = %update.title, "score refreshed");
        Ok(update)
    }

    /// Returns the habits held after the fetch, which may be newer than this
    /// fetch's own response.
    pub async fn load_habits(&self) -> Result<Vec<Habit>, SyncError> {
        let user = self.require_user().await?;
        let ticket = self.store.begin_fetch(Collection::Habits).await;
        let habits = self.api.get_user_habits(&user.id).await?;
        self.store.apply_habits(ticket, habits).await?;
        Ok(self.store.habits().await)
    }

    pub async fn load_chat(&self, limit: u32) -> Result<Vec<ChatMessage>, SyncError> {
        let user = self.require_user().await?;
        let ticket = self.store.begin_fetch(Collection::ChatMessages).await;
        let messages = self.api.get_chat_history(&user.id, limit).await?;
        self.store.apply_chat_messages(ticket, messages).await?;
        Ok(self.store.chat_messages().await)
    }

    pub async fn create_habit(&self, habit: NewHabit) -> Result<Habit, SyncError> {
        let user = self.require_user().await?;
        let edit = self
            .store
            .add_habit_pending(habit.provisional_for(&user.id))
            .await?;

        match self.api.create_habit(&user.id, &habit).await {
            Ok(created) => {
                keep_unless_signed_out(self.store.confirm_habit(edit, created.clone()).await)?;
                info!(habit = %created.id, name = %created.name, "habit created");
                Ok(created)
            }
            Err(err) => {
                self.store.rollback(edit).await?;
                Err(err.into())
            }
        }
    }

    pub async fn delete_habit(&self, habit_id: &str) -> Result<(), SyncError> {
        self.require_user().await?;
        let edit = self.store.remove_habit_pending(habit_id).await?;

        if let Err(err) = self.api.delete_habit(habit_id).await {
            if let Some(edit) = edit {
                self.store.rollback(edit).await?;
            }
            return Err(err.into());
        }
        info!(habit = %habit_id, "habit deleted");
        Ok(())
    }

    pub async fn log_habit(&self, log: NewHabitLog) -> Result<HabitLog, SyncError> {
        let user = self.require_user().await?;
        Ok(self.api.log_habit(&user.id, &log).await?)
    }

    pub async fn habit_logs(&self, limit: u32) -> Result<Vec<HabitLog>, SyncError> {
        let user = self.require_user().await?;
        Ok(self.api.get_habit_logs(&user.id, limit).await?)
    }

    pub async fn send_chat_message(&self, text: &str) -> Result<ChatMessage, SyncError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::EmptyMessage);
        }
        let user = self.require_user().await?;
        let edit = self
            .store
            .add_chat_message_pending(ChatMessage::provisional(&user.id, text))
            .await?;

        match self.api.send_chat_message(&user.id, text).await {
            Ok(reply) => {
                keep_unless_signed_out(self.store.add_chat_message(reply.clone()).await)?;
                Ok(reply)
            }
            Err(err) => {
                self.store.rollback(edit).await?;
                Err(err.into())
            }
        }
    }

    pub async fn todays_logs(&self) -> Result<Vec<HabitLog>, SyncError> {
        let logs = self.habit_logs(DEFAULT_HISTORY_LIMIT).await?;
        Ok(todays_logs(&logs))
    }

    pub async fn profile_stats(&self) -> Result<ProfileStats, SyncError> {
        let user = self.refresh_profile().await?;
        let habits = self.api.get_user_habits(&user.id).await?;
        let logs = self.api.get_habit_logs(&user.id, STATS_LOG_LIMIT).await?;
        Ok(build_profile_stats(&user, habits.len(), logs.len()))
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, SyncError> {
        Ok(self.api.get_leaderboard(limit).await?)
    }

    pub async fn my_rank(&self, entries: &[LeaderboardEntry]) -> Option<LeaderboardEntry> {
        let user = self.store.user().await?;
        rank_of(&user.id, entries).cloned()
    }

    async fn require_user(&self) -> Result<User, SyncError> {
        self.store.user().await.ok_or(SyncError::NotAuthenticated)
    }
}

fn keep_unless_signed_out(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(StoreError::OwnerMismatch { expected, found }) => {
            debug!(?expected, %found, "signed out while the request was in flight, dropping result");
            Ok(())
        }
        other => other,
    }
}
