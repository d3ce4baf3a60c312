use crate::errors::StoreError;
use crate::models::{ChatMessage, Habit, StoreData, User};
use crate::storage::{load_data, persist_data};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Habits,
    ChatMessages,
}

/// Issued before a collection fetch goes out. A response is only applied if
/// no newer ticket for the same collection has landed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    collection: Collection,
    seq: u64,
}

impl FetchTicket {
    pub fn collection(&self) -> Collection {
        self.collection
    }
}

/// An optimistic local edit awaiting the server's verdict. Dropping it
/// leaves the edit in place; `Store::rollback` undoes it.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum PendingEdit {
    HabitAdded { provisional_id: String },
    HabitRemoved { habit: Habit, index: usize },
    ChatMessageAdded { provisional_id: String },
}

#[derive(Debug, Default, Clone, Copy)]
struct FetchSeq {
    issued: u64,
    applied: u64,
}

impl FetchSeq {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }

    fn invalidate(&mut self) {
        self.applied = self.issued;
    }
}

#[derive(Debug, Default)]
struct StoreState {
    data: StoreData,
    habits_seq: FetchSeq,
    chat_seq: FetchSeq,
}

impl StoreState {
    fn seq_mut(&mut self, collection: Collection) -> &mut FetchSeq {
        match collection {
            Collection::Habits => &mut self.habits_seq,
            Collection::ChatMessages => &mut self.chat_seq,
        }
    }

    fn accept(&mut self, ticket: FetchTicket, collection: Collection) -> Result<bool, StoreError> {
        if ticket.collection != collection {
            return Err(StoreError::WrongCollection {
                expected: collection,
                found: ticket.collection,
            });
        }
        Ok(self.seq_mut(collection).accept(ticket.seq))
    }

    fn invalidate_fetches(&mut self) {
        self.habits_seq.invalidate();
        self.chat_seq.invalidate();
    }

    fn owner_id(&self) -> Option<&str> {
        self.data.user.as_ref().map(|user| user.id.as_str())
    }

    fn check_owner(&self, user_id: &str) -> Result<(), StoreError> {
        match self.owner_id() {
            Some(owner) if owner == user_id => Ok(()),
            owner => Err(StoreError::OwnerMismatch {
                expected: owner.map(str::to_string),
                found: user_id.to_string(),
            }),
        }
    }
}

/// The single local copy of the signed-in user, their habits and the chat
/// history. Clones share the same state.
#[derive(Clone)]
pub struct Store {
    data_path: Option<PathBuf>,
    state: Arc<Mutex<StoreState>>,
}

impl Store {
    pub fn new(data_path: Option<PathBuf>, data: StoreData) -> Self {
        Self {
            data_path,
            state: Arc::new(Mutex::new(StoreState {
                data,
                ..StoreState::default()
            })),
        }
    }

    pub async fn hydrate(data_path: PathBuf) -> Self {
        let data = load_data(&data_path).await;
        debug!(
            user = data.user.as_ref().map(|user| user.id.as_str()),
            habits = data.habits.len(),
            chat_messages = data.chat_messages.len(),
            "store hydrated"
        );
        Self::new(Some(data_path), data)
    }

    pub fn in_memory() -> Self {
        Self::new(None, StoreData::default())
    }

    pub async fn snapshot(&self) -> StoreData {
        self.state.lock().await.data.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.lock().await.data.user.clone()
    }

    pub async fn habits(&self) -> Vec<Habit> {
        self.state.lock().await.data.habits.clone()
    }

    pub async fn chat_messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.data.chat_messages.clone()
    }

    /// Replaces the held user. Switching to a different account drops the
    /// previous account's habits and chat.
    pub async fn set_user(&self, user: User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let switched = state.owner_id().is_some_and(|owner| owner != user.id);
        let mut next = state.data.clone();
        if switched {
            debug!(user = %user.id, "account switched, clearing collections");
            next.habits.clear();
            next.chat_messages.clear();
        }
        next.user = Some(user);
        self.commit(&mut state, next).await?;
        if switched {
            state.invalidate_fetches();
        }
        Ok(())
    }

    /// Logout. Clears the user together with everything that belongs to it,
    /// and makes any fetch still in flight stale.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.commit(&mut state, StoreData::default()).await?;
        state.invalidate_fetches();
        Ok(())
    }

    pub async fn set_habits(&self, habits: Vec<Habit>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.data.clone();
        next.habits = retain_owned(&state, habits, |habit| &habit.user_id);
        self.commit(&mut state, next).await
    }

    pub async fn add_habit(&self, habit: Habit) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_owner(&habit.user_id)?;
        let mut next = state.data.clone();
        next.habits.push(habit);
        self.commit(&mut state, next).await
    }

    pub async fn remove_habit(&self, habit_id: &str) -> Result<bool, StoreError> {
        Ok(self.remove_habit_pending(habit_id).await?.is_some())
    }

    pub async fn set_chat_messages(&self, messages: Vec<ChatMessage>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.data.clone();
        next.chat_messages = retain_owned(&state, messages, |message| &message.user_id);
        self.commit(&mut state, next).await
    }

    /// Appends to the end of the history; call order is message order.
    pub async fn add_chat_message(&self, message: ChatMessage) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_owner(&message.user_id)?;
        let mut next = state.data.clone();
        next.chat_messages.push(message);
        self.commit(&mut state, next).await
    }

    pub async fn add_habit_pending(&self, habit: Habit) -> Result<PendingEdit, StoreError> {
        let provisional_id = habit.id.clone();
        self.add_habit(habit).await?;
        Ok(PendingEdit::HabitAdded { provisional_id })
    }

    pub async fn remove_habit_pending(
        &self,
        habit_id: &str,
    ) -> Result<Option<PendingEdit>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(index) = state.data.habits.iter().position(|habit| habit.id == habit_id) else {
            return Ok(None);
        };
        let mut next = state.data.clone();
        let habit = next.habits.remove(index);
        self.commit(&mut state, next).await?;
        Ok(Some(PendingEdit::HabitRemoved { habit, index }))
    }

    pub async fn add_chat_message_pending(
        &self,
        message: ChatMessage,
    ) -> Result<PendingEdit, StoreError> {
        let provisional_id = message.id.clone();
        self.add_chat_message(message).await?;
        Ok(PendingEdit::ChatMessageAdded { provisional_id })
    }

    /// Swaps the provisional habit for the server's record, keeping its
    /// position. If the provisional entry is gone (e.g. a newer fetch
    /// replaced the list) the server record is appended instead.
    pub async fn confirm_habit(&self, edit: PendingEdit, habit: Habit) -> Result<(), StoreError> {
        let provisional_id = match edit {
            PendingEdit::HabitAdded { provisional_id } => provisional_id,
            other => {
                warn!(edit = ?other, "confirm_habit called with a non-habit edit");
                return Ok(());
            }
        };
        let mut state = self.state.lock().await;
        state.check_owner(&habit.user_id)?;
        let mut next = state.data.clone();
        let habits = &mut next.habits;
        if habits.iter().any(|held| held.id == habit.id) {
            habits.retain(|held| held.id != provisional_id);
        } else if let Some(slot) = habits.iter_mut().find(|held| held.id == provisional_id) {
            *slot = habit;
        } else {
            habits.push(habit);
        }
        self.commit(&mut state, next).await
    }

    /// Applies the compensating action for `edit`. Returns whether the store
    /// changed.
    pub async fn rollback(&self, edit: PendingEdit) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let owner = state.owner_id().map(str::to_string);
        let mut next = state.data.clone();
        let changed = match edit {
            PendingEdit::HabitAdded { provisional_id } => {
                let before = next.habits.len();
                next.habits.retain(|habit| habit.id != provisional_id);
                next.habits.len() != before
            }
            PendingEdit::HabitRemoved { habit, index } => {
                let owned = owner.as_deref() == Some(habit.user_id.as_str());
                let present = next.habits.iter().any(|held| held.id == habit.id);
                if owned && !present {
                    let index = index.min(next.habits.len());
                    next.habits.insert(index, habit);
                    true
                } else {
                    false
                }
            }
            PendingEdit::ChatMessageAdded { provisional_id } => {
                let before = next.chat_messages.len();
                next.chat_messages.retain(|message| message.id != provisional_id);
                next.chat_messages.len() != before
            }
        };
        if changed {
            self.commit(&mut state, next).await?;
        }
        Ok(changed)
    }

    pub async fn begin_fetch(&self, collection: Collection) -> FetchTicket {
        let mut state = self.state.lock().await;
        let seq = state.seq_mut(collection).issue();
        FetchTicket { collection, seq }
    }

    /// `set_habits` guarded by a fetch ticket. Returns false, leaving the
    /// store untouched, when the ticket is stale.
    pub async fn apply_habits(
        &self,
        ticket: FetchTicket,
        habits: Vec<Habit>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.accept(ticket, Collection::Habits)? {
            debug!(seq = ticket.seq, "discarding stale habits response");
            return Ok(false);
        }
        let mut next = state.data.clone();
        next.habits = retain_owned(&state, habits, |habit| &habit.user_id);
        self.commit(&mut state, next).await?;
        Ok(true)
    }

    pub async fn apply_chat_messages(
        &self,
        ticket: FetchTicket,
        messages: Vec<ChatMessage>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.accept(ticket, Collection::ChatMessages)? {
            debug!(seq = ticket.seq, "discarding stale chat response");
            return Ok(false);
        }
        let mut next = state.data.clone();
        next.chat_messages = retain_owned(&state, messages, |message| &message.user_id);
        self.commit(&mut state, next).await?;
        Ok(true)
    }

    /// Writes `next` to disk and only then makes it the held state, so a
    /// failed write leaves memory as it was.
    async fn commit(&self, state: &mut StoreState, next: StoreData) -> Result<(), StoreError> {
        if let Some(path) = &self.data_path {
            persist_data(path, &next).await?;
        }
        state.data = next;
        Ok(())
    }
}

fn retain_owned<T>(state: &StoreState, items: Vec<T>, owner: impl Fn(&T) -> &String) -> Vec<T> {
    let before = items.len();
    let kept: Vec<T> = match state.owner_id() {
        Some(id) => items.into_iter().filter(|item| owner(item) == id).collect(),
        None => Vec::new(),
    };
    if kept.len() != before {
        warn!(
            dropped = before - kept.len(),
            "ignoring records that do not belong to the current user"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: "Frost".to_string(),
            picture: None,
            winter_title: "Frozen Recruit".to_string(),
            total_score: 0,
            streak_days: 0,
            longest_streak: 0,
            created_at: "2025-11-01T00:00:00Z".to_string(),
            last_active: "2025-11-01T00:00:00Z".to_string(),
        }
    }

    fn habit(id: &str, user_id: &str) -> Habit {
        Habit {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: format!("habit {id}"),
            category: "fitness".to_string(),
            target_value: None,
            unit: None,
            created_at: String::new(),
        }
    }

    fn message(id: &str, user_id: &str, text: &str, is_user: bool) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            user_id: user_id.to_string(),
            message: text.to_string(),
            is_user,
            timestamp: "2025-11-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn reset_cascades_to_collections() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        store.add_habit(habit("h1", "u1")).await.unwrap();
        store
            .add_chat_message(message("m1", "u1", "hi", true))
            .await
            .unwrap();

        store.reset().await.unwrap();

        let data = store.snapshot().await;
        assert!(data.user.is_none());
        assert!(data.habits.is_empty());
        assert!(data.chat_messages.is_empty());
    }

    #[tokio::test]
    async fn chat_order_is_call_order() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        let ids = ["m3", "m1", "m22", "m0"];
        for id in ids {
            store
                .add_chat_message(message(id, "u1", id, true))
                .await
                .unwrap();
        }
        let held: Vec<String> = store
            .chat_messages()
            .await
            .into_iter()
            .map(|message| message.id)
            .collect();
        assert_eq!(held, ids);
    }

    #[tokio::test]
    async fn remove_habit_drops_only_that_entry() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        let list = vec![habit("h1", "u1"), habit("h2", "u1"), habit("h3", "u1")];
        store.set_habits(list.clone()).await.unwrap();

        assert!(store.remove_habit("h2").await.unwrap());
        assert_eq!(store.habits().await, vec![list[0].clone(), list[2].clone()]);

        assert!(!store.remove_habit("missing").await.unwrap());
        assert_eq!(store.habits().await.len(), 2);
    }

    #[tokio::test]
    async fn records_for_other_users_are_rejected() {
        let store = Store::in_memory();
        assert!(matches!(
            store.add_habit(habit("h1", "u1")).await,
            Err(StoreError::OwnerMismatch { expected: None, .. })
        ));

        store.set_user(user("u1")).await.unwrap();
        store
            .set_habits(vec![habit("h1", "u1"), habit("h2", "u2")])
            .await
            .unwrap();
        assert_eq!(store.habits().await, vec![habit("h1", "u1")]);
    }

    #[tokio::test]
    async fn switching_accounts_clears_previous_collections() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        store.add_habit(habit("h1", "u1")).await.unwrap();

        let mut refreshed = user("u1");
        refreshed.total_score = 40;
        store.set_user(refreshed).await.unwrap();
        assert_eq!(store.habits().await.len(), 1);

        store.set_user(user("u2")).await.unwrap();
        assert!(store.habits().await.is_empty());
    }

    #[tokio::test]
    async fn stale_fetch_cannot_overwrite_newer_one() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();

        let older = store.begin_fetch(Collection::Habits).await;
        let newer = store.begin_fetch(Collection::Habits).await;

        assert!(
            store
                .apply_habits(newer, vec![habit("h2", "u1")])
                .await
                .unwrap()
        );
        assert!(
            !store
                .apply_habits(older, vec![habit("h1", "u1")])
                .await
                .unwrap()
        );
        assert_eq!(store.habits().await, vec![habit("h2", "u1")]);
    }

    #[tokio::test]
    async fn out_of_order_is_fine_when_older_lands_first() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();

        let older = store.begin_fetch(Collection::ChatMessages).await;
        let newer = store.begin_fetch(Collection::ChatMessages).await;
        assert!(
            store
                .apply_chat_messages(older, vec![message("m1", "u1", "a", true)])
                .await
                .unwrap()
        );
        assert!(
            store
                .apply_chat_messages(newer, vec![message("m2", "u1", "b", false)])
                .await
                .unwrap()
        );
        assert_eq!(store.chat_messages().await.len(), 1);
        assert_eq!(store.chat_messages().await[0].id, "m2");
    }

    #[tokio::test]
    async fn reset_makes_in_flight_fetches_stale() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        let ticket = store.begin_fetch(Collection::Habits).await;

        store.reset().await.unwrap();
        store.set_user(user("u1")).await.unwrap();

        assert!(
            !store
                .apply_habits(ticket, vec![habit("h1", "u1")])
                .await
                .unwrap()
        );
        assert!(store.habits().await.is_empty());
    }

    #[tokio::test]
    async fn rollback_restores_removed_habit_in_place() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        store
            .set_habits(vec![habit("h1", "u1"), habit("h2", "u1"), habit("h3", "u1")])
            .await
            .unwrap();

        let edit = store.remove_habit_pending("h2").await.unwrap().unwrap();
        assert_eq!(store.habits().await.len(), 2);

        assert!(store.rollback(edit).await.unwrap());
        let ids: Vec<String> = store.habits().await.into_iter().map(|h| h.id).collect();
        assert_eq!(ids, ["h1", "h2", "h3"]);

        assert!(store.remove_habit_pending("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn confirm_replaces_provisional_habit() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        store.add_habit(habit("h0", "u1")).await.unwrap();

        let edit = store
            .add_habit_pending(habit("local-1", "u1"))
            .await
            .unwrap();
        store.add_habit(habit("h9", "u1")).await.unwrap();
        store.confirm_habit(edit, habit("h1", "u1")).await.unwrap();

        let ids: Vec<String> = store.habits().await.into_iter().map(|h| h.id).collect();
        assert_eq!(ids, ["h0", "h1", "h9"]);
    }

    #[tokio::test]
    async fn rollback_drops_provisional_chat_turn() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        store
            .add_chat_message(message("m1", "u1", "earlier", true))
            .await
            .unwrap();
        let edit = store
            .add_chat_message_pending(message("local-2", "u1", "pending", true))
            .await
            .unwrap();

        assert!(store.rollback(edit.clone()).await.unwrap());
        assert!(!store.rollback(edit).await.unwrap());
        assert_eq!(store.chat_messages().await.len(), 1);
    }

    fn temp_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "winter_arc_{tag}_{}_{}.json",
            std::process::id(),
            nanos
        ));
        path
    }

    #[tokio::test]
    async fn wrong_collection_ticket_is_an_error() {
        let store = Store::in_memory();
        store.set_user(user("u1")).await.unwrap();
        let chat = store.begin_fetch(Collection::ChatMessages).await;

        let result = store.apply_habits(chat, vec![habit("h1", "u1")]).await;
        assert!(matches!(
            result,
            Err(StoreError::WrongCollection {
                expected: Collection::Habits,
                found: Collection::ChatMessages,
            })
        ));
        assert!(store.habits().await.is_empty());

        assert!(
            store
                .apply_chat_messages(chat, vec![message("m1", "u1", "hi", true)])
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let path = temp_path("unwritable");
        let store = Store::hydrate(path.clone()).await;
        store.set_user(user("u1")).await.unwrap();
        store.add_habit(habit("h1", "u1")).await.unwrap();
        let before = store.snapshot().await;

        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        assert!(store.add_habit_pending(habit("local-1", "u1")).await.is_err());
        assert!(
            store
                .add_chat_message_pending(message("local-2", "u1", "hi", true))
                .await
                .is_err()
        );
        assert!(store.remove_habit("h1").await.is_err());
        assert!(store.set_user(user("u2")).await.is_err());
        assert!(store.reset().await.is_err());
        assert_eq!(store.snapshot().await, before);

        tokio::fs::remove_dir(&path).await.unwrap();
    }

    #[tokio::test]
    async fn hydrate_round_trips_through_disk() {
        let path = temp_path("state");

        let store = Store::hydrate(path.clone()).await;
        store.set_user(user("u1")).await.unwrap();
        store.add_habit(habit("h1", "u1")).await.unwrap();
        store
            .add_chat_message(message("m1", "u1", "hi", true))
            .await
            .unwrap();
        let before = store.snapshot().await;

        let rehydrated = Store::hydrate(path).await;
        assert_eq!(rehydrated.snapshot().await, before);
    }
}
