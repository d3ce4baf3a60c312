use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const PROVISIONAL_PREFIX: &str = "local-";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default = "default_winter_title")]
    pub winter_title: String,
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub streak_days: i64,
    #[serde(default)]
    pub longest_streak: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_active: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl Habit {
    pub fn category(&self) -> HabitCategory {
        HabitCategory::from(self.category.as_str())
    }
}

/// Known habit categories. Anything the server sends that is not listed here
/// is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitCategory {
    Fitness,
    Diet,
    Discipline,
    Sleep,
    Other(String),
}

impl HabitCategory {
    pub fn as_str(&self) -> &str {
        match self {
            HabitCategory::Fitness => "fitness",
            HabitCategory::Diet => "diet",
            HabitCategory::Discipline => "discipline",
            HabitCategory::Sleep => "sleep",
            HabitCategory::Other(value) => value,
        }
    }
}

impl From<&str> for HabitCategory {
    fn from(value: &str) -> Self {
        match value {
            "fitness" => HabitCategory::Fitness,
            "diet" => HabitCategory::Diet,
            "discipline" => HabitCategory::Discipline,
            "sleep" => HabitCategory::Sleep,
            other => HabitCategory::Other(other.to_string()),
        }
    }
}

impl fmt::Display for HabitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HabitLog {
    pub id: String,
    pub user_id: String,
    pub habit_id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub logged_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub message: String,
    #[serde(default = "default_is_user")]
    pub is_user: bool,
    #[serde(default)]
    pub timestamp: String,
}

impl ChatMessage {
    pub fn provisional(user_id: &str, message: &str) -> Self {
        Self {
            id: provisional_id(),
            user_id: user_id.to_string(),
            message: message.to_string(),
            is_user: true,
            timestamp: crate::time_utils::now_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub total_score: i64,
    pub streak_days: i64,
    pub winter_title: String,
    pub rank: u32,
}

/// What `POST /auth/session` hands back. Only identity fields; the full
/// record has to be fetched separately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreUpdate {
    pub score: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHabit {
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl NewHabit {
    pub fn new(name: impl Into<String>, category: HabitCategory) -> Self {
        Self {
            name: name.into(),
            category: category.as_str().to_string(),
            target_value: None,
            unit: None,
        }
    }

    pub(crate) fn provisional_for(&self, user_id: &str) -> Habit {
        Habit {
            id: provisional_id(),
            user_id: user_id.to_string(),
            name: self.name.clone(),
            category: self.category.clone(),
            target_value: self.target_value.clone(),
            unit: self.unit.clone(),
            created_at: crate::time_utils::now_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHabitLog {
    pub habit_id: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExchange {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreData {
    pub user: Option<User>,
    pub habits: Vec<Habit>,
    pub chat_messages: Vec<ChatMessage>,
}

pub fn provisional_id() -> String {
    format!("{PROVISIONAL_PREFIX}{}", Uuid::new_v4())
}

pub fn is_provisional(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

fn default_winter_title() -> String {
    "Frozen Recruit".to_string()
}

fn default_is_user() -> bool {
    true
}
