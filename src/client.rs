use crate::config::api_base;
use crate::errors::ApiError;
use crate::models::{
    ChatMessage, Habit, HabitLog, LeaderboardEntry, NewChatMessage, NewHabit, NewHabitLog,
    NewUser, ScoreUpdate, ServerMessage, SessionExchange, SessionUser, User,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use urlencoding::encode;
use tracing::{debug, error};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(backend_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: api_base(backend_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let url = self.url("/users");
        self.execute(self.http.post(&url).json(user), &url).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, ApiError> {
        let url = self.url(&format!("/users/{}", encode(user_id)));
        self.execute(self.http.get(&url), &url).await
    }

    pub async fn update_user_score(&self, user_id: &str) -> Result<ScoreUpdate, ApiError> {
        let url = self.url(&format!("/users/{}/score", encode(user_id)));
        self.execute(self.http.put(&url), &url).await
    }

    pub async fn create_habit(&self, user_id: &str, habit: &NewHabit) -> Result<Habit, ApiError> {
        let url = self.url(&format!("/users/{}/habits", encode(user_id)));
        self.execute(self.http.post(&url).json(habit), &url).await
    }

    pub async fn get_user_habits(&self, user_id: &str) -> Result<Vec<Habit>, ApiError> {
        let url = self.url(&format!("/users/{}/habits", encode(user_id)));
        self.execute(self.http.get(&url), &url).await
    }

    pub async fn delete_habit(&self, habit_id: &str) -> Result<ServerMessage, ApiError> {
        let url = self.url(&format!("/habits/{}", encode(habit_id)));
        self.execute(self.http.delete(&url), &url).await
    }

    pub async fn log_habit(&self, user_id: &str, log: &NewHabitLog) -> Result<HabitLog, ApiError> {
        let url = self.url(&format!("/users/{}/habit-logs", encode(user_id)));
        self.execute(self.http.post(&url).json(log), &url).await
    }

    pub async fn get_habit_logs(&self, user_id: &str, limit: u32) -> Result<Vec<HabitLog>, ApiError> {
        let url = self.url(&format!("/users/{}/habit-logs", encode(user_id)));
        self.execute(self.http.get(&url).query(&[("limit", limit)]), &url)
            .await
    }

    /// Returns the assistant's reply, not an echo of the sent message.
    pub async fn send_chat_message(
        &self,
        user_id: &str,
        message: &str,
    ) -> Result<ChatMessage, ApiError> {
        let url = self.url(&format!("/users/{}/chat", encode(user_id)));
        let body = NewChatMessage {
            message: message.to_string(),
        };
        self.execute(self.http.post(&url).json(&body), &url).await
    }

    pub async fn get_chat_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let url = self.url(&format!("/users/{}/chat", encode(user_id)));
        self.execute(self.http.get(&url).query(&[("limit", limit)]), &url)
            .await
    }

    pub async fn get_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let url = self.url("/leaderboard");
        self.execute(self.http.get(&url).query(&[("limit", limit)]), &url)
            .await
    }

    pub async fn exchange_session(&self, session_id: &str) -> Result<SessionUser, ApiError> {
        let url = self.url("/auth/session");
        let body = SessionExchange {
            session_id: session_id.to_string(),
        };
        self.execute(self.http.post(&url).json(&body), &url).await
    }

    /// `Ok(None)` when the server answers 401.
    pub async fn current_user(&self) -> Result<Option<User>, ApiError> {
        let url = self.url("/auth/me");
        match self.execute(self.http.get(&url), &url).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.is_unauthorized() => {
                debug!("no active session");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let url = self.url("/auth/logout");
        let _: ServerMessage = self.execute(self.http.post(&url), &url).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, ApiError> {
        let result = send_json(request).await;
        if let Err(err) = &result {
            if !err.is_unauthorized() {
                error!(%url, "API request failed: {err}");
            }
        }
        result
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await?;
        return Err(ApiError::from_body(status.as_u16(), &body));
    }

    let bytes = response.bytes().await?;
    if status == StatusCode::NO_CONTENT || bytes.is_empty() {
        return serde_json::from_slice(b"null").map_err(|err| ApiError::Decode(err.to_string()));
    }
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_carries_api_prefix() {
        let client = ApiClient::new("http://localhost:8001/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8001/api");
        assert_eq!(
            client.url("/users/u1/habits"),
            "http://localhost:8001/api/users/u1/habits"
        );
    }

    #[test]
    fn ids_are_encoded_as_single_path_segments() {
        let client = ApiClient::new("http://localhost:8001").unwrap();
        let user_id = "u/1?x#y";
        assert_eq!(
            client.url(&format!("/users/{}/chat", encode(user_id))),
            "http://localhost:8001/api/users/u%2F1%3Fx%23y/chat"
        );
    }
}
