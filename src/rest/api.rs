use crate::types::records::{
    Dialog, FeedbackEntry, Greeting, Group, InteractionHistory, MatchCandidate, Profile,
    SwipeAction, SwipeOutcome, UserRef,
};
use crate::types::{ChatMessage, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The slice of the REST surface the dialog stream controller depends on:
/// the history snapshot and the dialog metadata fetched on every dialog
/// switch. Narrow on purpose so the controller can run against a scripted
/// fake.
#[async_trait]
pub trait DialogApi: Send + Sync {
    async fn dialog(&self, dialog_id: i64) -> Result<Dialog>;
    async fn dialog_messages(&self, dialog_id: i64) -> Result<Vec<ChatMessage>>;
}

/// Backend REST client. The bearer token is read from the shared session
/// handle on every request, so a token refresh applies to all future calls
/// without touching the client.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base: impl Into<String>, token: Arc<RwLock<Option<String>>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    async fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let req = self.authorize(self.http.get(self.url(path))).await;
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self
            .authorize(self.http.post(self.url(path)).json(body))
            .await;
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn patch<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let req = self
            .authorize(self.http.patch(self.url(path)).json(body))
            .await;
        req.send().await?.error_for_status()?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let req = self.authorize(self.http.delete(self.url(path))).await;
        req.send().await?.error_for_status()?;
        Ok(())
    }

    // --- profile ---

    /// Own profile; gates onboarding and supplies the contact fields for the
    /// "share my contacts" message.
    pub async fn my_profile(&self) -> Result<Profile> {
        self.get("profile/me/").await
    }

    pub async fn profile(&self, user_id: i64) -> Result<Profile> {
        self.get(&format!("profile/{}/", user_id)).await
    }

    // --- dialogs ---

    pub async fn my_dialogs(&self) -> Result<Vec<Dialog>> {
        self.get("dialogs/me/").await
    }

    /// Creates (or returns) the one-to-one dialog with `partner`.
    pub async fn create_dialog(&self, partner: i64) -> Result<Dialog> {
        self.post("dialogs/", &serde_json::json!({ "partner": partner }))
            .await
    }

    // --- matchmaking ---

    pub async fn match_candidates(&self, limit: usize) -> Result<Vec<MatchCandidate>> {
        self.get(&format!("matches/?limit={}", limit)).await
    }

    pub async fn swipe(&self, user_id: i64, action: SwipeAction) -> Result<SwipeOutcome> {
        self.post(
            &format!("matches/{}/swipe/", user_id),
            &serde_json::json!({ "action": action }),
        )
        .await
    }

    pub async fn interactions(&self) -> Result<InteractionHistory> {
        self.get("interactions/").await
    }

    pub async fn reset_interactions(&self) -> Result<()> {
        let req = self
            .authorize(self.http.post(self.url("interactions/reset/")))
            .await;
        req.send().await?.error_for_status()?;
        Ok(())
    }

    pub async fn unreject(&self, user_id: i64) -> Result<()> {
        self.delete(&format!("interactions/{}/unreject/", user_id))
            .await
    }

    // --- groups ---

    pub async fn my_groups(&self) -> Result<Vec<Group>> {
        self.get("groups/me").await
    }

    pub async fn group_members(&self, group_id: i64) -> Result<Vec<UserRef>> {
        self.get(&format!("groups/{}/members/", group_id)).await
    }

    pub async fn update_group(&self, group_id: i64, name: &str, description: &str) -> Result<()> {
        self.patch(
            &format!("groups/{}/", group_id),
            &serde_json::json!({ "name": name, "description": description }),
        )
        .await
    }

    // --- support channel ---

    pub async fn feedback(&self) -> Result<Vec<FeedbackEntry>> {
        self.get("feedback/").await
    }

    pub async fn send_feedback(&self, text: &str) -> Result<FeedbackEntry> {
        self.post("feedback/", &serde_json::json!({ "text": text }))
            .await
    }

    // --- misc ---

    pub async fn hello(&self) -> Result<Greeting> {
        self.get("hello/").await
    }
}

#[async_trait]
impl DialogApi for ApiClient {
    async fn dialog(&self, dialog_id: i64) -> Result<Dialog> {
        self.get(&format!("dialogs/{}/", dialog_id)).await
    }

    async fn dialog_messages(&self, dialog_id: i64) -> Result<Vec<ChatMessage>> {
        self.get(&format!("dialogs/{}/messages/", dialog_id)).await
    }
}
