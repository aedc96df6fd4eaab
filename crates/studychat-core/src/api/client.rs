use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::path::Path;
use url::Url;

use super::types::*;
use super::{ChatBackend, QuizBackend};
use crate::error::{ApiError, ApiResult};
use crate::state::{ConversationId, Message};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

const CHAT_PREFIX: &str = "/api/aws-llm";
const PDF_PREFIX: &str = "/api/pdf-manager";

/// HTTP client for the chat and PDF/quiz backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Maps non-2xx responses to `ApiError::Status`, preferring the backend's
    /// `{"error": ...}` message over the bare status text.
    async fn check(response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path)?)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_conversations(&self) -> ApiResult<ConversationList> {
        self.get_json(&format!("{CHAT_PREFIX}/conversations/")).await
    }

    async fn fetch_history(&self, conversation: ConversationId) -> ApiResult<Vec<Message>> {
        let history: HistoryResponse = self
            .get_json(&format!("{CHAT_PREFIX}/chat/history/{conversation}/"))
            .await?;
        Ok(history
            .conversation
            .messages
            .into_iter()
            .map(Message::from)
            .collect())
    }

    async fn create_conversation(&self, title: Option<String>) -> ApiResult<CreatedConversation> {
        let request = CreateConversationRequest { title };
        self.post_json(&format!("{CHAT_PREFIX}/conversations/create/"), &request)
            .await
    }

    async fn delete_conversation(&self, conversation: ConversationId) -> ApiResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("{CHAT_PREFIX}/conversations/{conversation}/"))?)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn post_message(&self, request: &ChatRequest) -> ApiResult<ChatReply> {
        self.post_json(&format!("{CHAT_PREFIX}/chat/"), request).await
    }
}

#[async_trait]
impl QuizBackend for ApiClient {
    async fn list_pdfs(&self) -> ApiResult<Vec<PdfSummary>> {
        let page: Paginated<PdfSummary> = self.get_json(&format!("{PDF_PREFIX}/pdfs/")).await?;
        Ok(page.results)
    }

    async fn upload_pdf(&self, path: &Path, title: Option<String>) -> ApiResult<PdfDocument> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ApiError::InvalidUpload(format!("{} has no file name", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let mut form = Form::new().part("file", part);
        if let Some(title) = title {
            form = form.text("title", title);
        }

        let response = self
            .client
            .post(self.url(&format!("{PDF_PREFIX}/pdfs/upload/"))?)
            .multipart(form)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn list_quizzes(&self) -> ApiResult<Vec<QuizSummary>> {
        let page: Paginated<QuizSummary> = self.get_json(&format!("{PDF_PREFIX}/quizzes/")).await?;
        Ok(page.results)
    }

    async fn generate_quiz(&self, request: &QuizGenerationRequest) -> ApiResult<Quiz> {
        self.post_json(&format!("{PDF_PREFIX}/quizzes/generate/"), request)
            .await
    }

    async fn fetch_quiz(&self, quiz_id: i64) -> ApiResult<Quiz> {
        self.get_json(&format!("{PDF_PREFIX}/quizzes/{quiz_id}/")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unparseable_base_url() {
        assert!(matches!(ApiClient::new("not a url"), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_paths_join_onto_origin() {
        let client = ApiClient::new(DEFAULT_BACKEND_URL).unwrap();
        let url = client.url("/api/aws-llm/chat/history/7/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/aws-llm/chat/history/7/");
    }
}
