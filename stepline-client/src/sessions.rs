//! Compute session endpoints

use async_trait::async_trait;
use stepline_core::dto::session::{
    CreateSessionRequest, ExecuteRequest, ExecuteResponse, RawExecuteResult, RawLogsResult,
    ResultEnvelope, SessionHandle, SessionOptions,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::{ComputeSessions, ManagerClient};

impl ManagerClient {
    fn session_url(&self, session_id: &str) -> String {
        format!("{}/session/{}", self.base_url, session_id)
    }
}

#[async_trait]
impl ComputeSessions for ManagerClient {
    async fn create_session(
        &self,
        image: &str,
        options: &SessionOptions,
    ) -> Result<SessionHandle> {
        if image.is_empty() {
            return Err(ClientError::InvalidRequest(
                "session image cannot be empty".to_string(),
            ));
        }

        let token = Uuid::new_v4().simple().to_string();
        let request = CreateSessionRequest::new(image.to_string(), token, options);

        debug!(
            "Creating session with image {} in scaling group {}",
            image, options.scaling_group
        );

        let url = format!("{}/session", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        self.handle_response(response, "session").await
    }

    async fn execute(&self, session_id: &str, request: ExecuteRequest) -> Result<ExecuteResponse> {
        let response = self
            .client
            .post(self.session_url(session_id))
            .json(&request)
            .send()
            .await?;

        let envelope: ResultEnvelope<RawExecuteResult> =
            self.handle_response(response, session_id).await?;

        Ok(envelope.result.into())
    }

    async fn get_logs(&self, session_id: &str) -> Result<String> {
        let url = format!("{}/logs", self.session_url(session_id));
        let response = self.client.get(&url).send().await?;

        let envelope: ResultEnvelope<RawLogsResult> =
            self.handle_response(response, session_id).await?;

        Ok(envelope.result.logs)
    }

    async fn destroy_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.session_url(session_id))
            .send()
            .await?;

        self.handle_empty_response(response, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url() {
        let client = ManagerClient::new("http://localhost:8081");
        assert_eq!(
            client.session_url("sess-1"),
            "http://localhost:8081/session/sess-1"
        );
    }

    #[tokio::test]
    async fn test_create_session_rejects_empty_image() {
        let client = ManagerClient::new("http://localhost:8081");
        let options = SessionOptions {
            domain: "default".to_string(),
            group: "default".to_string(),
            scaling_group: "default".to_string(),
            mounts: vec![],
            resources: Default::default(),
            max_wait_seconds: 5,
        };

        let err = client.create_session("", &options).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
