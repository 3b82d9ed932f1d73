use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::config::{ClusterConfig, Credentials};
use crate::error::{Result, TransportError};
use crate::job::{JobHandle, JobResults, JobStatus, JobStatusSource, JobTracker, Page, RunOptions};

pub const ENDPOINTS: Endpoints = Endpoints {
    login: "apiv2/login",
    sql: "api/v3/sql",
    job: "api/v3/job",
};

#[derive(Debug)]
pub struct Endpoints {
    pub login: &'static str,
    pub sql: &'static str,
    pub job: &'static str,
}

const AUTH_TOKEN_PREFIX: &str = "_dremio";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct SqlRequest<'a> {
    sql: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct SqlResponse {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error_message: Option<String>,
}

/// REST client for a Dremio coordinator.
#[derive(Debug, Clone)]
pub struct DremioClient {
    client: reqwest::Client,
    /// Always ends with `/`.
    base_url: String,
    token: Option<String>,
}

impl DremioClient {
    pub fn new(cluster: &ClusterConfig) -> Self {
        Self::with_client(cluster, reqwest::Client::default())
    }

    /// Sends requests through a preconfigured `reqwest` client.
    pub fn with_client(cluster: &ClusterConfig, client: reqwest::Client) -> Self {
        DremioClient {
            client,
            base_url: cluster.base_url(),
            token: None,
        }
    }

    /// Reuses a token from a previous login.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub async fn login(
        cluster: &ClusterConfig,
        credentials: &Credentials,
    ) -> std::result::Result<Self, TransportError> {
        let client = Self::new(cluster);
        let request = client.client.post(client.url(ENDPOINTS.login)).json(&LoginRequest {
            user_name: &credentials.user_name,
            password: &credentials.password,
        });
        let response: LoginResponse = client.send(request).await?;
        log::debug!("Logged in to {} as {}", client.base_url, credentials.user_name);
        Ok(client.with_token(response.token))
    }

    /// Submits `sql` for execution, `context` being the path queries are resolved against.
    pub async fn submit(
        &self,
        sql: &str,
        context: Option<&[String]>,
    ) -> std::result::Result<JobHandle, TransportError> {
        let request = self
            .client
            .post(self.url(ENDPOINTS.sql))
            .json(&SqlRequest { sql, context });
        let response: SqlResponse = self.send(request).await?;
        log::debug!("Submitted job {}", response.id);
        Ok(JobHandle::new(response.id, sql))
    }

    pub async fn job_status(&self, job_id: &str) -> std::result::Result<JobStatus, TransportError> {
        let request = self.client.get(self.job_url(job_id));
        self.send(request).await
    }

    pub async fn job_results(
        &self,
        job_id: &str,
        page: &Page,
    ) -> std::result::Result<JobResults, TransportError> {
        let request = self
            .client
            .get(format!("{}/results", self.job_url(job_id)))
            .query(&page_query(page));
        self.send(request).await
    }

    /// Submits `sql` and waits for its results.
    pub async fn run_query_and_get_results(
        &self,
        sql: &str,
        options: &RunOptions,
    ) -> Result<JobResults> {
        let job = self.submit(sql, None).await?;
        JobTracker::new(self).run_to_completion(&job, options).await
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/{}", self.url(ENDPOINTS.job), job_id)
    }

    fn authorization(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("{}{}", AUTH_TOKEN_PREFIX, token))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<T, TransportError> {
        let request = match self.authorization() {
            Some(authorization) => request.header(AUTHORIZATION, authorization),
            None => request,
        };
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(TransportError::Remote {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn page_query(page: &Page) -> Vec<(&'static str, u64)> {
    [("offset", page.offset), ("limit", page.limit)]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|resp| resp.error_message)
        .unwrap_or_else(|| body.to_owned())
}

#[async_trait]
impl JobStatusSource for DremioClient {
    async fn fetch_status(&self, job_id: &str) -> std::result::Result<JobStatus, TransportError> {
        self.job_status(job_id).await
    }

    async fn fetch_result(
        &self,
        job_id: &str,
        page: &Page,
    ) -> std::result::Result<JobResults, TransportError> {
        self.job_results(job_id, page).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    /// Answers a single request with `status_line` and a JSON `body`, yielding the raw request.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = stream.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_lowercase()
        });
        (port, server)
    }

    fn local_client(port: u16) -> DremioClient {
        let mut cluster = ClusterConfig::new("127.0.0.1");
        cluster.port = port;
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        DremioClient::with_client(&cluster, client).with_token("abc123")
    }

    #[tokio::test]
    async fn test_error_status_becomes_remote_error() {
        let (port, server) = serve_once(
            "401 Unauthorized",
            r#"{"errorMessage": "Invalid username or password"}"#,
        )
        .await;

        let err = local_client(port).job_status("1f2e-00").await.unwrap_err();
        server.await.unwrap();

        match err {
            TransportError::Remote { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid username or password");
            }
            err => panic!("Expected a remote error, got {:?}", err),
        }
    }

    #[tokio::test]
    async fn test_job_status_request() {
        let (port, server) = serve_once(
            "200 OK",
            r#"{"jobState": "RUNNING", "rowCount": 0, "queryType": "REST"}"#,
        )
        .await;

        let status = local_client(port).job_status("1f2e-00").await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(status.job_state, crate::job::JobState::Running);
        assert!(request.starts_with("get /api/v3/job/1f2e-00 "));
        assert!(request.contains("authorization: _dremioabc123"));
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let (port, server) = serve_once("200 OK", r#"{"jobState": 3}"#).await;

        let err = local_client(port).job_status("1f2e-00").await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn test_urls() {
        let mut cluster = ClusterConfig::new("localhost");
        let client = DremioClient::new(&cluster);
        assert_eq!(client.url(ENDPOINTS.login), "http://localhost:9047/apiv2/login");
        assert_eq!(
            client.job_url("1f2e-00"),
            "http://localhost:9047/api/v3/job/1f2e-00"
        );

        cluster.ssl = true;
        cluster.port = 443;
        let client = DremioClient::new(&cluster);
        assert_eq!(client.url(ENDPOINTS.sql), "https://localhost:443/api/v3/sql");
    }

    #[test]
    fn test_authorization() {
        let client = DremioClient::new(&ClusterConfig::new("localhost"));
        assert_eq!(client.authorization(), None);
        let client = client.with_token("abc123");
        assert_eq!(client.authorization().as_deref(), Some("_dremioabc123"));
    }

    #[test]
    fn test_page_query() {
        assert!(page_query(&Page::default()).is_empty());
        assert_eq!(
            page_query(&Page {
                offset: None,
                limit: Some(500)
            }),
            vec![("limit", 500)]
        );
        assert_eq!(
            page_query(&Page {
                offset: Some(100),
                limit: Some(500)
            }),
            vec![("offset", 100), ("limit", 500)]
        );
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(SqlRequest {
            sql: "select 1",
            context: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"sql": "select 1"}));

        let context = vec!["@admin".to_owned(), "folder".to_owned()];
        let body = serde_json::to_value(SqlRequest {
            sql: "select 1",
            context: Some(&context),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"sql": "select 1", "context": ["@admin", "folder"]})
        );

        let body = serde_json::to_value(LoginRequest {
            user_name: "dremio",
            password: "pw",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"userName": "dremio", "password": "pw"})
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"errorMessage": "Invalid username or password"}"#),
            "Invalid username or password"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
