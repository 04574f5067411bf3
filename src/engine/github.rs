use super::CiApi;
use crate::error::{DispatchError, FetchError};
use crate::model::{Accepted, DashboardConfig, JobRef, JobRun, RunsPage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// GitHub Actions REST client scoped to one repository's `actions` root.
#[derive(Clone)]
pub struct GitHubClient {
    pub http: reqwest::Client,
    pub ci_root: String,
}

impl GitHubClient {
    pub fn new(cfg: &DashboardConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .connect_timeout(cfg.request_timeout.min(std::time::Duration::from_secs(5)))
            .build()
            .context("build github http client")?;
        Ok(Self::with_client(http, &cfg.ci_root))
    }

    pub fn with_client(http: reqwest::Client, ci_root: &str) -> Self {
        Self {
            http,
            ci_root: ci_root.trim_end_matches('/').to_string(),
        }
    }

    fn dispatch_url(&self, job: &JobRef) -> String {
        format!("{}/workflows/{}/dispatches", self.ci_root, job.workflow_id)
    }

    fn runs_url(&self) -> String {
        format!("{}/runs", self.ci_root)
    }
}

#[async_trait]
impl CiApi for GitHubClient {
    async fn dispatch(&self, credential: &str, job: &JobRef) -> Result<Accepted, DispatchError> {
        let resp = self
            .http
            .post(self.dispatch_url(job))
            .bearer_auth(credential)
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&serde_json::json!({ "ref": job.git_ref }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(Accepted);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DispatchError::Unauthorized {
                status: status.as_u16(),
            });
        }
        Err(DispatchError::RemoteRejected {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        })
    }

    async fn latest_run(&self, credential: &str) -> Result<Option<JobRun>, FetchError> {
        const RESOURCE: &str = "workflow runs";
        let resp = self
            .http
            .get(self.runs_url())
            .query(&[("per_page", "1")])
            .bearer_auth(credential)
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                resource: RESOURCE,
                source,
            })?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                resource: RESOURCE,
                status: resp.status().as_u16(),
            });
        }
        let page: RunsPage = resp.json().await.map_err(|source| FetchError::Decode {
            resource: RESOURCE,
            source,
        })?;
        Ok(page.workflow_runs.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Conclusion, RunStatus};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job() -> JobRef {
        JobRef {
            workflow_id: "daily_scrape.yml".into(),
            git_ref: "main".into(),
        }
    }

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::with_client(reqwest::Client::new(), &format!("{}/repos/o/r/actions/", server.uri()))
    }

    #[tokio::test]
    async fn dispatch_sends_bearer_and_ref() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/o/r/actions/workflows/daily_scrape.yml/dispatches"))
            .and(header("authorization", "Bearer secret"))
            .and(header("accept", GITHUB_ACCEPT))
            .and(body_json(serde_json::json!({ "ref": "main" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let res = client(&server).dispatch("secret", &job()).await;
        assert_eq!(res.unwrap(), Accepted);
    }

    #[tokio::test]
    async fn dispatch_maps_auth_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).dispatch("bad", &job()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unauthorized { status: 401 }));
    }

    #[tokio::test]
    async fn dispatch_carries_status_and_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        match client(&server).dispatch("tok", &job()).await {
            Err(DispatchError::RemoteRejected { status, reason }) => {
                assert_eq!(status, 422);
                assert_eq!(reason, "Unprocessable Entity");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_network_failure() {
        // Reserve a free port, then release it so the connection is refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let c = GitHubClient::with_client(reqwest::Client::new(), &format!("http://127.0.0.1:{port}"));
        let err = c.dispatch("tok", &job()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NetworkFailure(_)));
    }

    #[tokio::test]
    async fn latest_run_reads_first_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/actions/runs"))
            .and(query_param("per_page", "1"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"total_count": 40, "workflow_runs": [
                    {"id": 99, "status": "completed", "conclusion": "success", "name": "daily"}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let run = client(&server).latest_run("tok").await.unwrap().unwrap();
        assert_eq!(run.id, Some(99));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.settled(), Some(Conclusion::Success));
    }

    #[tokio::test]
    async fn latest_run_empty_and_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/actions/runs"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"workflow_runs": []}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/actions/runs"))
            .and(header("authorization", "Bearer other"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let c = client(&server);
        assert_eq!(c.latest_run("tok").await.unwrap(), None);
        assert!(matches!(
            c.latest_run("other").await,
            Err(FetchError::Status { status: 503, .. })
        ));
    }
}
