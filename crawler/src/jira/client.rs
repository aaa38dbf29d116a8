use std::collections::HashSet;

use async_trait::async_trait;

use crate::{app_config::JiraConfig, error::SourceError, HttpClient};

use super::{
    issue::{SearchResponse, Ticket},
    IssueSource,
};

const SEARCH_PATH: &str = "rest/api/2/search";
const MYSELF_PATH: &str = "rest/api/2/myself";
const SEARCH_FIELDS: &str = "*all";

#[derive(Debug, Clone)]
enum JiraAuth {
    Basic { username: String, password: String },
    Bearer(String),
}

/// Paged search client for the issue tracker
#[derive(Debug, Clone)]
pub struct JiraClient {
    http_client: HttpClient,
    base_url: String,
    auth: JiraAuth,
    page_size: u32,
    qa_field: Option<String>,
}

impl JiraClient {
    pub fn new(http_client: HttpClient, cfg: &JiraConfig) -> Self {
        let auth = match cfg.token.as_ref().filter(|t| !t.is_empty()) {
            Some(token) => JiraAuth::Bearer(token.clone()),
            None => JiraAuth::Basic {
                username: cfg.username.clone(),
                password: cfg.password.clone(),
            },
        };

        JiraClient {
            http_client,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            auth,
            page_size: cfg.page_size,
            qa_field: cfg.qa_field.clone(),
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            JiraAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            JiraAuth::Bearer(token) => req.bearer_auth(token),
        }
    }

    /// Confirm the tracker answers and accepts the configured credentials
    pub async fn check_connection(&self) -> Result<(), SourceError> {
        let url = format!("{}/{}", self.base_url, MYSELF_PATH);
        let resp = self.authorized(self.http_client.get(url)).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }
        Ok(())
    }

    /// Fetch a single page of search results starting at `start_at`
    pub async fn search_page(
        &self,
        jql: &str,
        start_at: usize,
    ) -> Result<SearchResponse, SourceError> {
        let start_at = start_at.to_string();
        let max_results = self.page_size.to_string();
        let url = format!("{}/{}", self.base_url, SEARCH_PATH);
        let req = self.http_client.get(url).query(&[
            ("jql", jql),
            ("startAt", start_at.as_str()),
            ("maxResults", max_results.as_str()),
            ("fields", SEARCH_FIELDS),
        ]);

        let resp = self.authorized(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        resp.json::<SearchResponse>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }

    /// Fetch every issue matching `jql`, paging until the reported total is reached.
    /// Any page failure, or a page that comes back empty short of the total, aborts
    /// the whole fetch.
    pub async fn get_issues(&self, jql: &str) -> Result<Vec<Ticket>, SourceError> {
        let mut tickets = Vec::new();
        let mut seen = HashSet::new();
        let mut retrieved = 0;

        loop {
            let page = self.search_page(jql, retrieved).await?;
            let total = page.total;
            let page_len = page.issues.len();
            retrieved += page_len;

            for issue in page.issues {
                if !seen.insert(issue.key.clone()) {
                    tracing::warn!("Issue {} returned twice while paging, ignoring", issue.key);
                    continue;
                }
                tickets.push(Ticket::from_jira_issue(issue, self.qa_field.as_deref()));
            }

            tracing::debug!("Fetched {} / {} issues", retrieved, total);

            if retrieved >= total {
                break;
            }
            if page_len == 0 {
                return Err(SourceError::Incomplete { retrieved, total });
            }
        }

        Ok(tickets)
    }
}

#[async_trait]
impl IssueSource for JiraClient {
    async fn fetch_all(&self, query: &str) -> Result<Vec<Ticket>, SourceError> {
        self.get_issues(query).await
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const JQL: &str = "project = OPS AND type = Bug";

    fn jira_config(url: &str) -> JiraConfig {
        JiraConfig {
            url: url.to_string(),
            username: "bot".to_string(),
            password: "secret".to_string(),
            token: None,
            jql: JQL.to_string(),
            page_size: 100,
            qa_field: None,
        }
    }

    fn issues(range: std::ops::Range<usize>) -> Vec<Value> {
        range
            .map(|i| {
                json!({
                    "key": format!("OPS-{}", i),
                    "fields": {
                        "summary": format!("Issue {}", i),
                        "created": "2024-03-01T09:15:00.000+0800"
                    }
                })
            })
            .collect()
    }

    fn page(start_at: usize, total: usize, issues: Vec<Value>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "startAt": start_at,
            "maxResults": 100,
            "total": total,
            "issues": issues,
        }))
    }

    #[tokio::test]
    async fn test_pages_until_total_reached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("jql", JQL))
            .and(query_param("startAt", "0"))
            .and(query_param("maxResults", "100"))
            .and(header("authorization", "Basic Ym90OnNlY3JldA=="))
            .respond_with(page(0, 150, issues(0..100)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "100"))
            .respond_with(page(100, 150, issues(100..150)))
            .expect(1)
            .mount(&server)
            .await;

        let client = JiraClient::new(HttpClient::new(), &jira_config(&server.uri()));
        let tickets = client.fetch_all(JQL).await.unwrap();

        assert_eq!(tickets.len(), 150);
        let keys: HashSet<_> = tickets.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys.len(), 150);
        assert_eq!(tickets[0].key, "OPS-0");
        assert_eq!(tickets[149].key, "OPS-149");
        assert!(tickets[0].created_at.is_some());
    }

    #[tokio::test]
    async fn test_single_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(page(0, 3, issues(0..3)))
            .expect(1)
            .mount(&server)
            .await;

        let client = JiraClient::new(HttpClient::new(), &jira_config(&server.uri()));
        let tickets = client.fetch_all(JQL).await.unwrap();

        assert_eq!(tickets.len(), 3);
    }

    #[tokio::test]
    async fn test_page_failure_aborts_fetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "0"))
            .respond_with(page(0, 150, issues(0..100)))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "100"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = JiraClient::new(HttpClient::new(), &jira_config(&server.uri()));
        let err = client.fetch_all(JQL).await.unwrap_err();

        match err {
            SourceError::Status { status, body } => {
                assert_eq!(status.as_u16(), 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let client = JiraClient::new(HttpClient::new(), &jira_config(&server.uri()));
        let err = client.fetch_all(JQL).await.unwrap_err();

        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn test_empty_page_before_total_aborts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "0"))
            .respond_with(page(0, 5, issues(0..2)))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "2"))
            .respond_with(page(2, 5, vec![]))
            .expect(1)
            .mount(&server)
            .await;

        let client = JiraClient::new(HttpClient::new(), &jira_config(&server.uri()));
        let err = client.fetch_all(JQL).await.unwrap_err();

        assert!(matches!(
            err,
            SourceError::Incomplete {
                retrieved: 2,
                total: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_bearer_token_auth() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(header("authorization", "Bearer pat-123"))
            .respond_with(page(0, 1, issues(0..1)))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = jira_config(&format!("{}/", server.uri()));
        cfg.token = Some("pat-123".to_string());
        let client = JiraClient::new(HttpClient::new(), &cfg);

        assert_eq!(client.fetch_all(JQL).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_connection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .and(header("authorization", "Basic Ym90OnNlY3JldA=="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "bot"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = JiraClient::new(HttpClient::new(), &jira_config(&server.uri()));
        client.check_connection().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_connection_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let client = JiraClient::new(HttpClient::new(), &jira_config(&server.uri()));
        let err = client.check_connection().await.unwrap_err();

        match err {
            SourceError::Status { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
