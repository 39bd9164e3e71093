use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::filters::FilterPredicate;

use super::api_types::{error_from_response, ApiStatusUpdate};
use super::types::{
  NewsDraft, NewsItem, NewsPage, NewsStats, NewsStatus, PasswordChange, ProfilePatch, ProfileUser,
};

/// The backend operations the core depends on.
///
/// [`ApiClient`] talks HTTP; tests substitute in-memory fakes.
#[async_trait]
pub trait NewsBackend: Send + Sync {
  /// `GET /api/news/user`
  async fn list_news(&self, filters: &FilterPredicate) -> AppResult<NewsPage>;

  /// `GET /api/news/public`, narrowed by category and page only
  async fn list_public_news(&self, filters: &FilterPredicate) -> AppResult<NewsPage>;

  /// `GET /api/news/stats`
  async fn news_stats(&self) -> AppResult<NewsStats>;

  /// `POST /api/news`
  async fn create_news(&self, draft: &NewsDraft) -> AppResult<NewsItem>;

  /// `PATCH /api/news/{id}/favorite`
  async fn toggle_favorite(&self, id: &str) -> AppResult<NewsItem>;

  /// `PATCH /api/news/{id}/status`
  async fn set_news_status(&self, id: &str, status: NewsStatus) -> AppResult<NewsItem>;

  /// `GET /api/users/me`
  async fn get_profile(&self) -> AppResult<ProfileUser>;

  /// `PUT /api/users/me`
  async fn update_profile(&self, patch: &ProfilePatch) -> AppResult<ProfileUser>;

  /// `PUT /api/users/me/password`
  async fn change_password(&self, change: &PasswordChange) -> AppResult<()>;
}

/// Supplies the bearer credential attached to each request.
pub trait CredentialSource: Send + Sync {
  fn bearer_token(&self) -> Option<String>;
}

/// A token fixed for the lifetime of the process
pub struct StaticToken(pub String);

impl CredentialSource for StaticToken {
  fn bearer_token(&self) -> Option<String> {
    if self.0.is_empty() {
      None
    } else {
      Some(self.0.clone())
    }
  }
}

/// HTTP client for the news/profile backend
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  credentials: Arc<dyn CredentialSource>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
    let mut base =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid API url '{}': {}", config.url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid API url '{}': not a base url", config.url));
    }
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      credentials,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Build a URL from path segments; segments are percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| AppError::State(format!("invalid base url {}", self.base)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn request(&self, method: Method, segments: &[&str]) -> AppResult<RequestBuilder> {
    let url = self.endpoint(segments)?;
    debug!(%method, %url, "api request");
    let builder = self.http.request(method, url);
    Ok(match self.credentials.bearer_token() {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(error_from_response(status.as_u16(), &body));
    }
    response
      .json::<T>()
      .await
      .map_err(|e| AppError::Decode(e.to_string()))
  }

  async fn send_empty(&self, request: RequestBuilder) -> AppResult<()> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(error_from_response(status.as_u16(), &body));
    }
    Ok(())
  }
}

#[async_trait]
impl NewsBackend for ApiClient {
  async fn list_news(&self, filters: &FilterPredicate) -> AppResult<NewsPage> {
    let request = self
      .request(Method::GET, &["api", "news", "user"])?
      .query(&filters.to_query_params());
    self.send(request).await
  }

  async fn list_public_news(&self, filters: &FilterPredicate) -> AppResult<NewsPage> {
    let request = self
      .request(Method::GET, &["api", "news", "public"])?
      .query(&filters.public_scope().to_query_params());
    self.send(request).await
  }

  async fn news_stats(&self) -> AppResult<NewsStats> {
    let request = self.request(Method::GET, &["api", "news", "stats"])?;
    self.send(request).await
  }

  async fn create_news(&self, draft: &NewsDraft) -> AppResult<NewsItem> {
    let request = self
      .request(Method::POST, &["api", "news"])?
      .json(draft);
    self.send(request).await
  }

  async fn toggle_favorite(&self, id: &str) -> AppResult<NewsItem> {
    let request = self.request(Method::PATCH, &["api", "news", id, "favorite"])?;
    self.send(request).await
  }

  async fn set_news_status(&self, id: &str, status: NewsStatus) -> AppResult<NewsItem> {
    let request = self
      .request(Method::PATCH, &["api", "news", id, "status"])?
      .json(&ApiStatusUpdate { status });
    self.send(request).await
  }

  async fn get_profile(&self) -> AppResult<ProfileUser> {
    let request = self.request(Method::GET, &["api", "users", "me"])?;
    self.send(request).await
  }

  async fn update_profile(&self, patch: &ProfilePatch) -> AppResult<ProfileUser> {
    let request = self
      .request(Method::PUT, &["api", "users", "me"])?
      .json(patch);
    self.send(request).await
  }

  async fn change_password(&self, change: &PasswordChange) -> AppResult<()> {
    let request = self
      .request(Method::PUT, &["api", "users", "me", "password"])?
      .json(change);
    self.send_empty(request).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::NewsCategory;
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> ApiClient {
    let config = ApiConfig {
      url: server.uri(),
      timeout_secs: 5,
    };
    ApiClient::new(&config, Arc::new(StaticToken("secret".to_string()))).unwrap()
  }

  fn news_json(id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
      "id": id,
      "source": "TechCrunch",
      "title": "AI Breakthrough",
      "summary": "New AI technology announced",
      "link": "https://example.com/news",
      "category": "research",
      "status": status,
      "is_favorite": false,
      "is_public": true,
      "created_at": "2024-01-01T10:00:00",
      "updated_at": "2024-01-01T10:00:00"
    })
  }

  #[tokio::test]
  async fn test_list_news_sends_filters_and_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/api/news/user"))
      .and(header("authorization", "Bearer secret"))
      .and(query_param("category", "research"))
      .and(query_param("is_favorite", "true"))
      .and(query_param("limit", "10"))
      .and(query_param("offset", "10"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "items": [news_json("n1", "pending")],
        "total": 11,
        "offset": 10,
        "limit": 10
      })))
      .expect(1)
      .mount(&server)
      .await;

    let filters = FilterPredicate {
      category: Some(NewsCategory::Research),
      is_favorite: Some(true),
      page: 2,
      page_size: 10,
      ..FilterPredicate::default()
    };
    let page = client_for(&server).list_news(&filters).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total, 11);
  }

  #[tokio::test]
  async fn test_set_status_patches_item() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
      .and(path("/api/news/n1/status"))
      .and(body_json(serde_json::json!({ "status": "read" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(news_json("n1", "read")))
      .expect(1)
      .mount(&server)
      .await;

    let item = client_for(&server)
      .set_news_status("n1", NewsStatus::Read)
      .await
      .unwrap();
    assert_eq!(item.status, NewsStatus::Read);
  }

  #[tokio::test]
  async fn test_toggle_favorite_and_stats() {
    let server = MockServer::start().await;

    let mut starred = news_json("n1", "pending");
    starred["is_favorite"] = serde_json::json!(true);
    Mock::given(method("PATCH"))
      .and(path("/api/news/n1/favorite"))
      .respond_with(ResponseTemplate::new(200).set_body_json(starred))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/news/stats"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "pending_count": 4,
        "reading_count": 2,
        "read_count": 9,
        "favorite_count": 3,
        "total_count": 15
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server);
    assert!(client.toggle_favorite("n1").await.unwrap().is_favorite);
    let stats = client.news_stats().await.unwrap();
    assert_eq!(stats.count_for(NewsStatus::Read), 9);
    assert_eq!(stats.total_count, 15);
  }

  #[tokio::test]
  async fn test_missing_item_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
      .and(path("/api/news/gone/favorite"))
      .respond_with(
        ResponseTemplate::new(404).set_body_json(serde_json::json!({ "detail": "News not found" })),
      )
      .mount(&server)
      .await;

    let err = client_for(&server).toggle_favorite("gone").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
  }

  #[tokio::test]
  async fn test_create_news_posts_draft() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/api/news"))
      .and(body_json(serde_json::json!({
        "source": "TechCrunch",
        "title": "AI Breakthrough",
        "summary": "New AI technology announced",
        "link": "https://example.com/news",
        "category": "research",
        "is_public": true
      })))
      .respond_with(ResponseTemplate::new(201).set_body_json(news_json("n9", "pending")))
      .expect(1)
      .mount(&server)
      .await;

    let draft = NewsDraft {
      source: "TechCrunch".to_string(),
      title: "AI Breakthrough".to_string(),
      summary: "New AI technology announced".to_string(),
      link: "https://example.com/news".to_string(),
      image_url: None,
      category: NewsCategory::Research,
      is_public: true,
    };
    let item = client_for(&server).create_news(&draft).await.unwrap();
    assert_eq!(item.id, "n9");
    assert_eq!(item.status, NewsStatus::Pending);
  }

  #[tokio::test]
  async fn test_duplicate_news_is_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/api/news"))
      .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
        "detail": "News with link https://example.com/news already exists for user u1"
      })))
      .mount(&server)
      .await;

    let draft = NewsDraft {
      source: "TechCrunch".to_string(),
      title: "AI Breakthrough".to_string(),
      summary: "New AI technology announced".to_string(),
      link: "https://example.com/news".to_string(),
      image_url: None,
      category: NewsCategory::General,
      is_public: false,
    };
    let err = client_for(&server).create_news(&draft).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
  }

  #[tokio::test]
  async fn test_public_feed_sends_category_and_page_only() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/api/news/public"))
      .and(query_param("category", "research"))
      .and(query_param("limit", "50"))
      .and(query_param("offset", "50"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "items": [news_json("n1", "read")],
        "total": 51,
        "offset": 50,
        "limit": 50
      })))
      .expect(1)
      .mount(&server)
      .await;

    let filters = FilterPredicate {
      category: Some(NewsCategory::Research),
      is_favorite: Some(true),
      page: 2,
      page_size: 50,
      ..FilterPredicate::default()
    };
    let page = client_for(&server).list_public_news(&filters).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total, 51);

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].url.query().unwrap_or_default().contains("is_favorite"));
  }

  #[tokio::test]
  async fn test_update_profile_sends_only_patched_fields() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
      .and(path("/api/users/me"))
      .and(body_json(serde_json::json!({ "username": "alice2" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "id": "u1",
        "username": "alice2",
        "email": "a@x.com",
        "is_active": true
      })))
      .expect(1)
      .mount(&server)
      .await;

    let user = client_for(&server)
      .update_profile(&ProfilePatch::username("alice2"))
      .await
      .unwrap();
    assert_eq!(user.username, "alice2");
  }

  #[tokio::test]
  async fn test_conflict_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
      .and(path("/api/users/me"))
      .respond_with(
        ResponseTemplate::new(400)
          .set_body_json(serde_json::json!({ "detail": "User with email a@x.com already exists" })),
      )
      .mount(&server)
      .await;

    let err = client_for(&server)
      .update_profile(&ProfilePatch::email("a@x.com"))
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
  }

  #[tokio::test]
  async fn test_wrong_current_password_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
      .and(path("/api/users/me/password"))
      .and(body_json(serde_json::json!({
        "current_password": "oldpass",
        "new_password": "newpass1"
      })))
      .respond_with(
        ResponseTemplate::new(401)
          .set_body_json(serde_json::json!({ "detail": "Incorrect password" })),
      )
      .expect(1)
      .mount(&server)
      .await;

    let change = PasswordChange {
      current_password: "oldpass".to_string(),
      new_password: "newpass1".to_string(),
    };
    let err = client_for(&server)
      .change_password(&change)
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
  }

  #[tokio::test]
  async fn test_wrong_current_password_400_is_validation() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
      .and(path("/api/users/me/password"))
      .respond_with(
        ResponseTemplate::new(400)
          .set_body_json(serde_json::json!({ "detail": "Current password is incorrect" })),
      )
      .expect(1)
      .mount(&server)
      .await;

    let change = PasswordChange {
      current_password: "nope".to_string(),
      new_password: "newpass1".to_string(),
    };
    let err = client_for(&server)
      .change_password(&change)
      .await
      .unwrap_err();
    assert_eq!(
      err,
      AppError::Validation {
        field: None,
        message: "Current password is incorrect".to_string(),
      }
    );
  }

  #[tokio::test]
  async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/api/news/stats"))
      .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
      .mount(&server)
      .await;

    let err = client_for(&server).news_stats().await.unwrap_err();
    assert!(matches!(err, AppError::Decode(_)));
  }

  #[test]
  fn test_base_url_keeps_prefix() {
    let config = ApiConfig {
      url: "http://localhost:8000/backend".to_string(),
      timeout_secs: 5,
    };
    let client = ApiClient::new(&config, Arc::new(StaticToken(String::new()))).unwrap();
    assert_eq!(
      client.endpoint(&["api", "users", "me"]).unwrap().as_str(),
      "http://localhost:8000/backend/api/users/me"
    );
  }
}
