//! Platform REST client.
//!
//! No retries, no backoff. `list_refs` follows `Link: rel="next"` so the
//! default branch cannot fall off the first page; every other call is a single
//! request.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use reqwest::{Client as HttpClient, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use lockbot_core::{InstallationId, PullRequestProposal, RepositoryIdentity};

use crate::credentials::AccessToken;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CreateRefBody, CreatedPullRequest, GitRef, InstallationTokenResponse, PlatformErrorBody,
    PutFileRequest, PutFileResponse, RepositoryMetadata,
};

const MEDIA_TYPE: &str = "application/vnd.github+json";
const REFS_PER_PAGE: &str = "100";
/// Upper bound on `git/refs` pages followed for one listing.
const MAX_REF_PAGES: usize = 50;

/// Remote repository operations the reconciliation workflow needs.
///
/// Every call takes the token to authenticate with; `None` sends the request
/// unauthenticated and lets the platform reject it.
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// `GET /repos/{owner}/{repo}` → `default_branch`.
    async fn default_branch(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
    ) -> ApiResult<String>;

    /// `GET /repos/{owner}/{repo}/git/refs`, every page.
    async fn list_refs(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
    ) -> ApiResult<Vec<GitRef>>;

    /// `GET /repos/{owner}/{repo}/contents/{path}?ref=…`.
    ///
    /// Returned raw: a directory yields an array, a file yields an object.
    async fn list_directory(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        git_ref: &str,
        path: &str,
    ) -> ApiResult<serde_json::Value>;

    /// `POST /repos/{owner}/{repo}/git/refs`.
    async fn create_ref(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        qualified_ref: &str,
        sha: &str,
    ) -> ApiResult<GitRef>;

    /// `PUT /repos/{owner}/{repo}/contents/{path}`.
    async fn put_file(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        request: &PutFileRequest,
    ) -> ApiResult<PutFileResponse>;

    /// `POST /repos/{owner}/{repo}/pulls`.
    async fn create_pull_request(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        proposal: &PullRequestProposal,
    ) -> ApiResult<CreatedPullRequest>;
}

/// reqwest-backed [`RepositoryApi`].
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http_client: HttpClient,
    base_url: Url,
}

impl GitHubClient {
    /// Create a client rooted at `base_url` (e.g. `https://api.github.com`
    /// or an enterprise `https://host/api/v3`).
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Relative joins must keep an enterprise path prefix.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = HttpClient::builder()
            .user_agent(concat!("lockbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /app/installations/{id}/access_tokens`, authenticated with an
    /// app JWT rather than an installation token.
    pub(crate) async fn create_installation_token(
        &self,
        app_jwt: &str,
        installation: InstallationId,
    ) -> ApiResult<InstallationTokenResponse> {
        let url = self.url(&format!("app/installations/{installation}/access_tokens"))?;
        self.request(Method::POST, url, Some(app_jwt), None::<&()>)
            .await
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn repo_url(&self, repo: &RepositoryIdentity, rest: &str) -> ApiResult<Url> {
        self.url(&format!("repos/{}/{}/{}", repo.owner, repo.name, rest))
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: Url,
        bearer: Option<&str>,
        body: Option<&B>,
    ) -> ApiResult<T> {
        let response = self.send(method, url, bearer, body).await?;
        handle_response(response).await
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        bearer: Option<&str>,
        body: Option<&B>,
    ) -> ApiResult<Response> {
        tracing::debug!(%method, %url, "platform request");
        let mut request = self
            .http_client
            .request(method, url)
            .header(ACCEPT, MEDIA_TYPE);

        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }
}

/// Target of the `rel="next"` entry of a `Link` header, if any.
fn next_page(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim().eq_ignore_ascii_case(r#"rel="next""#));
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        return Ok(serde_json::from_str(&text)?);
    }

    let message = match serde_json::from_str::<PlatformErrorBody>(&text) {
        Ok(body) => body.into_message(),
        Err(_) => text,
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RepositoryApi for GitHubClient {
    async fn default_branch(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
    ) -> ApiResult<String> {
        let url = self.url(&format!("repos/{}/{}", repo.owner, repo.name))?;
        let metadata: RepositoryMetadata = self
            .request(Method::GET, url, token.map(AccessToken::secret), None::<&()>)
            .await?;
        Ok(metadata.default_branch)
    }

    async fn list_refs(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
    ) -> ApiResult<Vec<GitRef>> {
        let mut url = self.repo_url(repo, "git/refs")?;
        url.query_pairs_mut().append_pair("per_page", REFS_PER_PAGE);

        let mut refs = Vec::new();
        let mut next = Some(url);
        for _ in 0..MAX_REF_PAGES {
            let Some(url) = next.take() else {
                return Ok(refs);
            };
            let response = self
                .send(Method::GET, url, token.map(AccessToken::secret), None::<&()>)
                .await?;
            next = next_page(response.headers());
            let page: Vec<GitRef> = handle_response(response).await?;
            refs.extend(page);
        }
        if next.is_some() {
            tracing::warn!(
                repository = %repo,
                pages = MAX_REF_PAGES,
                "ref listing truncated",
            );
        }
        Ok(refs)
    }

    async fn list_directory(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        git_ref: &str,
        path: &str,
    ) -> ApiResult<serde_json::Value> {
        let path = path.trim_start_matches("./").trim_matches('/');
        let path = if path == "." { "" } else { path };
        let mut url = self.repo_url(repo, &format!("contents/{path}"))?;
        url.query_pairs_mut().append_pair("ref", git_ref);
        self.request(Method::GET, url, token.map(AccessToken::secret), None::<&()>)
            .await
    }

    async fn create_ref(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        qualified_ref: &str,
        sha: &str,
    ) -> ApiResult<GitRef> {
        let url = self.repo_url(repo, "git/refs")?;
        let body = CreateRefBody {
            name: qualified_ref,
            sha,
        };
        self.request(Method::POST, url, token.map(AccessToken::secret), Some(&body))
            .await
    }

    async fn put_file(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        request: &PutFileRequest,
    ) -> ApiResult<PutFileResponse> {
        let url = self.repo_url(repo, &format!("contents/{}", request.path))?;
        self.request(Method::PUT, url, token.map(AccessToken::secret), Some(request))
            .await
    }

    async fn create_pull_request(
        &self,
        token: Option<&AccessToken>,
        repo: &RepositoryIdentity,
        proposal: &PullRequestProposal,
    ) -> ApiResult<CreatedPullRequest> {
        let url = self.repo_url(repo, "pulls")?;
        self.request(Method::POST, url, token.map(AccessToken::secret), Some(proposal))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn link(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn next_page_picks_rel_next_entry() {
        let headers = link(
            r#"<https://api.github.com/repositories/1/git/refs?per_page=100&page=3>; rel="last", <https://api.github.com/repositories/1/git/refs?per_page=100&page=2>; rel="next""#,
        );
        let next = next_page(&headers).expect("next");
        assert_eq!(
            next.as_str(),
            "https://api.github.com/repositories/1/git/refs?per_page=100&page=2"
        );
    }

    #[test]
    fn next_page_absent_on_last_page() {
        assert!(next_page(&HeaderMap::new()).is_none());
        let headers = link(r#"<https://api.github.com/x?page=1>; rel="prev", <https://api.github.com/x?page=1>; rel="first""#);
        assert!(next_page(&headers).is_none());
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = GitHubClient::new("https://ghe.example.com/api/v3").expect("client");
        assert_eq!(client.base_url().as_str(), "https://ghe.example.com/api/v3/");
        let url = client
            .repo_url(&RepositoryIdentity::new("acme", "widgets"), "git/refs")
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/acme/widgets/git/refs"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            GitHubClient::new("not a url"),
            Err(ApiError::Url(_))
        ));
    }
}
