//! Client for the read-only endpoints Patchwork needs from upstream registries.
//!
//! Only the catalog, tag listing and the `/v2/` probe are spoken; blobs and
//! manifests are never fetched, clients are redirected to them instead.

use async_trait::async_trait;
use patchwork_core::RegistryId;
use reqwest::header::{HeaderMap, LINK, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::challenge::BearerChallenge;
use crate::config::UpstreamSettings;
use crate::error::RegistryError;
use crate::tls::load_extra_certs;
use crate::transport::{ProbeResponse, ProbeTransport};

/// Upper bound on followed `Link: rel="next"` pages.
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Client shared by every request that needs an upstream registry.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    settings: UpstreamSettings,
    http: reqwest::Client,
}

impl UpstreamClient {
    /// Creates a new client.
    ///
    /// Extra certificates from [`UpstreamSettings::extra_certs_dir`] are
    /// trusted in addition to the system roots.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificates cannot be loaded or the HTTP
    /// client cannot be created.
    pub fn new(settings: UpstreamSettings) -> Result<Self, RegistryError> {
        let http = Self::build_http_client(&settings)?;
        Ok(Self { settings, http })
    }

    /// Returns the client settings.
    #[must_use]
    pub const fn settings(&self) -> &UpstreamSettings {
        &self.settings
    }

    /// Lists every repository of an upstream registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be retrieved.
    pub async fn catalog(&self, registry: &RegistryId) -> Result<Vec<String>, RegistryError> {
        let pages: Vec<CatalogPage> = self
            .fetch_pages(registry, "v2/_catalog", "registry:catalog:*")
            .await?
            .ok_or_else(|| RegistryError::HttpError {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("{registry} does not expose a catalog"),
            })?;

        Ok(pages.into_iter().flat_map(|page| page.repositories).collect())
    }

    /// Lists the tags of a repository on an upstream registry.
    ///
    /// An unknown repository has no tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the tags cannot be retrieved.
    pub async fn tags(
        &self,
        registry: &RegistryId,
        name: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let path = format!("v2/{name}/tags/list");
        let scope = format!("repository:{name}:pull");
        let pages: Vec<TagList> = self
            .fetch_pages(registry, &path, &scope)
            .await?
            .unwrap_or_default();

        Ok(pages
            .into_iter()
            .flat_map(|page| page.tags.unwrap_or_default())
            .collect())
    }

    /// Fetches a paginated JSON listing. `None` means the first page was 404.
    async fn fetch_pages<T: DeserializeOwned>(
        &self,
        registry: &RegistryId,
        path: &str,
        scope: &str,
    ) -> Result<Option<Vec<T>>, RegistryError> {
        let mut url = registry.endpoint(path);
        let mut token = None;
        let mut pages = Vec::new();

        for _ in 0..MAX_PAGES {
            let response = self.send_authorized(&url, scope, &mut token).await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND && pages.is_empty() {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(RegistryError::HttpError {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let next = next_page(registry, response.headers());
            pages.push(response.json::<T>().await?);

            match next {
                Some(next) => url = next,
                None => return Ok(Some(pages)),
            }
        }

        tracing::warn!(%registry, path, pages = MAX_PAGES, "Pagination limit reached");
        Ok(Some(pages))
    }

    /// Sends a GET, fetching an anonymous Bearer token once if challenged.
    async fn send_authorized(
        &self,
        url: &str,
        scope: &str,
        token: &mut Option<String>,
    ) -> Result<reqwest::Response, RegistryError> {
        let response = self.get(url, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || token.is_some() {
            return Ok(response);
        }

        let Some(challenge) = bearer_challenge(response.headers()) else {
            return Ok(response);
        };

        tracing::debug!(url, realm = %challenge.realm, scope, "Requesting anonymous token");
        let fresh = self.anonymous_token(&challenge, scope).await?;
        let response = self.get(url, Some(&fresh)).await?;
        *token = Some(fresh);
        Ok(response)
    }

    async fn anonymous_token(
        &self,
        challenge: &BearerChallenge,
        scope: &str,
    ) -> Result<String, RegistryError> {
        let mut query = vec![("scope", scope)];
        if let Some(service) = &challenge.service {
            query.push(("service", service.as_str()));
        }

        let response = self.http.get(&challenge.realm).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(RegistryError::AuthenticationFailed {
                message: format!(
                    "token server {} answered {}",
                    challenge.realm,
                    response.status()
                ),
            });
        }

        let body: TokenResponse = response.json().await?;
        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RegistryError::AuthenticationFailed {
                message: format!("token server {} returned no token", challenge.realm),
            })
    }

    async fn get(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<reqwest::Response, RegistryError> {
        let mut request = self.http.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Builds the HTTP client with proper configuration.
    fn build_http_client(settings: &UpstreamSettings) -> Result<reqwest::Client, RegistryError> {
        let mut builder = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(&settings.user_agent);

        if let Some(ref dir) = settings.extra_certs_dir {
            for cert in load_extra_certs(dir)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        builder.build().map_err(|e| RegistryError::HttpError {
            status: 0,
            message: format!("Failed to build HTTP client: {e}"),
        })
    }
}

#[async_trait]
impl ProbeTransport for UpstreamClient {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, RegistryError> {
        let response = self.http.get(url).send().await?;
        let www_authenticate = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            www_authenticate,
        })
    }
}

fn bearer_challenge(headers: &HeaderMap) -> Option<BearerChallenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(BearerChallenge::parse)
}

/// Extracts the `rel="next"` target of a `Link` header.
fn next_page(registry: &RegistryId, headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.trim().split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().replace(' ', "").eq_ignore_ascii_case("rel=\"next\""));
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        if target.starts_with("http://") || target.starts_with("https://") {
            Some(target.to_string())
        } else {
            Some(registry.endpoint(target))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn registry() -> RegistryId {
        RegistryId::from_url(&url::Url::parse("https://quay.io").unwrap()).unwrap()
    }

    fn link(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_client_creation() {
        assert!(UpstreamClient::new(UpstreamSettings::new()).is_ok());
    }

    #[test]
    fn test_next_page_relative() {
        let headers = link(r#"</v2/_catalog?last=b&n=2>; rel="next""#);
        assert_eq!(
            next_page(&registry(), &headers).as_deref(),
            Some("https://quay.io/v2/_catalog?last=b&n=2")
        );
    }

    #[test]
    fn test_next_page_absolute() {
        let headers =
            link(r#"<https://mirror.example/v2/_catalog?last=b>; rel=next, <x>; rel="prev""#);
        assert_eq!(next_page(&registry(), &headers), None);

        let headers = link(r#"<https://mirror.example/v2/_catalog?last=b>; rel = "next""#);
        assert_eq!(
            next_page(&registry(), &headers).as_deref(),
            Some("https://mirror.example/v2/_catalog?last=b")
        );
    }

    #[test]
    fn test_next_page_missing() {
        assert_eq!(next_page(&registry(), &HeaderMap::new()), None);
        assert_eq!(next_page(&registry(), &link(r#"</v2/x>; rel="prev""#)), None);
    }

    #[test]
    fn test_bearer_challenge_from_headers() {
        let mut headers = HeaderMap::new();
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"r\""));
        headers.append(
            WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer realm=\"https://auth/t\",service=\"s\""),
        );
        let challenge = bearer_challenge(&headers).unwrap();
        assert_eq!(challenge.realm, "https://auth/t");
    }
}
