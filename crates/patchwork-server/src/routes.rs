//! Registry v2 endpoints.
//!
//! Pulls are never proxied: manifest and blob requests are answered with a
//! `307` to the upstream registry that owns the repository. Only tag lists
//! and the catalog are fetched and rewritten by the gateway.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use futures::future::join_all;
use patchwork_core::{resolve, MappingRules, Resolution};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::catalog;
use crate::middleware::access_log;
use crate::oci::{ApiError, ErrorCode, API_VERSION, API_VERSION_HEADER};
use crate::reference::{is_valid_digest, is_valid_name, is_valid_reference};
use crate::state::AppState;

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Creates the gateway router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v2", get(api_version_check).fallback(unsupported_method))
        .route("/v2/", get(api_version_check).fallback(unsupported_method))
        .route("/v2/*path", get(dispatch).fallback(unsupported_method))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

/// A request below `/v2/`, split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Catalog,
    Tags { name: &'a str },
    Manifest { name: &'a str, reference: &'a str },
    Blob { name: &'a str, digest: &'a str },
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let path = path.trim_start_matches('/');
        if path == "_catalog" {
            return Some(Self::Catalog);
        }
        if let Some(name) = path.strip_suffix("/tags/list") {
            return Some(Self::Tags { name });
        }

        let (head, last) = path.rsplit_once('/')?;
        let (name, kind) = head.rsplit_once('/')?;
        match kind {
            "manifests" => Some(Self::Manifest {
                name,
                reference: last,
            }),
            "blobs" => Some(Self::Blob { name, digest: last }),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct TagsResponse<'a> {
    name: &'a str,
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    repositories: Vec<String>,
}

/// Host the client addressed, as used for virtual host selection.
fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .unwrap_or_default()
        .to_string()
}

async fn unsupported_method() -> ApiError {
    ApiError::new(ErrorCode::Unsupported)
}

async fn api_version_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let host = request_host(&headers, &uri);
    debug!(host, "GET /v2/");

    // A root mapped vhost has exactly one upstream, clients can talk to it directly.
    let root = state.rules.vhost(&host).and_then(MappingRules::root_mount);
    let Some((registry, _)) = root else {
        return (
            [
                (header::CONTENT_TYPE.as_str(), JSON_UTF8),
                (API_VERSION_HEADER, API_VERSION),
            ],
            "{}",
        )
            .into_response();
    };

    match state.realms.realm_for(registry, &state.probe).await {
        Ok(realm) if realm.is_empty() => {
            let redirect_url = registry.endpoint("v2/");
            info!(host, redirect_url, "Redirecting version check");
            Redirect::temporary(&redirect_url).into_response()
        }
        Ok(realm) => unauthorized(&realm, &host),
        Err(e) => {
            error!(%registry, host, error = %e, "Cannot discover registry authentication");
            ApiError::new(ErrorCode::Unknown)
                .with_detail(e.to_string())
                .into_response()
        }
    }
}

fn unauthorized(realm: &str, host: &str) -> Response {
    let challenge = format!(r#"Bearer realm="{realm}",service="patchwork;{host}""#);
    let Ok(challenge) = HeaderValue::from_str(&challenge) else {
        error!(realm, host, "Realm cannot be sent in a header");
        return ApiError::new(ErrorCode::Unknown)
            .with_detail(format!("unusable realm {realm:?}"))
            .into_response();
    };

    let mut response = ApiError::new(ErrorCode::Unauthorized).into_response();
    let headers = response.headers_mut();
    headers.insert(header::WWW_AUTHENTICATE, challenge);
    headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
    response
}

async fn dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(path): Path<String>,
) -> Response {
    let host = request_host(&headers, &uri);
    let result = match Route::parse(&path) {
        Some(Route::Catalog) => list_catalog(&state, &host).await,
        Some(Route::Tags { name }) => list_tags(&state, &host, name).await,
        Some(Route::Manifest { name, reference }) => manifest(&state, &host, name, reference),
        Some(Route::Blob { name, digest }) => blob(&state, &host, name, digest),
        None => Err(ApiError::new(ErrorCode::NameInvalid).with_detail(json!({ "path": path }))),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

fn translate(
    state: &AppState,
    host: &str,
    name: &str,
    unknown: ErrorCode,
) -> Result<Resolution, ApiError> {
    if !is_valid_name(name) {
        return Err(ApiError::new(ErrorCode::NameInvalid).with_detail(json!({ "name": name })));
    }

    resolve(state.rules.select(host), name).map_err(|e| {
        info!(name, host, error = %e, "Cannot translate name");
        ApiError::new(unknown).with_detail(json!({ "name": name }))
    })
}

fn manifest(
    state: &AppState,
    host: &str,
    name: &str,
    reference: &str,
) -> Result<Response, ApiError> {
    debug!(name, reference, host, "GET manifest");

    if !is_valid_reference(reference) {
        return Err(ApiError::new(ErrorCode::ManifestInvalid)
            .with_detail(json!({ "reference": reference })));
    }
    let resolution = translate(state, host, name, ErrorCode::ManifestUnknown)?;

    let redirect_url = resolution.upstream_url(&format!("manifests/{reference}"));
    info!(name, reference, redirect_url, "Redirecting manifest request");
    Ok(Redirect::temporary(&redirect_url).into_response())
}

fn blob(state: &AppState, host: &str, name: &str, digest: &str) -> Result<Response, ApiError> {
    debug!(name, digest, host, "GET blob");

    if !is_valid_digest(digest) {
        return Err(
            ApiError::new(ErrorCode::DigestInvalid).with_detail(json!({ "digest": digest }))
        );
    }
    let resolution = translate(state, host, name, ErrorCode::BlobUnknown)?;

    let redirect_url = resolution.upstream_url(&format!("blobs/{digest}"));
    info!(name, digest, redirect_url, "Redirecting pull blob request");
    Ok(Redirect::temporary(&redirect_url).into_response())
}

async fn list_tags(state: &AppState, host: &str, name: &str) -> Result<Response, ApiError> {
    debug!(name, host, "GET tags");

    let resolution = translate(state, host, name, ErrorCode::NameUnknown)?;
    let tags = state
        .upstream
        .tags(&resolution.registry, &resolution.remote_name)
        .await
        .map_err(|e| {
            error!(
                registry = %resolution.registry,
                name = %resolution.remote_name,
                error = %e,
                "Cannot list upstream tags"
            );
            ApiError::new(ErrorCode::Unknown).with_detail(e.to_string())
        })?;

    debug!(
        registry = %resolution.registry,
        repository = %resolution.remote_name,
        ?tags,
        "Remote tags"
    );
    Ok(Json(TagsResponse { name, tags }).into_response())
}

async fn list_catalog(state: &AppState, host: &str) -> Result<Response, ApiError> {
    debug!(host, "GET catalog");

    let rules = state.rules.select(host);
    let upstream = &state.upstream;
    let listings = join_all(rules.mount_points_by_registry().iter().map(
        |(registry, mounts)| async move { (registry, mounts, upstream.catalog(registry).await) },
    ))
    .await;

    let mut repositories = BTreeSet::new();
    for (registry, mounts, listing) in listings {
        match listing {
            Ok(listing) => {
                catalog::merge_into(&mut repositories, rules, registry, mounts, &listing);
            }
            Err(e) => warn!(%registry, host, error = %e, "Skipping registry in catalog"),
        }
    }

    Ok(Json(CatalogResponse {
        repositories: repositories.into_iter().collect(),
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        assert_eq!(Route::parse("_catalog"), Some(Route::Catalog));
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            Route::parse("cool/stuff/busybox/tags/list"),
            Some(Route::Tags {
                name: "cool/stuff/busybox"
            })
        );
        assert_eq!(Route::parse("tags/list"), None);
    }

    #[test]
    fn test_parse_manifest() {
        assert_eq!(
            Route::parse("library/busybox/manifests/latest"),
            Some(Route::Manifest {
                name: "library/busybox",
                reference: "latest"
            })
        );
        assert_eq!(
            Route::parse("a/blobs/b/manifests/v1"),
            Some(Route::Manifest {
                name: "a/blobs/b",
                reference: "v1"
            })
        );
    }

    #[test]
    fn test_parse_blob() {
        assert_eq!(
            Route::parse("busybox/blobs/sha256:abc"),
            Some(Route::Blob {
                name: "busybox",
                digest: "sha256:abc"
            })
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Route::parse("busybox"), None);
        assert_eq!(Route::parse("busybox/uploads/x"), None);
        assert_eq!(Route::parse("manifests/latest"), None);
    }

    #[test]
    fn test_request_host() {
        let mut headers = HeaderMap::new();
        let uri: Uri = "http://authority.local/v2/".parse().unwrap();
        assert_eq!(request_host(&headers, &uri), "authority.local");

        headers.insert(header::HOST, HeaderValue::from_static("mirror.local:5000"));
        assert_eq!(request_host(&headers, &uri), "mirror.local:5000");

        assert_eq!(request_host(&HeaderMap::new(), &"/v2/".parse().unwrap()), "");
    }
}
