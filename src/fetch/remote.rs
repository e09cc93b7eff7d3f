//! Host ref-listing APIs

use serde::Deserialize;

use super::refs::RefMap;
use super::transport::{Transport, TransportError};
use crate::locator::{Host, RepoReference};

pub const GITHUB_API: &str = "https://api.github.com";
pub const BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

// Upper bound on followed pagination links per listing
const MAX_PAGES: usize = 50;

/// GitHub git ref metadata from API
#[derive(Deserialize, Debug)]
struct GitHubRef {
    #[serde(rename = "ref")]
    name: String,
    object: GitHubObject,
}

#[derive(Deserialize, Debug)]
struct GitHubObject {
    sha: String,
}

/// One page of Bitbucket's refs listing
#[derive(Deserialize, Debug)]
struct BitbucketPage {
    values: Vec<BitbucketRef>,
    next: Option<String>,
}

#[derive(Deserialize, Debug)]
struct BitbucketRef {
    name: String,
    target: BitbucketTarget,
}

#[derive(Deserialize, Debug)]
struct BitbucketTarget {
    hash: String,
}

/// List every ref of `reference`'s repository on its host.
///
/// GitLab has no listing support yet and always yields an empty map.
pub async fn list_refs<T: Transport>(
    transport: &T,
    reference: &RepoReference,
    github_token: Option<&str>,
) -> Result<RefMap, TransportError> {
    match reference.host() {
        Host::Bitbucket => list_bitbucket_refs(transport, reference).await,
        Host::GitHub => list_github_refs(transport, reference, github_token).await,
        Host::GitLab => {
            log::debug!("Ref listing is not supported for gitlab, skipping {}", reference);
            Ok(RefMap::new())
        }
    }
}

async fn list_github_refs<T: Transport>(
    transport: &T,
    reference: &RepoReference,
    token: Option<&str>,
) -> Result<RefMap, TransportError> {
    let mut headers = vec![("Accept", "application/vnd.github.v3+json".to_string())];
    if let Some(token) = token {
        headers.push(("Authorization", format!("token {token}")));
    }

    let mut refs = RefMap::new();
    let mut url = Some(format!(
        "{}/repos/{}/{}/git/refs?per_page=100",
        GITHUB_API,
        reference.user(),
        reference.repo()
    ));
    let mut pages = 0;

    while let Some(current) = url.take() {
        let page = transport.get_json(&current, &headers).await?;
        let entries: Vec<GitHubRef> = decode(&current, page.body)?;

        for entry in entries {
            // Branches shadow tags of the same short name.
            if let Some(branch) = entry.name.strip_prefix("refs/heads/") {
                refs.insert(branch.to_string(), entry.object.sha);
            } else if let Some(tag) = entry.name.strip_prefix("refs/tags/") {
                refs.entry(tag.to_string()).or_insert(entry.object.sha);
            } else {
                refs.entry(entry.name).or_insert(entry.object.sha);
            }
        }

        pages += 1;
        url = page.next.filter(|_| pages < MAX_PAGES);
    }

    Ok(refs)
}

async fn list_bitbucket_refs<T: Transport>(
    transport: &T,
    reference: &RepoReference,
) -> Result<RefMap, TransportError> {
    let mut refs = RefMap::new();
    let mut url = Some(format!(
        "{}/repositories/{}/{}/refs?pagelen=100",
        BITBUCKET_API,
        reference.user(),
        reference.repo()
    ));
    let mut pages = 0;

    while let Some(current) = url.take() {
        let page = transport.get_json(&current, &[]).await?;
        let listing: BitbucketPage = decode(&current, page.body)?;

        for entry in listing.values {
            refs.insert(entry.name, entry.target.hash);
        }

        pages += 1;
        url = listing.next.filter(|_| pages < MAX_PAGES);
    }

    Ok(refs)
}

fn decode<D: serde::de::DeserializeOwned>(
    url: &str,
    body: serde_json::Value,
) -> Result<D, TransportError> {
    serde_json::from_value(body).map_err(|e| TransportError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeTransport;
    use crate::locator::parse;
    use serde_json::json;

    const GITHUB_REFS: &str = "https://api.github.com/repos/u/r/git/refs?per_page=100";
    const BITBUCKET_REFS: &str = "https://api.bitbucket.org/2.0/repositories/u/r/refs?pagelen=100";

    #[tokio::test]
    async fn github_prefixes_are_stripped_and_branches_shadow_tags() {
        let transport = FakeTransport::new().json(
            GITHUB_REFS,
            json!([
                {"ref": "refs/tags/release", "object": {"sha": "tag-sha"}},
                {"ref": "refs/heads/release", "object": {"sha": "branch-sha"}},
                {"ref": "refs/tags/v1.0.0", "object": {"sha": "v1-sha"}},
                {"ref": "refs/pull/1/head", "object": {"sha": "pr-sha"}}
            ]),
        );
        let reference = parse("u/r", Host::GitHub).unwrap();

        let refs = list_refs(&transport, &reference, Some("secret")).await.unwrap();

        assert_eq!(refs.get("release").map(String::as_str), Some("branch-sha"));
        assert_eq!(refs.get("v1.0.0").map(String::as_str), Some("v1-sha"));
        assert_eq!(refs.get("refs/pull/1/head").map(String::as_str), Some("pr-sha"));

        let headers = transport.headers_seen.lock().unwrap();
        assert!(headers.contains(&("Authorization".to_string(), "token secret".to_string())));
        assert!(headers.iter().any(|(k, _)| k == "Accept"));
    }

    #[tokio::test]
    async fn github_follows_next_links() {
        let second = "https://api.github.com/repositories/1/git/refs?page=2";
        let transport = FakeTransport::new()
            .json_page(
                GITHUB_REFS,
                json!([{"ref": "refs/heads/main", "object": {"sha": "aaa"}}]),
                second,
            )
            .json(
                second,
                json!([{"ref": "refs/heads/dev", "object": {"sha": "bbb"}}]),
            );
        let reference = parse("u/r", Host::GitHub).unwrap();

        let refs = list_refs(&transport, &reference, None).await.unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(FakeTransport::count(&transport.json_calls), 2);
        assert!(transport.headers_seen.lock().unwrap().iter().all(|(k, _)| k != "Authorization"));
    }

    #[tokio::test]
    async fn bitbucket_pages_are_merged() {
        let second = "https://api.bitbucket.org/2.0/repositories/u/r/refs?page=2";
        let transport = FakeTransport::new()
            .json(
                BITBUCKET_REFS,
                json!({"values": [{"name": "main", "target": {"hash": "aaa"}}], "next": second}),
            )
            .json(
                second,
                json!({"values": [{"name": "v1", "target": {"hash": "bbb"}}]}),
            );
        let reference = parse("bitbucket:u/r", Host::GitHub).unwrap();

        let refs = list_refs(&transport, &reference, None).await.unwrap();

        assert_eq!(refs.get("main").map(String::as_str), Some("aaa"));
        assert_eq!(refs.get("v1").map(String::as_str), Some("bbb"));
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_decode_error() {
        let transport = FakeTransport::new().json(GITHUB_REFS, json!({"message": "Not Found"}));
        let reference = parse("u/r", Host::GitHub).unwrap();

        let err = list_refs(&transport, &reference, None).await.unwrap_err();
        assert!(matches!(err, TransportError::Decode { .. }));
    }
}
