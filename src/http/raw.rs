use super::{encode_path, encode_path_segment, GitHubClient, GitHubError, ResponseMeta};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;

/// Which revision of a file the raw transport should serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRef {
    /// Default branch head.
    Head,
    Sha(String),
    /// A ref name, either short (`main`) or qualified (`refs/heads/main`).
    Ref(String),
}

impl RawRef {
    fn as_url_part(&self) -> String {
        match self {
            RawRef::Head => "HEAD".to_string(),
            RawRef::Sha(sha) => encode_path_segment(sha),
            RawRef::Ref(r) => encode_path(r),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawContent {
    pub bytes: Vec<u8>,
    /// Media type from the response, parameters stripped.
    pub content_type: Option<String>,
    pub meta: ResponseMeta,
}

impl GitHubClient {
    pub fn raw_url(&self, owner: &str, repo: &str, path: &str, r: &RawRef) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.endpoints.raw_url,
            encode_path_segment(owner),
            encode_path_segment(repo),
            r.as_url_part(),
            encode_path(path.trim_start_matches('/'))
        )
    }

    /// Fetch a file blob from the raw-content host.
    pub async fn raw_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        r: &RawRef,
    ) -> Result<RawContent, GitHubError> {
        let url = self.raw_url(owner, repo, path, r);
        let resp = self
            .send("GET raw", true, || {
                self.authorized(self.http.request(Method::GET, &url))
            })
            .await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let (bytes, meta) = self.finish(resp).await?;
        Ok(RawContent {
            bytes,
            content_type,
            meta,
        })
    }
}
