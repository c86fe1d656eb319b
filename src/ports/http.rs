//! HTTP abstraction returning lightweight fetch/post results.
use crate::domain::model::{FetchResult, PostResult};

/// Transport seam for the querier and the notification senders.
///
/// The production adapter is `infra::reqwest_http::ReqwestHttp`; tests swap in
/// canned implementations.
#[async_trait::async_trait]
pub trait Http: Send + Sync {
    /// GET `url`, optionally with an `Authorization: token <..>` header and an
    /// insecure (certificate-ignoring) transport.
    async fn get(&self, url: &str, auth_token: Option<&str>, insecure: bool) -> FetchResult;

    /// POST a JSON body to `url` with extra headers.
    async fn post_json(&self, url: &str, body: Vec<u8>, headers: Vec<(String, String)>)
        -> PostResult;
}
