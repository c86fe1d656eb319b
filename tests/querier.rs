use std::time::Duration;

use regex::Regex;
use relwatch::app::querier::query;
use relwatch::domain::commands::{MissClass, UrlCommand};
use relwatch::domain::model::{
    ChatOverride, FetchResult, HttpError, HttpErrorKind, PostResult, PushOverride, Service,
    ServiceKind, ServiceStatus,
};
use relwatch::ports::http::Http;
use tokio::sync::Mutex;

/// Serves a canned fetch result; notification posts always accept.
struct FakeHttp {
    result: Mutex<FetchResult>,
}

impl FakeHttp {
    fn with_body(body: &str) -> Self {
        Self {
            result: Mutex::new(FetchResult {
                status: Some(200),
                body: Some(body.to_string()),
                error: None,
            }),
        }
    }

    fn with_error(kind: HttpErrorKind) -> Self {
        Self {
            result: Mutex::new(FetchResult {
                status: None,
                body: None,
                error: Some(HttpError {
                    kind,
                    message: "transport failed".to_string(),
                }),
            }),
        }
    }

    async fn set_body(&self, body: &str) {
        *self.result.lock().await = FetchResult {
            status: Some(200),
            body: Some(body.to_string()),
            error: None,
        };
    }
}

#[async_trait::async_trait]
impl Http for FakeHttp {
    async fn get(&self, _url: &str, _auth_token: Option<&str>, _insecure: bool) -> FetchResult {
        self.result.lock().await.clone()
    }

    async fn post_json(
        &self,
        _url: &str,
        _body: Vec<u8>,
        _headers: Vec<(String, String)>,
    ) -> PostResult {
        PostResult {
            status: Some(200),
            body: None,
            error: None,
        }
    }
}

fn forge_service() -> Service {
    Service {
        id: "go-gitea/gitea".to_string(),
        kind: ServiceKind::Github,
        url: "https://api.github.com/repos/go-gitea/gitea/releases/latest".to_string(),
        commands: vec![UrlCommand::RegexSubmatch {
            pattern: Regex::new("v(.*)").unwrap(),
            index: 1,
            ignore_miss: false,
        }],
        interval: Duration::from_secs(600),
        progressive_versioning: true,
        regex_content: None,
        regex_version: None,
        access_token: None,
        allow_invalid_certs: false,
        skip_gotify: false,
        skip_slack: false,
        skip_webhook: false,
        gotify: PushOverride::default(),
        slack: ChatOverride::default(),
    }
}

fn url_service(commands: Vec<UrlCommand>) -> Service {
    Service {
        id: "example".to_string(),
        kind: ServiceKind::Url,
        url: "https://example.com/releases".to_string(),
        commands,
        progressive_versioning: false,
        ..forge_service()
    }
}

const RELEASE_V2: &str = r#"{"url":"https://api.github.com/...","tag_name":"v1.14.2","draft":false,"padding":"this body is deliberately padded out beyond the small-body threshold so the forge error-marker checks do not apply to a regular release response. xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"}"#;

fn release_body(tag: &str) -> String {
    RELEASE_V2.replace("v1.14.2", tag)
}

#[tokio::test]
async fn first_observation_seeds_without_firing() {
    let http = FakeHttp::with_body(&release_body("v1.14.2"));
    let service = forge_service();
    let mut status = ServiceStatus::default();

    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(!fired);
    assert_eq!(status.version, "1.14.2");

    // Same body again: no transition.
    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(!fired);
    assert_eq!(status.version, "1.14.2");
}

#[tokio::test]
async fn version_transition_fires() {
    let http = FakeHttp::with_body(&release_body("v1.14.2"));
    let service = forge_service();
    let mut status = ServiceStatus::default();

    assert!(!query(&http, &service, "gitea", &mut status).await.unwrap());

    http.set_body(&release_body("v1.14.3")).await;
    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(fired);
    assert_eq!(status.version, "1.14.3");
}

#[tokio::test]
async fn progressive_versioning_rejects_regression() {
    let http = FakeHttp::with_body(&release_body("v1.14.3"));
    let service = forge_service();
    let mut status = ServiceStatus::default();

    assert!(!query(&http, &service, "gitea", &mut status).await.unwrap());
    assert_eq!(status.version, "1.14.3");

    http.set_body(&release_body("v1.14.2")).await;
    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(!fired);
    assert_eq!(status.version, "1.14.3");
}

#[tokio::test]
async fn unparseable_new_version_fails_open() {
    let http = FakeHttp::with_body(&release_body("v1.14.3"));
    let mut service = forge_service();
    let mut status = ServiceStatus::default();
    assert!(!query(&http, &service, "gitea", &mut status).await.unwrap());

    // Stop stripping the `v`: the new token no longer parses as semver, so
    // the progressive check fails open and the transition is accepted.
    service.commands.clear();
    http.set_body(&release_body("v1.15.0")).await;
    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(fired);
    assert_eq!(status.version, "v1.15.0");
}

#[tokio::test]
async fn bad_credentials_is_fatal() {
    let http = FakeHttp::with_body(r#"{"message":"Bad credentials","documentation_url":"x"}"#);
    let service = forge_service();
    let mut status = ServiceStatus::default();

    let err = query(&http, &service, "gitea", &mut status).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let http = FakeHttp::with_body(r#"{"message":"API rate limit exceeded for 1.2.3.4."}"#);
    let service = forge_service();
    let mut status = ServiceStatus::default();

    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(!fired);
    assert_eq!(status.version, "");
}

#[tokio::test]
async fn small_body_without_markers_is_tag_not_found() {
    let http = FakeHttp::with_body(r#"{"message":"Not Found"}"#);
    let service = forge_service();
    let mut status = ServiceStatus::default();

    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(!fired);
    assert_eq!(status.version, "");
}

#[tokio::test]
async fn tls_failure_is_non_fatal() {
    let http = FakeHttp::with_error(HttpErrorKind::Tls);
    let service = forge_service();
    let mut status = ServiceStatus::default();

    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(!fired);
}

#[tokio::test]
async fn transport_failure_is_non_fatal() {
    let http = FakeHttp::with_error(HttpErrorKind::Connect);
    let service = forge_service();
    let mut status = ServiceStatus::default();

    let fired = query(&http, &service, "gitea", &mut status).await.unwrap();
    assert!(!fired);
}

#[tokio::test]
async fn extraction_abort_sets_miss_class_and_returns_false() {
    let http = FakeHttp::with_body("page without the marker");
    let service = url_service(vec![UrlCommand::Split {
        text: "#version:".to_string(),
        index: 1,
        ignore_miss: false,
    }]);
    let mut status = ServiceStatus::default();

    assert!(!query(&http, &service, "mon", &mut status).await.unwrap());
    assert!(status.miss_mask.is_set(MissClass::SplitNoMatch));

    // Further missing cycles stay quiet; the mask stays set.
    assert!(!query(&http, &service, "mon", &mut status).await.unwrap());
    assert!(status.miss_mask.is_set(MissClass::SplitNoMatch));
}

#[tokio::test]
async fn version_regex_filters_transitions() {
    let http = FakeHttp::with_body("release: beta");
    let mut service = url_service(vec![UrlCommand::Split {
        text: "release: ".to_string(),
        index: 1,
        ignore_miss: false,
    }]);
    service.regex_version = Some("^[0-9.]+$".to_string());
    let mut status = ServiceStatus::default();

    assert!(!query(&http, &service, "mon", &mut status).await.unwrap());
    assert_eq!(status.version, "");
    assert_eq!(status.version_regex_misses, 1);

    http.set_body("release: 1.2.3").await;
    assert!(!query(&http, &service, "mon", &mut status).await.unwrap());
    assert_eq!(status.version, "1.2.3");
    assert_eq!(status.version_regex_misses, 0);
}

#[tokio::test]
async fn content_regex_requires_match_in_raw_body() {
    let http = FakeHttp::with_body("version 1.2.3 (app-1.2.3_amd64.deb)");
    let mut service = url_service(vec![UrlCommand::Regex {
        pattern: Regex::new("[0-9]+\\.[0-9]+\\.[0-9]+").unwrap(),
        index: 0,
        ignore_miss: false,
    }]);
    service.regex_content = Some("app-${version}_amd64\\.deb".to_string());
    let mut status = ServiceStatus::default();

    assert!(!query(&http, &service, "mon", &mut status).await.unwrap());
    assert_eq!(status.version, "1.2.3");
    assert_eq!(status.content_regex_misses, 0);

    // The asset for the new version is not in the body yet.
    http.set_body("version 2.0.0 (app-1.2.3_amd64.deb)").await;
    assert!(!query(&http, &service, "mon", &mut status).await.unwrap());
    assert_eq!(status.version, "1.2.3");
    assert_eq!(status.content_regex_misses, 1);
}

#[tokio::test]
async fn first_version_must_be_semver_under_progressive() {
    let http = FakeHttp::with_body("release: beta");
    let mut service = url_service(vec![UrlCommand::Split {
        text: "release: ".to_string(),
        index: 1,
        ignore_miss: false,
    }]);
    service.progressive_versioning = true;
    let mut status = ServiceStatus::default();

    let res = query(&http, &service, "mon", &mut status).await;
    assert!(res.is_err());
}
