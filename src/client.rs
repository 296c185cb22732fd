//! Registry management API client
//!
//! [`RegistryClient`] is the narrow surface the registry reader needs. The
//! HTTP implementation speaks the Confluent-compatible REST dialect over a
//! blocking `reqwest` client.

use std::fs;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::{Certificate, Identity, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::RestSourceConfig;
use crate::error::RegistryError;
use crate::state::{CompatibilityResult, SubjectSchema};

const ACCEPT_REGISTRY: &str = "application/vnd.schemaregistry.v1+json, application/json";

/// Outcome of looking up one subject's compatibility setting
#[derive(Debug)]
pub struct CompatibilityLookup {
    /// Empty for the global setting
    pub subject: String,
    pub result: Result<CompatibilityResult, RegistryError>,
}

/// Read access to a live registry
pub trait RegistryClient {
    /// List subject names; `deleted` includes soft-deleted subjects
    fn subjects(&self, deleted: bool) -> Result<Vec<String>, RegistryError>;

    /// List version numbers of a subject; `deleted` includes soft-deleted versions
    fn versions(&self, subject: &str, deleted: bool) -> Result<Vec<i32>, RegistryError>;

    /// Fetch one subject version, whether or not it is soft-deleted
    fn schema(&self, subject: &str, version: i32) -> Result<SubjectSchema, RegistryError>;

    /// Look up compatibility settings for each subject; an empty subject
    /// names the global setting
    fn compatibility(&self, subjects: &[String]) -> Vec<CompatibilityLookup>;
}

/// Error body returned by the registry
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: i64,
    message: String,
}

/// Blocking HTTP client for the registry REST API
pub struct HttpRegistryClient {
    base: Url,
    http: Client,
    username: Option<String>,
    password: Option<String>,
}

impl HttpRegistryClient {
    /// Build a client from a REST source declaration
    ///
    /// Reads TLS material from disk but does not contact the registry.
    pub fn new(config: &RestSourceConfig) -> Result<Self, RegistryError> {
        let base = Url::parse(&config.url)
            .map_err(|e| RegistryError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl(config.url.clone()));
        }

        let mut builder = Client::builder();
        if let Some(tls) = config.tls.as_ref().filter(|tls| tls.enabled) {
            if let Some(ca_cert) = &tls.ca_cert {
                let pem = fs::read(ca_cert)?;
                builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
            }
            if let (Some(cert), Some(key)) = (&tls.client_cert, &tls.client_key) {
                let mut pem = fs::read(cert)?;
                pem.push(b'\n');
                pem.extend(fs::read(key)?);
                builder = builder.identity(Identity::from_pem(&pem)?);
            }
        }

        Ok(Self {
            base,
            http: builder.build()?,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, segments: &[&str], deleted: bool) -> Result<Url, RegistryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RegistryError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if deleted {
            url.query_pairs_mut().append_pair("deleted", "true");
        }
        Ok(url)
    }

    fn get<T: DeserializeOwned>(&self, segments: &[&str], deleted: bool) -> Result<T, RegistryError> {
        let url = self.url(segments, deleted)?;
        debug!(%url, "GET");

        let mut request = self.http.get(url).header(ACCEPT, ACCEPT_REGISTRY);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response.text()));
        }

        Ok(response.json()?)
    }
}

/// Error for a non-success response, decoding the registry's error body when
/// there is one
fn status_error(status: u16, body: reqwest::Result<String>) -> RegistryError {
    let body = match body {
        Ok(body) => body,
        Err(err) => {
            return RegistryError::Status {
                status,
                code: None,
                message: format!("response body unreadable: {}", err),
            }
        }
    };
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(error) => RegistryError::Status {
            status,
            code: Some(error.error_code),
            message: error.message,
        },
        Err(_) => RegistryError::Status {
            status,
            code: None,
            message: body,
        },
    }
}

impl RegistryClient for HttpRegistryClient {
    fn subjects(&self, deleted: bool) -> Result<Vec<String>, RegistryError> {
        self.get(&["subjects"], deleted)
    }

    fn versions(&self, subject: &str, deleted: bool) -> Result<Vec<i32>, RegistryError> {
        self.get(&["subjects", subject, "versions"], deleted)
    }

    fn schema(&self, subject: &str, version: i32) -> Result<SubjectSchema, RegistryError> {
        let version = version.to_string();
        self.get(&["subjects", subject, "versions", &version], true)
    }

    fn compatibility(&self, subjects: &[String]) -> Vec<CompatibilityLookup> {
        subjects
            .iter()
            .map(|subject| {
                let result = if subject.is_empty() {
                    self.get::<CompatibilityResult>(&["config"], false)
                } else {
                    self.get::<CompatibilityResult>(&["config", subject], false)
                };
                CompatibilityLookup {
                    subject: subject.clone(),
                    result: result.map(|mut setting| {
                        setting.subject = subject.clone();
                        setting
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;

    fn client(url: &str) -> HttpRegistryClient {
        HttpRegistryClient::new(&RestSourceConfig {
            url: url.to_string(),
            username: None,
            password: None,
            tls: None,
        })
        .unwrap()
    }

    #[test]
    fn test_url_escapes_subject_segments() {
        let client = client("http://registry.local:8081");
        let url = client.url(&["subjects", "orders/value", "versions"], true).unwrap();
        assert_eq!(
            url.as_str(),
            "http://registry.local:8081/subjects/orders%2Fvalue/versions?deleted=true"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client = client("https://example.com/registry/");
        let url = client.url(&["config"], false).unwrap();
        assert_eq!(url.as_str(), "https://example.com/registry/config");
    }

    #[test]
    fn test_rejects_unparseable_url() {
        let result = HttpRegistryClient::new(&RestSourceConfig {
            url: "not a url".to_string(),
            username: None,
            password: None,
            tls: None,
        });
        assert!(matches!(result, Err(RegistryError::InvalidUrl(_))));
    }

    #[test]
    fn test_not_found_detection() {
        let missing = RegistryError::Status {
            status: 404,
            code: Some(40408),
            message: "Subject does not have subject-level compatibility configured".to_string(),
        };
        let denied = RegistryError::Status {
            status: 401,
            code: None,
            message: "Unauthorized".to_string(),
        };
        assert!(missing.is_not_found());
        assert!(!denied.is_not_found());
    }

    #[test]
    fn test_error_body_is_decoded() {
        let body = r#"{"error_code":40401,"message":"Subject 'orders' not found."}"#;
        match status_error(404, Ok(body.to_string())) {
            RegistryError::Status { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code, Some(40401));
                assert_eq!(message, "Subject 'orders' not found.");
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_error_body_is_reported() {
        let failure = Client::new().get("http://[::1").build().unwrap_err();
        match status_error(502, Err(failure)) {
            RegistryError::Status { status, code, message } => {
                assert_eq!(status, 502);
                assert_eq!(code, None);
                assert!(message.starts_with("response body unreadable"));
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_tls_block_is_not_read() {
        let result = HttpRegistryClient::new(&RestSourceConfig {
            url: "https://registry.local:8081".to_string(),
            username: None,
            password: None,
            tls: Some(TlsConfig {
                enabled: false,
                ca_cert: Some("/nonexistent/ca.pem".into()),
                client_cert: None,
                client_key: None,
            }),
        });
        assert!(result.is_ok());
    }
}
