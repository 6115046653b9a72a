// SOAP 1.2 transport for ONVIF services
//
// Wraps `reqwest::Client` with envelope construction, WS-Security header
// injection and fault unwrapping. The service clients in `media` only
// assemble request bodies and pick fields out of the response.

use tracing::{debug, trace};
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::TransportConfig;
use crate::xml;

const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub(crate) const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";

/// One SOAP endpoint (a single ONVIF service on a single device).
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
    endpoint: Url,
    credentials: Option<Credentials>,
    timeout_secs: u64,
}

impl SoapClient {
    /// Create a client for `endpoint` from a `TransportConfig`.
    pub fn new(
        endpoint: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoint,
            credentials,
            timeout_secs: transport.timeout_secs(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        endpoint: Url,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            http,
            endpoint,
            credentials,
            timeout_secs: TransportConfig::default().timeout_secs(),
        }
    }

    /// The service endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Wrap `body` in an envelope and POST it, returning the raw response
    /// document on success.
    pub async fn call(&self, action: &str, body: &str) -> Result<String, Error> {
        let envelope = self.envelope(body);
        debug!(endpoint = %self.endpoint, action, "SOAP request");
        trace!(%envelope, "SOAP envelope");

        let resp = self
            .http
            .post(self.endpoint.clone())
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("application/soap+xml; charset=utf-8; action=\"{action}\""),
            )
            .body(envelope)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.map_transport(e))?;
        trace!(%status, body = %text, "SOAP response");

        parse_response(status, text)
    }

    fn envelope(&self, body: &str) -> String {
        let header = self
            .credentials
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(Credentials::ws_security_header)
            .unwrap_or_default();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="{SOAP_ENV_NS}" xmlns:tt="{SCHEMA_NS}"><s:Header>{header}</s:Header><s:Body>{body}</s:Body></s:Envelope>"#
        )
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Turn an HTTP status and body into either the response document or the
/// most specific error available.
///
/// Many cameras answer faults with HTTP 400/500 and a fault body, some
/// with 200 and a fault body, and some with a bare 401.
fn parse_response(status: reqwest::StatusCode, body: String) -> Result<String, Error> {
    if let Some(fault) = xml::find(&body, "Fault") {
        let code = fault
            .child("Code")
            .map(|code| {
                let value = code.child_text("Value").unwrap_or_default().into_owned();
                match code.child("Subcode").and_then(|s| s.child_text("Value")) {
                    Some(sub) => format!("{value}/{sub}"),
                    None => value,
                }
            })
            .unwrap_or_default();
        let reason = fault
            .child("Reason")
            .and_then(|r| r.child_text("Text"))
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_else(|| code.clone());

        if code.contains("NotAuthorized") || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::NotAuthorized { message: reason });
        }
        return Err(Error::SoapFault { code, reason });
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::NotAuthorized {
            message: format!("HTTP {status}"),
        });
    }

    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            body: preview(&body).to_owned(),
        });
    }

    Ok(body)
}

pub(crate) fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Build a `Deserialization` error for a response missing `what`.
pub(crate) fn missing(what: &str, body: &str) -> Error {
    Error::Deserialization {
        message: format!("missing <{what}> (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn fault_with_subcode() {
        let body = r#"<s:Envelope><s:Body><s:Fault><s:Code><s:Value>s:Sender</s:Value><s:Subcode><s:Value>ter:InvalidArgVal</s:Value></s:Subcode></s:Code><s:Reason><s:Text xml:lang="en">bad resolution</s:Text></s:Reason></s:Fault></s:Body></s:Envelope>"#;
        let err = parse_response(StatusCode::BAD_REQUEST, body.into());
        match err {
            Err(Error::SoapFault { code, reason }) => {
                assert_eq!(code, "s:Sender/ter:InvalidArgVal");
                assert_eq!(reason, "bad resolution");
            }
            other => panic!("expected SoapFault, got {other:?}"),
        }
    }

    #[test]
    fn not_authorized_fault() {
        let body = "<Fault><Code><Value>Sender</Value><Subcode><Value>ter:NotAuthorized</Value></Subcode></Code></Fault>";
        let err = parse_response(StatusCode::BAD_REQUEST, body.into());
        assert!(matches!(err, Err(Error::NotAuthorized { .. })));
    }

    #[test]
    fn bare_401() {
        let err = parse_response(StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(err, Err(Error::NotAuthorized { .. })));
    }

    #[test]
    fn non_success_without_fault() {
        let err = parse_response(StatusCode::BAD_GATEWAY, "upstream".into());
        assert!(matches!(err, Err(Error::Http { status: 502, .. })));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        assert!(preview(&body).len() <= 200);
    }
}
