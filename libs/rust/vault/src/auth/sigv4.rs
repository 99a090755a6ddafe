//! AWS Signature Version 4 signing for the IAM login, on top of `aws-sigv4`.
//!
//! Vault replays the signed request against STS itself, so the caller needs
//! the full header list rather than a request to send.

use crate::error::{VaultError, VaultResult};
use aws_credential_types::Credentials;
use aws_sigv4::{
    http_request::{self, SignableBody, SigningSettings},
    sign::v4,
};
use aws_smithy_runtime_api::client::identity::Identity;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::time::SystemTime;
use url::Url;

const PROVIDER_NAME: &str = "vault-client";

/// A request to be signed.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    /// HTTP method
    pub method: &'a str,
    /// Full request URL
    pub url: &'a Url,
    /// Headers to sign, in addition to `Host` and `X-Amz-Date`
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: &'a [u8],
}

/// Credentials, scope and time used to sign.
#[derive(Debug, Clone)]
pub struct SigningParams<'a> {
    /// Access key ID
    pub access_key_id: &'a str,
    /// Secret access key
    pub secret_access_key: &'a SecretString,
    /// Session token for temporary credentials
    pub session_token: Option<&'a SecretString>,
    /// AWS region
    pub region: &'a str,
    /// Service name (e.g. `sts`)
    pub service: &'a str,
    /// Signing time
    pub time: DateTime<Utc>,
}

/// Sign `request` and return its complete header list, including
/// `Host`, `X-Amz-Date`, `X-Amz-Security-Token` (temporary credentials
/// only) and `Authorization`.
///
/// # Errors
///
/// Returns [`VaultError::InvalidConfig`] if the URL has no host or the
/// request cannot be signed.
pub fn sign(
    request: &SignableRequest<'_>,
    params: &SigningParams<'_>,
) -> VaultResult<Vec<(String, String)>> {
    let identity: Identity = Credentials::new(
        params.access_key_id,
        params.secret_access_key.expose_secret(),
        params.session_token.map(|token| token.expose_secret().to_string()),
        None,
        PROVIDER_NAME,
    )
    .into();
    let signing_params: http_request::SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(params.region)
        .name(params.service)
        .time(SystemTime::from(params.time))
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| VaultError::invalid_config(format!("SigV4 parameters: {e}")))?
        .into();

    let mut headers = request.headers.clone();
    headers.push(("Host".to_string(), host_header(request.url)?));

    let signable = http_request::SignableRequest::new(
        request.method,
        request.url.as_str(),
        headers.iter().map(|(name, value)| (name.as_str(), value.as_str())),
        SignableBody::Bytes(request.body),
    )
    .map_err(|e| VaultError::invalid_config(format!("SigV4 request: {e}")))?;
    let (instructions, _signature) = http_request::sign(signable, &signing_params)
        .map_err(|e| VaultError::invalid_config(format!("SigV4 signing: {e}")))?
        .into_parts();

    headers.extend(
        instructions
            .headers()
            .map(|(name, value)| (header_case(name), value.to_string())),
    );
    Ok(headers)
}

/// `x-amz-date` -> `X-Amz-Date`
fn header_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn host_header(url: &Url) -> VaultResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| VaultError::invalid_config(format!("{url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_secret() -> SecretString {
        SecretString::from(EXAMPLE_SECRET.to_string())
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> &'a str {
        &headers.iter().find(|(k, _)| k == name).unwrap().1
    }

    #[test]
    fn test_sign_matches_published_signature() {
        let url = Url::parse("https://iam.amazonaws.com/?Version=2010-05-08&Action=ListUsers").unwrap();
        let secret = example_secret();
        let request = SignableRequest {
            method: "GET",
            url: &url,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded; charset=utf-8".to_string(),
            )],
            body: b"",
        };
        let params = SigningParams {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: &secret,
            session_token: None,
            region: "us-east-1",
            service: "iam",
            time: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).single().unwrap(),
        };

        let headers = sign(&request, &params).unwrap();
        assert_eq!(header(&headers, "X-Amz-Date"), "20150830T123600Z");
        assert_eq!(
            header(&headers, "Authorization"),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn test_session_token_is_signed() {
        let url = Url::parse("https://sts.amazonaws.com/").unwrap();
        let secret = example_secret();
        let token = SecretString::from("session".to_string());
        let request = SignableRequest {
            method: "POST",
            url: &url,
            headers: Vec::new(),
            body: b"Action=GetCallerIdentity&Version=2011-06-15",
        };
        let params = SigningParams {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: &secret,
            session_token: Some(&token),
            region: "us-east-1",
            service: "sts",
            time: Utc::now(),
        };

        let headers = sign(&request, &params).unwrap();
        assert_eq!(header(&headers, "X-Amz-Security-Token"), "session");
        assert_eq!(header(&headers, "Host"), "sts.amazonaws.com");
        assert!(header(&headers, "Authorization").contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
    }

    #[test]
    fn test_header_case() {
        assert_eq!(header_case("x-amz-security-token"), "X-Amz-Security-Token");
        assert_eq!(header_case("authorization"), "Authorization");
    }

    #[test]
    fn test_host_includes_non_default_port() {
        let url = Url::parse("http://127.0.0.1:9000/").unwrap();
        assert_eq!(host_header(&url).unwrap(), "127.0.0.1:9000");
    }
}
