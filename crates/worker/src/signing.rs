// AWS Signature Version 4 request signing
// Decision: Sign with hmac + sha2 directly; the JSON protocol only needs single-payload requests without query strings
// Decision: Credentials come from the standard AWS_* environment variables; no profile files or instance metadata

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Signing algorithm named in the `Authorization` header
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Service name in the credential scope
pub const SERVICE: &str = "swf";

/// Region used when neither the environment nor the endpoint names one
pub const DEFAULT_REGION: &str = "us-east-1";

type HmacSha256 = Hmac<Sha256>;

/// Static access key credentials
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Set for temporary credentials
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token;
        self
    }

    /// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`, plus `AWS_SESSION_TOKEN` if set
    ///
    /// Returns `None` unless both keys are present and non-empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let access_key_id = non_empty("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = non_empty("AWS_SECRET_ACCESS_KEY")?;
        Some(
            Self::new(access_key_id, secret_access_key)
                .with_session_token(non_empty("AWS_SESSION_TOKEN")),
        )
    }
}

/// The parts of a request covered by the signature
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    /// `Host` header value, including a non-default port
    pub host: &'a str,
    pub path: &'a str,
    /// Extra headers to sign, besides `host` and the `x-amz-*` ones added here
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

/// Signs requests for one region and service
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(credentials: AwsCredentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: SERVICE.to_string(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Headers to attach to `request`: `x-amz-date`, the session token if
    /// any, and `authorization`
    pub fn sign(
        &self,
        request: &SignableRequest<'_>,
        now: DateTime<Utc>,
    ) -> Vec<(&'static str, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        headers.push(("host".to_string(), request.host.to_string()));
        headers.push(("x-amz-date".to_string(), amz_date.clone()));
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n\n{canonical_headers}\n{signed_headers}\n{}",
            request.method,
            request.path,
            hex::encode(Sha256::digest(request.body))
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = [
            date.as_str(),
            self.region.as_str(),
            self.service.as_str(),
            "aws4_request",
        ]
        .iter()
        .fold(
            format!("AWS4{}", self.credentials.secret_access_key).into_bytes(),
            |key, part| hmac_sha256(&key, part.as_bytes()),
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let mut signed = vec![("x-amz-date", amz_date)];
        if let Some(token) = &self.credentials.session_token {
            signed.push(("x-amz-security-token", token.clone()));
        }
        signed.push((
            "authorization",
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        signed
    }
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 takes keys of any size"),
    };
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Region of a regional endpoint such as `swf.eu-west-1.amazonaws.com`
pub fn region_from_host(host: &str) -> Option<&str> {
    let mut labels = host.split('.');
    match (labels.next(), labels.next(), labels.next()) {
        (Some(SERVICE), Some(region), Some("amazonaws")) => Some(region),
        _ => None,
    }
}
