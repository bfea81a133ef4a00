//! AWS Signature Version 4 for DynamoDB JSON requests.
//!
//! Every request is `POST /` with no query string, so the canonical request
//! only varies by headers and body. A fresh signature is computed for each
//! attempt because the timestamp is part of it.

use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::credentials::ConnectConfig;

type HmacSha256 = Hmac<Sha256>;

pub const SERVICE: &str = "dynamodb";
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

pub fn sign(
    config: &ConnectConfig,
    target: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<Signature, InvalidLength> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let credentials = config.credentials();
    let token = credentials.session_token();

    let mut headers = vec![
        ("content-type", CONTENT_TYPE.to_string()),
        ("host", config.host()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = token {
        headers.push(("x-amz-security-token", token.to_string()));
    }
    headers.push(("x-amz-target", target.to_string()));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "POST\n/\n\n{canonical_headers}\n{signed_headers}\n{}",
        hex::encode(Sha256::digest(body))
    );
    let scope = format!("{date}/{}/{SERVICE}/aws4_request", config.region());
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret = format!("AWS4{}", credentials.secret_access_key());
    let key = hmac(secret.as_bytes(), date.as_bytes())?;
    let key = hmac(&key, config.region().as_bytes())?;
    let key = hmac(&key, SERVICE.as_bytes())?;
    let key = hmac(&key, b"aws4_request")?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    Ok(Signature {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id()
        ),
        amz_date,
        security_token: token.map(str::to_string),
    })
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn signs_with_a_stable_signature() {
        let config = ConnectConfig::new(
            "https://dynamodb.us-east-1.amazonaws.com",
            "us-east-1",
            Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
        )
        .unwrap();
        let signature = sign(
            &config,
            "DynamoDB_20120810.ListTables",
            b"{}",
            fixed_time(),
        )
        .unwrap();

        assert_eq!(signature.amz_date, "20240501T123045Z");
        assert_eq!(signature.security_token, None);
        assert_eq!(
            signature.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-east-1/dynamodb/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date;x-amz-target, \
             Signature=934cda696ac0627fa9ab29dd453205cf745834baf6497a4d684db9cbb8ae9ea7"
        );
    }

    #[test]
    fn session_token_is_signed() {
        let config = ConnectConfig::local(None)
            .unwrap()
            .with_session_token(Some("token".into()));
        let signature = sign(&config, "DynamoDB_20120810.GetItem", b"{}", fixed_time()).unwrap();
        assert_eq!(signature.security_token.as_deref(), Some("token"));
        assert!(signature.authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target"
        ));
    }

    #[test]
    fn signature_depends_on_body() {
        let config = ConnectConfig::local(None).unwrap();
        let a = sign(&config, "DynamoDB_20120810.GetItem", b"{}", fixed_time()).unwrap();
        let b = sign(&config, "DynamoDB_20120810.GetItem", b"{\"x\":1}", fixed_time()).unwrap();
        assert_ne!(a.authorization, b.authorization);
    }
}
