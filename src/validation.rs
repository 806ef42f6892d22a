//! Input validation for trigger-call requests.
//!
//! Pure format checks, run before anything touches the credential store or the
//! voice provider. The gateway calls them in a fixed order and reports the
//! first failure.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Length of the client-side credential digest in hex characters.
pub const CREDENTIAL_HEX_LEN: usize = 64;

/// Shortest accepted business name after trimming.
pub const MIN_BUSINESS_NAME_CHARS: usize = 2;

/// Raw request body. Fields are kept as untyped JSON so that missing or
/// mistyped values are reported by the validators rather than by the decoder.
#[derive(Debug, Default, Deserialize)]
pub struct CallRequest {
    #[serde(default)]
    pub phone_number: Option<Value>,
    #[serde(default)]
    pub business_name: Option<Value>,
    #[serde(default)]
    pub owner_name: Option<Value>,
    #[serde(default)]
    pub password_hash: Option<Value>,
}

impl CallRequest {
    /// The credential token, format-checked. A non-string value is malformed, not missing.
    pub fn credential(&self) -> Result<&str, ValidationError> {
        match &self.password_hash {
            None | Some(Value::Null) => Err(ValidationError::CredentialMissing),
            Some(Value::String(token)) => validate_credential_format(Some(token.as_str())),
            Some(_) => Err(ValidationError::CredentialMalformed),
        }
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_ref().and_then(Value::as_str)
    }

    pub fn business_name(&self) -> Option<&str> {
        self.business_name.as_ref().and_then(Value::as_str)
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owner_name.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Authentication required")]
    CredentialMissing,
    #[error("Invalid authentication format")]
    CredentialMalformed,
    #[error("Invalid phone number format. Use +1XXXXXXXXXX")]
    PhoneInvalid,
    #[error("Business name is required (minimum 2 characters)")]
    BusinessNameInvalid,
}

/// Checks the credential is a 64 character hex token. Says nothing about whether it is correct.
pub fn validate_credential_format(token: Option<&str>) -> Result<&str, ValidationError> {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return Err(ValidationError::CredentialMissing),
    };
    if token.len() == CREDENTIAL_HEX_LEN && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(token)
    } else {
        Err(ValidationError::CredentialMalformed)
    }
}

/// Accepts `+1` followed by exactly ten ASCII digits.
pub fn validate_phone(phone: Option<&str>) -> Result<&str, ValidationError> {
    let phone = phone.ok_or(ValidationError::PhoneInvalid)?;
    let digits = phone
        .strip_prefix("+1")
        .ok_or(ValidationError::PhoneInvalid)?;
    if digits.len() == 10 && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(phone)
    } else {
        Err(ValidationError::PhoneInvalid)
    }
}

/// Returns the trimmed name when it has at least two characters.
pub fn validate_business_name(name: Option<&str>) -> Result<&str, ValidationError> {
    let trimmed = name.map(str::trim).unwrap_or_default();
    if trimmed.chars().count() >= MIN_BUSINESS_NAME_CHARS {
        Ok(trimmed)
    } else {
        Err(ValidationError::BusinessNameInvalid)
    }
}

/// Trimmed owner name, or `None` when absent or blank.
pub fn normalize_owner_name(name: Option<&str>) -> Option<&str> {
    name.map(str::trim).filter(|n| !n.is_empty())
}

/// Keeps only the last four characters, for logs.
pub fn mask_phone(phone: &str) -> String {
    let visible: String = phone
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";

    #[test]
    fn test_credential_format() {
        assert_eq!(validate_credential_format(Some(TOKEN)), Ok(TOKEN));
        let upper = TOKEN.to_uppercase();
        assert!(validate_credential_format(Some(&upper)).is_ok());

        assert_eq!(validate_credential_format(None), Err(ValidationError::CredentialMissing));
        assert_eq!(validate_credential_format(Some("")), Err(ValidationError::CredentialMissing));
        assert_eq!(
            validate_credential_format(Some("password123")),
            Err(ValidationError::CredentialMalformed)
        );
        assert_eq!(
            validate_credential_format(Some(&TOKEN[..63])),
            Err(ValidationError::CredentialMalformed)
        );
        let not_hex = format!("{}g", &TOKEN[..63]);
        assert_eq!(
            validate_credential_format(Some(&not_hex)),
            Err(ValidationError::CredentialMalformed)
        );
    }

    #[test]
    fn test_phone_format() {
        assert_eq!(validate_phone(Some("+14805551234")), Ok("+14805551234"));

        for bad in ["4805551234", "+1480555123", "+1abc5551234", "+148055512345", "+24805551234", "+1 480 555 1234", ""] {
            assert_eq!(validate_phone(Some(bad)), Err(ValidationError::PhoneInvalid), "{bad}");
        }
        assert_eq!(validate_phone(None), Err(ValidationError::PhoneInvalid));
    }

    #[test]
    fn test_business_name_boundary() {
        assert_eq!(validate_business_name(Some("AB")), Ok("AB"));
        assert_eq!(validate_business_name(Some("  Acme Plumbing ")), Ok("Acme Plumbing"));
        assert_eq!(validate_business_name(Some("A")), Err(ValidationError::BusinessNameInvalid));
        assert_eq!(validate_business_name(Some(" A ")), Err(ValidationError::BusinessNameInvalid));
        assert_eq!(validate_business_name(Some("   ")), Err(ValidationError::BusinessNameInvalid));
        assert_eq!(validate_business_name(None), Err(ValidationError::BusinessNameInvalid));
    }

    #[test]
    fn test_owner_name_normalization() {
        assert_eq!(normalize_owner_name(Some(" Dana ")), Some("Dana"));
        assert_eq!(normalize_owner_name(Some("  ")), None);
        assert_eq!(normalize_owner_name(None), None);
    }

    #[test]
    fn test_request_tolerates_missing_fields() {
        let req: CallRequest = serde_json::from_str(r#"{"phone_number":"+14805551234"}"#).unwrap();
        assert_eq!(req.phone_number(), Some("+14805551234"));
        assert!(req.business_name().is_none());
        assert_eq!(req.credential(), Err(ValidationError::CredentialMissing));
    }

    #[test]
    fn test_request_tolerates_mistyped_fields() {
        let req: CallRequest = serde_json::from_str(
            r#"{"phone_number":4805551234,"business_name":null,"owner_name":7,"password_hash":123}"#,
        )
        .unwrap();
        assert_eq!(req.credential(), Err(ValidationError::CredentialMalformed));
        assert_eq!(req.phone_number(), None);
        assert_eq!(req.business_name(), None);
        assert_eq!(req.owner_name(), None);

        let req: CallRequest = serde_json::from_str(r#"{"password_hash":null}"#).unwrap();
        assert_eq!(req.credential(), Err(ValidationError::CredentialMissing));

        let body = format!(r#"{{"password_hash":"{TOKEN}"}}"#);
        let req: CallRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(req.credential(), Ok(TOKEN));
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+14805551234"), "***1234");
        assert_eq!(mask_phone("12"), "***12");
    }
}
