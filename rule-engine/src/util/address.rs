//! Sender address and domain validation.

use mailparse::addrparse;
use tracing::debug;

/// Whether `email` is a single bare mailbox (`local@domain`).
///
/// Display-name forms (`Jane <jane@example.com>`) and address lists are
/// rejected because rule scopes take bare addresses only.
pub fn is_valid_address(email: &str) -> bool {
    let trimmed = email.trim();
    if trimmed.is_empty() || trimmed != email {
        return false;
    }

    let single = match addrparse(trimmed) {
        Ok(list) => list.extract_single_info(),
        Err(e) => {
            debug!(error = %e, "address_parse_failed");
            None
        }
    };

    let Some(info) = single else {
        return false;
    };
    if info.display_name.is_some() || info.addr != trimmed {
        return false;
    }

    match trimmed.rsplit_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// Whether `domain` is a plausible DNS name with at least two labels.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        assert!(is_valid_address("jane@example.com"));
        assert!(is_valid_address("jane+news@example.co.uk"));
        assert!(is_valid_address("o'brien@example.com"));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("jane"));
        assert!(!is_valid_address(" jane@example.com"));
        assert!(!is_valid_address("Jane <jane@example.com>"));
        assert!(!is_valid_address("a@example.com, b@example.com"));
    }

    #[test]
    fn test_domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("mail.example-corp.io"));
        assert!(!is_valid_domain("localhost"));
        assert!(!is_valid_domain("example..com"));
        assert!(!is_valid_domain("-example.com"));
        assert!(!is_valid_domain("exa mple.com"));
    }
}
