//! Sender identity resolution.
//!
//! A requested "from" address is honoured only when it is the primary address
//! or one of the account's verified send-as identities. Anything else falls
//! back to the primary address while keeping the requested display name.

use serde::{Deserialize, Serialize};
use sheetmail_core::{MailTransport, SenderIdentity};

/// What the caller asked to send as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderRequest {
    pub address: Option<String>,
    pub name: Option<String>,
}

impl SenderRequest {
    pub fn new(address: Option<String>, name: Option<String>) -> Self {
        let clean = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Self {
            address: clean(address),
            name: clean(name),
        }
    }
}

/// The identity a run will actually use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSender {
    pub identity: SenderIdentity,
    /// True when the requested address was replaced by the primary.
    pub substituted: bool,
}

/// Pure selection logic.
pub fn choose_sender(
    primary: &SenderIdentity,
    aliases: &[SenderIdentity],
    request: &SenderRequest,
) -> ResolvedSender {
    let requested_name = request.name.clone();
    let with_name = |addr: &str, fallback: Option<&String>| SenderIdentity {
        address: addr.to_string(),
        display_name: requested_name.clone().or_else(|| fallback.cloned()),
        is_primary: addr.eq_ignore_ascii_case(&primary.address),
    };

    let Some(requested) = request.address.as_deref() else {
        return ResolvedSender {
            identity: with_name(&primary.address, primary.display_name.as_ref()),
            substituted: false,
        };
    };

    if requested.eq_ignore_ascii_case(&primary.address) {
        return ResolvedSender {
            identity: with_name(&primary.address, primary.display_name.as_ref()),
            substituted: false,
        };
    }

    if let Some(alias) = aliases
        .iter()
        .find(|a| a.address.eq_ignore_ascii_case(requested))
    {
        return ResolvedSender {
            identity: with_name(requested, alias.display_name.as_ref()),
            substituted: false,
        };
    }

    ResolvedSender {
        identity: with_name(&primary.address, primary.display_name.as_ref()),
        substituted: true,
    }
}

/// Query the transport's verified identities and pick the sender.
/// Identity lookup failures degrade to "primary only".
pub async fn resolve_sender(transport: &dyn MailTransport, request: &SenderRequest) -> ResolvedSender {
    let primary = transport.primary_identity();
    let aliases = match transport.send_as_identities().await {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("⚠️ Could not list send-as identities via {}: {e}", transport.name());
            Vec::new()
        }
    };
    let resolved = choose_sender(&primary, &aliases, request);
    if resolved.substituted {
        tracing::warn!(
            "⚠️ {} is not a verified sender, using {}",
            request.address.as_deref().unwrap_or_default(),
            resolved.identity.mailbox()
        );
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> SenderIdentity {
        SenderIdentity {
            address: "me@x.com".into(),
            display_name: Some("Me".into()),
            is_primary: true,
        }
    }

    fn aliases() -> Vec<SenderIdentity> {
        vec![SenderIdentity::new("sales@x.com").named("Sales Desk")]
    }

    #[test]
    fn test_no_request_uses_primary() {
        let r = choose_sender(&primary(), &aliases(), &SenderRequest::default());
        assert_eq!(r.identity.mailbox(), "Me <me@x.com>");
        assert!(!r.substituted);
    }

    #[test]
    fn test_verified_alias_case_insensitive() {
        let req = SenderRequest::new(Some("SALES@x.com".into()), None);
        let r = choose_sender(&primary(), &aliases(), &req);
        assert_eq!(r.identity.address, "SALES@x.com");
        assert_eq!(r.identity.display_name.as_deref(), Some("Sales Desk"));
        assert!(!r.substituted);
    }

    #[test]
    fn test_unverified_falls_back_keeping_name() {
        let req = SenderRequest::new(Some("ceo@other.com".into()), Some("The CEO".into()));
        let r = choose_sender(&primary(), &aliases(), &req);
        assert_eq!(r.identity.address, "me@x.com");
        assert_eq!(r.identity.display_name.as_deref(), Some("The CEO"));
        assert!(r.identity.is_primary);
        assert!(r.substituted);
    }

    #[test]
    fn test_blank_request_fields_are_ignored() {
        let req = SenderRequest::new(Some("  ".into()), Some("".into()));
        assert_eq!(req, SenderRequest::default());
    }
}
