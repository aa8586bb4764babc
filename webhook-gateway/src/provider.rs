//! Known webhook providers.
//!
//! The `service` query parameter is matched against this closed set. Anything
//! outside it never reaches a verifier or a handler.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A webhook sender the gateway knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    GitHub,
    Twilio,
    SendGrid,
    PayPal,
    Ups,
    FedEx,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::Stripe,
        Provider::GitHub,
        Provider::Twilio,
        Provider::SendGrid,
        Provider::PayPal,
        Provider::Ups,
        Provider::FedEx,
    ];

    /// Identifier used in the `service` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::GitHub => "github",
            Provider::Twilio => "twilio",
            Provider::SendGrid => "sendgrid",
            Provider::PayPal => "paypal",
            Provider::Ups => "ups",
            Provider::FedEx => "fedex",
        }
    }

    /// Whether this provider delivers form-encoded bodies.
    pub fn uses_form_encoding(&self) -> bool {
        matches!(self, Provider::Twilio)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a service name is not one of the known providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    // Exact match only: "Stripe" or " stripe" are not the same service.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_providers() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
    }

    #[test]
    fn test_parse_is_exact() {
        assert!("Stripe".parse::<Provider>().is_err());
        assert!(" stripe".parse::<Provider>().is_err());
        assert!("".parse::<Provider>().is_err());
        assert_eq!(
            "mailgun".parse::<Provider>(),
            Err(UnknownProvider("mailgun".to_string()))
        );
    }

    #[test]
    fn test_only_twilio_uses_forms() {
        let form: Vec<_> = Provider::ALL
            .into_iter()
            .filter(|p| p.uses_form_encoding())
            .collect();
        assert_eq!(form, vec![Provider::Twilio]);
    }
}
