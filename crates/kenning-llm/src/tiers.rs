//! Ordered provider tiers with linear failover.

use crate::any::AnyProvider;
use crate::error::LlmError;
use crate::privacy::PrivacySanitizer;
use crate::provider::LlmProvider;

#[derive(Debug, Clone)]
pub struct Tier {
    pub name: String,
    pub provider: AnyProvider,
    /// Trusted tiers receive the raw prompt even when privacy mode is on.
    pub trusted: bool,
}

impl Tier {
    #[must_use]
    pub fn new(name: impl Into<String>, provider: AnyProvider, trusted: bool) -> Self {
        Self {
            name: name.into(),
            provider,
            trusted,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TierChain {
    tiers: Vec<Tier>,
}

impl TierChain {
    #[must_use]
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Tier> {
        self.tiers.first()
    }

    /// Complete `prompt` with the first tier that succeeds.
    ///
    /// When a sanitizer is given, untrusted tiers see the sanitized prompt and their
    /// reply is desanitized before returning.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NoProviders`] for an empty chain and
    /// [`LlmError::TiersExhausted`] carrying the last failure otherwise.
    pub async fn complete(
        &self,
        prompt: &str,
        sanitizer: Option<&dyn PrivacySanitizer>,
    ) -> Result<String, LlmError> {
        let mut last_error: Option<String> = None;

        for tier in &self.tiers {
            let cloak = sanitizer.filter(|_| !tier.trusted);
            let outgoing = match cloak {
                Some(s) => {
                    tracing::info!(tier = %tier.name, "sanitizing prompt for untrusted tier");
                    s.sanitize(prompt)
                }
                None => prompt.to_owned(),
            };

            tracing::debug!(tier = %tier.name, provider = tier.provider.name(), "consulting tier");
            match tier.provider.complete(&outgoing).await {
                Ok(reply) => {
                    return Ok(match cloak {
                        Some(s) => s.desanitize(&reply),
                        None => reply,
                    });
                }
                Err(e) => {
                    tracing::warn!(tier = %tier.name, error = %e, "tier failed, falling back");
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(match last_error {
            Some(last_error) => LlmError::TiersExhausted { last_error },
            None => LlmError::NoProviders,
        })
    }
}
