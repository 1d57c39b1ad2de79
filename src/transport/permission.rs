use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::TransportError;

/// One capability requested from the host platform before scanning.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, derive_more::Display)]
pub enum Capability {
    #[display("scan")]
    Scan,
    #[display("connect")]
    Connect,
    #[display("location")]
    Location,
}

/// The platform's answer for a single requested capability.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CapabilityGrant {
    pub capability: Capability,
    pub granted: bool,
}

/// Outcome of a capability request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum PermissionOutcome {
    #[display("granted")]
    Granted,
    #[display("denied")]
    Denied,
}

/// Platform-native multi-capability prompt.
///
/// Owned by the OS; this crate only consumes the per-capability answers.
#[async_trait]
pub trait CapabilityPrompt: Send + Sync {
    /// Surfaces the platform prompt for the requested capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt itself cannot be presented.
    async fn request(
        &self,
        capabilities: &[Capability],
    ) -> Result<Vec<CapabilityGrant>, TransportError>;
}

/// Prompt used on desktop platforms where the radio carries no runtime
/// permission model: every capability is granted without surfacing UI.
#[derive(Debug, Default)]
pub struct SystemCapabilityPrompt;

#[async_trait]
impl CapabilityPrompt for SystemCapabilityPrompt {
    async fn request(
        &self,
        capabilities: &[Capability],
    ) -> Result<Vec<CapabilityGrant>, TransportError> {
        Ok(capabilities
            .iter()
            .map(|capability| CapabilityGrant {
                capability: *capability,
                granted: true,
            })
            .collect())
    }
}

const REQUIRED_CAPABILITIES: [Capability; 3] =
    [Capability::Scan, Capability::Connect, Capability::Location];

/// Asks the host platform for everything needed to scan and connect.
pub enum PermissionGate {
    /// Explicit OS prompt covering scan, connect and location at once.
    Prompt(Box<dyn CapabilityPrompt>),
    /// Static feature detection used by chooser-mediated platforms.
    FeatureCheck { available: bool },
}

impl PermissionGate {
    /// Builds a prompt-backed gate.
    #[must_use]
    pub fn prompt(prompt: Box<dyn CapabilityPrompt>) -> Self {
        Self::Prompt(prompt)
    }

    /// Builds a feature-detection gate.
    #[must_use]
    pub fn feature_check(available: bool) -> Self {
        Self::FeatureCheck { available }
    }

    /// Requests every capability needed to scan and connect.
    ///
    /// A partial grant is treated as a full denial; the prompt result is a
    /// recoverable outcome, never a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the platform prompt itself fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn request_capabilities(&self) -> Result<PermissionOutcome, TransportError> {
        match self {
            Self::Prompt(prompt) => {
                let grants = prompt.request(&REQUIRED_CAPABILITIES).await?;
                let denied: Vec<Capability> = REQUIRED_CAPABILITIES
                    .iter()
                    .filter(|required| {
                        !grants
                            .iter()
                            .any(|grant| grant.capability == **required && grant.granted)
                    })
                    .copied()
                    .collect();
                if denied.is_empty() {
                    Ok(PermissionOutcome::Granted)
                } else {
                    debug!(?denied, "capability request partially denied");
                    Ok(PermissionOutcome::Denied)
                }
            }
            Self::FeatureCheck { available } => {
                if *available {
                    Ok(PermissionOutcome::Granted)
                } else {
                    Ok(PermissionOutcome::Denied)
                }
            }
        }
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prompt(_) => f.write_str("PermissionGate::Prompt"),
            Self::FeatureCheck { available } => f
                .debug_struct("PermissionGate::FeatureCheck")
                .field("available", available)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    struct ScriptedPrompt {
        denied: Vec<Capability>,
    }

    #[async_trait]
    impl CapabilityPrompt for ScriptedPrompt {
        async fn request(
            &self,
            capabilities: &[Capability],
        ) -> Result<Vec<CapabilityGrant>, TransportError> {
            Ok(capabilities
                .iter()
                .map(|capability| CapabilityGrant {
                    capability: *capability,
                    granted: !self.denied.contains(capability),
                })
                .collect())
        }
    }

    #[rstest]
    #[case::all_granted(Vec::new(), PermissionOutcome::Granted)]
    #[case::connect_denied(vec![Capability::Connect], PermissionOutcome::Denied)]
    #[case::location_denied(vec![Capability::Location], PermissionOutcome::Denied)]
    #[case::all_denied(
        vec![Capability::Scan, Capability::Connect, Capability::Location],
        PermissionOutcome::Denied
    )]
    #[tokio::test]
    async fn partial_grants_are_full_denials(
        #[case] denied: Vec<Capability>,
        #[case] expected: PermissionOutcome,
    ) {
        let gate = PermissionGate::prompt(Box::new(ScriptedPrompt { denied }));
        let outcome = gate
            .request_capabilities()
            .await
            .expect("prompt should answer");
        assert_eq!(expected, outcome);
    }

    #[rstest]
    #[case(true, PermissionOutcome::Granted)]
    #[case(false, PermissionOutcome::Denied)]
    #[tokio::test]
    async fn feature_check_maps_availability(
        #[case] available: bool,
        #[case] expected: PermissionOutcome,
    ) {
        let gate = PermissionGate::feature_check(available);
        let outcome = gate
            .request_capabilities()
            .await
            .expect("feature check cannot fail");
        assert_eq!(expected, outcome);
    }
}
