//! Layered parameter resolution: override, then profile, then default.

use std::future::Future;

use tracing::{debug, error};

use crate::BoxError;
use crate::overrides::{GenerationInput, SamplingOverrides};
use crate::params::{GenerationDefaults, GenerationProfile, ResolvedParameters, Role, SamplingParameters};

/// Read access to persisted profiles, keyed by role.
pub trait ProfileLookup: Send + Sync {
    /// The first stored profile for `role`, or `None` if there is none.
    fn find_profile(
        &self,
        role: Role,
    ) -> impl Future<Output = Result<Option<GenerationProfile>, BoxError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct ParameterResolver {
    defaults: GenerationDefaults,
}

impl ParameterResolver {
    pub fn new(defaults: GenerationDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    /// Merge the layers field by field. Pure; never fails.
    pub fn settle(
        &self,
        overrides: &SamplingOverrides,
        profile: Option<&GenerationProfile>,
    ) -> SamplingParameters {
        let d = &self.defaults;

        SamplingParameters {
            temperature: overrides
                .temperature
                .or(profile.and_then(|p| p.temperature))
                .unwrap_or(d.temperature),
            max_tokens: overrides
                .max_tokens()
                .or(profile.and_then(|p| p.max_tokens))
                .unwrap_or(d.max_tokens),
            top_p: overrides
                .top_p
                .or(profile.and_then(|p| p.top_p))
                .unwrap_or(d.top_p),
            top_k: overrides
                .top_k()
                .or(profile.and_then(|p| p.top_k))
                .unwrap_or(d.top_k),
            model_path: overrides
                .model_path()
                .or(profile.and_then(|p| p.model_path()))
                .unwrap_or(&d.model_path)
                .to_owned(),
            // A stored -1 still counts as present and means random.
            seed: match (overrides.seed(), profile.filter(|p| p.seed.is_some())) {
                (Some(seed), _) => seed,
                (None, Some(p)) => p.seed(),
                (None, None) => d.seed,
            },
            stop_sequences: overrides
                .stop_sequences()
                .map(<[String]>::to_vec)
                .unwrap_or_else(|| d.stop_sequences.clone()),
        }
    }

    /// Look up the role's profile and settle. A missing profile or a failing
    /// store both resolve to defaults.
    pub async fn resolve<P: ProfileLookup>(
        &self,
        input: &GenerationInput,
        profiles: &P,
    ) -> ResolvedParameters {
        let profile = match profiles.find_profile(input.role).await {
            Ok(Some(profile)) => {
                debug!(role = %input.role, identifier = %profile.identifier, "using stored profile");
                Some(profile)
            }
            Ok(None) => {
                debug!(role = %input.role, "no stored profile for role; using defaults");
                None
            }
            Err(e) => {
                error!(role = %input.role, error = %e, "profile lookup failed; using defaults");
                None
            }
        };

        ResolvedParameters {
            prompt: input.prompt.clone(),
            role: input.role,
            sampling: self.settle(&input.overrides, profile.as_ref()),
        }
    }
}
