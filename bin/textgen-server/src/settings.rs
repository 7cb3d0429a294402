//! Snapshot of the default generation settings shown on the index page.

use serde::Serialize;
use textgen_core::{
    DEFAULT_PROFILE_IDENTIFIER, GenerationDefaults, ParameterResolver, Role, SamplingOverrides,
    SamplingParameters,
};
use tracing::{info, warn};

use crate::entities::ProfileStore;

/// Immutable after startup. Reading it never touches the database.
#[derive(Debug, Clone, Serialize)]
pub struct DefaultSettings {
    pub identifier: String,
    pub role: Role,
    /// `true` when a `"default"` profile row was found.
    pub persisted: bool,
    #[serde(flatten)]
    pub sampling: SamplingParameters,
}

impl DefaultSettings {
    /// Compiled defaults only.
    pub fn compiled(defaults: &GenerationDefaults) -> Self {
        let resolver = ParameterResolver::new(defaults.clone());
        Self {
            identifier: DEFAULT_PROFILE_IDENTIFIER.to_owned(),
            role: Role::default(),
            persisted: false,
            sampling: resolver.settle(&SamplingOverrides::default(), None),
        }
    }

    /// The stored `"default"` profile merged over compiled defaults. A
    /// missing row or a failing store yields the compiled values.
    pub async fn load<S: ProfileStore>(store: &S, defaults: &GenerationDefaults) -> Self {
        let profile = match store.get_profile(DEFAULT_PROFILE_IDENTIFIER).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "failed to read default profile; using compiled defaults");
                None
            }
        };

        let Some(profile) = profile else {
            info!("no stored default profile; using compiled defaults");
            return Self::compiled(defaults);
        };

        let resolver = ParameterResolver::new(defaults.clone());
        info!(role = %profile.role, "loaded stored default profile");
        Self {
            identifier: profile.identifier.clone(),
            role: profile.role,
            persisted: true,
            sampling: resolver.settle(&SamplingOverrides::default(), Some(&profile)),
        }
    }
}
