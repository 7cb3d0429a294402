use serde::{Deserialize, Serialize};
use textgen_core::{GenerationProfile, OverrideError, Role, SamplingOverrides};
use utoipa::{IntoParams, ToSchema};

/// A stored generation profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub identifier: String,
    pub role: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub model_path: Option<String>,
    pub seed: Option<i64>,
}

impl From<GenerationProfile> for ProfileResponse {
    fn from(p: GenerationProfile) -> Self {
        Self {
            identifier: p.identifier,
            role: p.role.to_string(),
            temperature: p.temperature,
            max_tokens: p.max_tokens,
            top_p: p.top_p,
            top_k: p.top_k,
            model_path: p.model_path,
            seed: p.seed,
        }
    }
}

/// Body for `PUT /admin/profiles/{identifier}`. Omitted fields are stored as
/// null and fall through to compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileBody {
    /// `user` (default), `assistant` or `system`.
    pub role: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f32>,
    pub top_k: Option<i64>,
    pub model_path: Option<String>,
    /// Negative means random.
    pub seed: Option<i64>,
}

impl ProfileBody {
    /// Validate ranges and build the profile to store under `identifier`.
    pub fn into_profile(self, identifier: String) -> Result<GenerationProfile, OverrideError> {
        let role = match self.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => r
                .parse::<Role>()
                .map_err(|_| OverrideError::UnknownRole(r.to_owned()))?,
            None => Role::default(),
        };

        let checked = SamplingOverrides {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            top_k: self.top_k,
            seed: self.seed,
            model_path: self
                .model_path
                .map(|p| p.trim().to_owned())
                .filter(|p| !p.is_empty()),
            stop_sequences: None,
        }
        .validated()?;

        Ok(GenerationProfile {
            identifier,
            role,
            temperature: checked.temperature,
            max_tokens: checked.max_tokens(),
            top_p: checked.top_p,
            top_k: checked.top_k(),
            model_path: checked.model_path,
            seed: checked.seed,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProfileListQuery {
    /// Substring of the role, ASCII case-insensitive.
    pub search: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn body_defaults_to_user_role() {
        let profile = ProfileBody::default().into_profile("p".into()).unwrap();
        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.temperature, None);
    }

    #[test]
    fn body_ranges_are_enforced() {
        let body = ProfileBody {
            top_p: Some(2.0),
            ..Default::default()
        };
        let err = body.into_profile("p".into()).unwrap_err();
        assert!(err.to_string().starts_with("top_p:"));
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let body = ProfileBody {
            temperature: Some(f32::INFINITY),
            ..Default::default()
        };
        let err = body.into_profile("p".into()).unwrap_err();
        assert_eq!(err.to_string(), "temperature: must be a finite number");

        let body: ProfileBody = serde_json::from_str(r#"{"top_p": -1e39}"#).unwrap();
        assert!(body.into_profile("p".into()).unwrap_err().to_string().starts_with("top_p:"));
    }

    #[test]
    fn blank_model_path_is_stored_as_null() {
        let body = ProfileBody {
            model_path: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(body.into_profile("p".into()).unwrap().model_path, None);
    }
}
