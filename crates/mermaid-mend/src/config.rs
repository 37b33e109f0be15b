//! JSON configuration for a mend run.

use crate::error::{Error, Result};
use crate::page::PlaceholderRules;
use crate::pipeline::Pipeline;
use crate::render::{CommandRenderer, DEFAULT_PROGRAM, RendererProfile, default_args};
use mermaid_mend_core::CorrectionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererCommand {
    pub program: String,
    /// `{id}` is replaced with the diagram's svg id.
    pub args: Vec<String>,
}

impl Default for RendererCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: default_args(),
        }
    }
}

/// Everything a run needs besides the pages themselves. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MendConfig {
    pub placeholder: PlaceholderRules,
    pub renderer: RendererCommand,
    pub profile: RendererProfile,
    /// Prefix definitions with the profile's init directive.
    pub inject_profile: bool,
    pub policy: CorrectionPolicy,
}

impl MendConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| Error::InvalidConfigJson {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.placeholder.validate()?;
        self.policy.validate()?;
        if self.renderer.program.trim().is_empty() {
            return Err(Error::InvalidConfigJson {
                message: "renderer.program must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn command_renderer(&self) -> CommandRenderer {
        CommandRenderer::new(self.renderer.program.clone(), self.renderer.args.clone())
    }

    pub fn pipeline(&self) -> Pipeline<CommandRenderer> {
        let pipeline = Pipeline::new(self.command_renderer(), self.policy.clone());
        if self.inject_profile {
            pipeline.with_profile(self.profile.clone())
        } else {
            pipeline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = MendConfig::from_json_str(
            r#"{"placeholder": {"class": "diagram"}, "policy": {"minFontSize": 18}}"#,
        )
        .unwrap();
        assert_eq!(config.placeholder.class, "diagram");
        assert_eq!(config.placeholder.tags, ["pre", "div"]);
        assert_eq!(config.policy.min_font_size, 18.0);
        assert_eq!(config.renderer.program, DEFAULT_PROGRAM);
        assert!(!config.inject_profile);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(MendConfig::from_json_str("{not json").is_err());
        assert!(MendConfig::from_json_str(r#"{"placeholder": {"class": ""}}"#).is_err());
        assert!(MendConfig::from_json_str(r#"{"renderer": {"program": " "}}"#).is_err());
    }
}
