//! Render invocation: hand a cleaned definition to an external renderer and get SVG back.

use mermaid_mend_core::entities::escape_html;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Renderer release the profile targets. One version, one configuration schema.
pub const PINNED_RENDERER_VERSION: &str = "11.12.2";

pub const DEFAULT_PROGRAM: &str = "merman-cli";
/// Substituted with the request id in [`CommandRenderer`] arguments.
pub const ID_PLACEHOLDER: &str = "{id}";

/// One diagram to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Id for the root `<svg>`; unique within the page.
    pub id: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The renderer itself cannot be reached; no diagram on the page can render.
    #[error("renderer unavailable: {message}")]
    Unavailable { message: String },

    /// The renderer rejected this definition.
    #[error("{message}")]
    Failed { message: String },

    #[error("renderer produced no SVG output")]
    EmptyOutput,
}

/// A component that turns one diagram definition into an SVG fragment.
///
/// Implementations are awaited once per diagram; completion of the returned future is the signal
/// that the fragment exists and can be corrected. Independent requests must not affect each
/// other: an error for one definition is reported for that definition only.
#[allow(async_fn_in_trait)]
pub trait DiagramRenderer {
    /// Checks that the renderer can be used at all. Called once per page before any render.
    async fn ready(&self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError>;
}

impl<R: DiagramRenderer> DiagramRenderer for &R {
    async fn ready(&self) -> Result<(), RenderError> {
        (**self).ready().await
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        (**self).render(request).await
    }
}

/// Renders by running an external program: definition on stdin, SVG on stdout.
///
/// The default invocation is `merman-cli render --id {id} -`. The call blocks the current task
/// while the child runs; renders stay sequential on a single-threaded executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

impl Default for CommandRenderer {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: default_args(),
        }
    }
}

pub fn default_args() -> Vec<String> {
    ["render", "--id", ID_PLACEHOLDER, "-"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn args_for(&self, id: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(ID_PLACEHOLDER, id))
            .collect()
    }

    fn locate(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path).find_map(|dir| {
            let candidate = dir.join(program);
            if candidate.is_file() {
                return Some(candidate);
            }
            let exe = candidate.with_extension(std::env::consts::EXE_EXTENSION);
            (!std::env::consts::EXE_EXTENSION.is_empty() && exe.is_file()).then_some(exe)
        })
    }
}

impl DiagramRenderer for CommandRenderer {
    async fn ready(&self) -> Result<(), RenderError> {
        match self.locate() {
            Some(path) => {
                tracing::debug!(program = %path.display(), "renderer located");
                Ok(())
            }
            None => Err(RenderError::Unavailable {
                message: format!("`{}` not found", self.program),
            }),
        }
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let mut child = Command::new(&self.program)
            .args(self.args_for(&request.id))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => RenderError::Unavailable {
                    message: format!("`{}` not found", self.program),
                },
                _ => RenderError::Failed {
                    message: format!("failed to start `{}`: {err}", self.program),
                },
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.definition.as_bytes())
                .map_err(|err| RenderError::Failed {
                    message: format!("failed to send definition: {err}"),
                })?;
        }

        let output = child.wait_with_output().map_err(|err| RenderError::Failed {
            message: format!("failed to read renderer output: {err}"),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("renderer exited with {}", output.status),
                msg => msg.to_string(),
            };
            return Err(RenderError::Failed { message });
        }

        let svg = String::from_utf8_lossy(&output.stdout).into_owned();
        if !svg.contains("<svg") {
            return Err(RenderError::EmptyOutput);
        }
        Ok(svg)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowchartProfile {
    pub curve: String,
    pub node_spacing: u32,
    pub rank_spacing: u32,
    pub padding: u32,
    pub use_max_width: bool,
}

impl Default for FlowchartProfile {
    fn default() -> Self {
        Self {
            curve: "linear".to_string(),
            node_spacing: 40,
            rank_spacing: 60,
            padding: 15,
            use_max_width: true,
        }
    }
}

/// Renderer configuration passed into the pipeline at construction.
///
/// Labels are rendered as SVG `<text>` (`htmlLabels: false`): that is what the corrector's font
/// rules operate on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererProfile {
    pub version: String,
    pub theme: String,
    pub security_level: String,
    pub html_labels: bool,
    pub flowchart: FlowchartProfile,
    pub theme_variables: BTreeMap<String, String>,
}

impl Default for RendererProfile {
    fn default() -> Self {
        Self {
            version: PINNED_RENDERER_VERSION.to_string(),
            theme: "default".to_string(),
            security_level: "loose".to_string(),
            html_labels: false,
            flowchart: FlowchartProfile::default(),
            theme_variables: BTreeMap::from([("fontSize".to_string(), "14px".to_string())]),
        }
    }
}

impl RendererProfile {
    pub fn init_config(&self) -> Value {
        json!({
            "theme": self.theme,
            "securityLevel": self.security_level,
            "htmlLabels": self.html_labels,
            "flowchart": {
                "htmlLabels": self.html_labels,
                "curve": self.flowchart.curve,
                "nodeSpacing": self.flowchart.node_spacing,
                "rankSpacing": self.flowchart.rank_spacing,
                "padding": self.flowchart.padding,
                "useMaxWidth": self.flowchart.use_max_width,
            },
            "themeVariables": self.theme_variables,
        })
    }

    pub fn init_directive(&self) -> String {
        format!("%%{{init: {}}}%%", self.init_config())
    }

    /// Prefixes `definition` with the init directive.
    ///
    /// Definitions that carry their own front-matter or init directive are returned unchanged:
    /// front-matter must stay the first thing in the text, and author config wins.
    pub fn apply<'a>(&self, definition: &'a str) -> Cow<'a, str> {
        let trimmed = definition.trim_start();
        if trimmed.starts_with("---") || trimmed.contains("%%{init") {
            return Cow::Borrowed(definition);
        }
        Cow::Owned(format!("{}\n{definition}", self.init_directive()))
    }
}

/// Inline markup shown in place of a diagram the renderer rejected.
pub fn render_error_html(err: &RenderError) -> String {
    format!(
        r#"<p class="mermaid-error" style="color: red;">Error rendering diagram: {}</p>"#,
        escape_html(&err.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_args_substitute_the_request_id() {
        let renderer = CommandRenderer::default();
        assert_eq!(
            renderer.args_for("mermaid-3-svg"),
            vec!["render", "--id", "mermaid-3-svg", "-"]
        );
    }

    #[test]
    fn profile_directive_pins_svg_labels() {
        let profile = RendererProfile::default();
        let directive = profile.init_directive();
        assert!(directive.starts_with("%%{init: {"));
        assert!(directive.ends_with("}%%"));
        let config = profile.init_config();
        assert_eq!(config["flowchart"]["htmlLabels"], json!(false));
        assert_eq!(config["flowchart"]["rankSpacing"], json!(60));
        assert_eq!(config["themeVariables"]["fontSize"], json!("14px"));
        assert_eq!(profile.version, PINNED_RENDERER_VERSION);
    }

    #[test]
    fn profile_respects_author_config() {
        let profile = RendererProfile::default();
        let front = "---\ntitle: x\n---\ngraph TD\nA-->B";
        assert_eq!(profile.apply(front), front);
        let directive = "%%{init: {\"theme\": \"dark\"}}%%\ngraph TD\nA-->B";
        assert_eq!(profile.apply(directive), directive);
        let plain = profile.apply("graph TD\nA-->B");
        assert!(plain.starts_with("%%{init: "));
        assert!(plain.ends_with("}%%\ngraph TD\nA-->B"));
    }

    #[test]
    fn error_html_escapes_the_message() {
        let html = render_error_html(&RenderError::Failed {
            message: "Parse error on line 2: A-->\n<EOF>".to_string(),
        });
        assert!(html.starts_with(r#"<p class="mermaid-error" style="color: red;">"#));
        assert!(html.contains("Error rendering diagram: Parse error on line 2: A--&gt;"));
        assert!(html.contains("&lt;EOF&gt;"));
    }
}
