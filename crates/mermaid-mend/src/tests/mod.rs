mod pipeline;

use crate::render::{DiagramRenderer, RenderError, RenderRequest};
use std::cell::RefCell;

/// Renders any definition except ones that end in a dangling edge.
#[derive(Debug, Default)]
pub(crate) struct FakeRenderer {
    pub(crate) unavailable: bool,
    pub(crate) requests: RefCell<Vec<RenderRequest>>,
}

impl DiagramRenderer for FakeRenderer {
    async fn ready(&self) -> Result<(), RenderError> {
        if self.unavailable {
            return Err(RenderError::Unavailable {
                message: "`fake` not found".to_string(),
            });
        }
        Ok(())
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        self.requests.borrow_mut().push(request.clone());
        if request.definition.trim_end().ends_with("-->") {
            return Err(RenderError::Failed {
                message: "Parse error on line 2".to_string(),
            });
        }
        Ok(format!(
            r#"<svg id="{}" viewBox="-120 0 200 100"><g><text style="fill: red" font-size="12">label</text></g></svg>"#,
            request.id
        ))
    }
}
