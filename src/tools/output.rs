use serde_json::Value;

/// One typed message produced by a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text { text: String },
    Json { value: Value },
    Link { url: String },
    Image { url: String },
    Blob {
        mime_type: String,
        file_name: Option<String>,
        data: Vec<u8>,
    },
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        ToolOutput::Text { text: text.into() }
    }

    pub fn json(value: Value) -> Self {
        ToolOutput::Json { value }
    }

    pub fn link(url: impl Into<String>) -> Self {
        ToolOutput::Link { url: url.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ToolOutput::Image { url: url.into() }
    }

    pub fn blob(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        ToolOutput::Blob { mime_type: mime_type.into(), file_name: None, data }
    }

    /// Text the model sees for this output.
    pub fn describe(&self) -> String {
        match self {
            ToolOutput::Text { text } => text.clone(),
            ToolOutput::Json { value } => value.to_string(),
            ToolOutput::Link { url } => format!("result link: {url}. please tell user to check it."),
            ToolOutput::Image { url } => format!(
                "image has been created and sent to user already ({url}), you do not need to create it, just tell the user to check it now."
            ),
            ToolOutput::Blob { mime_type, file_name, data } => format!(
                "file {} ({mime_type}, {} bytes) has been sent to user already, just tell the user to check it now.",
                file_name.as_deref().unwrap_or("<unnamed>"),
                data.len()
            ),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::text(text)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::json(value)
    }
}

/// Concatenate a tool's outputs into the single text result stored in the
/// transcript.
pub fn render_outputs(outputs: &[ToolOutput]) -> String {
    outputs
        .iter()
        .map(ToolOutput::describe)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_every_output_kind() {
        let outputs = vec![
            ToolOutput::text("plain"),
            ToolOutput::json(json!({"k": 1})),
            ToolOutput::link("https://example.com/r"),
            ToolOutput::image("https://example.com/i.png"),
            ToolOutput::Blob { mime_type: "text/csv".into(), file_name: Some("a.csv".into()), data: vec![1, 2, 3] },
        ];
        let rendered = render_outputs(&outputs);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "plain");
        assert_eq!(lines[1], r#"{"k":1}"#);
        assert!(lines[2].contains("https://example.com/r"));
        assert!(lines[3].contains("https://example.com/i.png"));
        assert!(lines[4].contains("a.csv") && lines[4].contains("3 bytes"));
    }

    #[test]
    fn no_outputs_render_empty() {
        assert_eq!(render_outputs(&[]), "");
    }
}
