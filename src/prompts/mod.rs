//! Prompt profiles for entry generation.
//!
//! A `PromptSpec` carries the system prompt and the user-prompt template used
//! for every word in a run. Templates are ordinary text with a `{word}`
//! placeholder; language-specific profiles (the interesting lexicographic
//! content) are supplied by operators as files, keeping linguistic content
//! out of the pipeline itself.

use std::path::Path;

/// Default system prompt: constrains the model to emit exactly one JSON
/// object, nothing else.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a dictionary entry generator. \
Your response MUST be ONLY the requested JSON object. Do not include any \
explanatory text, preambles, or comments before or after the JSON block. \
Start immediately with '{' and end with '}'.";

/// Default user-prompt template. Deliberately generic: real runs supply a
/// language-specific template via `--prompt-file`.
pub const DEFAULT_USER_TEMPLATE: &str = r#"
Role: Expert lexicographer. Target word: "{word}".
Task: Create a precise dictionary entry for an advanced learner.

Output STRICT JSON (no Markdown) with this structure:
{
  "word": "{word}",
  "senses": [
    {
      "pos": "part of speech",
      "definition": "precise, contextual definition",
      "examples": [ { "text": "a sentence showing typical usage" } ]
    }
  ],
  "search_keywords": ["all surface forms of the word, for indexing"]
}
"#;

/// System prompt plus user-prompt template for one run.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    /// System message sent with every request.
    pub system: String,
    /// User-prompt template; `{word}` is replaced with the headword.
    pub template: String,
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            template: DEFAULT_USER_TEMPLATE.to_string(),
        }
    }
}

impl PromptSpec {
    /// Creates a prompt spec from explicit strings.
    pub fn new(system: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            template: template.into(),
        }
    }

    /// Loads the user-prompt template from a file, and optionally the system
    /// prompt from another; missing options fall back to the defaults.
    pub fn from_files(
        system_path: Option<&Path>,
        template_path: Option<&Path>,
    ) -> std::io::Result<Self> {
        let mut spec = Self::default();

        if let Some(path) = system_path {
            spec.system = std::fs::read_to_string(path)?;
        }

        if let Some(path) = template_path {
            spec.template = std::fs::read_to_string(path)?;
        }

        Ok(spec)
    }

    /// Renders the user prompt for one headword.
    pub fn render(&self, word: &str) -> String {
        self.template.replace("{word}", word)
    }
}
