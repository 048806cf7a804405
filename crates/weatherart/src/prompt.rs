//! YAML prompt-template library and `{{var}}` rendering.
//!
//! Example prompt file (`~/.weatherart/prompts.yaml`):
//! ```yaml
//! prompts:
//!   - id: sydney-nolan
//!     template: >
//!       A {{ width }}x{{ height }} painting of {{ segments_summary }},
//!       {{ temp_range }}, in the style of Sidney Nolan.
//! ```
//!
//! Weather mocks (`weather_mocks.yaml`) carry the same variables as a
//! fetched forecast, letting prompts be exercised offline.

use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Regex for `{{ key }}` placeholders.
static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_]+)\s*\}\}").unwrap());

/// Errors from prompt loading and rendering.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("No prompts found in {0}")]
    NoPrompts(PathBuf),
    #[error("Prompt id not found: {0}")]
    UnknownPrompt(String),
    #[error("Prompt template is missing for id '{0}'")]
    EmptyTemplate(String),
    #[error("Mock id not found: {0}")]
    UnknownMock(String),
    #[error("Prompt file '{path}' failed to parse: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PromptError>;

/// One prompt template with a stable id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptEntry {
    pub id: String,
    #[serde(default)]
    pub template: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PromptFile {
    #[serde(default)]
    prompts: Vec<PromptEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MockFile {
    #[serde(default)]
    conditions: Vec<HashMap<String, serde_yaml::Value>>,
}

/// Loaded prompt template library.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: Vec<PromptEntry>,
}

impl PromptLibrary {
    /// Load the library from a YAML file; errors when it holds no prompts.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: PromptFile =
            serde_yaml::from_str(&contents).map_err(|source| PromptError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if file.prompts.is_empty() {
            return Err(PromptError::NoPrompts(path.to_path_buf()));
        }
        Ok(Self {
            prompts: file.prompts,
        })
    }

    /// Pick a prompt by id, or uniformly at random when `id` is `None`.
    pub fn pick(&self, id: Option<&str>) -> Result<&PromptEntry> {
        let entry = match id {
            Some(wanted) => self
                .prompts
                .iter()
                .find(|p| p.id == wanted)
                .ok_or_else(|| PromptError::UnknownPrompt(wanted.to_string()))?,
            None => self
                .prompts
                .choose(&mut rand::thread_rng())
                .ok_or_else(|| PromptError::NoPrompts(PathBuf::new()))?,
        };
        if entry.template.is_empty() {
            return Err(PromptError::EmptyTemplate(entry.id.clone()));
        }
        Ok(entry)
    }
}

/// Load a mocked prompt context by id from a weather-mocks YAML file.
///
/// All scalar fields of the matching condition become template variables.
pub fn load_mock_context(path: impl AsRef<Path>, mock_id: &str) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: MockFile = serde_yaml::from_str(&contents).map_err(|source| PromptError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    for condition in file.conditions {
        let matches = condition
            .get("id")
            .and_then(|v| v.as_str())
            .is_some_and(|id| id == mock_id);
        if matches {
            let mut vars = HashMap::new();
            for (key, value) in condition {
                if let Some(text) = scalar_to_string(&value) {
                    vars.insert(key, text);
                }
            }
            return Ok(vars);
        }
    }
    Err(PromptError::UnknownMock(mock_id.to_string()))
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Replace `{{ key }}` placeholders; unknown keys render as empty strings.
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER_PATTERN
        .replace_all(template, |caps: &Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Save a rendered prompt to `<output_dir>/<timestamp>.txt`.
pub fn write_prompt_file(
    output_dir: &Path,
    timestamp: &str,
    prompt_text: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{timestamp}.txt"));
    std::fs::write(&path, prompt_text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn renders_known_and_unknown_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("temp_range".to_string(), "12-22 deg".to_string());
        let rendered = render_template("Today: {{ temp_range }}, wind {{wind}}.", &vars);
        assert_eq!(rendered, "Today: 12-22 deg, wind .");
    }

    #[test]
    fn picks_prompt_by_id() {
        let file = write_yaml(
            "prompts:\n  - id: one\n    template: first\n  - id: two\n    template: second\n",
        );
        let library = PromptLibrary::from_file(file.path()).unwrap();
        assert_eq!(library.pick(Some("two")).unwrap().template, "second");
        assert!(matches!(
            library.pick(Some("missing")),
            Err(PromptError::UnknownPrompt(_))
        ));
    }

    #[test]
    fn random_pick_comes_from_the_library() {
        let file = write_yaml("prompts:\n  - id: only\n    template: body\n");
        let library = PromptLibrary::from_file(file.path()).unwrap();
        assert_eq!(library.pick(None).unwrap().id, "only");
    }

    #[test]
    fn empty_library_is_an_error() {
        let file = write_yaml("prompts: []\n");
        assert!(matches!(
            PromptLibrary::from_file(file.path()),
            Err(PromptError::NoPrompts(_))
        ));
    }

    #[test]
    fn empty_template_is_an_error() {
        let file = write_yaml("prompts:\n  - id: hollow\n");
        let library = PromptLibrary::from_file(file.path()).unwrap();
        assert!(matches!(
            library.pick(Some("hollow")),
            Err(PromptError::EmptyTemplate(_))
        ));
    }

    #[test]
    fn mock_context_exposes_scalars_only() {
        let file = write_yaml(
            "conditions:\n  - id: clear_summer_day\n    temp_range: 20-30 deg\n    width: 3840\n    nested:\n      ignored: true\n",
        );
        let vars = load_mock_context(file.path(), "clear_summer_day").unwrap();
        assert_eq!(vars.get("temp_range").unwrap(), "20-30 deg");
        assert_eq!(vars.get("width").unwrap(), "3840");
        assert!(!vars.contains_key("nested"));

        assert!(matches!(
            load_mock_context(file.path(), "nope"),
            Err(PromptError::UnknownMock(_))
        ));
    }

    #[test]
    fn prompt_file_is_written_under_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_prompt_file(dir.path(), "20260830_120000", "hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
