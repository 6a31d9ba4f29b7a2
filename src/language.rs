use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Source language the user declares the submitted code is written in.
///
/// Only affects what is sent to the model; nothing is parsed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedLanguage {
    #[default]
    Javascript,
    Python,
    Java,
    Csharp,
    Cpp,
    Php,
    Go,
    Rust,
    Typescript,
    Html,
    Css,
    Sql,
}

impl SupportedLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedLanguage::Javascript => "javascript",
            SupportedLanguage::Python => "python",
            SupportedLanguage::Java => "java",
            SupportedLanguage::Csharp => "csharp",
            SupportedLanguage::Cpp => "cpp",
            SupportedLanguage::Php => "php",
            SupportedLanguage::Go => "go",
            SupportedLanguage::Rust => "rust",
            SupportedLanguage::Typescript => "typescript",
            SupportedLanguage::Html => "html",
            SupportedLanguage::Css => "css",
            SupportedLanguage::Sql => "sql",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let name = s.trim().to_lowercase();
        Self::all().into_iter().find(|lang| lang.as_str() == name)
    }

    pub fn all() -> Vec<SupportedLanguage> {
        vec![
            SupportedLanguage::Javascript,
            SupportedLanguage::Python,
            SupportedLanguage::Java,
            SupportedLanguage::Csharp,
            SupportedLanguage::Cpp,
            SupportedLanguage::Php,
            SupportedLanguage::Go,
            SupportedLanguage::Rust,
            SupportedLanguage::Typescript,
            SupportedLanguage::Html,
            SupportedLanguage::Css,
            SupportedLanguage::Sql,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SupportedLanguage::Javascript => "JavaScript",
            SupportedLanguage::Python => "Python",
            SupportedLanguage::Java => "Java",
            SupportedLanguage::Csharp => "C#",
            SupportedLanguage::Cpp => "C++",
            SupportedLanguage::Php => "PHP",
            SupportedLanguage::Go => "Go",
            SupportedLanguage::Rust => "Rust",
            SupportedLanguage::Typescript => "TypeScript",
            SupportedLanguage::Html => "HTML",
            SupportedLanguage::Css => "CSS",
            SupportedLanguage::Sql => "SQL",
        }
    }

    /// Guess the language from a file extension (case-insensitive).
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        let lang = match ext.as_str() {
            "js" | "jsx" | "mjs" | "cjs" => SupportedLanguage::Javascript,
            "py" | "pyw" => SupportedLanguage::Python,
            "java" => SupportedLanguage::Java,
            "cs" => SupportedLanguage::Csharp,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "h" => SupportedLanguage::Cpp,
            "php" => SupportedLanguage::Php,
            "go" => SupportedLanguage::Go,
            "rs" => SupportedLanguage::Rust,
            "ts" | "tsx" => SupportedLanguage::Typescript,
            "html" | "htm" => SupportedLanguage::Html,
            "css" => SupportedLanguage::Css,
            "sql" => SupportedLanguage::Sql,
            _ => return None,
        };
        Some(lang)
    }
}

impl fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
