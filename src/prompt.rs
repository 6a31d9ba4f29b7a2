use crate::analysis::AnalysisType;
use crate::language::SupportedLanguage;

const RESPOND_WITH_JSON: &str =
    "Respond ONLY with a single JSON object, no Markdown fences and no prose outside it.";

fn task_instructions(kind: AnalysisType) -> &'static str {
    match kind {
        AnalysisType::Review => {
            "Perform a thorough code review. Look for bugs, readability problems, \
             maintainability issues and violations of common best practices. \
             Report each finding against the 1-based line it concerns.\n\
             Shape: {\"summary\": string, \"details\": [{\"line\": number, \
             \"severity\": \"High\"|\"Medium\"|\"Low\", \"issue\": string, \
             \"suggestion\": string}]}"
        }
        AnalysisType::Optimize => {
            "Optimize the code for performance and clarity without changing its \
             behaviour. Return the complete rewritten code, not a diff.\n\
             Shape: {\"summary\": string, \"optimizedCode\": string}"
        }
        AnalysisType::Secure => {
            "Audit the code for security vulnerabilities such as injection, XSS, \
             unsafe deserialization, secrets in source and missing validation. \
             Report each vulnerability against the 1-based line it concerns.\n\
             Shape: {\"summary\": string, \"vulnerabilities\": [{\"line\": number, \
             \"type\": string, \"description\": string, \"recommendation\": string}]}"
        }
        AnalysisType::Explain => {
            "Explain what the code does for a developer new to it. Walk through \
             the significant lines in order, quoting each line's source text.\n\
             Shape: {\"summary\": string, \"lineByLine\": [{\"line\": string, \
             \"explanation\": string}]}"
        }
    }
}

/// System instruction for one analysis task.
pub fn system_instruction(kind: AnalysisType, language: SupportedLanguage) -> String {
    format!(
        "You are an expert {} engineer acting as an automated code analysis service.\n\n{}\n\n{}",
        language.display_name(),
        task_instructions(kind),
        RESPOND_WITH_JSON
    )
}

pub fn analysis_prompt(kind: AnalysisType, code: &str, language: SupportedLanguage) -> String {
    format!(
        "Task: {}\nLanguage: {}\n\n```{}\n{}\n```",
        kind.label(),
        language,
        language,
        code
    )
}

/// Seed for the follow-up conversation about analyzed code.
pub fn chat_seed(code: &str, language: SupportedLanguage) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are a helpful senior software engineer. ");
    prompt.push_str("The user has just had the following code analyzed and wants to ask follow-up questions about it. ");
    prompt.push_str("Answer concisely, quote line numbers when relevant, and use Markdown code blocks for code.\n\n");
    prompt.push_str(&format!("Language: {}\n\n", language));
    prompt.push_str(&format!("```{}\n{}\n```", language, code));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_task_names_its_json_shape() {
        let expectations = [
            (AnalysisType::Review, "\"details\""),
            (AnalysisType::Optimize, "\"optimizedCode\""),
            (AnalysisType::Secure, "\"vulnerabilities\""),
            (AnalysisType::Explain, "\"lineByLine\""),
        ];
        for (kind, field) in expectations {
            let system = system_instruction(kind, SupportedLanguage::Go);
            assert!(system.contains(field), "{kind} prompt lacks {field}");
            assert!(system.contains("Go engineer"));
            assert!(system.contains("ONLY"));
        }
    }

    #[test]
    fn analysis_prompt_fences_code_with_language() {
        let prompt = analysis_prompt(AnalysisType::Secure, "SELECT 1;", SupportedLanguage::Sql);
        assert!(prompt.contains("```sql\nSELECT 1;\n```"));
        assert!(prompt.contains("Security Scan"));
    }

    #[test]
    fn chat_seed_embeds_code() {
        let seed = chat_seed("fn main() {}", SupportedLanguage::Rust);
        assert!(seed.contains("Language: rust"));
        assert!(seed.contains("fn main() {}"));
    }
}
