//! Built-in summarization prompts.

use std::collections::BTreeMap;

use super::traits::PromptOptions;

/// Name of the fallback prompt.
pub const DEFAULT_PROMPT: &str = "default";

/// Characters shown per prompt in [`PromptCatalog::previews`].
const PREVIEW_CHARS: usize = 100;

const DEFAULT_TEXT: &str = "As a secretary, summarize this recorded Spaces in a friendly manner. The summary should include these information: the main speakers and their position if it exists; a brief overview of the main topics discussed during the session; a complete log of all questions and answers from the session, including the question, answer, and the person who asked or answered the question; a list of any key announcements made during the session ; and the main takeaways from the session, including key conclusions, important decisions, and next steps. The summary should be written in a clear and concise manner, with all questions and answers included in chronological order. Just provide the summary, do not provide your ideas or thoughts. Do not use markdown or any other docs format, especially do not use any * or ** or *** for formatting. Do not repeat these requirements in the summary.";

const FORMATTED_TEXT: &str = "As a secretary, create a comprehensive single-post summary of this recorded Spaces using the following format:

🎯 SPACES OVERVIEW
Title:
Date & Time:
Host: @[hostname]

🎤 SPEAKERS & PARTICIPANTS
Main speakers: @[usernames]
Notable participants: @[usernames]
Approximate attendee count:

💡 DISCUSSION SUMMARY
Brief overview of main topics:
1. [First major topic]
2. [Second major topic]
[Continue with major points]

💬 COMPLETE Q&A LOG
[List all questions chronologically]

Q1 from @[username]: [Question]
A: [Answer] by @[username]

Q2 from @[username]: [Question]
A: [Answer] by @[username]

[Continue with all Q&As from the session]

📢 KEY ANNOUNCEMENTS
- [Important updates]
- [Future plans]

🎯 MAIN TAKEAWAYS
1. [Key conclusion]
2. [Important decision]
3. [Next steps]

Additional guidelines:
- Include ALL questions and answers from the session
- Maintain chronological order of Q&As
- Use @ mentions for all participants
- Keep answers as complete as possible while being concise
- Include any shared links
- Use line breaks for better readability

Note: While including all Q&As, maintain clarity and readability in the single post format. Do not provide in markdown format. Just provide the post.";

/// Named prompt templates.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    prompts: BTreeMap<String, String>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptCatalog {
    /// The `default` and `formatted` prompts.
    pub fn builtin() -> Self {
        let prompts = [(DEFAULT_PROMPT, DEFAULT_TEXT), ("formatted", FORMATTED_TEXT)]
            .into_iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect();
        Self { prompts }
    }

    /// Add or replace a named prompt.
    pub fn with_prompt(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompts.insert(name.into(), text.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.prompts.get(name).map(String::as_str)
    }

    /// Prompt text for a request: the custom prompt if given, else the named
    /// prompt if known, else `default`.
    pub fn select<'a>(&'a self, options: &'a PromptOptions) -> &'a str {
        if let Some(custom) = options.custom_prompt.as_deref().filter(|p| !p.is_empty()) {
            return custom;
        }
        options
            .prompt_type
            .as_deref()
            .and_then(|name| self.get(name))
            .or_else(|| self.get(DEFAULT_PROMPT))
            .unwrap_or(DEFAULT_TEXT)
    }

    /// First 100 characters of every prompt followed by `...`.
    pub fn previews(&self) -> BTreeMap<String, String> {
        self.prompts
            .iter()
            .map(|(name, text)| {
                let head: String = text.chars().take(PREVIEW_CHARS).collect();
                (name.clone(), format!("{head}..."))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(prompt_type: Option<&str>, custom: Option<&str>) -> PromptOptions {
        PromptOptions {
            prompt_type: prompt_type.map(str::to_string),
            custom_prompt: custom.map(str::to_string),
            model: None,
        }
    }

    #[test]
    fn custom_prompt_wins() {
        let catalog = PromptCatalog::builtin();
        assert_eq!(
            catalog.select(&options(Some("formatted"), Some("Just list speakers"))),
            "Just list speakers"
        );
    }

    #[test]
    fn named_prompt_then_default() {
        let catalog = PromptCatalog::builtin();
        assert!(
            catalog
                .select(&options(Some("formatted"), None))
                .contains("SPACES OVERVIEW")
        );
        assert_eq!(catalog.select(&options(Some("nope"), None)), DEFAULT_TEXT);
        assert_eq!(catalog.select(&options(None, Some(""))), DEFAULT_TEXT);
    }

    #[test]
    fn previews_are_truncated() {
        let previews = PromptCatalog::builtin().previews();
        assert_eq!(previews.len(), 2);
        let default = &previews["default"];
        assert!(default.ends_with("..."));
        assert_eq!(default.chars().count(), PREVIEW_CHARS + 3);

        let short = PromptCatalog::builtin().with_prompt("tiny", "hi").previews();
        assert_eq!(short["tiny"], "hi...");
    }
}
