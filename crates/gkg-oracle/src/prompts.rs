//! Prompt templates
//!
//! Placeholders use `{name}`. Unknown placeholders are left untouched so a
//! literal brace in a template survives rendering.

/// A named prompt with its placeholder list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Template text
    pub template: &'static str,
    /// Placeholders the template expects
    pub variables: &'static [&'static str],
}

impl PromptTemplate {
    /// Substitute `values` into the template
    ///
    /// Only placeholders in the template text are replaced; a value that
    /// itself contains `{name}` is copied verbatim.
    #[must_use]
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let value = tail[1..].find('}').and_then(|close| {
                let name = &tail[1..=close];
                values
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, v)| (*v, close + 2))
            });
            match value {
                Some((value, consumed)) => {
                    out.push_str(value);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Placeholders without a supplied value
    #[must_use]
    pub fn missing(&self, values: &[(&str, &str)]) -> Vec<&'static str> {
        self.variables
            .iter()
            .copied()
            .filter(|v| !values.iter().any(|(name, _)| name == v))
            .collect()
    }
}

/// System role shared by every call
pub const SYSTEM: &str = "You are a senior high-school English teacher. \
Answer strictly in the requested output format.";

pub const CLASSIFY_INITIAL: PromptTemplate = PromptTemplate {
    template: r#"You are a classifier. The user gives an English sentence (message) and a list of English grammar concepts (nodes).
Find every grammar error in the sentence, decide which single node it belongs to, and write a short analysis of it.
Rules:
1. Each entry of "answer" describes exactly one grammar error.
2. "concepts" holds exactly one id taken from nodes: the most relevant one.
3. "analysis" only discusses the concept it is tagged with, briefly and precisely.
Output format: {"answer": [{"analysis": "...", "concepts": ["<node id>"]}]}
If the sentence has no grammar error, answer {"answer": []}.
Message: {message}
Nodes: {nodes}"#,
    variables: &["message", "nodes"],
};

pub const PICK_MOST_RELEVANT: PromptTemplate = PromptTemplate {
    template: r#"The user gives a grammar analysis (analysis) and a list of grammar concepts (concepts).
Decide which single concept the analysis is most related to and output its id exactly as written.
Output format: {"concept": "<concept id>"}
Analysis: {analysis}
Concepts: {concepts}"#,
    variables: &["analysis", "concepts"],
};

pub const ENRICH: PromptTemplate = PromptTemplate {
    template: r#"The user gives a grammar analysis (analysis) and the detail of the related grammar rule (detail, with a description and examples).
Combine both to expand and enrich the original analysis, making full use of the examples.
Answer in natural language.
Analysis: {analysis}
Detail: {detail}"#,
    variables: &["analysis", "detail"],
};

pub const LETTER_REVIEW: PromptTemplate = PromptTemplate {
    template: r#"A student's English letter needs marking. Score it (full marks 15), find every spelling error, improper word choice and grammar error, then find advanced vocabulary and highlight expressions, and finally give writing advice.
For error analysis explain the grammar point in detail with correct and incorrect examples; for highlights explain what makes them good.
Essay: {essay}
Output format: {"score": "xx", "errors": {"spelling": "...", "grammar": "...", "word_choice": "..."}, "highlights": {"advanced_vocabulary": "...", "expressions": "..."}, "suggestions": "..."}"#,
    variables: &["essay"],
};

pub const SINGLE_SENTENCE: PromptTemplate = PromptTemplate {
    template: r#"Analyze the following English sentence:
1. Spelling errors (give the correct spelling)
2. Grammar errors (explain the grammar point in detail with correct and incorrect examples)
3. Improper word choice (explain why and suggest a fix)
4. Advanced expressions (words, phrases or structures, and what makes them advanced)
Sentence: {sentence}
Answer in natural language."#,
    variables: &["sentence"],
};

/// Appended to a prompt when retrying after a contract violation
#[must_use]
pub fn with_reminder(prompt: String, reminder: Option<&str>) -> String {
    match reminder {
        Some(text) => format!("{prompt}\nReminder: {text}"),
        None => prompt,
    }
}
