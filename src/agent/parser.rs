//! Parser for ReAct-formatted completions.
//!
//! A completion either names a tool:
//!
//! ```text
//! Thought: Do I need to use a tool? Yes
//! Action: list_directory
//! Action Input: routes/
//! ```
//!
//! or finishes:
//!
//! ```text
//! Thought: Do I need to use a tool? No
//! Final Answer: {"is_insecure": true, ...}
//! ```

use crate::types::Action;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Tool name recorded on steps produced by unparseable completions.
pub const EXCEPTION_TOOL: &str = "_Exception";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Action(Action),
    Finish { answer: String, log: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid Format: Missing 'Action:' after 'Thought:'")]
    MissingAction,

    #[error("Invalid Format: Missing 'Action Input:' after 'Action:'")]
    MissingActionInput,

    #[error("Parsing LLM output produced both a final answer and a parse-able action. Reply with either one Action or one Final Answer.")]
    AnswerAndAction,
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("static regex")
    })
}

fn action_only_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action\s*\d*\s*:").expect("static regex"))
}

/// Parse one completion.
pub fn parse(text: &str) -> Result<Parsed, ParseError> {
    let includes_answer = text.contains(FINAL_ANSWER_MARKER);

    if let Some(caps) = action_regex().captures(text) {
        if includes_answer {
            return Err(ParseError::AnswerAndAction);
        }
        let tool = caps[1].trim().trim_matches('`').trim().to_string();
        let input = clean_input(&caps[2]);
        return Ok(Parsed::Action(Action {
            tool,
            input,
            log: text.to_string(),
        }));
    }

    if includes_answer {
        let answer = text
            .rsplit(FINAL_ANSWER_MARKER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(Parsed::Finish {
            answer,
            log: text.to_string(),
        });
    }

    if action_only_regex().is_match(text) {
        Err(ParseError::MissingActionInput)
    } else {
        Err(ParseError::MissingAction)
    }
}

/// Trim the action input, dropping a trailing hallucinated observation,
/// one layer of code fence and one layer of surrounding quotes.
fn clean_input(raw: &str) -> String {
    let cut = raw.find("\nObservation").map_or(raw, |i| &raw[..i]);
    let mut input = cut.trim();

    if let Some(rest) = input.strip_prefix("```") {
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        // Drop a language tag on the opening fence.
        input = match rest.split_once('\n') {
            Some((tag, body)) if !tag.trim().contains(' ') && !tag.trim().starts_with('{') => body,
            _ => rest,
        }
        .trim();
    }

    input.trim_matches('"').trim().to_string()
}
