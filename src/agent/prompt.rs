//! ReAct prompt rendering.
//!
//! Layers (in order):
//! 1. Task instructions (may embed the placeholders below)
//! 2. Tool descriptions and the ReAct format block, unless the
//!    instructions already place `{tools}` themselves
//! 3. The task input
//! 4. The scratchpad: every step so far, replayed verbatim
//!
//! Placeholders: `{tools}`, `{tool_names}`, `{input}`, `{agent_scratchpad}`.
//! Any other brace text is left alone, so instructions may quote JSON.

use crate::tools::ToolSet;
use crate::types::Step;
use tracing::debug;

/// Format block appended to instructions that do not carry their own.
pub const REACT_FORMAT: &str = r#"
TOOLS:
------

You have access to the following tools:

{tools}

To use a tool, please use the following format:

```
Thought: Do I need to use a tool? Yes
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
```

When you have a response to say to the Human, or if you do not need to use a tool, you MUST use the format:

```
Thought: Do I need to use a tool? No
Final Answer: [your response here]
```

Begin!

New input: {input}
{agent_scratchpad}"#;

/// Stop sequences that keep the model from writing its own observations.
pub fn stop_sequences() -> Vec<String> {
    vec!["\nObservation:".to_string(), "\n\tObservation:".to_string()]
}

/// Complete the instruction text with the default format block if needed.
pub fn template_for(instructions: &str) -> String {
    if instructions.contains("{agent_scratchpad}") {
        instructions.to_string()
    } else {
        format!("{}\n{}", instructions.trim_end(), REACT_FORMAT)
    }
}

/// `name: description` lines plus the argument schema for each tool.
pub fn render_tools(tools: &ToolSet) -> String {
    tools
        .definitions()
        .iter()
        .map(|d| {
            let args = d
                .parameters
                .get("properties")
                .map(|p| p.to_string())
                .unwrap_or_else(|| "{}".into());
            format!("{}: {} Args: {}", d.name, d.description, args)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replay the scratchpad: `{log}\nObservation: {observation}\nThought: `.
pub fn render_scratchpad(steps: &[Step]) -> String {
    let mut out = String::new();
    for step in steps {
        out.push_str(&step.action.log);
        out.push_str("\nObservation: ");
        out.push_str(&step.observation);
        out.push_str("\nThought: ");
    }
    out
}

/// Build the complete prompt for one iteration.
pub fn build_prompt(instructions: &str, input: &str, tools: &ToolSet, steps: &[Step]) -> String {
    let template = template_for(instructions);
    let tool_text = render_tools(tools);
    let tool_names = tools.names().join(", ");
    let scratchpad = render_scratchpad(steps);

    let prompt = fill(&template, |key| match key {
        "tools" => Some(tool_text.as_str()),
        "tool_names" => Some(tool_names.as_str()),
        "input" => Some(input),
        "agent_scratchpad" => Some(scratchpad.as_str()),
        _ => None,
    });

    debug!("Prompt: {} chars, {} steps", prompt.len(), steps.len());
    prompt
}

/// Single-pass placeholder substitution. Substituted text is never
/// rescanned, so file contents that happen to contain `{input}` stay inert.
fn fill<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            lookup(key).map(|value| (value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ObservationKind};

    #[test]
    fn fill_leaves_unknown_braces() {
        let out = fill("a {x} {\"k\": 1} {y}", |k| (k == "x").then_some("X"));
        assert_eq!(out, "a X {\"k\": 1} {y}");
    }

    #[test]
    fn fill_does_not_rescan_values() {
        let out = fill("{a}{b}", |k| match k {
            "a" => Some("{b}"),
            "b" => Some("B"),
            _ => None,
        });
        assert_eq!(out, "{b}B");
    }

    #[test]
    fn template_appends_format_block_once() {
        let t = template_for("You are a security analyst.");
        assert!(t.starts_with("You are a security analyst.\n"));
        assert!(t.ends_with("{agent_scratchpad}"));
        assert_eq!(template_for(&t), t);
    }

    #[test]
    fn scratchpad_replays_steps_in_order() {
        let step = |tool: &str, obs: &str| {
            Step::new(
                Action {
                    tool: tool.into(),
                    input: "x".into(),
                    log: format!("Action: {}\nAction Input: x", tool),
                },
                obs.into(),
                ObservationKind::ToolOutput,
            )
        };
        let pad = render_scratchpad(&[step("a", "one"), step("b", "two")]);
        assert_eq!(
            pad,
            "Action: a\nAction Input: x\nObservation: one\nThought: Action: b\nAction Input: x\nObservation: two\nThought: "
        );
    }
}
