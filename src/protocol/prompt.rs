//! Prompt text sent to the proposer.

use crate::error::ProposalError;
use crate::protocol::grammar::Function;
use crate::protocol::transcript::Message;

const REFLECTION_AND_PLAN: &str = "\
## Reflection
1. Did your last action get you closer to your objective? If this is your first action, just put \"N/A\".
2. Why or why not? If this is your first action, just put \"N/A\".

## Plan
1. What is your new plan based on your reflection?
2. What will your first step be given the current HTML? Which node will you interact with? What function will you call?

## Code
Call ONE of the following functions:
";

/// Where in the pipeline a proposal was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Parse,
    Validate,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Parse => "parse",
            Stage::Validate => "validate",
        }
    }
}

/// The `## Reflection` / `## Plan` / `## Code` format, with one example block per function
pub fn output_format() -> String {
    let examples: Vec<String> = Function::ALL
        .iter()
        .map(|function| format!("```python\n{}\n```\n", function.example()))
        .collect();
    format!("{}{}", REFLECTION_AND_PLAN, examples.join("OR\n"))
}

/// System message opening a session
pub fn system_message(objective: &str) -> Message {
    Message::system(format!(
        "Your objective is: \"{}\"\n\
         You are given a browser where you can either go back a page, scroll up/down, click, or type into <node> elements on the page.\n\
         If you believe you have accomplished your objective, call the set_objective_complete() function to finish your task.\n\
         You can only click on nodes with clickable=true, or type into nodes with inputable=true.\n\
         You can only call one function at a time, and always output a single one-line code block\n\
         Output in the following format:\n{}\n\
         Do not repeat the questions in the output, only the headings and numbers.",
        objective,
        output_format()
    ))
}

/// User message presenting the current page outline
pub fn user_message(outline: &str, screenshot: Option<&str>) -> Message {
    let signatures: Vec<&str> = Function::ALL.iter().map(|function| function.signature()).collect();
    let message = Message::user(format!(
        "Here are nodes that you can click on and/or type into:\n\n{}\n\n\
         Answer the reflection questions, then call one of the available functions. The available functions are:\n\n\
         {}\n\n\
         Note that when using the type() function, you must also specify whether to submit the form after typing (i.e. pressing enter).",
        outline,
        signatures.join("\n")
    ));

    match screenshot {
        Some(url) => message.with_image(url),
        None => message,
    }
}

/// Diagnostic trace for a rejected proposal
pub fn error_trace(stage: Stage, code: Option<&str>, error: &ProposalError) -> String {
    let mut trace = format!("Stage: {}\n", stage.as_str());
    if let Some(code) = code {
        trace.push_str(&format!("Code:\n{}\n", code));
    }
    trace.push_str(&format!("{}: {}\n", error.kind_name(), error));
    trace
}

/// Corrective feedback appended after a rejected proposal
pub fn feedback_message(error: &ProposalError, trace: &str) -> Message {
    Message::user(format!(
        "{}\n\nI got an error running your code. Here is the full error message:\n{}\nCan you fix the error and try again?",
        error, trace
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::transcript::Role;

    #[test]
    fn test_output_format_lists_every_function() {
        let format = output_format();
        assert!(format.starts_with("## Reflection\n"));
        assert!(format.contains("```python\nclick(id=...)\n```\nOR\n```python\ntype(id=..., text=..., submit=...)\n```"));
        assert!(format.ends_with("```python\nset_objective_complete()\n```\n"));
        assert_eq!(format.matches("\nOR\n").count(), Function::ALL.len() - 1);
    }

    #[test]
    fn test_system_message() {
        let message = system_message("find the rust book");
        assert_eq!(message.role, Role::System);
        assert!(message.content.starts_with("Your objective is: \"find the rust book\"\n"));
        assert!(message.content.contains("clickable=true"));
        assert!(message.content.ends_with("only the headings and numbers."));
    }

    #[test]
    fn test_user_message() {
        let outline = "<node id=0 clickable=true inputable=false>\n  <button>Go</button>\n</node>\n";
        let message = user_message(outline, None);
        assert_eq!(message.role, Role::User);
        assert!(message.content.contains(outline));
        assert!(message.content.contains("go_back()\nscroll_up()\nscroll_down()\nclick(id: int)\n"));
        assert!(message.image_url.is_none());

        let message = user_message(outline, Some("data:image/png;base64,AAAA"));
        assert_eq!(message.image_url.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_feedback_message() {
        let error = ProposalError::NoCodeBlock;
        let trace = error_trace(Stage::Extract, None, &error);
        let message = feedback_message(&error, &trace);

        assert_eq!(message.role, Role::User);
        assert!(message.content.starts_with(
            "No code blocks found, please include a code block in your response\n\nI got an error running your code."
        ));
        assert!(message.content.contains("Stage: extract\n"));
        assert!(message.content.contains("NoCodeBlock: No code blocks found"));
        assert!(message.content.ends_with("Can you fix the error and try again?"));
    }

    #[test]
    fn test_trace_includes_code() {
        let error = ProposalError::MissingId("click");
        let trace = error_trace(Stage::Validate, Some("click()"), &error);
        assert_eq!(trace, "Stage: validate\nCode:\nclick()\nMissingId: No id specified for click()\n");
    }
}
