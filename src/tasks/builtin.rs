//! Canned tasks shipped with vulnscout.

use super::TaskSpec;
use crate::agent::{AnswerSchema, FieldType};
use crate::tools::ToolKind;

pub const BUILTIN_NAMES: [&str; 4] = ["recon", "sqli", "ssrf", "ctf"];

/// Values substituted into the built-in task text.
#[derive(Debug, Clone)]
pub struct BuiltinContext {
    /// The target root as the model should refer to it, e.g. `./repo/`.
    pub target: String,
    /// URL of the CTF flag endpoint.
    pub flag_url: String,
}

pub fn builtin(name: &str, ctx: &BuiltinContext) -> Option<TaskSpec> {
    match name {
        "recon" => Some(recon(ctx)),
        "sqli" => Some(sqli(ctx)),
        "ssrf" => Some(ssrf()),
        "ctf" => Some(ctf(ctx)),
        _ => None,
    }
}

pub fn all(ctx: &BuiltinContext) -> Vec<TaskSpec> {
    BUILTIN_NAMES
        .iter()
        .filter_map(|n| builtin(n, ctx))
        .collect()
}

fn recon(ctx: &BuiltinContext) -> TaskSpec {
    TaskSpec {
        name: "recon".into(),
        description: "Open-ended security review of a Node.js / Express / Angular code base".into(),
        instructions: "You are an expert security analyst with years of experience analyzing code \
and identifying vulnerabilities. You are given a web application written in Node.js, Express \
and Angular. Explore it with the tools below and report every vulnerability you can justify, \
naming the file and the code responsible."
            .into(),
        input: format!(
            "Analyze the Node.js, Express and Angular code in {} for security vulnerabilities. \
Start by exploring the directory structure to understand the codebase.",
            ctx.target
        ),
        tools: ToolKind::INSPECTION.to_vec(),
        answer: None,
        temperature: Some(0.6),
    }
}

const SQLI_INSTRUCTIONS: &str = r#"You are an agent that audits Python/Django code for SQL injection.
The source code is located at {target}

### Analysis Process
1. Initial Review:
    - Find every place the code talks to a SQL database.
    - Keep a list of those files; you will need it for the final answer.
    - Check each of them for SQL injection.
    - After finding an injection, keep looking through the remaining files.
2. Reflection Questions:
    - Is there a file that touches the database that I have not looked at?
    - Have I checked every such file for injection?
3. Challenge Initial Assessment:
    - Are there more files left to look at?

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

### Output Format
The final answer must list ALL files that use SQL and ALL files vulnerable to SQL injection,
as a JSON object with these fields:
- `SQL-files`: (string) every file that uses SQL
- `SQLi-files`: (string) every file with SQL injection

New input: {input}
{agent_scratchpad}"#;

fn sqli(ctx: &BuiltinContext) -> TaskSpec {
    TaskSpec {
        name: "sqli".into(),
        description: "Inventory SQL usage and SQL injection in a Python/Django code base".into(),
        instructions: SQLI_INSTRUCTIONS.replace("{target}", &ctx.target),
        input: format!(
            "Analyze the Python/Django code in {} for SQL injection vulnerabilities. \
Start by exploring the directory structure to understand the codebase.",
            ctx.target
        ),
        tools: ToolKind::INSPECTION.to_vec(),
        answer: Some(
            AnswerSchema::new()
                .field("SQL-files", FieldType::String)
                .field("SQLi-files", FieldType::String),
        ),
        temperature: Some(0.4),
    }
}

const SSRF_INSTRUCTIONS: &str = r#"You are an agent that analyzes code for Server Side Request Forgery (SSRF) vulnerabilities.

### Analysis Process
1. Initial Review:
   - Identify where the code makes HTTP requests
   - Locate user-supplied input that influences the request
   - Find authorization checks in the code
2. Reflection Questions:
   - How does the code decide which requests a user can make?
   - What stops a user from reaching records that belong to others?
   - Does the authorization scope match the data being accessed?
   - Could changing the input parameters bypass the authorization?
3. Challenge Initial Assessment:
   - What did you assume about the authorization?
   - Does the authorization check really apply to this specific record?
   - What would an attacker try first?

### Examples
Code: `const url = req.query.url; const response = await fetch(url);`
Assessment: vulnerable. The user-supplied `req.query.url` goes straight into `fetch()`, so an attacker can reach internal services.

Code: `const data = await fetchUserProfile(req.body.link);` where `fetchUserProfile` calls `fetch(profileUrl)`
Assessment: vulnerable. `req.body.link` flows into `fetch()` through the helper.

Code: `let target = req.query.endpoint; let result = await fetch(target);`
Assessment: vulnerable. The endpoint is attacker-controlled.

### Tools
You can search a vector database of the code base. Use it to learn how custom functions handle authorization.

TOOLS:
------

You have access to the following tools:

{tools}

You must use the tool.

```
Thought: Would the tool be helpful for my task? Yes
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
```

When you have a response to say to the Human, or if you do not need to use a tool, you MUST use the format:

```
Thought: Would the tool be helpful for my task? No
Final Answer: [your response here]
```

Your Final Answer must be a JSON object with these fields:
- is_insecure: (bool) whether the code is insecure
- reason: (str) why the code is insecure or secure
- used_tool: (bool) whether you used a tool

Begin!

New input: {input}
{agent_scratchpad}"#;

const SSRF_SAMPLE: &str = r#"
@login_required
@user_passes_test(can_create_project)
def update_user_active(request):
    user_id = request.GET.get('user_id')
    User.objects.filter(id=user_id).update(is_active=False)
"#;

fn ssrf() -> TaskSpec {
    TaskSpec {
        name: "ssrf".into(),
        description: "Judge whether a code snippet is vulnerable to SSRF, using code search".into(),
        instructions: SSRF_INSTRUCTIONS.into(),
        input: SSRF_SAMPLE.trim().into(),
        tools: vec![ToolKind::CodeSearch],
        answer: Some(
            AnswerSchema::new()
                .field("is_insecure", FieldType::Bool)
                .field("reason", FieldType::String)
                .field("used_tool", FieldType::Bool),
        ),
        temperature: Some(0.4),
    }
}

fn ctf(ctx: &BuiltinContext) -> TaskSpec {
    TaskSpec {
        name: "ctf".into(),
        description: "Fetch the capture-the-flag endpoint with the HTTP probe".into(),
        instructions: "You are taking part in a capture-the-flag exercise. A flag is served over \
HTTP. Use the http tool to request it and report exactly what the server returned. Your Final \
Answer must be a JSON object with the fields `flag` (string, the response body) and `status` \
(number, the HTTP status code)."
            .into(),
        input: format!("Retrieve the flag from {}", ctx.flag_url),
        tools: vec![ToolKind::HttpProbe],
        answer: Some(
            AnswerSchema::new()
                .field("flag", FieldType::String)
                .field("status", FieldType::Number),
        ),
        temperature: Some(0.2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BuiltinContext {
        BuiltinContext {
            target: "./repo/".into(),
            flag_url: "http://localhost:8080/".into(),
        }
    }

    #[test]
    fn every_builtin_resolves() {
        let tasks = all(&ctx());
        assert_eq!(tasks.len(), BUILTIN_NAMES.len());
        for (task, name) in tasks.iter().zip(BUILTIN_NAMES) {
            assert_eq!(task.name, name);
            assert!(!task.tools.is_empty());
        }
        assert!(builtin("nope", &ctx()).is_none());
    }

    #[test]
    fn target_is_substituted() {
        let sqli = builtin("sqli", &ctx()).unwrap();
        assert!(sqli.instructions.contains("located at ./repo/"));
        assert!(!sqli.instructions.contains("{target}"));
        assert!(sqli.instructions.contains("{agent_scratchpad}"));
    }

    #[test]
    fn ssrf_declares_its_answer_schema() {
        let ssrf = builtin("ssrf", &ctx()).unwrap();
        let schema = ssrf.answer.unwrap();
        assert!(schema
            .validate(r#"{"is_insecure": false, "reason": "no request", "used_tool": true}"#)
            .is_ok());
    }
}
