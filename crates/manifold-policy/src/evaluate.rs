use serde_json::{Value, json};

use crate::store::PolicyStore;

/// Opening delimiter for the machine-parsable refusal tag
const TAG_OPEN: &str = "[[tool-blocked:";
/// Closing delimiter for the refusal tag
const TAG_CLOSE: &str = "]]";

/// A tool call proposed by the model, as extracted from a provider response
#[derive(Debug, Clone)]
pub struct ProposedCall {
    /// Tool name
    pub name: String,
    /// Raw argument payload, JSON-encoded by most providers
    pub arguments: String,
}

/// Refusal payload substituted for a blocked response
#[derive(Debug, Clone)]
pub struct PolicyRefusal {
    /// Short machine-taggable summary embedding each blocked tool name in
    /// `[[tool-blocked:NAME]]` delimiters
    pub refusal_message: String,
    /// Canonical JSON rendering of the blocked calls, shown to the client
    /// as the assistant's reply
    pub content_message: String,
}

/// Evaluate policies over the proposed calls of one response
///
/// Returns `None` when every call is allowed; the response then passes
/// unmodified. Tools without a configured policy are always allowed.
pub async fn evaluate(
    store: &dyn PolicyStore,
    calls: &[ProposedCall],
    agent_id: &str,
    untrusted_context: bool,
) -> Option<PolicyRefusal> {
    let mut blocked: Vec<(&ProposedCall, String)> = Vec::new();

    for call in calls {
        let Some(policy) = store.tool_policy(agent_id, &call.name).await else {
            continue;
        };

        let reason = if untrusted_context && !policy.allow_untrusted_context {
            Some("untrusted content present in the conversation".to_owned())
        } else {
            match serde_json::from_str::<Value>(&call.arguments) {
                Ok(arguments) => policy.argument_rules.iter().find_map(|rule| rule.matches(&arguments)),
                Err(e) => {
                    tracing::warn!(
                        tool = %call.name,
                        error = %e,
                        "tool call arguments are not valid JSON, skipping argument rules"
                    );
                    None
                }
            }
        };

        if let Some(reason) = reason {
            tracing::warn!(agent = %agent_id, tool = %call.name, %reason, "tool call blocked by policy");
            blocked.push((call, reason));
        }
    }

    if blocked.is_empty() {
        return None;
    }

    Some(build_refusal(&blocked))
}

fn build_refusal(blocked: &[(&ProposedCall, String)]) -> PolicyRefusal {
    let tags = blocked
        .iter()
        .map(|(call, _)| format!("{TAG_OPEN}{}{TAG_CLOSE}", call.name))
        .collect::<Vec<_>>()
        .join(", ");
    let refusal_message = format!("Tool invocation denied by policy: {tags}");

    let reasons = blocked.iter().map(|(_, reason)| reason.clone()).collect::<Vec<_>>();
    let calls = blocked
        .iter()
        .map(|(call, _)| {
            // pre-serialized argument strings are parsed so the payload is
            // canonical JSON rather than a quoted blob
            let arguments = serde_json::from_str::<Value>(&call.arguments)
                .unwrap_or_else(|_| Value::String(call.arguments.clone()));
            json!({"name": call.name, "arguments": arguments})
        })
        .collect::<Vec<_>>();

    let content_message = json!({
        "denied": true,
        "reason": reasons.join("; "),
        "tool_calls": calls,
    })
    .to_string();

    PolicyRefusal {
        refusal_message,
        content_message,
    }
}

/// Extract the tool names tagged in a refusal message
pub fn blocked_tools(refusal_message: &str) -> Vec<String> {
    let mut tools = Vec::new();
    let mut rest = refusal_message;
    while let Some(start) = rest.find(TAG_OPEN) {
        rest = &rest[start + TAG_OPEN.len()..];
        let Some(end) = rest.find(TAG_CLOSE) else { break };
        tools.push(rest[..end].to_owned());
        rest = &rest[end + TAG_CLOSE.len()..];
    }
    tools
}
