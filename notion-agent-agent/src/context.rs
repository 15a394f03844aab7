//! Context builder for assembling prompts

use notion_agent_core::{Event, Part, Role};
use notion_agent_providers::{Message, ToolCallRequest};

/// Default system instruction for the read-only TODO assistant
pub const DEFAULT_INSTRUCTION: &str = r#"You are an assistant for TODO tasks.

You have access to tools that can READ data from Notion (tasks, pages, databases). You MUST NOT modify Notion: no create, update, delete, move, archive, append, or any write operations.

When the user asks about their TODOs:
- Search Notion for the task database or pages, then fetch them
- Summarize the current state and list all fields of a TODO item
- List all tasks
- Analyze all tasks together and look for patterns and potential connections between tasks
- If information is missing, ask a single clarifying question

If the user requests any change in Notion, refuse politely and explain that you are read-only."#;

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Builds provider messages from a session's events
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    instruction: String,
    history_limit: usize,
}

impl ContextBuilder {
    /// Create a builder, falling back to [`DEFAULT_INSTRUCTION`]
    pub fn new(instruction: Option<String>) -> Self {
        let instruction = instruction
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string());
        Self {
            instruction,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keep at most `limit` events of history
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn build_system_prompt(&self) -> String {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");
        format!("{}\n\n## Current Time\n{}", self.instruction, now)
    }

    /// Build the complete message list for an LLM call.
    ///
    /// History is cut to the most recent events, but never past the latest
    /// user turn, and always resumes at a user turn so tool results never
    /// lose the call they answer.
    pub fn build_messages(&self, events: &[Event]) -> Vec<Message> {
        let mut start = events.len().saturating_sub(self.history_limit);
        if let Some(last_user) = events.iter().rposition(is_user_turn) {
            start = start.min(last_user);
        }
        let recent = &events[start..];
        let first_user = recent
            .iter()
            .position(is_user_turn)
            .unwrap_or(recent.len());

        let mut messages = vec![Message::system(self.build_system_prompt())];
        for event in &recent[first_user..] {
            let Some(content) = &event.content else {
                continue;
            };
            let text = content.text();
            match content.role {
                Role::User => messages.push(Message::user(text)),
                Role::Model => {
                    let calls: Vec<ToolCallRequest> =
                        content.parts.iter().filter_map(to_tool_call).collect();
                    messages.push(Message::assistant(text, calls));
                }
                Role::Tool => {
                    for part in &content.parts {
                        if let Part::FunctionResponse { id, name, response } = part {
                            messages.push(Message::tool_result(id, name, response));
                        }
                    }
                }
            }
        }
        messages
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(None)
    }
}

fn is_user_turn(event: &Event) -> bool {
    matches!(&event.content, Some(c) if c.role == Role::User)
}

fn to_tool_call(part: &Part) -> Option<ToolCallRequest> {
    let Part::FunctionCall { id, name, args } = part else {
        return None;
    };
    let arguments = if args.is_object() {
        args.clone()
    } else {
        serde_json::json!({})
    };
    Some(ToolCallRequest {
        id: id.clone(),
        name: name.clone(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notion_agent_core::Content;
    use notion_agent_providers::ChatRole;
    use serde_json::json;

    fn event(content: Content) -> Event {
        Event::new("inv-1", "test", Some(content))
    }

    #[test]
    fn test_default_instruction_is_read_only() {
        let builder = ContextBuilder::default();
        let prompt = builder.build_system_prompt();
        assert!(prompt.starts_with("You are an assistant for TODO tasks."));
        assert!(prompt.contains("MUST NOT modify Notion"));
        assert!(prompt.contains("## Current Time"));
    }

    #[test]
    fn test_blank_instruction_falls_back() {
        let builder = ContextBuilder::new(Some("   ".to_string()));
        assert!(builder.build_system_prompt().contains("TODO tasks"));
        let custom = ContextBuilder::new(Some("Be brief.".to_string()));
        assert!(custom.build_system_prompt().starts_with("Be brief."));
    }

    #[test]
    fn test_build_messages_maps_roles() {
        let events = vec![
            event(Content::user_text("what are my tasks?")),
            event(Content::new(
                Role::Model,
                vec![Part::FunctionCall {
                    id: "call_1".to_string(),
                    name: "notion-search".to_string(),
                    args: json!({"query": "tasks"}),
                }],
            )),
            event(Content::new(
                Role::Tool,
                vec![Part::FunctionResponse {
                    id: "call_1".to_string(),
                    name: "notion-search".to_string(),
                    response: "Task A".to_string(),
                }],
            )),
            event(Content::model_text("You have Task A.")),
        ];

        let messages = ContextBuilder::default().build_messages(&events);
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::Tool,
                ChatRole::Assistant
            ]
        );

        let calls = &messages[2].tool_calls;
        assert_eq!(calls[0].name, "notion-search");
        assert_eq!(calls[0].arguments["query"], json!("tasks"));
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[3].content, "Task A");
        assert_eq!(messages[4].content, "You have Task A.");
    }

    #[test]
    fn test_history_limit_resumes_at_user_turn() {
        let events = vec![
            event(Content::user_text("first")),
            event(Content::new(
                Role::Tool,
                vec![Part::FunctionResponse {
                    id: "c".to_string(),
                    name: "notion-fetch".to_string(),
                    response: "orphan".to_string(),
                }],
            )),
            event(Content::model_text("answer")),
            event(Content::user_text("second")),
        ];

        let messages = ContextBuilder::default()
            .with_history_limit(3)
            .build_messages(&events);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "second");
    }

    #[test]
    fn test_history_limit_never_drops_latest_question() {
        let call = |id: &str| {
            event(Content::new(
                Role::Model,
                vec![Part::FunctionCall {
                    id: id.to_string(),
                    name: "notion-search".to_string(),
                    args: json!({}),
                }],
            ))
        };
        let result = |id: &str| {
            event(Content::new(
                Role::Tool,
                vec![Part::FunctionResponse {
                    id: id.to_string(),
                    name: "notion-search".to_string(),
                    response: "Task A".to_string(),
                }],
            ))
        };
        let mut events = vec![
            event(Content::user_text("earlier")),
            event(Content::model_text("done")),
            event(Content::user_text("what are my tasks?")),
        ];
        for i in 0..4 {
            events.push(call(&format!("c{}", i)));
            events.push(result(&format!("c{}", i)));
        }

        let messages = ContextBuilder::default()
            .with_history_limit(3)
            .build_messages(&events);
        assert_eq!(messages.len(), 10);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, "what are my tasks?");
        assert_eq!(messages[9].tool_call_id.as_deref(), Some("c3"));
    }
}
