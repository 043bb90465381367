//! Conversion between internal types and backend wire formats

pub mod nova;
pub mod openai;

use crate::protocol::shared::{
    WireChoice, WireFunction, WireFunctionCall, WireMessage, WireTool, WireToolCall, WireToolCallDelta, WireUsage,
};
use crate::types::{Choice, Message, ToolCallDelta, ToolDefinition, Usage};

// -- Outbound: internal types -> wire format --

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        let role = msg.role().as_str();
        match msg {
            Message::System(text) | Message::User(text) | Message::Assistant(text) => Self {
                role,
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
            Message::ToolCalls(calls) => Self {
                role,
                content: None,
                tool_calls: Some(
                    calls
                        .iter()
                        .map(|call| WireToolCall {
                            id: call.id.clone(),
                            call_type: "function",
                            function: WireFunctionCall {
                                name: call.function.name.clone(),
                                arguments: call.function.arguments.clone(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            },
            Message::ToolResult { tool_call_id, content } => Self {
                role,
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
            },
        }
    }
}

impl From<&ToolDefinition> for WireTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            tool_type: "function",
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

pub(crate) fn wire_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages.iter().map(Into::into).collect()
}

pub(crate) fn wire_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
    tools.iter().map(Into::into).collect()
}

// -- Inbound: wire format -> internal types --

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

/// Convert wire choices, using list position where the backend omits `index`
pub(crate) fn choices(wire: Vec<WireChoice>) -> Vec<Choice> {
    wire.into_iter()
        .enumerate()
        .map(|(position, choice)| convert_choice(position, choice))
        .collect()
}

fn convert_choice(position: usize, choice: WireChoice) -> Choice {
    let WireChoice {
        index,
        text,
        message,
        delta,
        finish_reason,
    } = choice;

    // Streaming chunks carry `delta`, whole bodies carry `text` or `message`
    let body = delta.or(message).unwrap_or_default();
    let token = text.or(body.content);
    let tool_calls = body.tool_calls.map(|calls| {
        calls
            .into_iter()
            .enumerate()
            .map(|(position, call)| convert_tool_call(position, call))
            .collect()
    });

    Choice {
        index: index.unwrap_or_else(|| position_index(position)),
        token,
        finish_reason,
        tool_calls,
    }
}

fn convert_tool_call(position: usize, call: WireToolCallDelta) -> ToolCallDelta {
    let function = call.function.unwrap_or_default();
    ToolCallDelta {
        index: call.index.unwrap_or_else(|| position_index(position)),
        id: call.id,
        name: function.name,
        arguments: function.arguments,
    }
}

fn position_index(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::shared::{WireDelta, WireFunctionDelta};
    use crate::types::{FunctionCall, ToolCall};

    #[test]
    fn tool_result_keeps_call_id() {
        let wire = WireMessage::from(&Message::ToolResult {
            tool_call_id: "call_1".into(),
            content: "ok".into(),
        });
        assert_eq!(wire.role, "tool");
        assert_eq!(wire.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(wire.content.as_deref(), Some("ok"));
    }

    #[test]
    fn tool_calls_message_is_assistant_without_content() {
        let wire = WireMessage::from(&Message::ToolCalls(vec![ToolCall {
            id: "call_1".into(),
            function: FunctionCall {
                name: "read_file".into(),
                arguments: r#"{"path":"a.rs"}"#.into(),
            },
        }]));
        assert_eq!(wire.role, "assistant");
        assert!(wire.content.is_none());
        let calls = wire.tool_calls.unwrap();
        assert_eq!(calls[0].call_type, "function");
        assert_eq!(calls[0].function.name, "read_file");
    }

    #[test]
    fn choice_prefers_text_then_delta() {
        let converted = choices(vec![
            WireChoice {
                text: Some("hi".into()),
                ..WireChoice::default()
            },
            WireChoice {
                delta: Some(WireDelta {
                    content: Some("there".into()),
                    tool_calls: None,
                }),
                finish_reason: Some("stop".into()),
                ..WireChoice::default()
            },
        ]);
        assert_eq!(converted[0].index, 0);
        assert_eq!(converted[0].token.as_deref(), Some("hi"));
        assert_eq!(converted[1].index, 1);
        assert_eq!(converted[1].token.as_deref(), Some("there"));
        assert_eq!(converted[1].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn tool_call_fragments_pass_through_unjoined() {
        let converted = choices(vec![WireChoice {
            index: Some(0),
            delta: Some(WireDelta {
                content: None,
                tool_calls: Some(vec![WireToolCallDelta {
                    index: Some(2),
                    id: None,
                    function: Some(WireFunctionDelta {
                        name: None,
                        arguments: Some(r#"{"pa"#.into()),
                    }),
                }]),
            }),
            ..WireChoice::default()
        }]);
        let calls = converted[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].index, 2);
        assert_eq!(calls[0].arguments.as_deref(), Some(r#"{"pa"#));
        assert!(calls[0].name.is_none());
    }
}
