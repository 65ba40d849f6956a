//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{AgentReply, DecisionKind, Oracle, OracleError};
use crate::message::{Message, ToolCall};
use crate::tools::ToolSpec;

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Oracle backed by a `/chat/completions` endpoint.
pub struct ChatCompletionsOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for ChatCompletionsOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsOracle")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

impl ChatCompletionsOracle {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builds a client from `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    ///
    /// Returns `None` when no API key is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(ENV_OPENAI_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())?;
        let model = std::env::var(ENV_OPENAI_MODEL)
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let oracle = Self::new(api_key, model);
        Some(match std::env::var(ENV_OPENAI_BASE_URL) {
            Ok(url) if !url.trim().is_empty() => oracle.with_base_url(url.trim()),
            _ => oracle,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|message| match message {
                Message::System { content } => wire("system", content),
                Message::Human { content } => wire("user", content),
                Message::Agent {
                    content,
                    tool_calls,
                    ..
                } => {
                    let mut out = wire("assistant", content);
                    if !tool_calls.is_empty() {
                        out.tool_calls = Some(
                            tool_calls
                                .iter()
                                .map(|call| WireToolCall {
                                    id: call.id.clone(),
                                    kind: function_kind(),
                                    function: WireFunctionCall {
                                        name: call.name.clone(),
                                        arguments: Value::Object(call.args.clone()).to_string(),
                                    },
                                })
                                .collect(),
                        );
                    }
                    out
                }
                Message::Tool {
                    call_id: Some(call_id),
                    content,
                    ..
                } => {
                    let mut out = wire("tool", content);
                    out.tool_call_id = Some(call_id.clone());
                    out
                }
                Message::Tool {
                    call_id: None,
                    name,
                    content,
                } => wire("user", &format!("Tool result ({name}): {content}")),
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: t.name.clone(),
                    description: t.description.clone().unwrap_or_default(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect()
    }

    async fn send(&self, request: ChatRequest) -> Result<WireMessage, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Transport(format!("chat completions request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Transport(format!(
                "chat completions error (HTTP {status}): {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            OracleError::InvalidResponse(format!("failed to parse chat completions response: {e}"))
        })?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| OracleError::InvalidResponse("response has no choices".into()))
    }
}

fn wire(role: &str, content: &str) -> WireMessage {
    WireMessage {
        role: role.to_string(),
        content: Some(content.to_string()),
        tool_calls: None,
        tool_call_id: None,
    }
}

#[async_trait]
impl Oracle for ChatCompletionsOracle {
    async fn decide(&self, kind: DecisionKind, messages: &[Message]) -> Result<Value, OracleError> {
        let mut wire_messages = Self::convert_messages(messages);
        wire_messages.push(wire(
            "system",
            &format!(
                "Respond only with a JSON object matching this schema: {}",
                kind.schema()
            ),
        ));
        let request = ChatRequest {
            model: self.model.clone(),
            messages: wire_messages,
            tools: Vec::new(),
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
            temperature: 0.0,
        };
        let message = self.send(request).await?;
        let content = message.content.unwrap_or_default();
        match serde_json::from_str::<Value>(&content) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(other) => Err(OracleError::InvalidResponse(format!(
                "{} decision is not an object: {other}",
                kind.as_str()
            ))),
            Err(e) => Err(OracleError::InvalidResponse(format!(
                "{} decision is not JSON: {e}",
                kind.as_str()
            ))),
        }
    }

    async fn respond(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AgentReply, OracleError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: Self::convert_messages(messages),
            tools: Self::convert_tools(tools),
            response_format: None,
            temperature: 0.0,
        };
        let message = self.send(request).await?;
        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| {
                let args = if call.function.arguments.trim().is_empty() {
                    Map::new()
                } else {
                    match serde_json::from_str::<Value>(&call.function.arguments) {
                        Ok(Value::Object(map)) => map,
                        _ => {
                            tracing::warn!(
                                tool = %call.function.name,
                                "dropping tool call with malformed arguments"
                            );
                            return None;
                        }
                    }
                };
                Some(ToolCall::new(call.id, call.function.name, args))
            })
            .collect();
        Ok(AgentReply {
            content: message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oracle(server: &MockServer) -> ChatCompletionsOracle {
        ChatCompletionsOracle::new("sk-test", "gpt-4o-mini").with_base_url(server.uri())
    }

    /// **Scenario**: Tool calls in the response become ToolCall values with parsed args.
    #[tokio::test]
    async fn respond_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            {"id": "call_1", "type": "function", "function": {"name": "search_used_vehicles", "arguments": "{\"make\":\"Audi\"}"}},
                            {"id": "call_2", "type": "function", "function": {"name": "search_used_vehicles", "arguments": "not json"}}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let reply = oracle(&server)
            .respond(&[Message::human("audi")], &crate::tools::quote_tools())
            .await
            .unwrap();
        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id, "call_1");
        assert_eq!(reply.tool_calls[0].args["make"], json!("Audi"));
    }

    #[tokio::test]
    async fn decide_requires_json_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"route\":\"contact_agent\"}"}}]
            })))
            .mount(&server)
            .await;
        let value = oracle(&server)
            .decide(DecisionKind::Route, &[Message::system("route")])
            .await
            .unwrap();
        assert_eq!(value["route"], "contact_agent");
    }

    #[tokio::test]
    async fn http_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let err = oracle(&server)
            .respond(&[Message::human("x")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Transport(ref m) if m.contains("500")));
    }

    #[test]
    fn tool_messages_carry_call_ids() {
        let wire = ChatCompletionsOracle::convert_messages(&[
            Message::tool(Some("c1".into()), "search_used_vehicles", "{}"),
            Message::tool(None, "search_used_vehicles", "{}"),
        ]);
        assert_eq!(wire[0].role, "tool");
        assert_eq!(wire[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(wire[1].role, "user");
    }
}
