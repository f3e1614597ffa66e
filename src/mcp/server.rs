use crate::app::App;
use crate::errors::{ErrorCode, ExecutionError, McpError};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::model::ToolParameter;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "toolgate";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn input_schema(parameters: &[ToolParameter]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for parameter in parameters {
        let mut schema = serde_json::Map::new();
        schema.insert(
            "type".to_string(),
            Value::String(parameter.kind.json_type().to_string()),
        );
        if !parameter.description.is_empty() {
            schema.insert(
                "description".to_string(),
                Value::String(parameter.description.clone()),
            );
        }
        if let Some(default_value) = &parameter.default_value {
            schema.insert("default".to_string(), default_value.clone());
        }
        properties.insert(parameter.name.clone(), Value::Object(schema));
        if parameter.required {
            required.push(Value::String(parameter.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub struct McpServer {
    app: Arc<App>,
}

impl McpServer {
    pub async fn new() -> Result<Self, ExecutionError> {
        let app = App::initialize()?;
        app.registry.refresh().await?;
        Ok(Self { app: Arc::new(app) })
    }

    async fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"list": true, "call": true}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    async fn handle_tools_list(&self) -> Value {
        let mut tools = Vec::new();
        for tool in self.app.registry.all() {
            tools.push(serde_json::json!({
                "name": tool.code,
                "description": tool.description,
                "inputSchema": input_schema(&tool.parameters),
            }));
        }
        for definition in self.app.native.definitions() {
            tools.push(serde_json::json!({
                "name": definition.code,
                "description": definition.description,
                "inputSchema": definition.input_schema,
            }));
        }
        serde_json::json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, name: &str, raw_args: Value) -> Result<Value, McpError> {
        let mut args = match raw_args {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(McpError::new(
                    ErrorCode::InvalidParams,
                    "arguments must be an object",
                ))
            }
        };
        let session_id = args
            .remove("session_id")
            .and_then(|value| value.as_str().map(str::to_string));

        // Unknown tools are not a protocol error. The dispatcher answers
        // them in-band and records the attempt in the audit trail.
        let response = self.app.dispatcher.execute(name, args, session_id).await;
        let is_error = !response.success;
        let text = serde_json::to_string(&response)
            .map_err(|err| McpError::new(ErrorCode::InternalError, err.to_string()))?;
        Ok(serde_json::json!({
            "content": [ { "type": "text", "text": text } ],
            "isError": is_error,
        }))
    }

    pub async fn run_stdio(&self) -> Result<(), ExecutionError> {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin).lines();
        let mut writer = BufWriter::new(stdout);

        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|err| ExecutionError::internal(err.to_string()))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(request) => request,
                Err(_) => {
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        ErrorCode::ParseError.as_i32(),
                        "Parse error".to_string(),
                    );
                    let payload = serde_json::to_string(&response).unwrap_or_default();
                    writer.write_all(payload.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                    continue;
                }
            };

            let response = match request.method.as_str() {
                _ if request.method.starts_with("notifications/") && request.id.is_none() => None,
                "initialize" => match request.id.clone() {
                    Some(id) => Some(JsonRpcResponse::success(id, self.handle_initialize().await)),
                    None => None,
                },
                "tools/list" => match request.id.clone() {
                    Some(id) => Some(JsonRpcResponse::success(id, self.handle_tools_list().await)),
                    None => None,
                },
                "tools/call" => match request.id.clone() {
                    Some(id) => {
                        let params = request.params.as_object().cloned().unwrap_or_default();
                        let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                        if name.is_empty() {
                            Some(JsonRpcResponse::failure(
                                id,
                                ErrorCode::InvalidParams.as_i32(),
                                "Missing tool name".to_string(),
                            ))
                        } else {
                            let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                            let call = match self.handle_tools_call(name, args).await {
                                Ok(result) => JsonRpcResponse::success(id, result),
                                Err(err) => {
                                    JsonRpcResponse::failure(id, err.code.as_i32(), err.message)
                                }
                            };
                            Some(call)
                        }
                    }
                    None => None,
                },
                _ => request.id.clone().map(|id| {
                    JsonRpcResponse::failure(
                        id,
                        ErrorCode::MethodNotFound.as_i32(),
                        "Method not found".to_string(),
                    )
                }),
            };

            if let Some(response) = response {
                let payload = serde_json::to_string(&response).unwrap_or_default();
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        self.app.audit.shutdown().await;
        Ok(())
    }
}

pub async fn run_stdio() -> Result<(), ExecutionError> {
    let server = McpServer::new().await?;
    server.run_stdio().await
}
