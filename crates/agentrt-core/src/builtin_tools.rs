// Built-in tools every deployment provides. Most are documented stubs;
// `calculator` and `http_request` have real behavior per the platform
// contract.

use crate::tools::{Tool, ToolExecutionResult};
use agentrt_contracts::tools::ToolContext;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "Search the web for information relevant to a query."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let query = input.get("query").and_then(Value::as_str).unwrap_or("");
        ToolExecutionResult::success(json!({
            "query": query,
            "results": [],
        }))
    }
}

pub struct CalculatorTool;

const CALCULATOR_ALLOWED: &str = "0123456789+-*/(). %";

impl CalculatorTool {
    /// Safely evaluate an arithmetic expression over `+ - * / ( ) % .` and
    /// digits. Any other character is rejected before evaluation begins.
    fn evaluate(expr: &str) -> Result<f64, String> {
        if !expr.chars().all(|c| CALCULATOR_ALLOWED.contains(c)) {
            return Err("expression contains disallowed characters".to_string());
        }
        let tokens = tokenize(expr)?;
        let mut parser = ExprParser {
            tokens: &tokens,
            pos: 0,
        };
        let value = parser.parse_expr()?;
        if parser.pos != tokens.len() {
            return Err("unexpected trailing input".to_string());
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let value = num_str
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number: {num_str}"))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(format!("unexpected character: {other}")),
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, String> {
        let mut value = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.parse_factor()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.parse_factor()?;
                    if rhs == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= rhs;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let rhs = self.parse_factor()?;
                    if rhs == 0.0 {
                        return Err("modulo by zero".to_string());
                    }
                    value %= rhs;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.parse_factor()?)
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.parse_expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("expected closing parenthesis".to_string()),
                }
            }
            _ => Err("expected number or '('".to_string()),
        }
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }
    fn description(&self) -> &str {
        "Safely evaluate an arithmetic expression."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"expression": {"type": "string"}},
            "required": ["expression"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let expr = match input.get("expression").and_then(Value::as_str) {
            Some(e) => e,
            None => return ToolExecutionResult::tool_error("missing 'expression' field"),
        };
        match Self::evaluate(expr) {
            Ok(result) => ToolExecutionResult::success(json!({"result": result})),
            Err(msg) => ToolExecutionResult::tool_error(msg),
        }
    }
}

pub struct GetCurrentTimeTool;

#[async_trait]
impl Tool for GetCurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }
    fn description(&self) -> &str {
        "Get the current UTC date and time."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _input: Value, _context: &ToolContext) -> ToolExecutionResult {
        ToolExecutionResult::success(json!({"now": chrono::Utc::now().to_rfc3339()}))
    }
}

pub struct GetWeatherTool;

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }
    fn description(&self) -> &str {
        "Get current weather for a location."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let location = input.get("location").and_then(Value::as_str).unwrap_or("");
        ToolExecutionResult::success(json!({
            "location": location,
            "conditions": "unavailable",
            "temperature_c": null,
        }))
    }
}

pub struct SendMessageTool;

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }
    fn description(&self) -> &str {
        "Send a message to a user or external channel."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"to": {"type": "string"}, "content": {"type": "string"}},
            "required": ["to", "content"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        ToolExecutionResult::success(json!({"delivered": true, "echo": input}))
    }
}

pub struct ExecuteCodeTool;

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }
    fn description(&self) -> &str {
        "Execute a code snippet in a sandboxed environment."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"language": {"type": "string"}, "source": {"type": "string"}},
            "required": ["language", "source"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let language = input.get("language").and_then(Value::as_str).unwrap_or("");
        ToolExecutionResult::success(json!({
            "language": language,
            "stdout": "",
            "stderr": "",
            "note": "execution sandboxing not enabled in this deployment",
        }))
    }
}

pub struct KnowledgeSearchTool;

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "knowledge_search"
    }
    fn description(&self) -> &str {
        "Search the agent's knowledge base for relevant passages."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}},
            "required": ["query"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let query = input.get("query").and_then(Value::as_str).unwrap_or("");
        ToolExecutionResult::success(json!({"query": query, "chunks": []}))
    }
}

pub struct CreateTaskTool;

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }
    fn description(&self) -> &str {
        "Create a follow-up task for later execution."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"title": {"type": "string"}, "description": {"type": "string"}},
            "required": ["title"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let title = input.get("title").and_then(Value::as_str).unwrap_or("");
        ToolExecutionResult::success(json!({
            "task_id": uuid::Uuid::now_v7(),
            "title": title,
        }))
    }
}

/// Performs a real HTTP call with a timeout; this is the one tool beyond
/// `calculator` that the contract requires to actually do its work.
pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }
    fn description(&self) -> &str {
        "Perform an HTTP request and return status, headers, and body."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "method": {"type": "string"},
                "url": {"type": "string"},
                "body": {"type": "string"}
            },
            "required": ["url"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let url = match input.get("url").and_then(Value::as_str) {
            Some(u) => u,
            None => return ToolExecutionResult::tool_error("missing 'url' field"),
        };
        let method = input
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let method = match method.parse::<reqwest::Method>() {
            Ok(m) => m,
            Err(_) => return ToolExecutionResult::tool_error(format!("invalid method: {method}")),
        };

        let mut request = self.client.request(method, url);
        if let Some(body) = input.get("body").and_then(Value::as_str) {
            request = request.body(body.to_string());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let headers: serde_json::Map<String, Value> = response
                    .headers()
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.to_string(),
                            json!(v.to_str().unwrap_or_default().to_string()),
                        )
                    })
                    .collect();
                let success = response.status().is_success();
                let body = response.text().await.unwrap_or_default();
                ToolExecutionResult::success(json!({
                    "status": status,
                    "headers": headers,
                    "body": body,
                    "success": success,
                }))
            }
            Err(err) => ToolExecutionResult::internal_error(err.to_string()),
        }
    }
}

pub struct FileOperationsTool;

#[async_trait]
impl Tool for FileOperationsTool {
    fn name(&self) -> &str {
        "file_operations"
    }
    fn description(&self) -> &str {
        "Read, write, or list files in the agent's scoped workspace."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["read", "write", "list"]},
                "path": {"type": "string"}
            },
            "required": ["operation", "path"]
        })
    }
    async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
        let operation = input
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or("");
        ToolExecutionResult::success(json!({
            "operation": operation,
            "note": "file operations not enabled in this deployment",
        }))
    }
}

/// Register all required built-in tools into a registry.
pub fn register_builtins(registry: &mut crate::tools::ToolRegistry) {
    registry.register(WebSearchTool);
    registry.register(CalculatorTool);
    registry.register(GetCurrentTimeTool);
    registry.register(GetWeatherTool);
    registry.register(SendMessageTool);
    registry.register(ExecuteCodeTool);
    registry.register(KnowledgeSearchTool);
    registry.register(CreateTaskTool);
    registry.register(HttpRequestTool::new());
    registry.register(FileOperationsTool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculator_evaluates_precedence_and_parens() {
        assert_eq!(CalculatorTool::evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(CalculatorTool::evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(CalculatorTool::evaluate("10 % 3").unwrap(), 1.0);
        assert_eq!(CalculatorTool::evaluate("-2 + 5").unwrap(), 3.0);
    }

    #[test]
    fn calculator_rejects_disallowed_characters() {
        assert!(CalculatorTool::evaluate("2 + a").is_err());
        assert!(CalculatorTool::evaluate("import os").is_err());
    }

    #[test]
    fn calculator_rejects_division_by_zero() {
        assert!(CalculatorTool::evaluate("1 / 0").is_err());
    }

    #[tokio::test]
    async fn builtins_register_all_ten_tools() {
        let mut registry = crate::tools::ToolRegistry::new();
        register_builtins(&mut registry);
        assert_eq!(registry.len(), 10);
        for name in [
            "web_search",
            "calculator",
            "get_current_time",
            "get_weather",
            "send_message",
            "execute_code",
            "knowledge_search",
            "create_task",
            "http_request",
            "file_operations",
        ] {
            assert!(registry.has(name), "missing builtin tool {name}");
        }
    }
}
