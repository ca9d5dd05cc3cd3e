use std::collections::HashMap;

use lambda_runtime::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

/// Service name reported by the health check. Kept verbatim from the
/// pre-migration deployment so existing monitors keep matching.
pub const HEALTH_SERVICE_NAME: &str = "python-lambda";

/// API Gateway proxy event, reduced to the fields the handler reads.
/// Missing fields take their defaults at decode time.
#[derive(Deserialize, Debug, Clone)]
pub struct ApiGatewayEvent {
    #[serde(rename = "httpMethod", default = "default_http_method")]
    pub http_method: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub body: Option<Value>,
}

fn default_http_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

/// Per-invocation metadata from the hosting runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    pub request_id: Option<String>,
}

impl RequestMeta {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
        }
    }

    pub fn from_context(context: &Context) -> Self {
        let request_id = Some(context.request_id.clone()).filter(|id| !id.is_empty());
        Self { request_id }
    }

    /// Request id echoed in response envelopes, `"N/A"` when the runtime
    /// did not supply one.
    pub fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or("N/A")
    }
}

/// API Gateway proxy response.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

fn cors_headers() -> HashMap<String, String> {
    HashMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        (
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type,X-Amz-Date,Authorization,X-Api-Key".to_string(),
        ),
        (
            "Access-Control-Allow-Methods".to_string(),
            "GET,POST,OPTIONS".to_string(),
        ),
    ])
}

/// Parses a request body into a JSON object. String bodies are parsed as
/// JSON; anything absent, unparsable, or not an object becomes an empty map.
pub fn parse_body_object(body: Option<&Value>) -> Map<String, Value> {
    match body {
        Some(Value::Object(fields)) => fields.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StatusBody {
    pub status: String,
    pub message: String,
    pub environment: String,
    pub project: String,
    pub method: String,
    pub path: String,
    pub timestamp: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EchoBody {
    pub status: String,
    pub message: String,
    pub environment: String,
    pub project: String,
    pub received_data: Map<String, Value>,
    pub timestamp: String,
}

/// Legacy unsupported-method body: no `timestamp`, no `details`. This path
/// predates the standardized error envelope and is kept byte-compatible.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MethodNotAllowedBody {
    pub status: String,
    pub message: String,
    pub supported_methods: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HealthBody {
    pub status: String,
    pub service: String,
    pub environment: String,
}

/// Echo/status handler. Holds the environment labels read once per
/// invocation; makes no remote calls.
pub struct DemoApiService {
    pub environment: String,
    pub project: String,
}

impl DemoApiService {
    pub fn new(environment: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            project: project.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            env_or("ENVIRONMENT", "unknown"),
            env_or("PROJECT", "unknown"),
        )
    }

    pub fn handle(&self, event: &ApiGatewayEvent, meta: &RequestMeta) -> ApiGatewayResponse {
        match event.http_method.as_str() {
            "GET" => {
                let body = StatusBody {
                    status: "success".to_string(),
                    message: "Rust Lambda is running!".to_string(),
                    environment: self.environment.clone(),
                    project: self.project.clone(),
                    method: event.http_method.clone(),
                    path: event.path.clone(),
                    timestamp: meta.request_id().to_string(),
                };

                json_response(200, &body)
            }
            "POST" => {
                let received_data = parse_body_object(event.body.as_ref());
                info!("Echoing {} body fields", received_data.len());

                let body = EchoBody {
                    status: "success".to_string(),
                    message: "POST request received".to_string(),
                    environment: self.environment.clone(),
                    project: self.project.clone(),
                    received_data,
                    timestamp: meta.request_id().to_string(),
                };

                json_response(200, &body)
            }
            method => {
                warn!("Rejecting unsupported method: {}", method);

                let body = MethodNotAllowedBody {
                    status: "error".to_string(),
                    message: format!("Method {} not supported", method),
                    supported_methods: vec!["GET".to_string(), "POST".to_string()],
                };

                json_response(405, &body)
            }
        }
    }
}

/// Health-check entry point: fixed payload, content-type header only, and
/// the event is ignored entirely.
pub fn health_check_response() -> ApiGatewayResponse {
    let body = HealthBody {
        status: "healthy".to_string(),
        service: HEALTH_SERVICE_NAME.to_string(),
        environment: env_or("ENVIRONMENT", "unknown"),
    };

    ApiGatewayResponse {
        status_code: 200,
        headers: HashMap::from([(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )]),
        body: serde_json::to_string(&body)
            .unwrap_or_else(|_| "{\"status\":\"error\"}".to_string()),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn json_response(status_code: u16, body: &impl Serialize) -> ApiGatewayResponse {
    match serde_json::to_string_pretty(body) {
        Ok(body) => ApiGatewayResponse {
            status_code,
            headers: cors_headers(),
            body,
        },
        Err(err) => {
            error!("Failed to encode response body: {}", err);
            ApiGatewayResponse {
                status_code: 500,
                headers: cors_headers(),
                body: "{\n  \"status\": \"error\",\n  \"message\": \"Failed to encode response\"\n}"
                    .to_string(),
            }
        }
    }
}
