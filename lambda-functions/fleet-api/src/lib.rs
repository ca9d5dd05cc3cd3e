use std::collections::HashMap;
use std::fmt;

use aws_config::BehaviorVersion;
use aws_sdk_gamelift::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use bon::Builder;
use chrono::{DateTime, Utc};
use lambda_runtime::{Context, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

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

/// Operation selector carried in a POST body.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ActionDirective {
    #[serde(default = "ActionDirective::default_action")]
    pub action: String,
    #[serde(default)]
    pub fleet_id: Option<String>,
}

impl Default for ActionDirective {
    fn default() -> Self {
        Self {
            action: Self::default_action(),
            fleet_id: None,
        }
    }
}

impl ActionDirective {
    fn default_action() -> String {
        "list_fleets".to_string()
    }

    /// Decodes the directive from a raw request body. A missing or
    /// unparsable body selects the default action.
    pub fn from_body(body: Option<&Value>) -> Self {
        serde_json::from_value(Value::Object(parse_body_object(body))).unwrap_or_default()
    }
}

/// Failure reported while calling the fleet management service.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The service rejected the call and reported an error code.
    Api { code: String, message: String },
    /// The call never produced a service response (construction, dispatch,
    /// timeout).
    Other(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { code, message } => write!(f, "{}: {}", code, message),
            Self::Other(details) => write!(f, "{}", details),
        }
    }
}

impl RemoteError {
    fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
        R: fmt::Debug + Send + Sync + 'static,
    {
        if matches!(err, SdkError::ServiceError(_)) {
            return Self::Api {
                code: err.code().unwrap_or("Unknown").to_string(),
                message: err.message().unwrap_or("no error message").to_string(),
            };
        }
        Self::Other(DisplayErrorContext(err).to_string())
    }
}

/// One page of fleet ids from the management service, in the order the
/// service returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetPage {
    pub fleet_ids: Vec<String>,
    pub next_token: Option<String>,
}

/// One fleet-attributes record as reported by the management service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetRecord {
    pub fleet_id: Option<String>,
    pub fleet_arn: Option<String>,
    pub fleet_type: Option<String>,
    pub instance_type: Option<String>,
    pub build_id: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub termination_time: Option<DateTime<Utc>>,
}

/// Capability for reading fleet state from the management service. Injected
/// into the handler so tests can substitute a fake.
#[allow(async_fn_in_trait)]
pub trait FleetClient {
    async fn list_fleets(&self) -> Result<FleetPage, RemoteError>;

    async fn describe_fleet_attributes(
        &self,
        fleet_id: &str,
    ) -> Result<Vec<FleetRecord>, RemoteError>;
}

/// GameLift-backed [`FleetClient`]. Constructed fresh for every invocation;
/// nothing is reused across calls.
pub struct GameLiftFleetClient {
    client: aws_sdk_gamelift::Client,
}

impl GameLiftFleetClient {
    pub async fn new() -> Result<Self, Error> {
        let region =
            std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;

        Ok(Self {
            client: aws_sdk_gamelift::Client::new(&config),
        })
    }
}

impl FleetClient for GameLiftFleetClient {
    async fn list_fleets(&self) -> Result<FleetPage, RemoteError> {
        let result = self
            .client
            .list_fleets()
            .send()
            .await
            .map_err(RemoteError::from_sdk)?;

        Ok(FleetPage {
            fleet_ids: result.fleet_ids.unwrap_or_default(),
            next_token: result.next_token,
        })
    }

    async fn describe_fleet_attributes(
        &self,
        fleet_id: &str,
    ) -> Result<Vec<FleetRecord>, RemoteError> {
        let result = self
            .client
            .describe_fleet_attributes()
            .fleet_ids(fleet_id)
            .send()
            .await
            .map_err(RemoteError::from_sdk)?;

        Ok(result
            .fleet_attributes
            .unwrap_or_default()
            .into_iter()
            .map(fleet_record_from_attributes)
            .collect())
    }
}

fn fleet_record_from_attributes(
    attributes: aws_sdk_gamelift::types::FleetAttributes,
) -> FleetRecord {
    FleetRecord {
        fleet_id: attributes.fleet_id,
        fleet_arn: attributes.fleet_arn,
        fleet_type: attributes.fleet_type.map(|t| t.as_str().to_string()),
        instance_type: attributes.instance_type.map(|t| t.as_str().to_string()),
        build_id: attributes.build_id,
        status: attributes.status.map(|s| s.as_str().to_string()),
        description: attributes.description,
        name: attributes.name,
        creation_time: attributes.creation_time.and_then(to_utc),
        termination_time: attributes.termination_time.and_then(to_utc),
    }
}

fn to_utc(timestamp: aws_sdk_gamelift::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

/// Fleet projection serialized with the management service's own key names,
/// absent values rendered as `null`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FleetView {
    pub fleet_id: Option<String>,
    pub fleet_arn: Option<String>,
    pub fleet_type: Option<String>,
    #[serde(rename = "EC2InstanceType")]
    pub ec2_instance_type: Option<String>,
    pub build_id: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub creation_time: Option<String>,
    pub termination_time: Option<String>,
}

impl From<FleetRecord> for FleetView {
    fn from(record: FleetRecord) -> Self {
        Self {
            fleet_id: record.fleet_id,
            fleet_arn: record.fleet_arn,
            fleet_type: record.fleet_type,
            ec2_instance_type: record.instance_type,
            build_id: record.build_id,
            status: record.status,
            description: record.description,
            name: record.name,
            creation_time: record.creation_time.map(|t| t.to_rfc3339()),
            termination_time: record.termination_time.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Builder, Serialize, Debug)]
pub struct ListFleetsBody {
    #[builder(default = String::from("success"))]
    pub status: String,
    #[builder(default = String::from("list_fleets"))]
    pub operation: String,
    pub fleet_count: usize,
    pub fleets: Vec<String>,
    pub next_token: Option<String>,
    pub timestamp: String,
}

#[derive(Builder, Serialize, Debug)]
pub struct DescribeFleetBody {
    #[builder(default = String::from("success"))]
    pub status: String,
    #[builder(default = String::from("describe_fleet"))]
    pub operation: String,
    pub fleet: FleetView,
    pub timestamp: String,
}

#[derive(Builder, Serialize, Debug)]
pub struct ErrorBody {
    #[builder(default = String::from("error"))]
    pub status: String,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Standardized error response shared by every fleet handler failure path.
pub fn error_response(
    status_code: u16,
    message: &str,
    details: Option<String>,
    meta: &RequestMeta,
) -> ApiGatewayResponse {
    let body = ErrorBody::builder()
        .message(message.to_string())
        .timestamp(meta.request_id().to_string())
        .maybe_details(details)
        .build();

    json_response(status_code, &body)
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

/// HTTP-facing dispatch for fleet read operations.
pub struct FleetApiService<C> {
    pub client: C,
}

impl<C: FleetClient> FleetApiService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn handle(
        &self,
        event: &ApiGatewayEvent,
        meta: &RequestMeta,
    ) -> ApiGatewayResponse {
        match event.http_method.as_str() {
            "GET" => self.handle_list_fleets(meta).await,
            "POST" => {
                let directive = ActionDirective::from_body(event.body.as_ref());

                match directive.action.as_str() {
                    "list_fleets" => self.handle_list_fleets(meta).await,
                    "describe_fleet" => match directive.fleet_id {
                        Some(fleet_id) => self.handle_describe_fleet(&fleet_id, meta).await,
                        None => error_response(
                            400,
                            "Missing required parameter: fleet_id",
                            None,
                            meta,
                        ),
                    },
                    action => {
                        warn!("Rejecting unknown action: {}", action);
                        error_response(400, &format!("Unknown action: {}", action), None, meta)
                    }
                }
            }
            method => error_response(
                405,
                &format!("Method {} not supported", method),
                None,
                meta,
            ),
        }
    }

    async fn handle_list_fleets(&self, meta: &RequestMeta) -> ApiGatewayResponse {
        match self.client.list_fleets().await {
            Ok(page) => {
                info!("Listed {} fleets", page.fleet_ids.len());

                let body = ListFleetsBody::builder()
                    .fleet_count(page.fleet_ids.len())
                    .fleets(page.fleet_ids)
                    .maybe_next_token(page.next_token)
                    .timestamp(meta.request_id().to_string())
                    .build();

                json_response(200, &body)
            }
            Err(err) => remote_error_response("listing fleets", err, meta),
        }
    }

    async fn handle_describe_fleet(
        &self,
        fleet_id: &str,
        meta: &RequestMeta,
    ) -> ApiGatewayResponse {
        match self.client.describe_fleet_attributes(fleet_id).await {
            Ok(records) => match records.into_iter().next() {
                Some(record) => {
                    let body = DescribeFleetBody::builder()
                        .fleet(FleetView::from(record))
                        .timestamp(meta.request_id().to_string())
                        .build();

                    json_response(200, &body)
                }
                None => error_response(
                    404,
                    &format!("Fleet not found: {}", fleet_id),
                    None,
                    meta,
                ),
            },
            Err(err) => remote_error_response("describing fleet", err, meta),
        }
    }
}

fn remote_error_response(
    operation: &str,
    err: RemoteError,
    meta: &RequestMeta,
) -> ApiGatewayResponse {
    match err {
        RemoteError::Api { code, message } => {
            error!("GameLift API error while {}: {} ({})", operation, code, message);
            error_response(
                500,
                &format!("GameLift API error: {}", code),
                Some(message),
                meta,
            )
        }
        RemoteError::Other(details) => {
            error!("Unexpected error while {}: {}", operation, details);
            error_response(
                500,
                &format!("Unexpected error {}", operation),
                Some(details),
                meta,
            )
        }
    }
}
