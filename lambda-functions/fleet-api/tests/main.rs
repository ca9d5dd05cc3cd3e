use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use fleet_api::{
    ApiGatewayEvent, ApiGatewayResponse, FleetApiService, FleetClient, FleetPage, FleetRecord,
    RemoteError, RequestMeta,
};
use serde_json::{json, Value};

/// In-memory stand-in for the GameLift-backed client. Counts remote calls so
/// tests can assert that validation failures never reach the service.
#[derive(Default)]
struct FakeFleetClient {
    fleets: Vec<String>,
    next_token: Option<String>,
    records: HashMap<String, FleetRecord>,
    failure: Option<RemoteError>,
    calls: AtomicUsize,
}

impl FakeFleetClient {
    fn with_fleets(fleets: &[&str]) -> Self {
        Self {
            fleets: fleets.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    fn failing(failure: RemoteError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FleetClient for FakeFleetClient {
    async fn list_fleets(&self) -> Result<FleetPage, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        Ok(FleetPage {
            fleet_ids: self.fleets.clone(),
            next_token: self.next_token.clone(),
        })
    }

    async fn describe_fleet_attributes(
        &self,
        fleet_id: &str,
    ) -> Result<Vec<FleetRecord>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        Ok(self.records.get(fleet_id).cloned().into_iter().collect())
    }
}

fn event(value: Value) -> ApiGatewayEvent {
    serde_json::from_value(value).unwrap()
}

fn meta() -> RequestMeta {
    RequestMeta::new("test-request-id-12345")
}

fn body_json(response: &ApiGatewayResponse) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

fn sample_record() -> FleetRecord {
    FleetRecord {
        fleet_id: Some("fleet-123".to_string()),
        fleet_arn: Some("arn:aws:gamelift:us-east-1::fleet/fleet-123".to_string()),
        fleet_type: Some("ON_DEMAND".to_string()),
        instance_type: Some("c5.large".to_string()),
        build_id: Some("build-1".to_string()),
        status: Some("ACTIVE".to_string()),
        description: Some("demo fleet".to_string()),
        name: Some("demo".to_string()),
        creation_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        termination_time: None,
    }
}

#[tokio::test]
async fn test_get_lists_fleets() {
    let service = FleetApiService::new(FakeFleetClient::with_fleets(&["fleet-1", "fleet-2"]));

    let response = service.handle(&event(json!({"httpMethod": "GET"})), &meta()).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.headers["Content-Type"], "application/json");
    assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");

    let body = body_json(&response);
    assert_eq!(body["status"], "success");
    assert_eq!(body["operation"], "list_fleets");
    assert_eq!(body["fleet_count"], 2);
    assert_eq!(body["fleets"], json!(["fleet-1", "fleet-2"]));
    assert_eq!(body["next_token"], Value::Null);
    assert_eq!(body["timestamp"], "test-request-id-12345");
    assert_eq!(
        body["fleet_count"].as_u64().unwrap() as usize,
        body["fleets"].as_array().unwrap().len()
    );
}

#[tokio::test]
async fn test_missing_method_defaults_to_get() {
    let service = FleetApiService::new(FakeFleetClient::with_fleets(&["fleet-1"]));

    let response = service.handle(&event(json!({})), &meta()).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(body_json(&response)["operation"], "list_fleets");
}

#[tokio::test]
async fn test_post_defaults_to_list_fleets() {
    let service = FleetApiService::new(FakeFleetClient::with_fleets(&["fleet-1"]));

    let response = service
        .handle(&event(json!({"httpMethod": "POST", "body": "{}"})), &meta())
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(body_json(&response)["operation"], "list_fleets");
}

#[tokio::test]
async fn test_post_with_unparsable_body_lists_fleets() {
    let service = FleetApiService::new(FakeFleetClient::with_fleets(&[]));

    let response = service
        .handle(
            &event(json!({"httpMethod": "POST", "body": "this is not json"})),
            &meta(),
        )
        .await;

    assert_eq!(response.status_code, 200);

    let body = body_json(&response);
    assert_eq!(body["operation"], "list_fleets");
    assert_eq!(body["fleet_count"], 0);
}

#[tokio::test]
async fn test_list_fleets_passes_next_token_through() {
    let client = FakeFleetClient {
        fleets: vec!["fleet-1".to_string()],
        next_token: Some("token-abc".to_string()),
        ..FakeFleetClient::default()
    };

    let response = FleetApiService::new(client)
        .handle(&event(json!({"httpMethod": "GET"})), &meta())
        .await;

    assert_eq!(body_json(&response)["next_token"], "token-abc");
}

#[tokio::test]
async fn test_describe_fleet_without_fleet_id_is_rejected_locally() {
    let client = FakeFleetClient::default();
    let service = FleetApiService::new(client);

    let response = service
        .handle(
            &event(json!({
                "httpMethod": "POST",
                "body": "{\"action\": \"describe_fleet\"}"
            })),
            &meta(),
        )
        .await;

    assert_eq!(response.status_code, 400);

    let body = body_json(&response);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Missing required parameter: fleet_id");

    // The remote service must never be called for a request that fails
    // local validation.
    assert_eq!(service.client.call_count(), 0);
}

#[tokio::test]
async fn test_describe_fleet_not_found() {
    let service = FleetApiService::new(FakeFleetClient::default());

    let response = service
        .handle(
            &event(json!({
                "httpMethod": "POST",
                "body": "{\"action\": \"describe_fleet\", \"fleet_id\": \"fleet-123\"}"
            })),
            &meta(),
        )
        .await;

    assert_eq!(response.status_code, 404);

    let body = body_json(&response);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Fleet not found: fleet-123");
}

#[tokio::test]
async fn test_describe_fleet_success() {
    let client = FakeFleetClient {
        records: HashMap::from([("fleet-123".to_string(), sample_record())]),
        ..FakeFleetClient::default()
    };

    let response = FleetApiService::new(client)
        .handle(
            &event(json!({
                "httpMethod": "POST",
                "body": "{\"action\": \"describe_fleet\", \"fleet_id\": \"fleet-123\"}"
            })),
            &meta(),
        )
        .await;

    assert_eq!(response.status_code, 200);

    let body = body_json(&response);
    assert_eq!(body["status"], "success");
    assert_eq!(body["operation"], "describe_fleet");
    assert_eq!(body["timestamp"], "test-request-id-12345");

    let fleet = &body["fleet"];
    assert_eq!(fleet["FleetId"], "fleet-123");
    assert_eq!(fleet["EC2InstanceType"], "c5.large");
    assert_eq!(fleet["Status"], "ACTIVE");
    assert_eq!(fleet["CreationTime"], "2024-05-01T12:00:00+00:00");
    assert_eq!(fleet["TerminationTime"], Value::Null);
}

#[tokio::test]
async fn test_structured_body_is_accepted() {
    let client = FakeFleetClient {
        records: HashMap::from([("fleet-123".to_string(), sample_record())]),
        ..FakeFleetClient::default()
    };

    let response = FleetApiService::new(client)
        .handle(
            &event(json!({
                "httpMethod": "POST",
                "body": {"action": "describe_fleet", "fleet_id": "fleet-123"}
            })),
            &meta(),
        )
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(body_json(&response)["operation"], "describe_fleet");
}

#[tokio::test]
async fn test_unknown_action_is_rejected() {
    let service = FleetApiService::new(FakeFleetClient::default());

    let response = service
        .handle(
            &event(json!({
                "httpMethod": "POST",
                "body": "{\"action\": \"unknown_action\"}"
            })),
            &meta(),
        )
        .await;

    assert_eq!(response.status_code, 400);

    let body = body_json(&response);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Unknown action: unknown_action");
}

#[tokio::test]
async fn test_unsupported_method() {
    let service = FleetApiService::new(FakeFleetClient::default());

    let response = service
        .handle(&event(json!({"httpMethod": "DELETE"})), &meta())
        .await;

    assert_eq!(response.status_code, 405);

    let body = body_json(&response);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Method DELETE not supported");
    assert_eq!(body["timestamp"], "test-request-id-12345");
}

#[tokio::test]
async fn test_remote_api_error_is_normalized() {
    let service = FleetApiService::new(FakeFleetClient::failing(RemoteError::Api {
        code: "UnauthorizedException".to_string(),
        message: "not authorized to perform gamelift:ListFleets".to_string(),
    }));

    let response = service
        .handle(&event(json!({"httpMethod": "GET"})), &meta())
        .await;

    assert_eq!(response.status_code, 500);

    let body = body_json(&response);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "GameLift API error: UnauthorizedException");
    assert_eq!(body["details"], "not authorized to perform gamelift:ListFleets");
}

#[tokio::test]
async fn test_transport_error_while_listing() {
    let service = FleetApiService::new(FakeFleetClient::failing(RemoteError::Other(
        "connection reset by peer".to_string(),
    )));

    let response = service
        .handle(&event(json!({"httpMethod": "GET"})), &meta())
        .await;

    assert_eq!(response.status_code, 500);

    let body = body_json(&response);
    assert_eq!(body["message"], "Unexpected error listing fleets");
    assert_eq!(body["details"], "connection reset by peer");
}

#[tokio::test]
async fn test_transport_error_while_describing() {
    let service = FleetApiService::new(FakeFleetClient::failing(RemoteError::Other(
        "timed out".to_string(),
    )));

    let response = service
        .handle(
            &event(json!({
                "httpMethod": "POST",
                "body": "{\"action\": \"describe_fleet\", \"fleet_id\": \"fleet-9\"}"
            })),
            &meta(),
        )
        .await;

    assert_eq!(response.status_code, 500);
    assert_eq!(
        body_json(&response)["message"],
        "Unexpected error describing fleet"
    );
}

#[tokio::test]
async fn test_every_response_round_trips_as_json() {
    let service = FleetApiService::new(FakeFleetClient::with_fleets(&["fleet-1"]));

    for request in [
        json!({"httpMethod": "GET"}),
        json!({"httpMethod": "POST", "body": "{}"}),
        json!({"httpMethod": "POST", "body": "{\"action\": \"describe_fleet\"}"}),
        json!({"httpMethod": "DELETE"}),
    ] {
        let response = service.handle(&event(request), &meta()).await;
        let body = body_json(&response);
        assert!(body["status"] == "success" || body["status"] == "error");
    }
}
