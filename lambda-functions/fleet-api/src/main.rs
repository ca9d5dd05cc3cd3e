use fleet_api::{
    error_response, ApiGatewayEvent, ApiGatewayResponse, FleetApiService, GameLiftFleetClient,
    RequestMeta,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

async fn function_handler(
    event: LambdaEvent<ApiGatewayEvent>,
) -> Result<ApiGatewayResponse, Error> {
    let meta = RequestMeta::from_context(&event.context);

    // The client is built before method dispatch, so an init failure wins
    // over a 405.
    let client = match GameLiftFleetClient::new().await {
        Ok(client) => client,
        Err(err) => {
            return Ok(error_response(
                500,
                "Failed to initialize GameLift client",
                Some(err.to_string()),
                &meta,
            ))
        }
    };

    Ok(FleetApiService::new(client)
        .handle(&event.payload, &meta)
        .await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(function_handler)).await
}
