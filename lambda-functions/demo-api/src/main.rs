use demo_api::{ApiGatewayEvent, ApiGatewayResponse, DemoApiService, RequestMeta};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

async fn function_handler(
    event: LambdaEvent<ApiGatewayEvent>,
) -> Result<ApiGatewayResponse, Error> {
    let meta = RequestMeta::from_context(&event.context);
    let service = DemoApiService::from_env();

    Ok(service.handle(&event.payload, &meta))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(function_handler)).await
}
