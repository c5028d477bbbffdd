use std::sync::Arc;

use anyhow::anyhow;
use day2ops_core::logging::{log_config_sources, log_startup_info};
use day2ops_core::{init_logging, AppConfig, AppConfigTrait, LoggingConfig};
use day2ops_lambda::{AwsSecretsStore, Handler};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let logging = LoggingConfig::from_app_config(&config)
        .with_service("day2ops-lambda", env!("CARGO_PKG_VERSION"));
    init_logging(&logging).map_err(|e| anyhow!("failed to initialise logging: {}", e))?;
    log_startup_info(&logging);
    log_config_sources(&config);

    // The SDK client is built once per cold start and reused by invocations
    let sdk_config = aws_config::from_env().load().await;
    let store = match config.secrets_endpoint.as_deref() {
        Some(endpoint) => AwsSecretsStore::with_endpoint(&sdk_config, endpoint),
        None => AwsSecretsStore::new(&sdk_config),
    };
    let handler = Arc::new(Handler::new(store, config));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, lambda_runtime::Error>(handler.handle(event.payload).await) }
    }))
    .await
    .map_err(|e| anyhow!("lambda runtime exited: {}", e))
}
