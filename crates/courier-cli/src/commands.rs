//! Command implementations.

use std::sync::mpsc;

use clap::Args;
use courier_client::{build_http_client, Gateway};
use courier_common_config::CourierConfig;
use courier_http::{Method, Request, ResilientHttpClient, RetryPolicy};

use crate::cli::CommandContext;
use crate::error::CliError;
use crate::output::{print_output, ResponseOutput};

/// Send a GET request.
#[derive(Debug, Args)]
pub struct GetCommand {
    /// Absolute URL, or a path resolved against `http.base_url`
    pub url: String,

    /// Retry up to N attempts in total
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub retry: Option<u32>,
}

/// Send a POST request with a JSON body.
#[derive(Debug, Args)]
pub struct PostCommand {
    /// Absolute URL, or a path resolved against `http.base_url`
    pub url: String,

    /// JSON request body
    #[arg(long)]
    pub body: String,
}

/// Fetch the gateway configuration.
#[derive(Debug, Args)]
pub struct ConfigCommand {
    /// Authorization token
    #[arg(long, env = "COURIER_AUTHORIZATION", hide_env_values = true)]
    pub auth: Option<String>,

    /// Configuration URL, overriding `gateway.config_url`
    #[arg(long)]
    pub url: Option<String>,
}

/// Run `get`.
pub fn get(ctx: &CommandContext, cmd: GetCommand) -> Result<(), CliError> {
    let policy = match cmd.retry {
        Some(attempts) => RetryPolicy::retry_up_to(attempts)
            .ok_or_else(|| CliError::validation("retry", "--retry must be at least 1"))?,
        None => RetryPolicy::NoRetry,
    };
    check_target(&ctx.config, &cmd.url)?;

    let client = build_http_client(&ctx.config)?;
    let body = dispatch(&client, Request::get(&cmd.url), policy)?;
    print_output(ctx, &ResponseOutput::new(cmd.url, body))
}

/// Run `post`.
pub fn post(ctx: &CommandContext, cmd: PostCommand) -> Result<(), CliError> {
    check_target(&ctx.config, &cmd.url)?;
    serde_json::from_str::<serde_json::Value>(&cmd.body)
        .map_err(|e| CliError::validation("body", format!("--body is not valid JSON: {e}")))?;

    let client = build_http_client(&ctx.config)?;
    let request = Request::new(Method::Post, &cmd.url)
        .with_header("content-type", courier_http::headers::CONTENT_TYPE_JSON)
        .with_body(cmd.body);
    let body = dispatch(&client, request, RetryPolicy::NoRetry)?;
    print_output(ctx, &ResponseOutput::new(cmd.url, body))
}

/// Run `config`.
pub fn config(ctx: &CommandContext, cmd: ConfigCommand) -> Result<(), CliError> {
    let mut config = ctx.config.clone();
    if let Some(auth) = cmd.auth {
        config.gateway.authorization = Some(auth);
    }
    if let Some(url) = cmd.url {
        config.gateway.config_url = Some(url);
    }
    let Some(config_url) = config.gateway.config_url.clone() else {
        return Err(CliError::config(
            "no configuration URL",
            "pass --url or set gateway.config_url",
        ));
    };

    let gateway = Gateway::from_config(&config)?;
    let (tx, rx) = mpsc::channel();
    gateway.get_configuration(Box::new(move |result| {
        let _ = tx.send(result);
    }));

    let configuration = rx
        .recv()
        .map_err(|_| CliError::Other(anyhow::anyhow!("configuration load was abandoned")))?
        .map_err(|e| CliError::network(&config_url, e))?;

    print_output(
        ctx,
        &ResponseOutput::new(config_url, configuration.to_json().to_string()),
    )
}

/// Send `request` and block until its outcome is delivered.
fn dispatch(
    client: &ResilientHttpClient,
    request: Request,
    policy: RetryPolicy,
) -> Result<String, CliError> {
    let url = request.url().to_string();
    let (tx, rx) = mpsc::channel();

    tracing::debug!(url = %url, max_attempts = policy.max_attempts(), "dispatching");
    client.send_request(
        request,
        policy,
        Some(Box::new(move |outcome| {
            let _ = tx.send(outcome);
        })),
    );

    rx.recv()
        .map_err(|_| CliError::Other(anyhow::anyhow!("request was abandoned before completing")))?
        .map_err(|e| CliError::network(url, e))
}

/// Reject targets the transport could never reach.
fn check_target(config: &CourierConfig, target: &str) -> Result<(), CliError> {
    if target.starts_with("http://") || target.starts_with("https://") {
        return url::Url::parse(target)
            .map(|_| ())
            .map_err(|e| CliError::validation("url", format!("invalid URL '{target}': {e}")));
    }
    if !target.starts_with('/') {
        return Err(CliError::validation(
            "url",
            format!("'{target}' is neither an absolute URL nor a path"),
        ));
    }
    if config.http.base_url.is_none() {
        return Err(CliError::config(
            format!("relative path '{target}' needs a base URL"),
            "set http.base_url or COURIER_BASE_URL",
        ));
    }
    Ok(())
}
