//! gateway-cli: request access from a gateway relay without a browser.
//!
//! # Usage
//!
//! ```text
//! gateway-cli --endpoint <URL> --password <PW> [--expiration <SECS>]
//!
//! Options:
//!   -e, --endpoint <URL>      Relay URL; a bare host URL gets /authenticate/ appended
//!   -p, --password <PW>       Shared secret
//!   -x, --expiration <SECS>   Seconds until the grant lapses (0 = never)
//! ```
//!
//! `GATEWAY_ENDPOINT` and `GATEWAY_PASSWORD` can stand in for the first two
//! flags, which keeps the password out of shell history.
//!
//! Exit status is 0 when the relay answers 2xx and 1 otherwise.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use reqwest::{StatusCode, Url};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Path the relay serves the authorization form on.
const AUTHENTICATE_PATH: &str = "/authenticate/";

const USER_AGENT: &str = "gateway-cli";

#[derive(Debug, Parser)]
#[command(
    name = "gateway-cli",
    about = "Ask a gateway relay to admit this machine's address",
    version
)]
struct Cli {
    /// Relay URL, e.g. `https://gateway.example.net/authenticate/`.
    #[arg(short, long, env = "GATEWAY_ENDPOINT")]
    endpoint: String,

    /// Shared secret.
    #[arg(short, long, env = "GATEWAY_PASSWORD", hide_env_values = true)]
    password: String,

    /// Seconds until the grant lapses; 0 means never.
    #[arg(short = 'x', long)]
    expiration: Option<u32>,
}

/// The relay's answer.
#[derive(Debug)]
struct Outcome {
    status: StatusCode,
    body: String,
}

/// Parses `raw`, appending [`AUTHENTICATE_PATH`] when it names only a host.
fn resolve_endpoint(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid endpoint URL '{raw}'"))?;
    if url.path() == "/" || url.path().is_empty() {
        url.set_path(AUTHENTICATE_PATH);
    }
    Ok(url)
}

/// POSTs the authorization form.
async fn submit(
    client: &reqwest::Client,
    endpoint: Url,
    password: &str,
    expiration: u32,
) -> anyhow::Result<Outcome> {
    let expiration = expiration.to_string();
    let response = client
        .post(endpoint.clone())
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .form(&[("password", password), ("expiration", expiration.as_str())])
        .send()
        .await
        .with_context(|| format!("request to {endpoint} failed"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("failed to read the relay's response")?;
    Ok(Outcome { status, body })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let endpoint = resolve_endpoint(&cli.endpoint)?;
    let expiration = match cli.expiration {
        Some(secs) => secs,
        None => {
            warn!("no expiration given; requesting a grant that never expires");
            0
        }
    };

    let client = reqwest::Client::new();
    let outcome = submit(&client, endpoint, &cli.password, expiration).await?;

    info!(status = %outcome.status, "relay answered");
    if outcome.status.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        if !outcome.body.is_empty() {
            eprintln!("{}", outcome.body.trim_end());
        }
        Ok(ExitCode::FAILURE)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Form, Router};
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Submitted {
        password: String,
        expiration: String,
    }

    type Seen = Arc<Mutex<Option<(Submitted, String)>>>;

    async fn record(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Form(form): Form<Submitted>,
    ) -> (axum::http::StatusCode, &'static str) {
        let agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let status = if form.password == "right" {
            axum::http::StatusCode::OK
        } else {
            axum::http::StatusCode::FORBIDDEN
        };
        *seen.lock().unwrap() = Some((form, agent));
        (status, "done")
    }

    async fn stub_relay() -> (SocketAddr, Seen) {
        let seen: Seen = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route("/authenticate/", post(record))
            .with_state(Arc::clone(&seen));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "gateway-cli",
            "-e",
            "http://gw.local/",
            "-p",
            "pw",
            "-x",
            "600",
        ]);
        assert_eq!(cli.endpoint, "http://gw.local/");
        assert_eq!(cli.password, "pw");
        assert_eq!(cli.expiration, Some(600));
    }

    #[test]
    fn test_cli_expiration_is_optional() {
        let cli = Cli::parse_from(["gateway-cli", "--endpoint", "http://gw", "--password", "pw"]);
        assert_eq!(cli.expiration, None);
    }

    #[test]
    fn test_cli_rejects_negative_expiration() {
        let result = Cli::try_parse_from(["gateway-cli", "-e", "http://gw", "-p", "pw", "-x", "-5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_endpoint_appends_path_to_bare_host() {
        let url = resolve_endpoint("http://gw.local:8080").unwrap();
        assert_eq!(url.as_str(), "http://gw.local:8080/authenticate/");
    }

    #[test]
    fn test_resolve_endpoint_keeps_explicit_path() {
        let url = resolve_endpoint("https://gw.local/custom/authenticate").unwrap();
        assert_eq!(url.path(), "/custom/authenticate");
    }

    #[test]
    fn test_resolve_endpoint_rejects_garbage() {
        assert!(resolve_endpoint("not a url").is_err());
    }

    #[tokio::test]
    async fn test_submit_posts_form_with_user_agent() {
        // Arrange
        let (addr, seen) = stub_relay().await;
        let endpoint = resolve_endpoint(&format!("http://{addr}")).unwrap();

        // Act
        let outcome = submit(&reqwest::Client::new(), endpoint, "right", 0)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.body, "done");
        let (form, agent) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(
            form,
            Submitted {
                password: "right".to_string(),
                expiration: "0".to_string()
            }
        );
        assert_eq!(agent, "gateway-cli");
    }

    #[tokio::test]
    async fn test_submit_reports_rejection_status() {
        let (addr, _seen) = stub_relay().await;
        let endpoint = resolve_endpoint(&format!("http://{addr}")).unwrap();

        let outcome = submit(&reqwest::Client::new(), endpoint, "wrong", 60)
            .await
            .unwrap();

        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
    }
}
