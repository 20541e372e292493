//! Thin views over the gateway.
//!
//! Views print what the backend returns; they do not interpret shop data.

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use sukimoko_admin_core::{ApiRequest, ApiResponse, Gateway, GatewayError};

const PROFILE_ENDPOINT: &str = "/api/user/profile";

/// Dashboard counters: label, endpoint, field holding the value
const DASHBOARD_COUNTERS: [(&str, &str, &str); 3] = [
    ("Product types", "/api/dashboard/product-count", "totalProductTypes"),
    ("Total revenue", "/api/dashboard/total-revenue", "totalRevenue"),
    ("Revenue today", "/api/dashboard/total-revenue-today", "totalRevenueToday"),
];

#[derive(Debug, Deserialize)]
struct Profile {
    name: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

pub async fn whoami(gateway: &Gateway) -> Result<()> {
    let response = gateway.get(PROFILE_ENDPOINT).await?.error_for_status()?;
    let profile: Profile = response.json().context("Failed to parse profile")?;

    println!("{}", profile.name.as_deref().unwrap_or("Admin"));
    if let Some(email) = profile.email {
        println!("{}", email);
    }
    if let Some(role) = profile.role {
        println!("role: {}", role);
    }
    Ok(())
}

pub async fn dashboard(gateway: &Gateway) -> Result<()> {
    let requests = DASHBOARD_COUNTERS
        .iter()
        .map(|&(label, path, field)| async move { (label, field, gateway.get(path).await) });
    let results = futures::future::join_all(requests).await;

    for (label, field, result) in results {
        match result {
            Ok(response) if response.is_success() => {
                let value = response
                    .json::<Value>()
                    .ok()
                    .and_then(|body| body.get(field).cloned())
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<15} {}", label, value);
            }
            Ok(response) => println!("{:<15} unavailable (HTTP {})", label, response.status()),
            // Every counter bounced the same way; report it once
            Err(e @ GatewayError::Auth(_)) => return Err(e.into()),
            Err(e) => println!("{:<15} unavailable ({})", label, e),
        }
    }
    Ok(())
}

pub async fn request(
    gateway: &Gateway,
    method: &str,
    path: &str,
    data: Option<&str>,
    headers: &[String],
) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("Invalid HTTP method: {}", method))?;

    let mut request = ApiRequest::new(method, path);
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        request = request.header(name, value);
    }
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data must be valid JSON")?;
        request.body = Some(body);
    }

    let response = gateway.send(request).await?;
    print_response(&response);
    Ok(())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Header must look like `Name: value`, got `{}`", raw))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name in `{}`", raw))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value in `{}`", raw))?;
    Ok((name, value))
}

fn print_response(response: &ApiResponse) {
    debug!(status = %response.status(), bytes = response.body().len(), "Printing response");
    eprintln!("HTTP {}", response.status());
    match response.json::<Value>() {
        Ok(json) => match serde_json::to_string_pretty(&json) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", response.text()),
        },
        Err(_) if response.body().is_empty() => {}
        Err(_) => println!("{}", response.text()),
    }
}
