use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use oscbridge_core::{FactStore, Parameters};
use oscbridge_rules::params::{sanitize, ParamKind, ParameterDefinition};
use oscbridge_rules::{Configured, Task, TaskError, ValidationError};

pub const KIND: &str = "http_request";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
struct RequestParams {
    url: String,
    method: reqwest::Method,
    body: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

/// Fires a single HTTP request.
#[derive(Debug)]
pub struct HttpRequestTask {
    debug: bool,
    client: reqwest::Client,
    params: Configured<RequestParams>,
}

impl HttpRequestTask {
    pub fn new(client: reqwest::Client, debug: bool) -> Self {
        Self {
            debug,
            client,
            params: Configured::default(),
        }
    }

    fn parse(parameters: &Parameters) -> Result<RequestParams, ValidationError> {
        let param_error = |source| ValidationError::Parameter {
            path: KIND.to_string(),
            source,
        };
        let sanitized = sanitize(
            parameters,
            &[
                ParameterDefinition::required("url", &[ParamKind::String]),
                ParameterDefinition::optional("body", &[ParamKind::String], Some(json!(""))),
                ParameterDefinition::optional(
                    "timeout_secs",
                    &[ParamKind::Int],
                    Some(json!(DEFAULT_TIMEOUT_SECS)),
                ),
                ParameterDefinition::optional("method", &[ParamKind::String], Some(json!("GET")))
                    .with_pattern("(?i)^(GET|POST)$"),
                ParameterDefinition::optional("headers", &[ParamKind::List], None),
            ],
        )
        .map_err(param_error)?;

        let method = match sanitized.string("method").map_err(param_error)?.to_uppercase().as_str() {
            "POST" => reqwest::Method::POST,
            _ => reqwest::Method::GET,
        };

        let headers = sanitized
            .string_list("headers")
            .map_err(param_error)?
            .iter()
            .enumerate()
            .map(|(i, header)| {
                header
                    .split_once(':')
                    .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                    .ok_or_else(|| ValidationError::Invalid {
                        path: KIND.to_string(),
                        reason: format!("failed to parse header[{}]: '{}' invalid header definition", i, header),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RequestParams {
            url: sanitized.string("url").map_err(param_error)?,
            method,
            body: sanitized.string("body").map_err(param_error)?,
            headers,
            timeout: Duration::from_secs(sanitized.uint("timeout_secs").map_err(param_error)?),
        })
    }
}

#[async_trait]
impl Task for HttpRequestTask {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn set_parameters(&mut self, parameters: &Parameters) {
        self.params.set(Self::parse(parameters));
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.params.validate(KIND)
    }

    async fn execute(&self, _store: &FactStore) -> Result<(), TaskError> {
        let params = self.params.get()?;
        info!(task = KIND, method = %params.method, url = %params.url, "Executing task");

        let mut request = self
            .client
            .request(params.method.clone(), &params.url)
            .timeout(params.timeout)
            .body(params.body.clone());
        for (name, value) in &params.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TaskError::Timeout {
                    secs: params.timeout.as_secs(),
                }
            } else {
                TaskError::Other(anyhow::Error::new(e).context("error sending request"))
            }
        })?;

        let status = response.status();
        let body = response.text().await.context("error reading response")?;
        if self.debug {
            debug!(task = KIND, %status, %body, "Response received");
        }
        if !status.is_success() {
            return Err(TaskError::Other(anyhow::anyhow!(
                "{} {} answered {}",
                params.method,
                params.url,
                status
            )));
        }
        Ok(())
    }
}
