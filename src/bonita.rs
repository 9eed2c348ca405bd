//! Bonita BPM REST client.
//!
//! Logs in through `loginservice`, keeps the session cookie and echoes the
//! `X-Bonita-API-Token` cookie as a header on every API call. Instantiating a
//! process posts the mapped document as the contract inputs.

use std::{fmt, time::Duration};

use log::{debug, trace, warn};
use reqwest::{
    StatusCode,
    blocking::{Client, Response},
};
use serde::Deserialize;
use thiserror::Error;

use crate::document::Document;

const API_TOKEN: &str = "X-Bonita-API-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A deployed process definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub activation_state: String,
    #[serde(default)]
    pub deployment_date: String,
}

impl fmt::Display for ProcessDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartedCase {
    #[serde(deserialize_with = "deserialize_case_id")]
    case_id: u64,
}

fn deserialize_case_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(id) => Ok(id),
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

/// Error body Bonita returns on rejected API calls.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    explanations: Vec<String>,
}

impl ApiErrorBody {
    fn describe(&self) -> String {
        if self.explanations.is_empty() {
            self.message.clone()
        } else {
            format!("{} {}", self.message, self.explanations.join("; "))
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Process definition not found: {0}")]
    DefinitionNotFound(String),
    #[error("Process is not enabled: {0}")]
    ActivationRejected(String),
    #[error("Process execution failed: {0}")]
    ExecutionRejected(String),
    #[error("Contract violated: {0}")]
    ContractViolated(String),
    #[error("Unexpected response {status}: {message}")]
    Unexpected { status: u16, message: String },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot login with the given credentials for '{0}'")]
    InvalidCredentials(String),
    #[error("Cannot connect to the server at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected response {status} from {url}")]
    Unexpected { url: String, status: u16 },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Anything able to start a process instance from a document.
pub trait ProcessSink {
    /// Starts one instance and returns the case id.
    fn start_process(
        &mut self,
        process: &ProcessDefinition,
        document: &Document,
    ) -> Result<u64, SubmitError>;
}

/// Classifies a rejected instantiation from its status and error body.
fn classify_rejection(status: StatusCode, body: &str) -> SubmitError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).unwrap_or_default();
    let message = if parsed.message.is_empty() {
        body.trim().to_string()
    } else {
        parsed.describe()
    };
    let exception = parsed.exception.as_str();
    if exception.contains("ContractViolation") {
        SubmitError::ContractViolated(message)
    } else if exception.contains("ProcessActivation") {
        SubmitError::ActivationRejected(message)
    } else if exception.contains("ProcessDefinitionNotFound") || status == StatusCode::NOT_FOUND {
        SubmitError::DefinitionNotFound(message)
    } else if exception.contains("ProcessExecution") || status.is_server_error() {
        SubmitError::ExecutionRejected(message)
    } else if status == StatusCode::BAD_REQUEST {
        SubmitError::ContractViolated(message)
    } else {
        SubmitError::Unexpected {
            status: status.as_u16(),
            message,
        }
    }
}

/// An authenticated session with one Bonita application.
pub struct BonitaClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl BonitaClient {
    /// `server_url` such as `http://localhost:8080`, `application` such as `bonita`.
    pub fn new(server_url: &str, application: &str) -> Result<Self, SessionError> {
        let client = Client::builder()
            .user_agent(format!("bonita-importfile/{}", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url(server_url, application),
            api_token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let url = format!("{}/loginservice", self.base_url);
        debug!("Logging into {url} as '{username}'");
        let response = self
            .client
            .post(&url)
            .form(&[
                ("username", username),
                ("password", password),
                ("redirect", "false"),
            ])
            .send()
            .map_err(|source| SessionError::Unreachable {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SessionError::InvalidCredentials(username.to_string()));
        }
        if !status.is_success() {
            return Err(SessionError::Unexpected {
                url,
                status: status.as_u16(),
            });
        }
        self.api_token = response
            .cookies()
            .find(|cookie| cookie.name() == API_TOKEN)
            .map(|cookie| cookie.value().to_string());
        if self.api_token.is_none() {
            debug!("Server did not issue an {API_TOKEN} cookie");
        }
        Ok(())
    }

    /// The most recently deployed processes, newest first.
    pub fn list_processes(&self, limit: usize) -> Result<Vec<ProcessDefinition>, SessionError> {
        let url = format!("{}/API/bpm/process", self.base_url);
        let count = limit.to_string();
        let response = self
            .authorized(self.client.get(&url))
            .query(&[("p", "0"), ("c", count.as_str()), ("o", "deploymentDate DESC")])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Unexpected {
                url,
                status: status.as_u16(),
            });
        }
        let processes: Vec<ProcessDefinition> = response.json()?;
        debug!("Retrieved {} process definition(s)", processes.len());
        Ok(processes)
    }

    pub fn logout(&self) {
        let url = format!("{}/logoutservice", self.base_url);
        match self
            .authorized(self.client.get(&url))
            .query(&[("redirect", "false")])
            .send()
        {
            Ok(response) => trace!("Logout answered {}", response.status()),
            Err(err) => warn!("Logout failed: {err}"),
        }
    }

    fn authorized(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.api_token {
            Some(token) => request.header(API_TOKEN, token),
            None => request,
        }
    }

    fn read_started_case(response: Response) -> Result<u64, SubmitError> {
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(classify_rejection(status, &body));
        }
        let started: StartedCase =
            serde_json::from_str(&body).map_err(|err| SubmitError::Unexpected {
                status: status.as_u16(),
                message: format!("Unreadable instantiation response: {err}"),
            })?;
        Ok(started.case_id)
    }
}

impl ProcessSink for BonitaClient {
    fn start_process(
        &mut self,
        process: &ProcessDefinition,
        document: &Document,
    ) -> Result<u64, SubmitError> {
        let url = format!("{}/API/bpm/process/{}/instantiation", self.base_url, process.id);
        let response = self.authorized(self.client.post(&url)).json(document).send()?;
        Self::read_started_case(response)
    }
}

fn base_url(server_url: &str, application: &str) -> String {
    let server = server_url.trim().trim_end_matches('/');
    let application = application.trim().trim_matches('/');
    if application.is_empty() {
        server.to_string()
    } else {
        format!("{server}/{application}")
    }
}
