use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use transfer_types::{ErrorEnvelope, FILE_NAME_PARAM, UnsupportedVerbEnvelope, UploadReceipt};

/// Any JSON body the transfer endpoint can answer with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply {
    Receipt(UploadReceipt),
    Error(ErrorEnvelope),
    Verb(UnsupportedVerbEnvelope),
}

/// Blocking client for the upload/download endpoint.
pub(crate) struct TransferClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl TransferClient {
    pub(crate) fn new(server: &str) -> Self {
        // Error envelopes arrive with 500 too; read them instead of failing early.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint(server),
        }
    }

    fn url(&self, file_name: &str) -> String {
        format!(
            "{}?{}={}",
            self.endpoint,
            FILE_NAME_PARAM,
            urlencoding::encode(file_name)
        )
    }

    /// POST the file at `path` under `file_name`.
    pub(crate) fn upload(&self, path: &Path, file_name: &str) -> Result<UploadReceipt> {
        let mut file = File::open(path).with_context(|| format!("open {:?}", path))?;
        let url = self.url(file_name);
        tracing::debug!(url = %url, "uploading");
        let mut resp = self
            .agent
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .send(ureq::SendBody::from_reader(&mut file))
            .context("request upload")?;
        let status = resp.status();
        let body = resp
            .body_mut()
            .read_to_string()
            .context("read upload response body")?;
        parse_upload_reply(&body).with_context(|| format!("upload failed with {status}"))
    }

    /// GET `file_name` and copy its bytes into `sink`, returning the byte count.
    pub(crate) fn download<W: Write>(&self, file_name: &str, sink: &mut W) -> Result<u64> {
        let url = self.url(file_name);
        tracing::debug!(url = %url, "downloading");
        let mut resp = self.agent.get(&url).call().context("request download")?;

        let is_json = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if is_json {
            let body = resp
                .body_mut()
                .read_to_string()
                .context("read download response body")?;
            return Err(reply_error(&body));
        }
        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("download failed with {}", resp.status()));
        }

        let expected = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let mut reader = resp.body_mut().as_reader();
        let copied = io::copy(&mut reader, sink).context("read download body")?;
        if let Some(expected) = expected {
            if copied != expected {
                return Err(anyhow::anyhow!(
                    "short transfer: received {copied} of {expected} bytes"
                ));
            }
        }
        Ok(copied)
    }
}

/// Normalize a server URL so a query string can be appended.
fn endpoint(server: &str) -> String {
    let after_scheme = server.split_once("://").map_or(server, |(_, rest)| rest);
    if after_scheme.contains('/') {
        server.to_string()
    } else {
        format!("{server}/")
    }
}

fn parse_upload_reply(body: &str) -> Result<UploadReceipt> {
    match serde_json::from_str::<Reply>(body).context("decode upload response")? {
        Reply::Receipt(receipt) => Ok(receipt),
        Reply::Error(err) => Err(anyhow::anyhow!(
            "server error {}: {}",
            err.error_code,
            err.error_message
        )),
        Reply::Verb(err) => Err(anyhow::anyhow!("server error: {}", err.error)),
    }
}

fn reply_error(body: &str) -> anyhow::Error {
    match serde_json::from_str::<Reply>(body) {
        Ok(Reply::Error(err)) => {
            anyhow::anyhow!("server error {}: {}", err.error_code, err.error_message)
        }
        Ok(Reply::Verb(err)) => anyhow::anyhow!("server error: {}", err.error),
        Ok(Reply::Receipt(_)) => anyhow::anyhow!("unexpected upload receipt in download"),
        Err(e) => anyhow::anyhow!("undecodable server reply: {e}"),
    }
}
