//! Transport capability and command descriptors.
//!
//! A [`Transport`] executes [`CommandRequest`]s against the package manager
//! service and reports raw results; decoding them into responses is the
//! client's job. [`ReqwestTransport`] is the HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use futures::stream::{self, BoxStream, StreamExt};

use packman_core::error::{PackmanError, PackmanResult};
use packman_core::types::PackId;

use crate::wait::Availability;

pub mod http;

pub use self::http::{ReqwestTransport, TransportConfig};

pub const HTML_SERVICE_PATH: &str = "/crx/packmgr/service/console.html";
pub const JSON_SERVICE_PATH: &str = "/crx/packmgr/service/exec.json";
pub const LIST_PATH: &str = "/crx/packmgr/list.jsp";
pub const LOGIN_PATH: &str = "/crx/j_security_check";

pub const KEY_CMD: &str = "cmd";
pub const KEY_FORCE: &str = "force";
pub const KEY_PACKAGE: &str = "package";
pub const KEY_RECURSIVE: &str = "recursive";
pub const KEY_AUTOSAVE: &str = "autosave";
pub const KEY_AC_HANDLING: &str = "acHandling";
pub const KEY_QUERY: &str = "q";

pub const CMD_CONTENTS: &str = "contents";
pub const CMD_INSTALL: &str = "install";
pub const CMD_UNINSTALL: &str = "uninstall";
pub const CMD_UPLOAD: &str = "upload";
pub const CMD_BUILD: &str = "build";
pub const CMD_REWRAP: &str = "rewrap";
pub const CMD_DRY_RUN: &str = "dryrun";
pub const CMD_DELETE: &str = "delete";
pub const CMD_REPLICATE: &str = "replicate";

/// Smallest autosave threshold the client will send
pub const MIN_AUTOSAVE: i64 = 1024;

pub const MIME_ZIP: &str = "application/zip";

/// Service endpoint a command is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Compact JSON responses
    Json,
    /// Streaming HTML console transcript
    Html,
}

impl Endpoint {
    pub fn service_path(&self) -> &'static str {
        match self {
            Endpoint::Json => JSON_SERVICE_PATH,
            Endpoint::Html => HTML_SERVICE_PATH,
        }
    }
}

/// File attached to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Value of one command parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Bool(bool),
    Int(i64),
    File(FilePart),
}

impl ParamValue {
    /// Form representation of a non-file value
    pub fn as_text(&self) -> Option<String> {
        match self {
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Bool(b) => Some(b.to_string()),
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::File(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<FilePart> for ParamValue {
    fn from(value: FilePart) -> Self {
        ParamValue::File(value)
    }
}

/// One service command: endpoint, optional target package and ordered parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub endpoint: Endpoint,
    pub pack_id: Option<PackId>,
    pub params: Vec<(String, ParamValue)>,
}

impl CommandRequest {
    /// Start a request for `command` on `endpoint`
    pub fn new(endpoint: Endpoint, command: &str) -> Self {
        Self {
            endpoint,
            pack_id: None,
            params: vec![(KEY_CMD.to_string(), ParamValue::from(command))],
        }
    }

    pub fn for_pack_id(mut self, pack_id: &PackId) -> Self {
        self.pack_id = Some(pack_id.clone());
        self
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    /// Value of the `cmd` parameter
    pub fn command(&self) -> Option<&str> {
        self.params.iter().find_map(|(name, value)| match value {
            ParamValue::Text(s) if name == KEY_CMD => Some(s.as_str()),
            _ => None,
        })
    }

    /// Path below the base URL: the service path, plus `<installationPath>.zip`
    /// when the request targets a package.
    pub fn path(&self) -> String {
        match &self.pack_id {
            Some(id) => format!("{}{}.zip", self.endpoint.service_path(), id.installation_path()),
            None => self.endpoint.service_path().to_string(),
        }
    }

    /// Non-file parameters in insertion order
    pub fn text_params(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter_map(|(name, value)| value.as_text().map(|v| (name.clone(), v)))
            .collect()
    }

    /// File parameters in insertion order
    pub fn file_params(&self) -> impl Iterator<Item = (&str, &FilePart)> {
        self.params.iter().filter_map(|(name, value)| match value {
            ParamValue::File(part) => Some((name.as_str(), part)),
            _ => None,
        })
    }

    pub fn has_files(&self) -> bool {
        self.file_params().next().is_some()
    }
}

/// Fully buffered service response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    /// Charset declared by the `Content-Type` header
    pub charset: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    /// Body decoded with the declared charset
    pub fn text(&self) -> String {
        let (text, _) = encoding_for(self.charset.as_deref()).decode_without_bom_handling(&self.body);
        text.into_owned()
    }
}

/// Service response whose body is read line by line as it arrives
pub struct StreamingResponse {
    pub status: u16,
    pub reason: String,
    pub lines: BoxStream<'static, PackmanResult<String>>,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Capability to talk to a package manager service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one lightweight availability check.
    ///
    /// When `enforce_timeout` is set the check must not outlast `remaining`.
    async fn probe(&self, enforce_timeout: bool, remaining: Duration) -> PackmanResult<Availability>;

    /// Execute a command and buffer the whole response
    async fn execute_simple(&self, request: &CommandRequest) -> PackmanResult<RawResponse>;

    /// Execute a command and expose the response body as decoded lines
    async fn execute_streaming(&self, request: &CommandRequest) -> PackmanResult<StreamingResponse>;

    /// Fetch the package listing, optionally filtered by `query`
    async fn list(&self, query: Option<&str>) -> PackmanResult<RawResponse>;
}

/// Extract the `charset` parameter of a `Content-Type` header value
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// Encoding for a charset label, UTF-8 when absent or unknown
pub fn encoding_for(charset: Option<&str>) -> &'static Encoding {
    charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8)
}

/// Fail a body stream with `ServiceTimeout` when no chunk arrives within `idle`.
///
/// The stream ends after the timeout error; a body that keeps delivering
/// chunks may run for any length of time.
pub fn with_idle_timeout(
    body: BoxStream<'static, PackmanResult<Bytes>>,
    idle: Duration,
) -> BoxStream<'static, PackmanResult<Bytes>> {
    stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => Some((
                Err(PackmanError::ServiceTimeout {
                    message: format!("no response data for {}ms", idle.as_millis()),
                }),
                None,
            )),
        }
    })
    .boxed()
}

struct LineReader {
    body: BoxStream<'static, PackmanResult<Bytes>>,
    buffer: Vec<u8>,
    exhausted: bool,
    encoding: &'static Encoding,
}

impl LineReader {
    fn decode(&self, mut line: Vec<u8>) -> String {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let (text, _) = self.encoding.decode_without_bom_handling(&line);
        text.into_owned()
    }
}

/// Split a chunked body into lines and decode each with `encoding`.
///
/// Lines are split on `\n` before decoding, so `encoding` must be ASCII
/// compatible. A trailing line without a newline is still yielded. A body
/// error ends the stream after it is yielded.
pub fn decode_lines(
    body: BoxStream<'static, PackmanResult<Bytes>>,
    encoding: &'static Encoding,
) -> BoxStream<'static, PackmanResult<String>> {
    let reader = LineReader {
        body,
        buffer: Vec::new(),
        exhausted: false,
        encoding,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(pos) = reader.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = reader.buffer.drain(..=pos).collect();
                line.pop();
                let text = reader.decode(line);
                return Some((Ok(text), reader));
            }

            if reader.exhausted {
                if reader.buffer.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut reader.buffer);
                let text = reader.decode(line);
                return Some((Ok(text), reader));
            }

            match reader.body.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    reader.exhausted = true;
                    reader.buffer.clear();
                    return Some((Err(e), reader));
                }
                None => reader.exhausted = true,
            }
        }
    })
    .boxed()
}
