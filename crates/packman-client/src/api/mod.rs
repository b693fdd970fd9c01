//! Package manager JSON wire types

use serde::{Deserialize, Serialize};

use packman_core::error::{PackmanError, PackmanResult};
use packman_core::types::{ListResponse, ListResult, SimpleResponse};

use crate::transport::RawResponse;

/// Body of the compact JSON endpoint. Absent fields read as `false`/empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimpleResponseBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub path: String,
}

impl From<SimpleResponseBody> for SimpleResponse {
    fn from(body: SimpleResponseBody) -> Self {
        SimpleResponse {
            success: body.success,
            message: body.msg,
            path: body.path,
        }
    }
}

/// Body of the package listing endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListResponseBody {
    #[serde(default)]
    pub results: Vec<ListEntry>,
    #[serde(default)]
    pub total: Option<usize>,
}

/// One listed package
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub download_name: String,
    pub size: Option<u64>,
    pub created: Option<i64>,
    pub last_unpacked: Option<i64>,
}

impl From<ListEntry> for ListResult {
    fn from(entry: ListEntry) -> Self {
        ListResult {
            path: entry.path,
            group: entry.group,
            name: entry.name,
            version: entry.version,
            download_name: entry.download_name,
            size: entry.size,
            created: entry.created,
            last_unpacked: entry.last_unpacked,
        }
    }
}

impl From<ListResponseBody> for ListResponse {
    fn from(body: ListResponseBody) -> Self {
        let total = body.total.unwrap_or(body.results.len());
        ListResponse {
            results: body.results.into_iter().map(ListResult::from).collect(),
            total,
        }
    }
}

/// Check the status of a response, then decode its JSON body.
///
/// 400 maps to `UnsupportedCommand`, any other non-2xx to `HttpStatus`.
pub fn parse_simple_response(response: &RawResponse, command: Option<&str>) -> PackmanResult<SimpleResponse> {
    ensure_success(response.status, &response.reason, command)?;
    let body: SimpleResponseBody = decode_json(response)?;
    Ok(body.into())
}

/// Check the status of a listing response, then decode it
pub fn parse_list_response(response: &RawResponse) -> PackmanResult<ListResponse> {
    ensure_success(response.status, &response.reason, None)?;
    let body: ListResponseBody = decode_json(response)?;
    Ok(body.into())
}

pub(crate) fn ensure_success(status: u16, reason: &str, command: Option<&str>) -> PackmanResult<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(PackmanError::from_status(status, reason, command))
    }
}

fn decode_json<T: for<'de> Deserialize<'de>>(response: &RawResponse) -> PackmanResult<T> {
    serde_json::from_str(&response.text()).map_err(|e| PackmanError::JsonParse {
        message: e.to_string(),
    })
}
