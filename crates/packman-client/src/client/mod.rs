//! Package manager client: one method per service operation

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use packman_core::error::{PackmanError, PackmanResult};
use packman_core::types::{AcHandling, DetailedResponse, ListResponse, PackId, SimpleResponse};

use crate::api::{ensure_success, parse_list_response, parse_simple_response};
use crate::parser::{parse_line_stream, ProgressListener};
use crate::transport::{
    CommandRequest, Endpoint, FilePart, ReqwestTransport, Transport, TransportConfig, CMD_BUILD, CMD_CONTENTS,
    CMD_DELETE, CMD_DRY_RUN, CMD_INSTALL, CMD_REPLICATE, CMD_REWRAP, CMD_UNINSTALL, CMD_UPLOAD, KEY_AC_HANDLING,
    KEY_AUTOSAVE, KEY_FORCE, KEY_PACKAGE, KEY_RECURSIVE, MIME_ZIP, MIN_AUTOSAVE,
};
use crate::wait::{self, WaitConfig};

/// Options for [`PackageManagerClient::install`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Also install subpackages
    pub recursive: bool,
    /// Save threshold in nodes; raised to [`MIN_AUTOSAVE`] when lower
    pub autosave: i64,
    /// Access control handling; the package's own setting applies when `None`
    pub ac_handling: Option<AcHandling>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            autosave: MIN_AUTOSAVE,
            ac_handling: None,
        }
    }
}

/// Client for a package manager service.
///
/// Package-targeted operations take `Option<&PackId>` and fail with
/// `MissingArgument` before any request is sent when it is `None`.
#[derive(Debug, Clone)]
pub struct PackageManagerClient<T: Transport = ReqwestTransport> {
    transport: T,
    wait_config: WaitConfig,
}

impl PackageManagerClient<ReqwestTransport> {
    /// Client for `http://localhost:4502` with default credentials
    pub fn new() -> PackmanResult<Self> {
        Ok(Self::with_transport(ReqwestTransport::new()?))
    }

    pub fn with_config(config: TransportConfig) -> PackmanResult<Self> {
        Ok(Self::with_transport(ReqwestTransport::with_config(config)?))
    }
}

impl<T: Transport> PackageManagerClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            wait_config: WaitConfig::default(),
        }
    }

    pub fn with_wait_config(mut self, wait_config: WaitConfig) -> Self {
        self.wait_config = wait_config;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Identify the package archive at `file`
    pub fn identify(&self, file: &Path) -> PackmanResult<PackId> {
        PackId::identify_package(file)
    }

    /// Wait until the service is live, `None` waiting indefinitely
    pub async fn wait_for_service(&self, timeout: Option<Duration>) -> PackmanResult<()> {
        wait::wait_for_service(timeout, &self.wait_config, |enforce, remaining| {
            self.transport.probe(enforce, remaining)
        })
        .await
    }

    /// Whether the package is present on the server
    pub async fn exists_on_server(&self, pack_id: Option<&PackId>) -> PackmanResult<bool> {
        let request = CommandRequest::new(Endpoint::Json, CMD_CONTENTS).for_pack_id(require(pack_id)?);
        Ok(self.execute_simple(request).await?.success)
    }

    /// Upload a package archive.
    ///
    /// The target identity is read from the archive when `pack_id` is `None`.
    pub async fn upload(&self, file: &Path, force: bool, pack_id: Option<&PackId>) -> PackmanResult<SimpleResponse> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| PackmanError::io(format!("Failed to read package {}", file.display()), e))?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.zip".to_string());

        let identified;
        let pack_id = match pack_id {
            Some(id) => id,
            None => {
                identified = PackId::identify_reader(Cursor::new(bytes.as_slice()), Some(&file_name))?;
                &identified
            }
        };
        info!("Uploading {} as {}", file.display(), pack_id);

        let request = CommandRequest::new(Endpoint::Json, CMD_UPLOAD)
            .for_pack_id(pack_id)
            .with_param(
                KEY_PACKAGE,
                FilePart {
                    file_name,
                    mime_type: MIME_ZIP.to_string(),
                    bytes: Bytes::from(bytes),
                },
            )
            .with_param(KEY_FORCE, force);
        self.execute_simple(request).await
    }

    pub async fn delete(&self, pack_id: Option<&PackId>) -> PackmanResult<SimpleResponse> {
        let request = CommandRequest::new(Endpoint::Json, CMD_DELETE).for_pack_id(require(pack_id)?);
        self.execute_simple(request).await
    }

    pub async fn replicate(&self, pack_id: Option<&PackId>) -> PackmanResult<SimpleResponse> {
        let request = CommandRequest::new(Endpoint::Json, CMD_REPLICATE).for_pack_id(require(pack_id)?);
        self.execute_simple(request).await
    }

    /// List the package contents
    pub async fn contents(
        &self,
        pack_id: Option<&PackId>,
        listener: &mut dyn ProgressListener,
    ) -> PackmanResult<DetailedResponse> {
        let request = CommandRequest::new(Endpoint::Html, CMD_CONTENTS).for_pack_id(require(pack_id)?);
        self.execute_detailed(request, listener).await
    }

    pub async fn install(
        &self,
        pack_id: Option<&PackId>,
        options: &InstallOptions,
        listener: &mut dyn ProgressListener,
    ) -> PackmanResult<DetailedResponse> {
        let mut request = CommandRequest::new(Endpoint::Html, CMD_INSTALL)
            .for_pack_id(require(pack_id)?)
            .with_param(KEY_RECURSIVE, options.recursive)
            .with_param(KEY_AUTOSAVE, options.autosave.max(MIN_AUTOSAVE));
        if let Some(ac_handling) = options.ac_handling {
            request = request.with_param(KEY_AC_HANDLING, ac_handling.as_param());
        }
        self.execute_detailed(request, listener).await
    }

    /// Simulate an install without changing the repository
    pub async fn dry_run(
        &self,
        pack_id: Option<&PackId>,
        listener: &mut dyn ProgressListener,
    ) -> PackmanResult<DetailedResponse> {
        let request = CommandRequest::new(Endpoint::Html, CMD_DRY_RUN).for_pack_id(require(pack_id)?);
        self.execute_detailed(request, listener).await
    }

    pub async fn build(
        &self,
        pack_id: Option<&PackId>,
        listener: &mut dyn ProgressListener,
    ) -> PackmanResult<DetailedResponse> {
        let request = CommandRequest::new(Endpoint::Html, CMD_BUILD).for_pack_id(require(pack_id)?);
        self.execute_detailed(request, listener).await
    }

    pub async fn rewrap(
        &self,
        pack_id: Option<&PackId>,
        listener: &mut dyn ProgressListener,
    ) -> PackmanResult<DetailedResponse> {
        let request = CommandRequest::new(Endpoint::Html, CMD_REWRAP).for_pack_id(require(pack_id)?);
        self.execute_detailed(request, listener).await
    }

    pub async fn uninstall(
        &self,
        pack_id: Option<&PackId>,
        listener: &mut dyn ProgressListener,
    ) -> PackmanResult<DetailedResponse> {
        let request = CommandRequest::new(Endpoint::Html, CMD_UNINSTALL).for_pack_id(require(pack_id)?);
        self.execute_detailed(request, listener).await
    }

    /// List packages on the server, optionally filtered by `query`
    pub async fn list(&self, query: Option<&str>) -> PackmanResult<ListResponse> {
        let response = self.transport.list(query).await?;
        parse_list_response(&response)
    }

    async fn execute_simple(&self, request: CommandRequest) -> PackmanResult<SimpleResponse> {
        let response = self.transport.execute_simple(&request).await?;
        debug!("{} answered {}", request.path(), response.status);
        parse_simple_response(&response, request.command())
    }

    async fn execute_detailed(
        &self,
        request: CommandRequest,
        listener: &mut dyn ProgressListener,
    ) -> PackmanResult<DetailedResponse> {
        let response = self.transport.execute_streaming(&request).await?;
        debug!("{} answered {}", request.path(), response.status);
        ensure_success(response.status, &response.reason, request.command())?;
        parse_line_stream(response.lines, listener).await
    }
}

fn require(pack_id: Option<&PackId>) -> PackmanResult<&PackId> {
    pack_id.ok_or(PackmanError::MissingArgument { name: "pack_id" })
}
