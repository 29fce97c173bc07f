//! Submission workflow driver
//!
//! Drives one item through create -> metadata -> upload -> license -> submit
//! on an authenticated session. The steps are strictly linear; a failed item
//! is abandoned and a restart always begins with a new workspace item.

use std::path::Path;

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::Deserialize;
use serde_json::Value;

use super::http::ApiResponse;
use super::session::DspaceSession;
use crate::app::models::{
    MetadataPatch, PatchOp, PatchOperation, SubmissionReceipt, WorkspaceItem, WorkspaceState,
};
use crate::constants::{dspace, http};
use crate::errors::{AuthError, MetadataError, SubmissionError, SubmissionResult};

const JSON: &str = "application/json";

#[derive(Debug, Deserialize)]
struct IdBody {
    id: Option<u64>,
}

/// Map session errors to submission errors for a given step
fn at_step(step: &'static str) -> impl FnOnce(AuthError) -> SubmissionError {
    move |err| match err {
        AuthError::Http(source) => SubmissionError::Transport { step, source },
        other => SubmissionError::Auth(other),
    }
}

fn require_state(
    item: &WorkspaceItem,
    expected: WorkspaceState,
    step: &'static str,
) -> SubmissionResult<()> {
    if item.state() == expected {
        Ok(())
    } else {
        Err(SubmissionError::InvalidTransition {
            workspace_id: item.id,
            state: item.state(),
            step,
        })
    }
}

fn upload_form(data: &Bytes, file_name: &str, mime: &str) -> Form {
    let part = || {
        Part::stream_with_length(Body::from(data.clone()), data.len() as u64)
            .file_name(file_name.to_string())
    };
    Form::new()
        .part("file", part().mime_str(mime).unwrap_or_else(|_| part()))
        .text("name", file_name.to_string())
}

/// Guess a bitstream content type from its leading bytes
pub fn detect_mime(data: &[u8]) -> &'static str {
    infer::get(data)
        .map(|kind| kind.mime_type())
        .unwrap_or(http::OCTET_STREAM)
}

/// Drives the five-step workflow on a borrowed session
pub struct SubmissionDriver<'s> {
    session: &'s mut DspaceSession,
}

impl<'s> SubmissionDriver<'s> {
    pub fn new(session: &'s mut DspaceSession) -> Self {
        Self { session }
    }

    fn workspace_path(id: u64) -> String {
        format!("{}/{}", dspace::WORKSPACE_ITEMS_ENDPOINT, id)
    }

    /// Creates an empty workspace item in the owning collection
    pub async fn create_workspace_item(
        &mut self,
        collection_uuid: &str,
    ) -> SubmissionResult<WorkspaceItem> {
        let mut url = self.session.endpoint(dspace::WORKSPACE_ITEMS_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("owningCollection", collection_uuid);

        let response = self
            .session
            .send(|client| {
                client
                    .post(url.clone())
                    .header(ACCEPT, JSON)
                    .header(CONTENT_TYPE, JSON)
            })
            .await
            .map_err(at_step("create"))?;

        if !response.is_success() {
            return Err(SubmissionError::WorkspaceCreateFailed {
                status: response.status_code(),
                body: response.body_preview(),
            });
        }

        let id = response
            .json::<IdBody>()
            .ok()
            .and_then(|body| body.id)
            .ok_or_else(|| SubmissionError::InvalidResponse {
                step: "create",
                reason: format!("no workspace id in body: {}", response.body_preview()),
            })?;

        tracing::info!("Created workspace item {} in {}", id, collection_uuid);
        Ok(WorkspaceItem::new(id, collection_uuid))
    }

    /// Applies the metadata patch
    pub async fn add_metadata(
        &mut self,
        item: &mut WorkspaceItem,
        patch: &MetadataPatch,
    ) -> SubmissionResult<()> {
        require_state(item, WorkspaceState::Created, "attach metadata")?;
        if patch.is_empty() {
            return Err(MetadataError::EmptyPatch.into());
        }

        let body = serde_json::to_vec(patch).map_err(|e| SubmissionError::InvalidResponse {
            step: "metadata",
            reason: e.to_string(),
        })?;
        let response = self.patch_workspace(item.id, &body, "metadata").await?;

        if response.status_code() != 200 {
            return Err(SubmissionError::MetadataPatchFailed {
                status: response.status_code(),
                body: response.body_preview(),
            });
        }

        tracing::debug!(
            "Attached {} metadata field(s) to workspace {}",
            patch.len(),
            item.id
        );
        item.advance(WorkspaceState::MetadataAttached);
        Ok(())
    }

    /// Uploads the content file and checks the workspace lists it
    ///
    /// The `sections/upload` endpoint is tried first; on any failure the legacy
    /// workspace endpoint is used once. Returns the bitstream name.
    pub async fn upload_bitstream(
        &mut self,
        item: &mut WorkspaceItem,
        content_path: &Path,
    ) -> SubmissionResult<String> {
        require_state(item, WorkspaceState::MetadataAttached, "upload a file")?;

        let data = Bytes::from(tokio::fs::read(content_path).await?);
        let file_name = content_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bitstream".to_string());
        let mime = detect_mime(&data);

        let preferred = self
            .session
            .endpoint(&format!("{}/sections/upload", Self::workspace_path(item.id)))?;
        let legacy = self.session.endpoint(&Self::workspace_path(item.id))?;

        let build = |url: &url::Url| {
            let url = url.clone();
            let data = &data;
            let file_name = &file_name;
            move |client: &reqwest::Client| {
                client
                    .post(url.clone())
                    .header(ACCEPT, JSON)
                    .multipart(upload_form(data, file_name, mime))
            }
        };

        let uploaded = match self.session.send(build(&preferred)).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                tracing::warn!(
                    "sections/upload returned HTTP {} for workspace {}; falling back",
                    response.status,
                    item.id
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    "sections/upload failed for workspace {}: {}; falling back",
                    item.id,
                    e
                );
                false
            }
        };

        if !uploaded {
            let response = self
                .session
                .send(build(&legacy))
                .await
                .map_err(at_step("upload"))?;
            if !response.is_success() {
                return Err(SubmissionError::UploadFailed {
                    status: response.status_code(),
                    body: response.body_preview(),
                });
            }
            tracing::debug!("Uploaded {} via legacy endpoint", file_name);
        }

        let files = self
            .fetch_workspace(item.id)
            .await?
            .and_then(|ws| ws.pointer("/sections/upload/files").cloned())
            .and_then(|files| files.as_array().map(Vec::len))
            .unwrap_or(0);

        if files == 0 {
            return Err(SubmissionError::UploadNotRegistered {
                workspace_id: item.id,
            });
        }

        tracing::info!(
            "Uploaded {} ({}) to workspace {}",
            file_name,
            mime,
            item.id
        );
        item.advance(WorkspaceState::FileAttached);
        Ok(file_name)
    }

    /// Grants the deposit license
    ///
    /// Tries `add`, then `replace`; if neither is accepted, the item state
    /// decides: success only if the license is already granted.
    pub async fn accept_license(&mut self, item: &mut WorkspaceItem) -> SubmissionResult<()> {
        require_state(item, WorkspaceState::FileAttached, "accept the license")?;

        let mut last_error = None;
        for op in [PatchOp::Add, PatchOp::Replace] {
            let body = serde_json::to_vec(&[PatchOperation::license_granted(op)]).map_err(|e| {
                SubmissionError::InvalidResponse {
                    step: "license",
                    reason: e.to_string(),
                }
            })?;

            match self.patch_workspace(item.id, &body, "license").await {
                Ok(response) if response.status_code() == 200 => {
                    tracing::debug!("License granted for workspace {} (op={})", item.id, op);
                    item.advance(WorkspaceState::LicenseAccepted);
                    return Ok(());
                }
                Ok(response) => {
                    tracing::warn!(
                        "License op={} returned HTTP {} for workspace {}",
                        op,
                        response.status,
                        item.id
                    );
                    last_error = Some(SubmissionError::LicenseFailed {
                        status: response.status_code(),
                        body: response.body_preview(),
                    });
                }
                Err(e) => {
                    tracing::warn!("License op={} failed for workspace {}: {}", op, item.id, e);
                    last_error = Some(e);
                }
            }
        }

        let granted = match self.fetch_workspace(item.id).await {
            Ok(Some(ws)) => ws.pointer("/sections/license/granted") == Some(&Value::Bool(true)),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Could not read license state of {}: {}", item.id, e);
                false
            }
        };

        if granted {
            tracing::info!("License already granted in workspace {}", item.id);
            item.advance(WorkspaceState::LicenseAccepted);
            return Ok(());
        }

        Err(last_error.unwrap_or(SubmissionError::InvalidResponse {
            step: "license",
            reason: "license not granted".to_string(),
        }))
    }

    /// Hands the workspace item to the workflow engine
    ///
    /// Returns the workflow item id if the server reported one.
    pub async fn submit(&mut self, item: &mut WorkspaceItem) -> SubmissionResult<Option<u64>> {
        require_state(item, WorkspaceState::LicenseAccepted, "submit")?;

        let url = self.session.endpoint(dspace::WORKFLOW_ITEMS_ENDPOINT)?;
        let workspace_uri = self
            .session
            .endpoint(&Self::workspace_path(item.id))?
            .to_string();

        let response = self
            .session
            .send(|client| {
                client
                    .post(url.clone())
                    .header(ACCEPT, JSON)
                    .header(CONTENT_TYPE, http::URI_LIST)
                    .body(workspace_uri.clone())
            })
            .await
            .map_err(at_step("submit"))?;

        if !matches!(response.status_code(), 200 | 201 | 202) {
            return Err(SubmissionError::SubmitFailed {
                status: response.status_code(),
                body: response.body_preview(),
            });
        }

        let workflow_id = response.json::<IdBody>().ok().and_then(|body| body.id);
        tracing::info!(
            "Workspace {} submitted to workflow{}",
            item.id,
            workflow_id
                .map(|id| format!(" as workflow item {}", id))
                .unwrap_or_default()
        );
        item.advance(WorkspaceState::Submitted);
        Ok(workflow_id)
    }

    /// Runs all five steps for one item
    ///
    /// An empty patch is rejected before anything is created on the server.
    pub async fn submit_item(
        &mut self,
        collection_uuid: &str,
        patch: &MetadataPatch,
        content_path: &Path,
    ) -> SubmissionResult<SubmissionReceipt> {
        if patch.is_empty() {
            return Err(MetadataError::EmptyPatch.into());
        }
        if !content_path.is_file() {
            return Err(SubmissionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("content file not found: {}", content_path.display()),
            )));
        }

        let mut item = self.create_workspace_item(collection_uuid).await?;
        self.add_metadata(&mut item, patch).await?;
        let bitstream_name = self.upload_bitstream(&mut item, content_path).await?;
        self.accept_license(&mut item).await?;
        let workflow_item_id = self.submit(&mut item).await?;

        Ok(SubmissionReceipt {
            workspace_id: item.id,
            workflow_item_id,
            bitstream_name,
        })
    }

    /// Reads a workspace item; a 404 means there is nothing to read
    pub async fn fetch_workspace(&mut self, id: u64) -> SubmissionResult<Option<Value>> {
        let url = self.session.endpoint(&Self::workspace_path(id))?;
        let response = self
            .session
            .send(|client| client.get(url.clone()).header(ACCEPT, JSON))
            .await
            .map_err(at_step("read workspace"))?;

        if response.status_code() == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(SubmissionError::InvalidResponse {
                step: "read workspace",
                reason: format!("HTTP {} - {}", response.status, response.body_preview()),
            });
        }

        response
            .json()
            .map(Some)
            .map_err(|e| SubmissionError::InvalidResponse {
                step: "read workspace",
                reason: e.to_string(),
            })
    }

    async fn patch_workspace(
        &mut self,
        id: u64,
        body: &[u8],
        step: &'static str,
    ) -> SubmissionResult<ApiResponse> {
        let url = self.session.endpoint(&Self::workspace_path(id))?;
        self.session
            .send(|client| {
                client
                    .patch(url.clone())
                    .header(ACCEPT, JSON)
                    .header(CONTENT_TYPE, http::JSON_PATCH)
                    .body(body.to_vec())
            })
            .await
            .map_err(at_step(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::ClientConfig;

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3"), "application/pdf");
        assert_eq!(detect_mime(b"plain words"), http::OCTET_STREAM);
    }

    #[test]
    fn test_at_step_maps_auth_errors() {
        let err = at_step("upload")(AuthError::NoTokenFound);
        assert!(matches!(err, SubmissionError::Auth(AuthError::NoTokenFound)));
        assert_eq!(err.step(), "auth");
    }

    #[test]
    fn test_require_state() {
        let item = WorkspaceItem::new(3, "c");
        assert!(require_state(&item, WorkspaceState::Created, "attach metadata").is_ok());

        let err = require_state(&item, WorkspaceState::LicenseAccepted, "submit").unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::InvalidTransition {
                workspace_id: 3,
                state: WorkspaceState::Created,
                step: "submit"
            }
        ));
    }

    #[tokio::test]
    async fn test_out_of_order_step_is_refused_without_io() {
        let mut session = DspaceSession::new(&ClientConfig::default()).unwrap();
        let mut driver = SubmissionDriver::new(&mut session);
        let mut item = WorkspaceItem::new(9, "c");

        let err = driver.submit(&mut item).await.unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidTransition { .. }));
        assert_eq!(item.state(), WorkspaceState::Created);
    }

    #[tokio::test]
    async fn test_empty_patch_rejected_before_create() {
        let mut session = DspaceSession::new(&ClientConfig::default()).unwrap();
        let mut driver = SubmissionDriver::new(&mut session);

        let err = driver
            .submit_item("c", &MetadataPatch::new(), Path::new("/nonexistent.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Metadata(MetadataError::EmptyPatch)
        ));
    }

    #[test]
    fn test_upload_form_builds() {
        let form = upload_form(&Bytes::from_static(b"%PDF-1.4"), "doc.pdf", "application/pdf");
        assert!(!form.boundary().is_empty());
    }
}
