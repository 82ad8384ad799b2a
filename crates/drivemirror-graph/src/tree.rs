//! Remote tree service backed by the Microsoft Graph API
//!
//! Implements [`ITreeService`] over drive items, the server-side copy
//! endpoint and sharing permissions. Wire DTOs stay private to this
//! module; everything crossing the port boundary is a domain type.
//! Pagination cursors and the copy monitor handle carry absolute Graph
//! URLs (`@odata.nextLink`, the copy `Location`) that the core treats as
//! opaque.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use drivemirror_core::domain::{
    AccountInfo, ChildPage, ConflictBehavior, CopyDestination, CopySource, CopyStarted, DriveId,
    Email, Node, NodeId, NodeKind, OperationHandle, OperationStatus, PageCursor, Permission,
    PermissionId, PermissionPage, PermissionRole,
};
use drivemirror_core::ports::ITreeService;

use crate::client::{decode, response_error, retry_after, GraphClient};

/// Children and permission pages are requested at this size
const PAGE_SIZE: u32 = 200;

/// Graph-backed tree service bound to one account session and one drive
///
/// The session identity comes from the client's token store; the drive is
/// discovered at [`connect`](Self::connect) time. Cross-drive copies
/// still go through this instance - the copy endpoint addresses the
/// source by its own drive id.
pub struct GraphTreeService {
    client: GraphClient,
    drive_id: DriveId,
}

impl GraphTreeService {
    /// Connects the session to the signed-in account's default drive
    pub async fn connect(client: GraphClient) -> Result<Self> {
        let response = client.send(Method::GET, "/me/drive", None).await?;
        let drive: DriveDto = decode("default drive lookup", response).await?;
        let drive_id = DriveId::new(drive.id)?;
        info!(drive = %drive_id, "connected to drive");
        Ok(Self { client, drive_id })
    }

    /// Binds to a known drive without the discovery round-trip
    pub fn with_drive_id(client: GraphClient, drive_id: DriveId) -> Self {
        Self { client, drive_id }
    }

    fn item_path(&self, id: &NodeId) -> String {
        format!("/drives/{}/items/{}", self.drive_id, id)
    }

    /// Builds the colon-form address for a slash-separated root-relative
    /// path, percent-encoding each segment
    fn path_address(&self, path: &str) -> Result<String> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut url = url::Url::parse(self.client.base_url()).context("invalid Graph base URL")?;
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| anyhow::anyhow!("Graph base URL cannot carry paths"))?;
            parts.pop_if_empty().push("drives").push(self.drive_id.as_str());
            match segments.split_last() {
                None => {
                    parts.push("root");
                }
                Some((last, init)) => {
                    parts.push("root:");
                    parts.extend(init.iter().copied());
                    parts.push(&format!("{last}:"));
                }
            }
        }
        Ok(url.into())
    }
}

#[async_trait::async_trait]
impl ITreeService for GraphTreeService {
    fn drive_id(&self) -> &DriveId {
        &self.drive_id
    }

    async fn get_root(&self) -> Result<Node> {
        let path = format!("/drives/{}/root", self.drive_id);
        let response = self.client.send(Method::GET, &path, None).await?;
        let item: DriveItemDto = decode("root lookup", response).await?;
        item.into_node()
    }

    async fn get_node(&self, id: &NodeId) -> Result<Node> {
        let response = self
            .client
            .send(Method::GET, &self.item_path(id), None)
            .await?;
        let item: DriveItemDto = decode("item lookup", response).await?;
        item.into_node()
    }

    async fn get_node_by_path(&self, path: &str) -> Result<Option<Node>> {
        let url = self.path_address(path)?;
        let response = self.client.send_url(Method::GET, &url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let item: DriveItemDto = decode("path lookup", response).await?;
        Ok(Some(item.into_node()?))
    }

    async fn list_children(
        &self,
        parent: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> Result<ChildPage> {
        let response = match cursor {
            Some(next) => self.client.send_url(Method::GET, next.as_str(), None).await?,
            None => {
                let path = format!("{}/children?$top={PAGE_SIZE}", self.item_path(parent));
                self.client.send(Method::GET, &path, None).await?
            }
        };
        let page: CollectionDto<DriveItemDto> = decode("children listing", response).await?;
        let mut nodes = Vec::with_capacity(page.value.len());
        for item in page.value {
            nodes.push(item.into_node()?);
        }
        let next = page.next_link.map(PageCursor::new).transpose()?;
        Ok(ChildPage { nodes, next })
    }

    async fn create_folder(&self, parent: &NodeId, name: &str) -> Result<Node> {
        let body = serde_json::json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });
        let path = format!("{}/children", self.item_path(parent));
        debug!(parent = %parent, name, "creating folder");
        let response = self.client.send(Method::POST, &path, Some(&body)).await?;
        let item: DriveItemDto = decode("folder creation", response).await?;
        item.into_node()
    }

    async fn copy_node(
        &self,
        source: &CopySource,
        destination: &CopyDestination,
        name: &str,
        on_conflict: ConflictBehavior,
    ) -> Result<CopyStarted> {
        // Issued through this (destination) session but addressed to the
        // source item's own drive, which is what makes the cross-account
        // case work once the pre-flight has granted read access.
        let path = format!(
            "/drives/{}/items/{}/copy?@microsoft.graph.conflictBehavior={}",
            source.drive_id, source.node_id, on_conflict
        );
        let body = serde_json::json!({
            "name": name,
            "parentReference": {
                "driveId": destination.drive_id.as_str(),
                "id": destination.parent_id.as_str(),
            },
        });
        debug!(source = %source.node_id, dest = %destination.parent_id, name, "starting copy");
        let response = self.client.send(Method::POST, &path, Some(&body)).await?;
        match response.status() {
            StatusCode::ACCEPTED => {
                let monitor = response
                    .headers()
                    .get("Location")
                    .and_then(|value| value.to_str().ok())
                    .context("copy accepted without a monitor URL")?;
                Ok(CopyStarted::Accepted(OperationHandle::new(monitor)))
            }
            status if status.is_success() => {
                let item: DriveItemDto = decode("copy", response).await?;
                Ok(CopyStarted::Completed(item.into_node()?))
            }
            _ => Err(response_error("copy request", response).await),
        }
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let response = self.client.send_url(Method::GET, handle.as_str(), None).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(%status, "monitor poll rejected the current token");
            return Ok(OperationStatus::AuthorizationExpired);
        }
        let pace = retry_after(&response);
        let job: AsyncJobStatusDto = decode("operation monitor", response).await?;
        job.into_status(pace)
    }

    async fn list_permissions(
        &self,
        node: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> Result<PermissionPage> {
        let response = match cursor {
            Some(next) => self.client.send_url(Method::GET, next.as_str(), None).await?,
            None => {
                let path = format!("{}/permissions?$top={PAGE_SIZE}", self.item_path(node));
                self.client.send(Method::GET, &path, None).await?
            }
        };
        let page: CollectionDto<PermissionDto> = decode("permission listing", response).await?;
        let mut permissions = Vec::with_capacity(page.value.len());
        for dto in page.value {
            permissions.push(dto.into_permission()?);
        }
        let next = page.next_link.map(PageCursor::new).transpose()?;
        Ok(PermissionPage { permissions, next })
    }

    async fn grant_permission(
        &self,
        node: &NodeId,
        recipient: &Email,
        role: PermissionRole,
    ) -> Result<Vec<Permission>> {
        let body = serde_json::json!({
            "recipients": [ { "email": recipient.as_str() } ],
            "requireSignIn": true,
            "sendInvitation": false,
            "roles": [ role.as_str() ],
        });
        let path = format!("{}/invite", self.item_path(node));
        let response = self.client.send(Method::POST, &path, Some(&body)).await?;
        let page: CollectionDto<PermissionDto> = decode("permission grant", response).await?;
        let mut granted = Vec::with_capacity(page.value.len());
        for dto in page.value {
            granted.push(dto.into_permission()?);
        }
        anyhow::ensure!(
            !granted.is_empty(),
            "granting {} on {node} to {recipient} returned no permissions",
            role.as_str()
        );
        info!(node = %node, recipient = %recipient, role = role.as_str(), "granted permission");
        Ok(granted)
    }

    async fn revoke_permission(&self, node: &NodeId, permission: &PermissionId) -> Result<()> {
        let path = format!("{}/permissions/{}", self.item_path(node), permission);
        let response = self.client.send(Method::DELETE, &path, None).await?;
        if !response.status().is_success() {
            return Err(response_error("permission revocation", response).await);
        }
        debug!(node = %node, permission = %permission, "revoked permission");
        Ok(())
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        let response = self.client.send(Method::GET, "/me", None).await?;
        let profile: ProfileDto = decode("profile lookup", response).await?;
        profile.into_account_info()
    }
}

// ============================================================================
// Wire DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
struct DriveDto {
    id: String,
}

/// A drive item as Graph serializes it; facet presence stands in for an
/// item-type discriminator
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItemDto {
    id: String,
    name: String,
    size: Option<u64>,
    folder: Option<serde_json::Value>,
    parent_reference: Option<ParentReferenceDto>,
}

#[derive(Debug, Deserialize)]
struct ParentReferenceDto {
    id: Option<String>,
}

impl DriveItemDto {
    fn into_node(self) -> Result<Node> {
        let kind = if self.folder.is_some() {
            NodeKind::Folder
        } else {
            NodeKind::File
        };
        Ok(Node {
            id: NodeId::new(self.id)?,
            name: self.name,
            kind,
            size: self.size,
            parent_id: self
                .parent_reference
                .and_then(|parent| parent.id)
                .map(NodeId::new)
                .transpose()?,
        })
    }
}

/// Generic OData collection page
#[derive(Debug, Deserialize)]
struct CollectionDto<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Status resource served by the copy monitor URL
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AsyncJobStatusDto {
    status: Option<String>,
    status_description: Option<String>,
    percentage_complete: Option<f64>,
    resource_id: Option<String>,
}

impl AsyncJobStatusDto {
    fn into_status(self, pace: Option<Duration>) -> Result<OperationStatus> {
        let state = self.status.as_deref().unwrap_or("inProgress");
        match state {
            "completed" => Ok(OperationStatus::Completed {
                resource_id: self.resource_id.map(NodeId::new).transpose()?,
            }),
            "failed" | "deleteFailed" | "cancelled" => {
                let message = match self.status_description {
                    Some(description) => description,
                    None => state.to_string(),
                };
                Ok(OperationStatus::Failed { message })
            }
            _ => Ok(OperationStatus::InProgress {
                percent: self.percentage_complete,
                retry_after: pace,
            }),
        }
    }
}

/// A sharing permission with both the modern (`grantedToV2`) and legacy
/// (`grantedTo`) grantee facets
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionDto {
    id: String,
    roles: Option<Vec<String>>,
    granted_to_v2: Option<IdentitySetDto>,
    granted_to: Option<IdentitySetDto>,
    granted_to_identities_v2: Option<Vec<IdentitySetDto>>,
    granted_to_identities: Option<Vec<IdentitySetDto>>,
    invitation: Option<InvitationDto>,
}

#[derive(Debug, Deserialize)]
struct IdentitySetDto {
    user: Option<IdentityDto>,
}

#[derive(Debug, Deserialize)]
struct IdentityDto {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvitationDto {
    email: Option<String>,
}

impl PermissionDto {
    /// Maps to the domain record, collecting grantee emails from every
    /// facet the service may populate
    ///
    /// Identities without a usable email (sharing links, applications)
    /// are skipped rather than rejected.
    fn into_permission(self) -> Result<Permission> {
        let mut grantees: Vec<Email> = Vec::new();
        let mut collect = |raw: Option<String>| {
            if let Some(address) = raw {
                if let Ok(email) = Email::new(address) {
                    if !grantees.contains(&email) {
                        grantees.push(email);
                    }
                }
            }
        };
        collect(self.granted_to_v2.and_then(|set| set.user.and_then(|u| u.email)));
        collect(self.granted_to.and_then(|set| set.user.and_then(|u| u.email)));
        for set in self.granted_to_identities_v2.into_iter().flatten() {
            collect(set.user.and_then(|u| u.email));
        }
        for set in self.granted_to_identities.into_iter().flatten() {
            collect(set.user.and_then(|u| u.email));
        }
        collect(self.invitation.and_then(|invite| invite.email));
        Ok(Permission {
            id: PermissionId::new(self.id)?,
            roles: self.roles.unwrap_or_default(),
            grantees,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDto {
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
}

impl ProfileDto {
    fn into_account_info(self) -> Result<AccountInfo> {
        let address = self
            .mail
            .or(self.user_principal_name)
            .context("account profile has no email address")?;
        Ok(AccountInfo {
            display_name: self.display_name.unwrap_or_else(|| "Unknown".to_string()),
            email: Email::new(address)?,
        })
    }
}
