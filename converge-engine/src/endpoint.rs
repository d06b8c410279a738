//! Private endpoints of a data federation.

use tracing::{debug, error, info, warn};

use crate::client::CloudClient;
use crate::condition::{ConditionPublisher, ConditionType};
use crate::identity::Diff;
use crate::resource::PrivateEndpoint;
use crate::workflow::{Reason, WorkflowResult};

/// Create missing endpoints, then delete undeclared ones.
///
/// Stops at the first failing call. The endpoint condition mirrors the result.
pub async fn ensure_private_endpoints<C, P>(
    client: &C,
    project_id: &str,
    desired: &[PrivateEndpoint],
    conditions: &mut P,
) -> WorkflowResult
where
    C: CloudClient + ?Sized,
    P: ConditionPublisher + ?Sized,
{
    let result = sync_private_endpoints(client, project_id, desired).await;
    conditions.set_from_result(ConditionType::PrivateEndpointReady, &result);
    result
}

async fn sync_private_endpoints<C>(
    client: &C,
    project_id: &str,
    desired: &[PrivateEndpoint],
) -> WorkflowResult
where
    C: CloudClient + ?Sized,
{
    let remote = match client.list_private_endpoints(project_id).await {
        Ok(remote) => remote,
        Err(e) => {
            error!(project_id, "failed to list private endpoints: {}", e);
            return WorkflowResult::terminate(Reason::PrivateEndpointsNotReady, e.to_string());
        }
    };

    let diff = Diff::compute(desired, &remote);
    debug!(
        project_id,
        create = diff.to_create.len(),
        delete = diff.to_delete.len(),
        "private endpoint diff"
    );

    for endpoint in diff.to_create {
        if let Err(e) = client.create_private_endpoint(project_id, endpoint).await {
            error!(
                project_id,
                endpoint_id = %endpoint.endpoint_id,
                "failed to create private endpoint: {}",
                e
            );
            return WorkflowResult::terminate(Reason::PrivateEndpointsNotReady, e.to_string());
        }
        info!(project_id, endpoint_id = %endpoint.endpoint_id, "Created private endpoint");
    }

    for endpoint in diff.to_delete {
        // An empty id would address the whole collection
        if endpoint.endpoint_id.is_empty() {
            warn!(project_id, "Ignoring listed private endpoint without an id");
            continue;
        }
        if let Err(e) = client
            .delete_private_endpoint(project_id, &endpoint.endpoint_id)
            .await
        {
            error!(
                project_id,
                endpoint_id = %endpoint.endpoint_id,
                "failed to delete private endpoint: {}",
                e
            );
            return WorkflowResult::terminate(Reason::PrivateEndpointsNotReady, e.to_string());
        }
        info!(project_id, endpoint_id = %endpoint.endpoint_id, "Deleted private endpoint");
    }

    WorkflowResult::ok()
}
