//! Private endpoint passes against the in-memory fake.

use converge_engine::condition::{ConditionType, Conditions};
use converge_engine::endpoint::ensure_private_endpoints;
use converge_engine::resource::PrivateEndpoint;
use converge_engine::test_util::{FakeCloud, Operation};
use converge_engine::workflow::Reason;

const PROJECT_ID: &str = "p-1";

fn endpoint(id: &str) -> PrivateEndpoint {
    PrivateEndpoint {
        endpoint_id: id.to_string(),
        provider: "AWS".to_string(),
        endpoint_type: "DATA_LAKE".to_string(),
    }
}

fn ids(endpoints: &[PrivateEndpoint]) -> Vec<&str> {
    let mut ids: Vec<&str> = endpoints.iter().map(|e| e.endpoint_id.as_str()).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_creates_then_deletes() {
    let cloud = FakeCloud::new();
    cloud.seed_endpoint(PROJECT_ID, endpoint("vpce-2"));
    cloud.seed_endpoint(PROJECT_ID, endpoint("vpce-3"));
    let desired = vec![endpoint("vpce-1"), endpoint("vpce-2")];
    let mut conditions = Conditions::new();

    let result = ensure_private_endpoints(&cloud, PROJECT_ID, &desired, &mut conditions).await;
    assert!(result.is_ok());
    assert_eq!(ids(&cloud.endpoints(PROJECT_ID)), vec!["vpce-1", "vpce-2"]);
    assert_eq!(
        cloud.calls(),
        vec![
            Operation::ListPrivateEndpoints,
            Operation::CreatePrivateEndpoint,
            Operation::DeletePrivateEndpoint,
        ]
    );
    assert!(conditions.is_true(ConditionType::PrivateEndpointReady));

    // Converged: only the list call remains.
    cloud.reset_calls();
    let result = ensure_private_endpoints(&cloud, PROJECT_ID, &desired, &mut conditions).await;
    assert!(result.is_ok());
    assert_eq!(cloud.calls(), vec![Operation::ListPrivateEndpoints]);
}

#[tokio::test]
async fn test_listed_endpoint_without_id_is_not_deleted() {
    let cloud = FakeCloud::new();
    cloud.seed_endpoint(PROJECT_ID, endpoint(""));
    cloud.seed_endpoint(PROJECT_ID, endpoint("vpce-9"));
    let mut conditions = Conditions::new();

    let result = ensure_private_endpoints(&cloud, PROJECT_ID, &[], &mut conditions).await;
    assert!(result.is_ok());
    assert_eq!(
        cloud.calls(),
        vec![
            Operation::ListPrivateEndpoints,
            Operation::DeletePrivateEndpoint,
        ]
    );
    assert_eq!(ids(&cloud.endpoints(PROJECT_ID)), vec![""]);
}

#[tokio::test]
async fn test_stops_at_first_failure() {
    let cloud = FakeCloud::new();
    cloud.seed_endpoint(PROJECT_ID, endpoint("vpce-3"));
    cloud.fail_next(Operation::CreatePrivateEndpoint, "invalid endpoint");
    let desired = vec![endpoint("vpce-1")];
    let mut conditions = Conditions::new();

    let result = ensure_private_endpoints(&cloud, PROJECT_ID, &desired, &mut conditions).await;
    assert!(result.is_terminate());
    assert!(result.is_retryable());
    assert_eq!(result.reason(), Some(Reason::PrivateEndpointsNotReady));
    assert!(result.message().contains("invalid endpoint"));

    // The delete never ran.
    assert_eq!(ids(&cloud.endpoints(PROJECT_ID)), vec!["vpce-3"]);
    assert_eq!(cloud.mutations(), 1);

    let condition = conditions.get(ConditionType::PrivateEndpointReady).unwrap();
    assert!(!condition.status);
    assert_eq!(condition.reason.as_deref(), Some("PrivateEndpointsNotReady"));
}

#[tokio::test]
async fn test_list_failure_makes_no_changes() {
    let cloud = FakeCloud::new();
    cloud.seed_endpoint(PROJECT_ID, endpoint("vpce-3"));
    cloud.fail_next(Operation::ListPrivateEndpoints, "unavailable");
    let mut conditions = Conditions::new();

    let result = ensure_private_endpoints(&cloud, PROJECT_ID, &[], &mut conditions).await;
    assert!(result.is_terminate());
    assert_eq!(cloud.mutations(), 0);
    assert_eq!(ids(&cloud.endpoints(PROJECT_ID)), vec!["vpce-3"]);
    assert!(!conditions.is_true(ConditionType::PrivateEndpointReady));
}
