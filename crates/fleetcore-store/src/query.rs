use fleetcore_errors::EngineError;
use fleetcore_errors::MultipleChoices;
use fleetcore_errors::NotFound;
use fleetcore_models::Action;
use fleetcore_models::Cluster;
use fleetcore_models::ClusterPolicyBinding;
use fleetcore_models::Credential;
use fleetcore_models::HealthCheck;
use fleetcore_models::Node;
use fleetcore_models::Policy;
use fleetcore_models::Profile;
use fleetcore_models::Service;

use crate::pagination::ListQuery;

use self::seal::SealQueryOp;

pub trait QueryOp: Into<QueryOps> + SealQueryOp {
    type Response: From<QueryResponses>;
}

#[derive(Clone, Debug)]
pub enum QueryOps {
    GetProfile(GetProfile),
    GetCluster(GetCluster),
    GetNode(GetNode),
    GetPolicy(GetPolicy),
    GetClusterPolicyBinding(GetClusterPolicyBinding),
    GetCredential(GetCredential),
    GetService(GetService),
    GetAction(GetAction),
    ListClusters(ListClusters),
    ListNodes(ListNodes),
    ListActionsReady(ListActionsReady),
    ListActionsByOwner(ListActionsByOwner),
    ListClusterPolicyBindings(ListClusterPolicyBindings),
    ListServices(ListServices),
    GetHealthCheck(GetHealthCheck),
    ListHealthChecks(ListHealthChecks),
}

pub enum QueryResponses {
    Profile(Option<Profile>),
    Cluster(Option<Cluster>),
    Node(Option<Node>),
    Policy(Option<Policy>),
    ClusterPolicyBinding(Option<ClusterPolicyBinding>),
    Credential(Option<Credential>),
    Service(Option<Service>),
    Action(Option<Action>),
    Clusters(Vec<Cluster>),
    Nodes(Vec<Node>),
    Actions(Vec<Action>),
    Bindings(Vec<ClusterPolicyBinding>),
    Services(Vec<Service>),
    HealthCheck(Option<HealthCheck>),
    HealthChecks(Vec<HealthCheck>),
}

mod seal {
    pub trait SealQueryOp {}
}

macro_rules! query_op {
    ($name:ident, $variant:ident, $response_ty:ty, $unwrap:ident) => {
        impl QueryOp for $name {
            type Response = $response_ty;
        }
        impl SealQueryOp for $name {}
        impl From<$name> for QueryOps {
            fn from(op: $name) -> QueryOps {
                QueryOps::$variant(op)
            }
        }
        impl From<QueryResponses> for $response_ty {
            fn from(response: QueryResponses) -> $response_ty {
                match response {
                    QueryResponses::$unwrap(value) => value,
                    _ => unreachable!("backend returned the wrong response variant"),
                }
            }
        }
    };
}

/// Either the full id or a short prefix to disambiguate.
#[derive(Clone, Debug)]
pub struct GetProfile {
    pub id_or_prefix: String,
}

impl From<&str> for GetProfile {
    fn from(id: &str) -> Self {
        GetProfile {
            id_or_prefix: id.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GetCluster {
    pub id_or_prefix: String,
}

impl From<&str> for GetCluster {
    fn from(id: &str) -> Self {
        GetCluster {
            id_or_prefix: id.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GetNode {
    pub id_or_prefix: String,
}

impl From<&str> for GetNode {
    fn from(id: &str) -> Self {
        GetNode {
            id_or_prefix: id.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GetPolicy {
    pub id_or_prefix: String,
}

impl From<&str> for GetPolicy {
    fn from(id: &str) -> Self {
        GetPolicy {
            id_or_prefix: id.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GetClusterPolicyBinding {
    pub cluster_id: String,
    pub policy_id: String,
}

#[derive(Clone, Debug)]
pub struct GetCredential {
    pub user: String,
    pub project: String,
}

#[derive(Clone, Debug)]
pub struct GetService {
    pub id: String,
}

impl From<&str> for GetService {
    fn from(id: &str) -> Self {
        GetService { id: id.to_string() }
    }
}

#[derive(Clone, Debug)]
pub struct GetAction {
    pub id: String,
}

impl From<&str> for GetAction {
    fn from(id: &str) -> Self {
        GetAction { id: id.to_string() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ListClusters {
    pub query: ListQuery,
}

#[derive(Clone, Debug)]
pub struct ListNodes {
    pub cluster_id: Option<String>,
    pub query: ListQuery,
}

#[derive(Clone, Debug, Default)]
pub struct ListActionsReady;

#[derive(Clone, Debug)]
pub struct ListActionsByOwner {
    pub owner: String,
}

#[derive(Clone, Debug)]
pub struct ListClusterPolicyBindings {
    pub cluster_id: String,
}

/// All registered services, used by the dispatcher's liveness sweep.
#[derive(Clone, Debug, Default)]
pub struct ListServices;

#[derive(Clone, Debug)]
pub struct GetHealthCheck {
    pub id: String,
}

impl From<&str> for GetHealthCheck {
    fn from(id: &str) -> Self {
        GetHealthCheck { id: id.to_string() }
    }
}

/// `get_by_param` support: filters by either field when present.
#[derive(Clone, Debug, Default)]
pub struct ListHealthChecks {
    pub cluster_id: Option<String>,
    pub check_type: Option<String>,
}

query_op!(GetProfile, GetProfile, Option<Profile>, Profile);
query_op!(GetCluster, GetCluster, Option<Cluster>, Cluster);
query_op!(GetNode, GetNode, Option<Node>, Node);
query_op!(GetPolicy, GetPolicy, Option<Policy>, Policy);
query_op!(GetClusterPolicyBinding, GetClusterPolicyBinding, Option<ClusterPolicyBinding>, ClusterPolicyBinding);
query_op!(GetCredential, GetCredential, Option<Credential>, Credential);
query_op!(GetService, GetService, Option<Service>, Service);
query_op!(GetAction, GetAction, Option<Action>, Action);
query_op!(ListClusters, ListClusters, Vec<Cluster>, Clusters);
query_op!(ListNodes, ListNodes, Vec<Node>, Nodes);
query_op!(ListActionsReady, ListActionsReady, Vec<Action>, Actions);
query_op!(ListActionsByOwner, ListActionsByOwner, Vec<Action>, Actions);
query_op!(ListClusterPolicyBindings, ListClusterPolicyBindings, Vec<ClusterPolicyBinding>, Bindings);
query_op!(ListServices, ListServices, Vec<Service>, Services);
query_op!(GetHealthCheck, GetHealthCheck, Option<HealthCheck>, HealthCheck);
query_op!(ListHealthChecks, ListHealthChecks, Vec<HealthCheck>, HealthChecks);

/// Resolves a full id or short prefix against a row set, following the
/// `NotFound` / `MultipleChoices` contract used throughout the Store.
pub fn resolve_prefix<'a, T>(rows: &'a [T], id_or_prefix: &str, kind: &'static str, id_fn: impl Fn(&T) -> &str) -> Result<Option<&'a T>, EngineError> {
    if let Some(row) = rows.iter().find(|row| id_fn(row) == id_or_prefix) {
        return Ok(Some(row));
    }
    let mut matches = rows.iter().filter(|row| id_fn(row).starts_with(id_or_prefix));
    let first = matches.next();
    match first {
        None => Ok(None),
        Some(row) => {
            if matches.next().is_some() {
                Err(MultipleChoices::new(kind, id_or_prefix).into())
            } else {
                Ok(Some(row))
            }
        }
    }
}

/// Narrow alias used when a missing row should surface as `NotFound` rather
/// than `Option::None` (callers that require the row to exist).
pub fn require<T>(value: Option<T>, kind: &'static str, id: &str) -> Result<T, EngineError> {
    value.ok_or_else(|| NotFound::new(kind, id).into())
}
