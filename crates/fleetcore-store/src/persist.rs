use fleetcore_models::Action;
use fleetcore_models::Cluster;
use fleetcore_models::ClusterPolicyBinding;
use fleetcore_models::Credential;
use fleetcore_models::HealthCheck;
use fleetcore_models::Node;
use fleetcore_models::Policy;
use fleetcore_models::Profile;
use fleetcore_models::Service;
use fleetcore_models::StoredEvent;

use self::seal::SealPersistOp;

/// Something that can be persisted through [`crate::Store::persist`].
///
/// Sealed: only the models enumerated in [`PersistOps`] may implement it.
pub trait PersistOp: Into<PersistOps> + SealPersistOp {
    type Response: From<PersistResponses>;
}

/// One variant per persistable model; this is what [`crate::StoreBackend`]
/// implementations actually match on.
#[derive(Clone, Debug)]
pub enum PersistOps {
    Action(Box<Action>),
    Cluster(Box<Cluster>),
    ClusterPolicyBinding(Box<ClusterPolicyBinding>),
    Credential(Box<Credential>),
    HealthCheck(Box<HealthCheck>),
    Node(Box<Node>),
    Policy(Box<Policy>),
    Profile(Box<Profile>),
    Service(Box<Service>),
    StoredEvent(Box<StoredEvent>),
}

/// Uniform success response; every persist call either fails or succeeds.
pub enum PersistResponses {
    Success,
}

mod seal {
    pub trait SealPersistOp {}
}

macro_rules! persist_model {
    ($model:ty, $variant:ident) => {
        impl PersistOp for $model {
            type Response = ();
        }
        impl SealPersistOp for $model {}
        impl From<$model> for PersistOps {
            fn from(model: $model) -> PersistOps {
                PersistOps::$variant(Box::new(model))
            }
        }
    };
}

persist_model!(Action, Action);
persist_model!(Cluster, Cluster);
persist_model!(ClusterPolicyBinding, ClusterPolicyBinding);
persist_model!(Credential, Credential);
persist_model!(HealthCheck, HealthCheck);
persist_model!(Node, Node);
persist_model!(Policy, Policy);
persist_model!(Profile, Profile);
persist_model!(Service, Service);
persist_model!(StoredEvent, StoredEvent);

impl From<PersistResponses> for () {
    fn from(_: PersistResponses) -> Self {}
}
