use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::handler::OpPhase;
use crate::handler::PolicyHandler;
use fleetcore_models::ActionKind;

/// Version assumed by [`PolicyMetadata::build`] when the caller doesn't pick
/// one explicitly.
pub const DEFAULT_VERSION: &str = "v1";

/// Metadata attached to a registered policy type.
pub struct PolicyMetadata {
    /// The policy `type` string, e.g. `"scaling"` or `"affinity"`.
    pub policy_type: String,
    /// Handler implementation version; together with `policy_type` this is
    /// the registry key, so two versions of the same policy type can be
    /// registered side by side during a rollout.
    pub version: String,
    /// `(phase, action kind)` pairs this policy's hooks run for; a binding
    /// whose action kind isn't listed here is skipped entirely.
    pub targets: Vec<(OpPhase, ActionKind)>,
    pub handler: Box<dyn PolicyHandler>,
}

impl PolicyMetadata {
    pub fn build<T, H>(policy_type: T, handler: H) -> PolicyMetadataBuilder
    where
        T: Into<String>,
        H: PolicyHandler + 'static,
    {
        PolicyMetadataBuilder {
            policy_type: policy_type.into(),
            version: DEFAULT_VERSION.to_string(),
            targets: Vec::new(),
            handler: Box::new(handler),
        }
    }
}

/// Incrementally build a [`PolicyMetadata`].
pub struct PolicyMetadataBuilder {
    policy_type: String,
    version: String,
    targets: Vec<(OpPhase, ActionKind)>,
    handler: Box<dyn PolicyHandler>,
}

impl PolicyMetadataBuilder {
    pub fn finish(self) -> PolicyMetadata {
        PolicyMetadata {
            policy_type: self.policy_type,
            version: self.version,
            targets: self.targets,
            handler: self.handler,
        }
    }

    /// Registers a `(phase, action kind)` this policy's hooks apply to.
    pub fn on(&mut self, phase: OpPhase, kind: ActionKind) -> &mut Self {
        self.targets.push((phase, kind));
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = version.into();
        self
    }
}

/// Key a [`PolicyRegistry`] resolves on: a policy `type` plus the handler
/// version a policy selects via [`fleetcore_models::Policy::version`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PolicyKey {
    policy_type: String,
    version: String,
}

/// Resolves a policy's `(type, version)` to the [`PolicyHandler`] that
/// implements it.
#[derive(Clone)]
pub struct PolicyRegistry {
    entries: Arc<HashMap<PolicyKey, PolicyMetadata>>,
}

impl PolicyRegistry {
    pub fn build() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::default()
    }

    pub fn lookup(&self, policy_type: &str, version: &str) -> Result<&PolicyMetadata> {
        let key = PolicyKey { policy_type: policy_type.to_string(), version: version.to_string() };
        self.entries
            .get(&key)
            .ok_or_else(|| crate::errors::PolicyNotFound::from(format!("{policy_type}@{version}").as_str()))
            .map_err(anyhow::Error::from)
    }
}

/// Incrementally build a [`PolicyRegistry`].
#[derive(Default)]
pub struct PolicyRegistryBuilder {
    entries: HashMap<PolicyKey, PolicyMetadata>,
}

impl PolicyRegistryBuilder {
    pub fn finish(self) -> PolicyRegistry {
        PolicyRegistry {
            entries: Arc::new(self.entries),
        }
    }

    /// # Panics
    ///
    /// Panics if `(policy_type, version)` is already registered.
    pub fn register(&mut self, metadata: PolicyMetadata) -> &mut Self {
        let key = PolicyKey { policy_type: metadata.policy_type.clone(), version: metadata.version.clone() };
        if self.entries.contains_key(&key) {
            panic!("policy type {}@{} cannot be registered more than once", metadata.policy_type, metadata.version);
        }
        self.entries.insert(key, metadata);
        self
    }
}
