//! Command ingress: routes wire commands to the host of their actor kind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{ActorDescription, CommandContext, DispatchError, EngineError, IngressError};

/// Type-erased access to the host of one actor kind.
#[async_trait]
pub trait ActorGateway: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Every method of the kind, hidden ones included.
    fn describe(&self) -> ActorDescription;

    /// Checks that `method` exists and takes `arity` arguments.
    fn check(&self, method: &str, arity: usize) -> Result<(), DispatchError>;

    /// Visible method names starting with `prefix`.
    fn complete(&self, prefix: &str) -> Vec<String>;

    async fn invoke(
        &self,
        address: &Address,
        ctx: &CommandContext,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EngineError>;

    async fn history(
        &self,
        address: &Address,
        after: EventId,
        max_results: i64,
    ) -> Result<Vec<Event>, EngineError>;

    async fn clear(&self, address: &Address) -> Result<(), EngineError>;

    async fn passivate_idle(&self) -> usize;

    async fn shutdown(&self);
}

/// Entry point for external commands and introspection.
#[derive(Clone, Default)]
pub struct Ingress {
    gateways: BTreeMap<&'static str, Arc<dyn ActorGateway>>,
}

impl fmt::Debug for Ingress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingress")
            .field("kinds", &self.gateways.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Ingress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the host of one actor kind.
    pub fn with_gateway(mut self, gateway: Arc<dyn ActorGateway>) -> Self {
        self.gateways.insert(gateway.kind(), gateway);
        self
    }

    fn gateway(&self, kind: &str) -> Result<&Arc<dyn ActorGateway>, IngressError> {
        self.gateways
            .get(kind.to_lowercase().as_str())
            .ok_or_else(|| IngressError::UnknownKind(kind.to_string()))
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.gateways.keys().copied().collect()
    }

    /// Routes a command to its actor.
    ///
    /// The kind, method and argument count are checked before the actor is
    /// activated. `cid`, `uid` and `extras` on the command are carried onto
    /// the event it produces.
    #[instrument(skip(self, command), fields(to = ?command.to, event_type = %command.event_type))]
    pub async fn invoke(&self, command: &Event) -> Result<Value, IngressError> {
        let address = command.to.as_ref().ok_or(IngressError::MissingAddress)?;
        let gateway = self.gateway(address.kind())?;
        gateway.check(&command.event_type, command.arity())?;

        let ctx = CommandContext::from_event(command);
        let result = gateway
            .invoke(address, &ctx, &command.event_type, command.args.clone())
            .await?;
        debug!("command completed");
        Ok(result)
    }

    /// Descriptions of every kind, without hidden methods.
    pub fn actors(&self) -> Vec<ActorDescription> {
        self.gateways
            .values()
            .map(|g| g.describe().visible())
            .collect()
    }

    /// Kind names starting with `prefix`, ignoring case.
    pub fn complete_kind(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.gateways
            .keys()
            .filter(|kind| kind.starts_with(&prefix))
            .map(|kind| kind.to_string())
            .collect()
    }

    /// Visible method names of `kind` starting with `prefix`.
    pub fn complete_method(&self, kind: &str, prefix: &str) -> Result<Vec<String>, IngressError> {
        Ok(self.gateway(kind)?.complete(prefix))
    }

    /// Journaled history of one actor.
    pub async fn history(
        &self,
        address: &Address,
        after: EventId,
        max_results: i64,
    ) -> Result<Vec<Event>, IngressError> {
        let gateway = self.gateway(address.kind())?;
        Ok(gateway.history(address, after, max_results).await?)
    }

    /// Clears the snapshot and journal of one actor.
    pub async fn clear(&self, address: &Address) -> Result<(), IngressError> {
        let gateway = self.gateway(address.kind())?;
        Ok(gateway.clear(address).await?)
    }

    /// Passivates idle actors of every kind.
    pub async fn passivate_idle(&self) -> usize {
        let mut total = 0;
        for gateway in self.gateways.values() {
            total += gateway.passivate_idle().await;
        }
        total
    }

    /// Shuts down every host.
    pub async fn shutdown(&self) {
        for gateway in self.gateways.values() {
            gateway.shutdown().await;
        }
    }
}
