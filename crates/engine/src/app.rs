//! Engine wiring: store, bus, projections and services composed into one
//! handle.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use emporium_events::{EventBus, EventEnvelope, InMemoryBusError, InMemoryEventBus, Subscription};

use crate::dispatcher::CommandDispatcher;
use crate::event_store::InMemoryEventStore;
use crate::projections::{ProjectionError, ProjectionHub};
use crate::services::{
    DirectoryService, PricingService, ProcurementService, RuleResolver, SalesOrderService,
    StockLedger,
};

/// Bus decorator that applies every published envelope to the projection hub
/// before fanning it out to subscribers.
///
/// Publication happens after the append, so routing envelopes through the
/// hub synchronously makes the read models consistent with the store the
/// moment a dispatch returns: no polling, no eventual-consistency window
/// inside the engine. External subscribers (the notification collaborator)
/// still get the ordinary broadcast.
#[derive(Debug)]
pub struct ProjectingBus {
    hub: Arc<ProjectionHub>,
    inner: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
}

/// Publish-path failure: projection application or fan-out.
#[derive(Debug)]
pub enum PublishError {
    Projection(ProjectionError),
    Bus(InMemoryBusError),
}

impl EventBus<EventEnvelope<JsonValue>> for ProjectingBus {
    type Error = PublishError;

    fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
        self.hub
            .apply_envelope(&message)
            .map_err(PublishError::Projection)?;
        self.inner.publish(message).map_err(PublishError::Bus)
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.inner.subscribe()
    }
}

type Store = Arc<InMemoryEventStore>;
type Dispatcher = CommandDispatcher<Store, ProjectingBus>;

/// The assembled inventory-consistency engine.
///
/// One instance owns the event store, the projections and every service.
/// Collaborators reach the operations through the service accessors and may
/// [`Emporium::subscribe`] to the envelope feed for out-of-band delivery.
#[derive(Debug)]
pub struct Emporium {
    hub: Arc<ProjectionHub>,
    bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
    ledger: StockLedger<Store, ProjectingBus>,
    pricing: PricingService,
    orders: SalesOrderService<Store, ProjectingBus>,
    procurement: ProcurementService<Store, ProjectingBus>,
    resolver: RuleResolver<Store, ProjectingBus>,
    directory: DirectoryService<Store, ProjectingBus>,
}

impl Emporium {
    /// Assemble an engine over the in-memory store.
    pub fn in_memory() -> Self {
        let hub = Arc::new(ProjectionHub::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let store: Store = Arc::new(InMemoryEventStore::new());

        let dispatcher: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(
            store,
            ProjectingBus {
                hub: Arc::clone(&hub),
                inner: Arc::clone(&bus),
            },
        ));

        let ledger = StockLedger::new(Arc::clone(&dispatcher));
        let pricing = PricingService::new(Arc::clone(&hub));
        let orders = SalesOrderService::new(
            Arc::clone(&dispatcher),
            Arc::clone(&hub),
            ledger.clone(),
            pricing.clone(),
        );
        let procurement = ProcurementService::new(
            Arc::clone(&dispatcher),
            Arc::clone(&hub),
            ledger.clone(),
        );
        let resolver = RuleResolver::new(Arc::clone(&dispatcher), Arc::clone(&hub));
        let directory = DirectoryService::new(Arc::clone(&dispatcher));

        Self {
            hub,
            bus,
            ledger,
            pricing,
            orders,
            procurement,
            resolver,
            directory,
        }
    }

    /// Stock ledger operations (reserve / release / adjust).
    pub fn ledger(&self) -> &StockLedger<Store, ProjectingBus> {
        &self.ledger
    }

    /// Effective price computation.
    pub fn pricing(&self) -> &PricingService {
        &self.pricing
    }

    /// Checkout and sales order transitions.
    pub fn orders(&self) -> &SalesOrderService<Store, ProjectingBus> {
        &self.orders
    }

    /// Purchase orders and the delivery lifecycle.
    pub fn procurement(&self) -> &ProcurementService<Store, ProjectingBus> {
        &self.procurement
    }

    /// Discount rule application and preview.
    pub fn rules(&self) -> &RuleResolver<Store, ProjectingBus> {
        &self.resolver
    }

    /// Catalog, supplier, rule and manual-discount administration.
    pub fn directory(&self) -> &DirectoryService<Store, ProjectingBus> {
        &self.directory
    }

    /// Read models: catalog, stock levels, discount board, supplier stats,
    /// change feed.
    pub fn projections(&self) -> &ProjectionHub {
        &self.hub
    }

    /// Subscribe to the committed-envelope feed (notification collaborator).
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }
}

impl Default for Emporium {
    fn default() -> Self {
        Self::in_memory()
    }
}
