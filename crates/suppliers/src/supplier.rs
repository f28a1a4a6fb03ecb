use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError};
use emporium_events::Event;

/// Supplier identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierStatus {
    Active,
    Suspended,
}

/// Contact information for a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    contact: ContactInfo,
    status: SupplierStatus,
    version: u64,
    created: bool,
}

impl Supplier {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: ContactInfo::default(),
            status: SupplierStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> SupplierStatus {
        self.status
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    /// Invariant helper: suspended suppliers cannot receive new orders.
    pub fn can_transact(&self) -> bool {
        self.created && self.status == SupplierStatus::Active
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSupplier {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SuspendSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendSupplier {
    pub supplier_id: SupplierId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReinstateSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinstateSupplier {
    pub supplier_id: SupplierId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    RegisterSupplier(RegisterSupplier),
    SuspendSupplier(SuspendSupplier),
    ReinstateSupplier(ReinstateSupplier),
}

/// Event: SupplierRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistered {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierSuspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierSuspended {
    pub supplier_id: SupplierId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierReinstated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierReinstated {
    pub supplier_id: SupplierId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierRegistered(SupplierRegistered),
    SupplierSuspended(SupplierSuspended),
    SupplierReinstated(SupplierReinstated),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierRegistered(_) => "suppliers.supplier.registered",
            SupplierEvent::SupplierSuspended(_) => "suppliers.supplier.suspended",
            SupplierEvent::SupplierReinstated(_) => "suppliers.supplier.reinstated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierRegistered(e) => e.occurred_at,
            SupplierEvent::SupplierSuspended(e) => e.occurred_at,
            SupplierEvent::SupplierReinstated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierRegistered(e) => {
                self.id = e.supplier_id;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.status = SupplierStatus::Active;
                self.created = true;
            }
            SupplierEvent::SupplierSuspended(_) => {
                self.status = SupplierStatus::Suspended;
            }
            SupplierEvent::SupplierReinstated(_) => {
                self.status = SupplierStatus::Active;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::RegisterSupplier(cmd) => self.handle_register(cmd),
            SupplierCommand::SuspendSupplier(cmd) => self.handle_suspend(cmd),
            SupplierCommand::ReinstateSupplier(cmd) => self.handle_reinstate(cmd),
        }
    }
}

impl Supplier {
    fn ensure_supplier_id(&self, supplier_id: SupplierId) -> Result<(), DomainError> {
        if self.id != supplier_id {
            return Err(DomainError::invariant("supplier_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("supplier already registered"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![SupplierEvent::SupplierRegistered(SupplierRegistered {
            supplier_id: cmd.supplier_id,
            name: cmd.name.clone(),
            contact: cmd.contact.clone(),
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_supplier_id(cmd.supplier_id)?;

        if self.status == SupplierStatus::Suspended {
            return Ok(vec![]);
        }

        Ok(vec![SupplierEvent::SupplierSuspended(SupplierSuspended {
            supplier_id: cmd.supplier_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reinstate(
        &self,
        cmd: &ReinstateSupplier,
    ) -> Result<Vec<SupplierEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_supplier_id(cmd.supplier_id)?;

        if self.status == SupplierStatus::Active {
            return Ok(vec![]);
        }

        Ok(vec![SupplierEvent::SupplierReinstated(SupplierReinstated {
            supplier_id: cmd.supplier_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::AggregateId;

    fn test_supplier_id() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn registered_supplier(supplier_id: SupplierId) -> Supplier {
        let mut supplier = Supplier::empty(supplier_id);
        let cmd = RegisterSupplier {
            supplier_id,
            name: "Acme Wholesale".to_string(),
            contact: ContactInfo::default(),
            actor_id: ActorId::new(),
            occurred_at: Utc::now(),
        };
        let events = supplier
            .handle(&SupplierCommand::RegisterSupplier(cmd))
            .unwrap();
        supplier.apply(&events[0]);
        supplier
    }

    #[test]
    fn register_supplier_emits_registered_event() {
        let supplier_id = test_supplier_id();
        let supplier = registered_supplier(supplier_id);
        assert!(supplier.is_registered());
        assert!(supplier.can_transact());
        assert_eq!(supplier.name(), "Acme Wholesale");
    }

    #[test]
    fn suspended_supplier_cannot_transact() {
        let supplier_id = test_supplier_id();
        let mut supplier = registered_supplier(supplier_id);

        let events = supplier
            .handle(&SupplierCommand::SuspendSupplier(SuspendSupplier {
                supplier_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        supplier.apply(&events[0]);
        assert!(!supplier.can_transact());

        let events = supplier
            .handle(&SupplierCommand::ReinstateSupplier(ReinstateSupplier {
                supplier_id,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        supplier.apply(&events[0]);
        assert!(supplier.can_transact());
    }

    #[test]
    fn register_twice_conflicts() {
        let supplier_id = test_supplier_id();
        let supplier = registered_supplier(supplier_id);

        let err = supplier
            .handle(&SupplierCommand::RegisterSupplier(RegisterSupplier {
                supplier_id,
                name: "Other".to_string(),
                contact: ContactInfo::default(),
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
