//! `emporium-suppliers`: the supplier directory aggregate.

pub mod supplier;

pub use supplier::{
    ContactInfo, RegisterSupplier, ReinstateSupplier, Supplier, SupplierCommand, SupplierEvent,
    SupplierId, SupplierRegistered, SupplierReinstated, SupplierStatus, SupplierSuspended,
    SuspendSupplier,
};
