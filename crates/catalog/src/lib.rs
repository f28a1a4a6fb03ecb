//! `emporium-catalog`: the product catalog aggregate.
//!
//! Products carry the descriptive and pricing fields the rest of the engine
//! reads (category, base price, active flag, creation time). Stock is *not*
//! part of this aggregate; the inventory crate owns the per-product counter.

pub mod product;

pub use product::{
    BasePriceChanged, ChangeBasePrice, CreateProduct, DeactivateProduct, Product, ProductCommand,
    ProductCreated, ProductDeactivated, ProductEvent, ProductId, ProductReactivated,
    ProductStatus, ReactivateProduct,
};
