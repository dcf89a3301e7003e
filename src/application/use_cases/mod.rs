pub mod customer;
pub mod order;
pub mod plan;
pub mod subscription;
