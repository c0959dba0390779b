//! Data Transfer Objects for REST response serialization.

pub mod topic_dto;

pub use topic_dto::*;
