//! # mycloud-entity
//!
//! Domain entity models for MyCloud. Every struct in this crate represents
//! a database table row or a domain value object. Database entities derive
//! `sqlx::FromRow`; every row carries `user_id` as its partition key.

pub mod file;
pub mod folder;
pub mod share;
pub mod storage;
pub mod user;
