//! Core domain types for the Grange community directory.
//!
//! This crate defines the entities (users, persons, groups, memberships),
//! the authorization rules that govern who may change what, and the
//! [`store::DirectoryStore`] trait that storage backends implement. It has
//! no HTTP or database dependencies; everything observable about the
//! directory's rules lives here as plain functions over plain data.

pub mod audit;
pub mod authz;
pub mod error;
pub mod group;
pub mod identity;
pub mod person;
pub mod store;

pub use error::{Error, Result};
