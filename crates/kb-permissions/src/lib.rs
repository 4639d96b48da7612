//! C1: permission evaluation for filesystem, network, environment, and
//! cross-plugin invoke access.
//!
//! This crate holds no process state of its own — every type here is either
//! a pure function over a [`kb_core::PermissionSpec`] or a small evaluator
//! built once per execution and dropped at the end of it.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod deny_list;
pub mod env;
pub mod evaluator;
pub mod invoke;
pub mod pattern;

pub use deny_list::is_hard_denied;
pub use env::env_read_allowed;
pub use evaluator::{PermissionDenial, PermissionEvaluator};
pub use invoke::{invoke_decision, InvokeDenyReason, InvokeTargetRef};
pub use pattern::PatternSet;
