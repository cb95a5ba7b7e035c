#![doc = include_str!("../README.md")]

mod common;
mod error;
mod pool;
mod task;
mod worker;

pub use crate::{
    common::{common, configure_common, post_task},
    error::{CommonAlreadyInitializedError, SpawnError},
    pool::{Builder, WorkerPool},
};
