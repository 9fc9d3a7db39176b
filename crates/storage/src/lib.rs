// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable local state for the scheduler: lease files and the single-process
//! exclusion lock that guards a reconciliation pass.

pub mod lease_store;
pub mod lock;

pub use lease_store::{
    FakeLeaseWriter, FsLeaseWriter, LeaseStore, LeaseStoreError, LeaseWriter, OsPidProbe, PidProbe,
    StaleLease,
};
pub use lock::{ExclusionLock, LockError};
