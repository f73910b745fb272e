//! Persistence of accepted submissions.
//!
//! Stores keep an append-only log of [`StateDelta`] commits. The first entry
//! is the genesis commit; replaying every entry in order rebuilds the chain.
use std::io;

use crate::state::StateDelta;

pub trait Store {
    fn append(&self, delta: &StateDelta) -> io::Result<()>;
    fn load(&self) -> io::Result<Vec<StateDelta>>;
}

pub mod file;
pub mod memory;
