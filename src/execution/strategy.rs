//! Which request-processing stages must run off the I/O thread.
//!
//! Strategies form a join-semilattice under [`HttpExecutionStrategy::merge`]:
//! merging is a union of offload bits, [`HttpExecutionStrategy::offload_none`] is the
//! identity and [`HttpExecutionStrategy::offload_all`] absorbs everything.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One offloadable stage, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Offload {
    ReceiveMetadata,
    ReceiveData,
    Send,
}

impl Offload {
    fn bit(self) -> u8 {
        match self {
            Offload::ReceiveMetadata => HttpExecutionStrategy::RECEIVE_METADATA,
            Offload::ReceiveData => HttpExecutionStrategy::RECEIVE_DATA,
            Offload::Send => HttpExecutionStrategy::SEND,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Offload::ReceiveMetadata => "receive-metadata",
            Offload::ReceiveData => "receive-data",
            Offload::Send => "send",
        }
    }
}

/// Immutable set of stages that require offloading.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HttpExecutionStrategy {
    offloads: u8,
}

impl HttpExecutionStrategy {
    const RECEIVE_METADATA: u8 = 0b001;
    const RECEIVE_DATA: u8 = 0b010;
    const SEND: u8 = 0b100;
    const ALL: u8 = Self::RECEIVE_METADATA | Self::RECEIVE_DATA | Self::SEND;

    pub const fn offload_none() -> Self {
        Self { offloads: 0 }
    }

    pub const fn offload_all() -> Self {
        Self { offloads: Self::ALL }
    }

    pub fn from_offloads(offloads: impl IntoIterator<Item = Offload>) -> Self {
        Self {
            offloads: offloads.into_iter().fold(0, |bits, offload| bits | offload.bit()),
        }
    }

    pub const fn with_receive_metadata(self) -> Self {
        Self {
            offloads: self.offloads | Self::RECEIVE_METADATA,
        }
    }

    pub const fn with_receive_data(self) -> Self {
        Self {
            offloads: self.offloads | Self::RECEIVE_DATA,
        }
    }

    pub const fn with_send(self) -> Self {
        Self {
            offloads: self.offloads | Self::SEND,
        }
    }

    /// Union of both requirement sets.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            offloads: self.offloads | other.offloads,
        }
    }

    /// Offloads `required` asks for that `self` does not provide.
    #[must_use]
    pub const fn missing(self, required: Self) -> Self {
        Self {
            offloads: required.offloads & !self.offloads,
        }
    }

    pub const fn has_offloads(self) -> bool {
        self.offloads != 0
    }

    pub const fn is_metadata_receive_offloaded(self) -> bool {
        self.offloads & Self::RECEIVE_METADATA != 0
    }

    pub const fn is_data_receive_offloaded(self) -> bool {
        self.offloads & Self::RECEIVE_DATA != 0
    }

    pub const fn is_send_offloaded(self) -> bool {
        self.offloads & Self::SEND != 0
    }

    /// Either receive stage is offloaded, so request handling itself hops.
    pub const fn is_request_offloaded(self) -> bool {
        self.is_metadata_receive_offloaded() || self.is_data_receive_offloaded()
    }

    pub fn offloads(self) -> Vec<Offload> {
        [Offload::ReceiveMetadata, Offload::ReceiveData, Offload::Send]
            .into_iter()
            .filter(|offload| self.offloads & offload.bit() != 0)
            .collect()
    }
}

impl fmt::Display for HttpExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_offloads() {
            return f.write_str("offload-none");
        }
        let names: Vec<&str> = self.offloads().into_iter().map(Offload::name).collect();
        f.write_str(&names.join("|"))
    }
}

impl fmt::Debug for HttpExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpExecutionStrategy({self})")
    }
}

impl FromIterator<Offload> for HttpExecutionStrategy {
    fn from_iter<I: IntoIterator<Item = Offload>>(iter: I) -> Self {
        Self::from_offloads(iter)
    }
}
