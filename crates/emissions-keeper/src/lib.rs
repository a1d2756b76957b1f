//! Network regret synthesis and stake accounting for the emissions module.
//!
//! [`Keeper`] ties together the regret store, the stake ledger, the removal
//! scheduler and the invariant checker over one [`StorageBackend`]. Message
//! handlers live in [`msg_server`], read-only queries in [`query`].

pub mod bank;
pub mod config;
pub mod error;
pub mod events;
pub mod inference_synthesis;
pub mod invariants;
pub mod logging;
pub mod msg_server;
pub mod msgs;
pub mod prefixes;
pub mod query;
pub mod regret_store;
pub mod removals;
pub mod stake_ledger;
pub mod topics;

pub use bank::{AccountKeeper, BankKeeper, ModuleAccounts, StoreBank};
pub use config::{EmissionsConfig, LoggingConfig};
pub use error::{EmissionsError, ErrorKind, Result};
pub use events::EmissionsEvent;
pub use invariants::InvariantChecker;
pub use regret_store::{PairRegretKind, RegretStore, WorkerRegretKind};
pub use removals::StakeRemovalScheduler;
pub use stake_ledger::StakeLedger;
pub use topics::TopicStore;

use emissions_storage::{open_backend, MemoryBackend, StorageBackend};
use emissions_types::{BlockHeight, ModuleParams};
use std::sync::Arc;
use tracing::info;

/// Block information handed to every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub block_height: BlockHeight,
}

impl BlockContext {
    pub fn new(block_height: BlockHeight) -> Self {
        Self { block_height }
    }
}

pub struct Keeper {
    backend: Arc<dyn StorageBackend>,
    params: ModuleParams,
    topics: TopicStore,
    regrets: RegretStore,
    ledger: StakeLedger,
    removals: StakeRemovalScheduler,
}

impl Keeper {
    /// Builds a keeper over `backend` with externally provided bank and
    /// account capabilities.
    pub fn with_collaborators(
        backend: Arc<dyn StorageBackend>,
        params: ModuleParams,
        bank: Arc<dyn BankKeeper>,
        accounts: &dyn AccountKeeper,
    ) -> Result<Self> {
        params.validate()?;
        let ledger = StakeLedger::new(backend.clone(), bank, accounts, &params.bond_denom)?;

        info!(
            bond_denom = %params.bond_denom,
            staking_account = %ledger.staking_account(),
            "✨ Emissions keeper initialized"
        );

        Ok(Self {
            topics: TopicStore::new(backend.clone()),
            regrets: RegretStore::new(backend.clone()),
            removals: StakeRemovalScheduler::new(backend.clone()),
            ledger,
            params,
            backend,
        })
    }

    /// Builds a keeper whose bank lives in the same backend, so token
    /// movements commit and roll back with the ledger.
    pub fn with_store_bank(
        backend: Arc<dyn StorageBackend>,
        params: ModuleParams,
    ) -> Result<(Self, Arc<StoreBank>)> {
        let bank = Arc::new(StoreBank::new(backend.clone()));
        let keeper = Self::with_collaborators(backend, params, bank.clone(), &ModuleAccounts)?;
        Ok((keeper, bank))
    }

    pub fn in_memory(params: ModuleParams) -> Result<(Self, Arc<StoreBank>)> {
        Self::with_store_bank(Arc::new(MemoryBackend::new()), params)
    }

    /// Opens the configured storage backend and builds a keeper over it.
    pub fn from_config(config: &EmissionsConfig) -> anyhow::Result<(Self, Arc<StoreBank>)> {
        let backend = open_backend(&config.storage)?;
        Ok(Self::with_store_bank(backend, config.params.clone())?)
    }

    pub fn params(&self) -> &ModuleParams {
        &self.params
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn topics(&self) -> &TopicStore {
        &self.topics
    }

    pub fn regrets(&self) -> &RegretStore {
        &self.regrets
    }

    pub fn ledger(&self) -> &StakeLedger {
        &self.ledger
    }

    pub fn removals(&self) -> &StakeRemovalScheduler {
        &self.removals
    }

    pub fn invariant_checker(&self) -> InvariantChecker<'_> {
        InvariantChecker::new(&self.ledger, &self.removals)
    }
}
