//! Value types shared by the emissions storage and keeper crates.

pub mod address;
pub mod amount;
pub mod error;
pub mod params;
pub mod stake;
pub mod topic;
pub mod values;

pub use address::{address_from_seed, decode_address, encode_address, validate_address};
pub use amount::Amount;
pub use error::{Result, ValidationError};
pub use params::ModuleParams;
pub use stake::{ActorType, DelegateStakeRemovalInfo, DelegatorInfo, StakeRemovalInfo};
pub use topic::{Topic, TopicId};
pub use values::{
    BlockHeight, Nonce, TimestampedValue, ValueBundle, WithheldWorkerAttributedValue,
    WorkerAttributedValue,
};
