// Agora common library - main library exports

pub mod block;
pub mod context;
pub mod encoding;
pub mod forks;
pub mod hash;
pub mod script;
pub mod transaction;
pub mod validation;

// Flattened re-exports
pub use self::block::{Block, Header};
pub use self::context::ConsensusContext;
pub use self::forks::{Checkpoint, ForkSettings, ForkSettingsError, NetworkProfile, RuleFork};
pub use self::hash::{BlockHash, Hash, TxHash};
pub use self::transaction::{Input, OutPoint, Output, PrevoutSlot, Transaction, TransactionParts};
pub use self::validation::{PrevoutValidation, TxValidation};
