//! Fork configuration: consensus rule toggles and checkpoints per network
//!
//! Built once at startup from a network profile, optionally adjusted from
//! configuration, and read-only thereafter.

use crate::context::ConsensusContext;
use crate::hash::BlockHash;
use bitmask_enum::bitmask;
use config::Config;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use tracing::info;

/// Consensus rules, each independently toggleable
#[bitmask(u32)]
pub enum RuleFork {
    /// Work must meet the required difficulty
    Difficult,
    /// Difficulty is retargeted
    Retarget,
    Bip16,
    /// Duplicate transaction hashes are rejected
    Bip30,
    Bip34,
    Bip42,
    Bip66,
    Bip65,
    Bip90,
    Bip68,
    Bip112,
    Bip113,
    Bip141,
    Bip143,
    Bip147,
    TimeWarpPatch,
    RetargetOverflowPatch,
    ScryptProofOfWork,
    /// Hash collisions are consensus-legal and destroy the collided outputs
    AllowCollisions,
}

/// Configuration names of each rule, in bit order
pub const RULE_NAMES: [(&str, RuleFork); 19] = [
    ("difficult", RuleFork::Difficult),
    ("retarget", RuleFork::Retarget),
    ("bip16", RuleFork::Bip16),
    ("bip30", RuleFork::Bip30),
    ("bip34", RuleFork::Bip34),
    ("bip42", RuleFork::Bip42),
    ("bip66", RuleFork::Bip66),
    ("bip65", RuleFork::Bip65),
    ("bip90", RuleFork::Bip90),
    ("bip68", RuleFork::Bip68),
    ("bip112", RuleFork::Bip112),
    ("bip113", RuleFork::Bip113),
    ("bip141", RuleFork::Bip141),
    ("bip143", RuleFork::Bip143),
    ("bip147", RuleFork::Bip147),
    ("time_warp_patch", RuleFork::TimeWarpPatch),
    ("retarget_overflow_patch", RuleFork::RetargetOverflowPatch),
    ("scrypt_proof_of_work", RuleFork::ScryptProofOfWork),
    ("allow_collisions", RuleFork::AllowCollisions),
];

/// Errors building fork settings
#[derive(Debug, Error, PartialEq)]
pub enum ForkSettingsError {
    #[error("unknown network profile '{0}'")]
    UnknownNetwork(String),

    #[error("invalid checkpoint '{0}', expected <hash>:<height>")]
    InvalidCheckpoint(String),
}

/// Network profile selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    Mainnet,
    Testnet,
    Regtest,
    /// Unconfigured: default rules, no checkpoints
    None,
}

impl FromStr for NetworkProfile {
    type Err = ForkSettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            "none" => Ok(Self::None),
            other => Err(ForkSettingsError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
            Self::None => "none",
        })
    }
}

/// A known-good block hash at a fixed height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub hash: BlockHash,
    pub height: u64,
}

impl Checkpoint {
    pub fn new(hash: BlockHash, height: u64) -> Self {
        Self { hash, height }
    }
}

impl FromStr for Checkpoint {
    type Err = ForkSettingsError;

    /// Parse `<hash>:<height>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ForkSettingsError::InvalidCheckpoint(s.to_string());
        let (hash, height) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            hash: hash.parse().map_err(|_| invalid())?,
            height: height.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.height)
    }
}

const MAINNET_CHECKPOINTS: [(&str, u64); 18] = [
    ("000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f", 0),
    ("0000000069e244f73d78e8fd29ba2fd2ed618bd6fa2ee92559f542fdb26e7c1d", 11111),
    ("000000002dd5588a74784eaa7ab0507a18ad16a236e7b1ce69f00d7ddfb5d0a6", 33333),
    ("00000000001e1b4903550a0b96e9a9405c8a95f387162e4944e8d9fbe501cd6a", 68555),
    ("00000000006a49b14bcf27462068f1264c961f11fa2e0eddd2be0791e1d4124a", 70567),
    ("0000000000573993a3c9e41ce34471c079dcf5f52a0e824a81e7f953b8661a20", 74000),
    ("00000000000291ce28027faea320c8d2b054b2e0fe44a773f3eefb151d6bdc97", 105000),
    ("000000000000774a7f8a7a12dc906ddb9e17e75d684f15e00f8767f9e8f36553", 118000),
    ("00000000000005b12ffd4cd315cd34ffd4a594f430ac814c91184a0d42d2b0fe", 134444),
    ("000000000000033b512028abb90e1626d8b346fd0ed598ac0a3c371138dce2bd", 140700),
    ("000000000000099e61ea72015e79632f216fe6cb33d7899acb35b75c8303b763", 168000),
    ("000000000000059f452a5f7340de6682a977387c17010ff6e6c3bd83ca8b1317", 193000),
    ("000000000000048b95347e83192f69cf0366076336c639f9b7228e9ba171342e", 210000),
    ("00000000000001b4f4b433e81ee46494af945cf96014816a4e2370f11b23df4e", 216116),
    ("00000000000001c108384350f74090433e7fcf79a606b8e797f065b130575932", 225430),
    ("000000000000003887df1f29024b06fc2200b55f8af8f35453d7be294df2d214", 250000),
    ("0000000000000001ae8c72a0b0c301f67e3afca10e819efa9041e458e9bd7e40", 279000),
    ("00000000000000004d9b4ef50f0f9d686fd69db2e03af35a100370c64632a983", 295000),
];

const TESTNET_CHECKPOINTS: [(&str, u64); 7] = [
    ("000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943", 0),
    ("00000000009e2958c15ff9290d571bf9459e93b19765c6801ddeccadbb160a1e", 100000),
    ("0000000000287bffd321963ef05feab753ebe274e1d78b2fd4e2bfe9ad3aa6f2", 200000),
    ("000000000000226f7618566e70a2b5e020e29579b46743f05348427239bf41a1", 300000),
    ("000000000598cbbb1e79057b79eef828c495d4fc31050e6b179c57d07d00367c", 400000),
    ("000000000001a7c0aaa2630fbb2c0e476aafffc60f82177375b2aaa22209f606", 500000),
    ("000000000000624f06c69d3a9fe8d25e0a9030569128d63ad1b704bbb3059a16", 600000),
];

const REGTEST_CHECKPOINTS: [(&str, u64); 1] = [(
    "06226e46111a0b59caaf126043eb5bbf28c34f3a5e332a1fc7b2b73cf188910f",
    0,
)];

// BIP34 activation, from which duplicate hashes can no longer be mined
const MAINNET_ALLOW_COLLISIONS_HEIGHT: u64 = 227931;
const TESTNET_ALLOW_COLLISIONS_HEIGHT: u64 = 21111;

// Patches and alternative work rules are opt-in on every profile
const DEFAULT_OFF: [RuleFork; 3] = [
    RuleFork::TimeWarpPatch,
    RuleFork::RetargetOverflowPatch,
    RuleFork::ScryptProofOfWork,
];

fn checkpoint_table(table: &[(&str, u64)]) -> Vec<Checkpoint> {
    table
        .iter()
        .map(|(hash, height)| {
            Checkpoint::new(hash.parse().expect("checkpoint table hash is valid hex"), *height)
        })
        .collect()
}

/// Consensus rule toggles and checkpoints for one network profile
#[derive(Debug, Clone, PartialEq)]
pub struct ForkSettings {
    profile: NetworkProfile,

    /// Configured rules, one toggle per rule
    rules: RuleFork,

    /// Height at which the collision rule becomes active, if configured
    allow_collisions_height: u64,

    /// Checkpoints, ascending by height
    checkpoints: Vec<Checkpoint>,
}

impl ForkSettings {
    /// Default settings for a network profile
    pub fn new(profile: NetworkProfile) -> Self {
        let mut settings = Self {
            profile,
            rules: RULE_NAMES
                .iter()
                .map(|(_, rule)| *rule)
                .filter(|rule| !DEFAULT_OFF.contains(rule))
                .fold(RuleFork::none(), |rules, rule| rules | rule),
            allow_collisions_height: 0,
            checkpoints: Vec::new(),
        };

        match profile {
            NetworkProfile::Mainnet => {
                settings.allow_collisions_height = MAINNET_ALLOW_COLLISIONS_HEIGHT;
                settings.checkpoints = checkpoint_table(&MAINNET_CHECKPOINTS);
            }
            NetworkProfile::Testnet => {
                settings.set_rule(RuleFork::Difficult, false);
                settings.allow_collisions_height = TESTNET_ALLOW_COLLISIONS_HEIGHT;
                settings.checkpoints = checkpoint_table(&TESTNET_CHECKPOINTS);
            }
            NetworkProfile::Regtest => {
                settings.set_rule(RuleFork::Retarget, false);
                settings.checkpoints = checkpoint_table(&REGTEST_CHECKPOINTS);
            }
            NetworkProfile::None => {}
        }

        settings
    }

    /// Read settings from configuration
    ///
    /// `network` selects the profile; `forks.<rule>` booleans and a
    /// `checkpoints` list of `<hash>:<height>` strings override it.
    pub fn from_config(config: &Config) -> Result<Self, ForkSettingsError> {
        let profile: NetworkProfile =
            config.get_string("network").unwrap_or("mainnet".to_string()).parse()?;
        let mut settings = Self::new(profile);
        info!("Fork settings for network '{profile}'");

        for (name, rule) in RULE_NAMES {
            if let Ok(enabled) = config.get_bool(&format!("forks.{name}")) {
                info!("Rule {name} overridden to {enabled}");
                settings.set_rule(rule, enabled);
            }
        }

        if let Ok(checkpoints) = config.get::<Vec<String>>("checkpoints") {
            let mut parsed = checkpoints
                .iter()
                .map(|text| text.parse())
                .collect::<Result<Vec<Checkpoint>, _>>()?;
            parsed.sort_by_key(|checkpoint| checkpoint.height);
            info!("Using {} configured checkpoints", parsed.len());
            settings.checkpoints = parsed;
        }

        Ok(settings)
    }

    pub fn profile(&self) -> NetworkProfile {
        self.profile
    }

    /// Toggle one rule
    pub fn set_rule(&mut self, rule: RuleFork, enabled: bool) {
        if enabled {
            self.rules |= rule;
        } else {
            self.rules &= !rule;
        }
    }

    /// Whether the rule is switched on in configuration
    pub fn is_configured(&self, rule: RuleFork) -> bool {
        self.rules.contains(rule)
    }

    /// Bitmask of all configured rules
    pub fn enabled_forks(&self) -> RuleFork {
        self.rules
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Checkpoint at exactly this height
    pub fn checkpoint_at(&self, height: u64) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|checkpoint| checkpoint.height == height)
    }

    /// True at or below the highest checkpoint
    pub fn is_under_checkpoint(&self, height: u64) -> bool {
        self.checkpoints.last().is_some_and(|top| height <= top.height)
    }

    /// Rules in force for a block at the given height
    pub fn forks_at(&self, height: u64) -> RuleFork {
        let mut forks = self.rules;
        if height < self.allow_collisions_height {
            forks &= !RuleFork::AllowCollisions;
        }
        forks
    }

    /// Consensus context for a block at the given height
    pub fn context(&self, height: u64, median_time_past: u32) -> ConsensusContext {
        ConsensusContext::new(
            height,
            self.forks_at(height),
            self.is_under_checkpoint(height),
            median_time_past,
        )
    }
}
