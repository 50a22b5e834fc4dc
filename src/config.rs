use anyhow::{Context, Result};
use serde::Deserialize;

use crate::splice::InsertionStrategy;

pub const DEFAULT_TRACE_FILE: &str = "example.txt";
pub const DEFAULT_TEST_FILE: &str = "CryticToFoundry.t.sol";
pub const DEFAULT_FOLDER: &str = "ig";
pub const DEFAULT_FN_PREFIX: &str = "test_";

pub const DEFAULT_BROADCAST_DIR: &str = "broadcast";
pub const DEFAULT_ADDRESSES_OUTPUT: &str = "out/addresses.json";
pub const DEFAULT_CHAIN_ID: u64 = 31337;
pub const DEFAULT_TOKEN_CONTRACT: &str = "TestnetToken";
pub const DEFAULT_TOKEN_NAME_ARG: usize = 1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trace: Trace,
    pub addresses: Addresses,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Trace {
    /// The fuzzer trace to convert.
    pub trace_file: String,
    /// The test file name inside the target folder.
    pub test_file: String,
    pub default_folder: String,
    /// Prefix of the generated test function, e.g. `test_` -> `test_3`.
    pub fn_prefix: String,
    pub strategy: InsertionStrategy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Addresses {
    pub broadcast_dir: String,
    pub output: String,
    pub default_chain_id: u64,
    /// The generic token contract whose deployments are keyed by a constructor
    /// argument instead of the contract name.
    pub token_contract: String,
    pub token_name_arg: usize,
    pub steps: Vec<DeployStep>,
}

/// A deployment script and the functions whose broadcasts are scanned.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeployStep {
    pub script: String,
    pub functions: Vec<String>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            trace_file: DEFAULT_TRACE_FILE.to_string(),
            test_file: DEFAULT_TEST_FILE.to_string(),
            default_folder: DEFAULT_FOLDER.to_string(),
            fn_prefix: DEFAULT_FN_PREFIX.to_string(),
            strategy: InsertionStrategy::default(),
        }
    }
}

impl Default for Addresses {
    fn default() -> Self {
        Self {
            broadcast_dir: DEFAULT_BROADCAST_DIR.to_string(),
            output: DEFAULT_ADDRESSES_OUTPUT.to_string(),
            default_chain_id: DEFAULT_CHAIN_ID,
            token_contract: DEFAULT_TOKEN_CONTRACT.to_string(),
            token_name_arg: DEFAULT_TOKEN_NAME_ARG,
            steps: default_steps(),
        }
    }
}

impl DeployStep {
    pub fn new(script: &str, functions: &[&str]) -> Self {
        Self {
            script: script.to_string(),
            functions: functions.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn new(cfg_path: &str) -> Result<Self> {
        let cfg_str = std::fs::read_to_string(cfg_path).with_context(|| format!("failed to read config {cfg_path}"))?;
        let cfg: Config = toml::from_str(&cfg_str)?;
        Ok(cfg)
    }

    /// Load the config file if one is given, otherwise use the built-in defaults.
    pub fn load(cfg_path: Option<&str>) -> Result<Self> {
        match cfg_path {
            Some(path) => Self::new(path),
            None => Ok(Self::default()),
        }
    }
}

fn default_steps() -> Vec<DeployStep> {
    vec![
        DeployStep::new("01_CoreFoundations.s.sol", &["run"]),
        DeployStep::new("02_Token.s.sol", &["deployToken"]),
        DeployStep::new("03_Factory.s.sol", &["createIGMarket"]),
    ]
}
