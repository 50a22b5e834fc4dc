//! Deployed contract addresses collected from Foundry broadcast records.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{ser::PrettyFormatter, Value};
use tracing::{debug, info};

use crate::{
    config::Addresses,
    utils::{arg_to_string, checksum},
};

const CREATE: &str = "CREATE";

/// A `<function>-latest.json` file written by `forge script --broadcast`.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRecord {
    pub transactions: Vec<BroadcastTx>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTx {
    pub transaction_type: String,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<Value>>,
}

/// Deployments of `contract` are keyed by their constructor argument at `arg`,
/// so several instances can coexist.
#[derive(Debug, Clone)]
pub struct TokenRename {
    pub contract: String,
    pub arg: usize,
}

/// map<contract_name, address>, in deployment order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AddressBook {
    inner: IndexMap<String, String>,
}

impl BroadcastRecord {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read broadcast {}", path.display()))?;
        let record = serde_json::from_str(&content).with_context(|| format!("invalid broadcast {}", path.display()))?;
        Ok(record)
    }

    pub fn creations(&self) -> impl Iterator<Item = &BroadcastTx> {
        self.transactions.iter().filter(|tx| tx.transaction_type == CREATE)
    }
}

impl BroadcastTx {
    /// The name this deployment is known by in the address book.
    pub fn logical_name(&self, rename: &TokenRename) -> Result<String> {
        let contract_name = self
            .contract_name
            .as_deref()
            .ok_or_else(|| anyhow!("CREATE transaction without contractName"))?;
        if contract_name != rename.contract {
            return Ok(contract_name.to_string());
        }

        self.arguments
            .as_ref()
            .and_then(|args| args.get(rename.arg))
            .map(arg_to_string)
            .ok_or_else(|| anyhow!("{} deployment without constructor argument {}", contract_name, rename.arg))
    }
}

impl TokenRename {
    pub fn new(contract: &str, arg: usize) -> Self {
        Self {
            contract: contract.to_string(),
            arg,
        }
    }
}

impl From<&Addresses> for TokenRename {
    fn from(cfg: &Addresses) -> Self {
        Self::new(&cfg.token_contract, cfg.token_name_arg)
    }
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every configured deployment step for `chain_id`, in order.
    pub fn build(cfg: &Addresses, chain_id: u64) -> Result<Self> {
        let rename = TokenRename::from(cfg);
        let mut book = Self::new();
        for step in &cfg.steps {
            for function in &step.functions {
                let path = broadcast_path(&cfg.broadcast_dir, &step.script, chain_id, function);
                debug!("Load broadcast from {}", path.display());
                let record = BroadcastRecord::read(&path)?;
                book.extend_from_record(&record, &rename)?;
            }
        }

        info!("Collected {} addresses on chain {}", book.len(), chain_id);
        Ok(book)
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a BroadcastRecord>, rename: &TokenRename) -> Result<Self> {
        let mut book = Self::new();
        for record in records {
            book.extend_from_record(record, rename)?;
        }
        Ok(book)
    }

    /// Add every contract created in `record`. A name seen before is
    /// overwritten by the newer deployment and keeps its first position.
    pub fn extend_from_record(&mut self, record: &BroadcastRecord, rename: &TokenRename) -> Result<()> {
        for tx in record.creations() {
            let name = tx.logical_name(rename)?;
            let address = tx
                .contract_address
                .as_deref()
                .ok_or_else(|| anyhow!("CREATE transaction of {} without contractAddress", name))?;

            let address = checksum(address);
            debug!("{} => {}", name, address);
            if let Some(prev) = self.inner.insert(name.clone(), address) {
                debug!("{} redeployed, replacing {}", name, prev);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The mapping as a JSON object indented with 4 spaces.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(path, self.to_json_pretty()?).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// `<broadcast_dir>/<script>/<chain_id>/<function>-latest.json`
pub fn broadcast_path(broadcast_dir: &str, script: &str, chain_id: u64, function: &str) -> PathBuf {
    Path::new(broadcast_dir)
        .join(script)
        .join(chain_id.to_string())
        .join(format!("{function}-latest.json"))
}
