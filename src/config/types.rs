use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentpadConfig {
    pub credentials: CredentialsConfig,
    pub model: ModelConfig,
    pub ledger: LedgerConfig,
    pub sandbox: SandboxConfig,
    pub output: OutputConfig,
}

/// Credentials handed to sandboxed scripts through `getConfig()`.
///
/// Empty values fall back to process environment variables
/// (`AGENTPAD_ACCOUNT_ID`, `AGENTPAD_PRIVATE_KEY`, `AGENTPAD_API_KEY`),
/// then to the empty string. See `loader::ResolvedCredentials`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Ledger account identifier (e.g. "0.0.12345")
    pub account_id: String,
    /// Private key for the account
    pub private_key: String,
    /// Model provider API key
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Which provider backs `createAgent` (openai, anthropic)
    pub provider: String,
    /// Default model when a script doesn't pick one
    pub model: String,
    /// API base URL override
    pub base_url: Option<String>,
    /// Maximum provider round-trips per agent turn
    pub max_iterations: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_iterations: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Network label exposed to scripts (testnet, mainnet, local)
    pub network: String,
    /// REST gateway base URL for query tools
    pub gateway_url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            gateway_url: "http://localhost:5551/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Wall-clock limit for uninterrupted engine execution. Refreshed at
    /// every suspension point, so waiting on input never trips it.
    pub timeout_seconds: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Snapshot completed runs into the history directory
    pub save_history: bool,
    /// Maximum retained output tabs; oldest evicted first
    pub max_tabs: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_history: true,
            max_tabs: 10,
        }
    }
}
