use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentpadError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Provider errors
    #[error("Provider '{provider}' not found")]
    ProviderNotFound { provider: String },

    #[error("API key missing for provider '{provider}'")]
    ApiKeyMissing { provider: String },

    #[error("Provider API error: {message}")]
    ProviderApi {
        message: String,
        status: Option<u16>,
    },

    #[error("Rate limited by provider, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    // Sandbox errors
    #[error("Script construction failed: {message}")]
    ScriptConstruction { message: String, stack: String },

    #[error("Script failed: {message}")]
    ScriptRuntime { message: String, stack: String },

    #[error("Script timed out after {seconds} seconds of uninterrupted execution")]
    ScriptTimeout { seconds: u64 },

    #[error("Script is suspended on a promise nothing can resolve")]
    ScriptStalled,

    #[error("Engine error: {0}")]
    Engine(String),

    // Agent errors
    #[error("No active agent; run a script that produces one first")]
    NoActiveAgent,

    #[error("Agent turn exceeded maximum iterations ({max})")]
    MaxIterationsExceeded { max: u32 },

    #[error("Unknown tool name '{tool}'")]
    ToolNotFound { tool: String },

    #[error("Invalid tool input for '{tool}': {reason}")]
    InvalidToolInput { tool: String, reason: String },

    // Ledger gateway errors
    #[error("Ledger gateway error: {message}")]
    Gateway {
        message: String,
        status: Option<u16>,
    },

    // History errors
    #[error("Output tab not found: {id}")]
    TabNotFound { id: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AgentpadError {
    /// True for failures the script itself caused, which are reported to the
    /// output sink instead of aborting the CLI.
    pub fn is_script_fault(&self) -> bool {
        matches!(
            self,
            Self::ScriptConstruction { .. }
                | Self::ScriptRuntime { .. }
                | Self::ScriptTimeout { .. }
                | Self::ScriptStalled
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentpadError>;
