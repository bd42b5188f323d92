use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "agentpad")]
#[clap(version, about = "Terminal playground for sandboxed agent scripts")]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub global_opts: GlobalOpts,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Configuration file path
    #[clap(short, long, global = true, env = "AGENTPAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[clap(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a script in the playground sandbox
    Run(RunArgs),

    /// Run a bundled demo script (list them with no name)
    Demo(DemoArgs),

    /// Browse saved output history
    History(HistoryArgs),

    /// Initialize a new agentpad configuration
    Init(InitArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

// ============================================================================
// Run Command
// ============================================================================

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script file to execute ("-" reads from stdin)
    pub file: PathBuf,

    /// Source language of the script
    #[clap(long, default_value = "js", value_parser = parse_language)]
    pub language: crate::sandbox::SourceLanguage,

    /// Skip saving this run's output to history
    #[clap(long)]
    pub no_save: bool,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Demo name (hello, config, echo-agent, balance-agent, input-loop)
    pub name: Option<String>,

    /// Skip saving this run's output to history
    #[clap(long)]
    pub no_save: bool,
}

// ============================================================================
// History Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[clap(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List saved output tabs
    List,
    /// Print one saved tab by id or name ("Output 3")
    Show {
        /// Tab id or display name
        id: String,
    },
    /// Delete all saved tabs
    Clear,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[clap(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
}

// ============================================================================
// Common Types
// ============================================================================

fn parse_language(s: &str) -> Result<crate::sandbox::SourceLanguage, String> {
    crate::sandbox::SourceLanguage::parse(s)
        .ok_or_else(|| "Language must be one of: js, ts".to_string())
}

#[derive(Debug, Clone, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SourceLanguage;

    #[test]
    fn run_defaults_to_javascript() {
        let cli = Cli::parse_from(["agentpad", "run", "script.js"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.language, SourceLanguage::JavaScript);
                assert!(!args.no_save);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn language_flag_accepts_both_tags() {
        let cli = Cli::parse_from(["agentpad", "run", "script.ts", "--language", "ts"]);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.language, SourceLanguage::TypeScript),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["agentpad", "run", "x", "--language", "py"]).is_err());
    }

    #[test]
    fn history_show_requires_an_id() {
        assert!(Cli::try_parse_from(["agentpad", "history", "show"]).is_err());
        let cli = Cli::parse_from(["agentpad", "history", "show", "Output 2"]);
        match cli.command {
            Commands::History(args) => {
                assert!(matches!(args.action, HistoryAction::Show { ref id } if id == "Output 2"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
