use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use medchain_sdk::{SortKey, StatusFilter};

#[derive(Parser)]
#[command(
    name = "medchain",
    about = "MedChain: pharmaceutical supply-chain ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Block journal to open (overrides `journal_path` from the config file)
    #[arg(short, long, global = true)]
    pub ledger: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the journal with its genesis block
    Init(InitArgs),
    /// Load the sample supply-chain dataset
    Demo(DemoArgs),
    /// Queue a transaction for the next block
    Submit(SubmitArgs),
    /// Seal pending transactions into a block
    Seal,
    /// List transactions waiting for the next seal
    Pending,
    /// List blocks
    Blocks(BlocksArgs),
    /// Show a sealed transaction and its inclusion proof
    Show(ShowArgs),
    /// Show the world state, or one entry
    State(StateArgs),
    /// Show the classified audit log
    Audit(AuditArgs),
    /// Find blocks mentioning a term
    Search(SearchArgs),
    /// Show the chain of custody of a batch
    Trace(TraceArgs),
    /// Verify chain integrity
    Verify(VerifyArgs),
    /// Drop every block after genesis
    Reset(ResetArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Also load the sample dataset
    #[arg(long)]
    pub demo: bool,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Reset to genesis before loading
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Chaincode function, e.g. createDrugBatch or dispatchBatch
    pub function: String,
    /// Submitting identity
    #[arg(long)]
    pub creator: String,
    /// Endorsing peer, e.g. peer0.manufacturer.medchain.com
    #[arg(long)]
    pub endorser: Option<String>,
    /// Positional chaincode argument (repeatable)
    #[arg(short, long = "arg")]
    pub args: Vec<String>,
    /// Payload field as key=value; JSON values are parsed (repeatable)
    #[arg(short, long = "field")]
    pub fields: Vec<String>,
    /// Nonzero marks the transaction invalid
    #[arg(long, default_value = "0")]
    pub validation_code: u32,
    /// Seal immediately
    #[arg(long)]
    pub seal: bool,
}

#[derive(Args)]
pub struct BlocksArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// Print every transaction in each block
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub tx_id: String,
}

#[derive(Args)]
pub struct StateArgs {
    pub key: Option<String>,
}

#[derive(Args)]
pub struct AuditArgs {
    /// all, complete, pending, or waiting
    #[arg(long, default_value = "all")]
    pub status: StatusFilter,
    /// Case-insensitive text filter over every field
    #[arg(short, long)]
    pub search: Option<String>,
    /// timestamp, action, or status
    #[arg(long, default_value = "timestamp")]
    pub sort: SortKey,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct SearchArgs {
    pub term: String,
}

#[derive(Args)]
pub struct TraceArgs {
    pub batch: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Only check the configured window of recent blocks
    #[arg(long)]
    pub recent: bool,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Required confirmation
    #[arg(long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_demo() {
        let cli = Cli::try_parse_from(["medchain", "init", "--demo"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert!(args.demo);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_submit() {
        let cli = Cli::try_parse_from([
            "medchain", "submit", "dispatchBatch",
            "--creator", "manufacturer-admin",
            "-a", "batch001",
            "-f", "batchId=batch001",
            "-f", "quantity=500",
            "--seal",
        ])
        .unwrap();
        if let Command::Submit(args) = cli.command {
            assert_eq!(args.function, "dispatchBatch");
            assert_eq!(args.creator, "manufacturer-admin");
            assert_eq!(args.args, vec!["batch001"]);
            assert_eq!(args.fields, vec!["batchId=batch001", "quantity=500"]);
            assert_eq!(args.validation_code, 0);
            assert!(args.seal);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn submit_requires_creator() {
        assert!(Cli::try_parse_from(["medchain", "submit", "createDrugBatch"]).is_err());
    }

    #[test]
    fn parse_audit_filters() {
        let cli = Cli::try_parse_from([
            "medchain", "audit", "--status", "waiting", "--sort", "action", "-s", "aiims",
        ])
        .unwrap();
        if let Command::Audit(args) = cli.command {
            assert_eq!(args.status, StatusFilter::Waiting);
            assert_eq!(args.sort, SortKey::Action);
            assert_eq!(args.search, Some("aiims".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn audit_defaults() {
        let cli = Cli::try_parse_from(["medchain", "audit"]).unwrap();
        if let Command::Audit(args) = cli.command {
            assert_eq!(args.status, StatusFilter::All);
            assert_eq!(args.sort, SortKey::Timestamp);
            assert!(args.limit.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(Cli::try_parse_from(["medchain", "audit", "--status", "lost"]).is_err());
    }

    #[test]
    fn parse_blocks_limit() {
        let cli = Cli::try_parse_from(["medchain", "blocks", "-n", "5", "--full"]).unwrap();
        if let Command::Blocks(args) = cli.command {
            assert_eq!(args.limit, 5);
            assert!(args.full);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "medchain", "verify", "--recent", "--ledger", "data/medchain.jsonl", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.ledger, Some(PathBuf::from("data/medchain.jsonl")));
        if let Command::Verify(args) = cli.command {
            assert!(args.recent);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_trace_and_search() {
        let cli = Cli::try_parse_from(["medchain", "trace", "BATCH-1ldf2g-ABCDE"]).unwrap();
        assert!(matches!(cli.command, Command::Trace(ref a) if a.batch == "BATCH-1ldf2g-ABCDE"));
        let cli = Cli::try_parse_from(["medchain", "search", "batch001"]).unwrap();
        assert!(matches!(cli.command, Command::Search(ref a) if a.term == "batch001"));
    }
}
