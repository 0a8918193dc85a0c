use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use medchain_sdk::{
    AuditQuery, AuditStatus, Block, LedgerTime, MedChain, MedChainConfig, Transaction,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::*;

const DEFAULT_JOURNAL: &str = "medchain.jsonl";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let chain = open_chain(&cli)?;
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Init(args) => cmd_init(&chain, args),
        Command::Demo(args) => cmd_demo(&chain, args),
        Command::Submit(args) => cmd_submit(&chain, args),
        Command::Seal => cmd_seal(&chain),
        Command::Pending => cmd_pending(&chain, json),
        Command::Blocks(args) => cmd_blocks(&chain, args, json),
        Command::Show(args) => cmd_show(&chain, args, json),
        Command::State(args) => cmd_state(&chain, args, json),
        Command::Audit(args) => cmd_audit(&chain, args, json),
        Command::Search(args) => cmd_search(&chain, args, json),
        Command::Trace(args) => cmd_trace(&chain, args, json),
        Command::Verify(args) => cmd_verify(&chain, args, json),
        Command::Reset(args) => cmd_reset(&chain, args),
    }
}

/// Journal path precedence: `--ledger`, then the config file, then
/// `medchain.jsonl` in the working directory.
fn open_chain(cli: &Cli) -> anyhow::Result<MedChain> {
    let mut config = match &cli.config {
        Some(path) => MedChainConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MedChainConfig::default(),
    };
    if let Some(path) = &cli.ledger {
        config.journal_path = Some(path.clone());
    }
    if config.journal_path.is_none() {
        config.journal_path = Some(DEFAULT_JOURNAL.into());
    }
    let journal = config.journal_path.clone().unwrap_or_default();
    tracing::debug!(journal = %journal.display(), chaincode = %config.chaincode, "opening ledger");
    MedChain::open(config).with_context(|| format!("opening ledger {}", journal.display()))
}

fn cmd_init(chain: &MedChain, args: InitArgs) -> anyhow::Result<()> {
    let genesis = chain
        .block(0)?
        .context("ledger has no genesis block")?;
    println!("{} Ledger ready ({} blocks)", "✓".green().bold(), chain.height()?);
    println!("  Genesis: {}", genesis.fingerprint.to_hex().cyan());
    if args.demo {
        let sealed = chain.load_sample()?;
        println!("{} Sample dataset loaded: {} blocks", "✓".green().bold(), sealed);
    }
    Ok(())
}

fn cmd_demo(chain: &MedChain, args: DemoArgs) -> anyhow::Result<()> {
    if args.fresh {
        chain.reset()?;
    }
    let sealed = chain.load_sample()?;
    println!("{} Sample dataset loaded: {} blocks", "✓".green().bold(), sealed);
    println!("  Height: {}", chain.height()?.to_string().bold());
    Ok(())
}

fn cmd_submit(chain: &MedChain, args: SubmitArgs) -> anyhow::Result<()> {
    let mut draft = chain
        .draft(args.function, args.creator)
        .with_args(args.args)
        .with_validation_code(args.validation_code);
    if let Some(endorser) = args.endorser {
        draft = draft.with_endorser(endorser);
    }
    for field in &args.fields {
        let (key, value) = parse_field(field)?;
        draft = draft.with_field(key, value);
    }

    let id = chain.submit_transaction(draft)?;
    println!("{} Transaction accepted: {}", "✓".green().bold(), id.yellow());
    if args.seal {
        cmd_seal(chain)?;
    } else {
        println!("  Pending: {}", chain.pending()?.len());
    }
    Ok(())
}

/// Split `key=value`; the value is parsed as JSON when it is valid JSON,
/// otherwise kept as a string.
fn parse_field(field: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, raw)) = field.split_once('=') else {
        bail!("field `{field}` must be key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("field `{field}` has an empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn cmd_seal(chain: &MedChain) -> anyhow::Result<()> {
    let sealed = chain.seal_all()?;
    if sealed.is_empty() {
        println!("Nothing to seal.");
    }
    for block in &sealed {
        println!(
            "{} Sealed block {} ({} transactions) {}",
            "✓".green().bold(),
            format!("#{}", block.index).yellow().bold(),
            block.transaction_count(),
            block.fingerprint.short_hex().dimmed()
        );
    }
    Ok(())
}

fn cmd_pending(chain: &MedChain, json: bool) -> anyhow::Result<()> {
    let pending = chain.pending()?;
    if json {
        return print_json(&pending);
    }
    if pending.is_empty() {
        println!("No pending transactions.");
    }
    for tx in &pending {
        print_transaction(tx, "  ");
    }
    Ok(())
}

fn cmd_blocks(chain: &MedChain, args: BlocksArgs, json: bool) -> anyhow::Result<()> {
    let snapshot = chain.get_ledger()?;
    let blocks: Vec<&Block> = snapshot
        .blocks()
        .iter()
        .rev()
        .take(args.limit)
        .map(|b| b.as_ref())
        .collect();
    if json {
        return print_json(&blocks);
    }
    for block in blocks {
        print_block(block, args.full);
    }
    Ok(())
}

fn cmd_show(chain: &MedChain, args: ShowArgs, json: bool) -> anyhow::Result<()> {
    let Some((index, tx)) = chain.find_transaction(&args.tx_id)? else {
        bail!("transaction {} not found", args.tx_id);
    };
    let proof = chain.inclusion_proof(&args.tx_id)?;
    if json {
        return print_json(&serde_json::json!({
            "block_index": index,
            "transaction": tx,
            "proof": proof,
        }));
    }
    println!("Transaction {} in block {}", tx.id.yellow().bold(), format!("#{index}").yellow());
    print_transaction(&tx, "  ");
    if let Some(proof) = proof {
        let verdict = if proof.verify() { "valid".green() } else { "invalid".red() };
        println!("  Inclusion proof: {} ({} steps, root {})", verdict, proof.path.len(), proof.root.short_hex());
    }
    Ok(())
}

fn cmd_state(chain: &MedChain, args: StateArgs, json: bool) -> anyhow::Result<()> {
    if let Some(key) = args.key {
        let Some(entry) = chain.world_state_entry(&key)? else {
            bail!("no world-state entry for {key}");
        };
        if json {
            return print_json(&entry);
        }
        println!("{} (v{}, block #{})", key.yellow().bold(), entry.version(), entry.last_block());
        for (field, value) in entry.attributes() {
            println!("  {}: {}", field.bold(), render_value(value));
        }
        println!("  {}: {}", "updated".dimmed(), fmt_time(entry.updated_at()));
        return Ok(());
    }

    let state = chain.get_world_state()?;
    if json {
        return print_json(&state);
    }
    if state.is_empty() {
        println!("World state is empty.");
    }
    for (key, entry) in state.iter() {
        println!(
            "{}  {}  {}  {}",
            key.yellow().bold(),
            entry.get_str("drugName").unwrap_or_default(),
            entry.status().unwrap_or_default().cyan(),
            entry.current_location().unwrap_or_default().dimmed()
        );
    }
    Ok(())
}

fn cmd_audit(chain: &MedChain, args: AuditArgs, json: bool) -> anyhow::Result<()> {
    let mut query = AuditQuery::new().with_status(args.status).sorted_by(args.sort);
    if let Some(text) = args.search {
        query = query.with_text(text);
    }
    let mut rows = chain.get_audit_events(&query)?;
    if let Some(limit) = args.limit {
        rows.truncate(limit);
    }
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No audit events match.");
    }
    for row in &rows {
        let validity = if row.valid { String::new() } else { " [rejected]".red().to_string() };
        println!(
            "{}  {:<9} {}{}",
            fmt_time(row.timestamp).dimmed(),
            status_label(row.status),
            row.action.bold(),
            validity
        );
        println!(
            "    {} ({}) {}",
            row.actor,
            row.role.cyan(),
            row.key.as_deref().unwrap_or("-").yellow()
        );
        if let (Some(from), Some(to)) = (&row.from, &row.to) {
            println!("    {} → {}", from, to);
        }
    }
    Ok(())
}

fn cmd_search(chain: &MedChain, args: SearchArgs, json: bool) -> anyhow::Result<()> {
    let hits = chain.search_ledger(&args.term)?;
    if json {
        let blocks: Vec<&Block> = hits.iter().map(|b| b.as_ref()).collect();
        return print_json(&blocks);
    }
    println!("Found {} blocks matching \"{}\"", hits.len().to_string().bold(), args.term);
    for block in &hits {
        print_block(block, true);
    }
    Ok(())
}

fn cmd_trace(chain: &MedChain, args: TraceArgs, json: bool) -> anyhow::Result<()> {
    let Some(trail) = chain.trace(&args.batch)? else {
        bail!("no custody records for {}", args.batch);
    };
    if json {
        return print_json(&trail);
    }
    println!(
        "{} {}  stage: {}",
        trail.key.yellow().bold(),
        trail.drug_name.as_deref().unwrap_or_default(),
        trail.stage.to_string().cyan()
    );
    if let Some(origin) = &trail.origin {
        println!("  Origin: {origin}");
    }
    if let Some(location) = &trail.current_location {
        println!("  Current location: {}", location.bold());
    }
    if let Some(status) = trail.step_status {
        println!("  Latest step: {}", status_label(status));
    }
    for (n, hop) in trail.hops.iter().enumerate() {
        println!(
            "  {}. {}  {} by {} ({})",
            n + 1,
            fmt_time(hop.timestamp).dimmed(),
            hop.action.bold(),
            hop.handler,
            hop.role.cyan()
        );
        if let Some(location) = &hop.location {
            println!("     @ {location}");
        }
    }
    Ok(())
}

fn cmd_verify(chain: &MedChain, args: VerifyArgs, json: bool) -> anyhow::Result<()> {
    let report = if args.recent { chain.verify_recent()? } else { chain.verify()? };
    if json {
        print_json(&report)?;
    } else if report.is_valid() {
        let scope = match report.checked {
            Some((first, last)) => format!("blocks {first}..={last}"),
            None => "no blocks".into(),
        };
        println!("{} Chain integrity verified ({scope} of {})", "✓".green().bold(), report.block_count);
    } else {
        println!("{} Chain integrity violated", "✗".red().bold());
        for v in &report.violations {
            println!("  block {}: {:?}: {}", v.index.to_string().yellow(), v.kind, v.description);
        }
    }
    if !report.is_valid() {
        bail!("verification failed at block {}", report.violations[0].index);
    }
    Ok(())
}

fn cmd_reset(chain: &MedChain, args: ResetArgs) -> anyhow::Result<()> {
    if !args.yes {
        bail!("reset drops every block after genesis; pass --yes to confirm");
    }
    chain.reset()?;
    println!("{} Ledger reset to genesis", "✓".green().bold());
    Ok(())
}

fn print_block(block: &Block, full: bool) {
    let label = if block.is_genesis() { " genesis".dimmed().to_string() } else { String::new() };
    println!(
        "{}{}  {}  {} txs",
        format!("Block #{}", block.index).yellow().bold(),
        label,
        fmt_time(block.timestamp).dimmed(),
        block.transaction_count()
    );
    println!("  Fingerprint: {}", block.fingerprint.to_hex().cyan());
    println!("  Previous:    {}", block.prev_fingerprint.to_hex().dimmed());
    println!("  Merkle root: {}", block.merkle_root.short_hex());
    if full {
        for tx in &block.transactions {
            print_transaction(tx, "    ");
        }
    }
}

fn print_transaction(tx: &Transaction, indent: &str) {
    let code = if tx.is_valid() {
        "valid".green()
    } else {
        format!("code {}", tx.validation_code).red()
    };
    println!("{indent}{} {}  {}", tx.id.yellow(), tx.function.bold(), code);
    println!("{indent}  by {} via {}", tx.creator, tx.endorser.dimmed());
    if !tx.args.is_empty() {
        println!("{indent}  args: {}", tx.args.join(", "));
    }
    if !tx.payload.is_empty() {
        println!("{indent}  payload: {}", tx.payload_json().dimmed());
    }
}

fn status_label(status: AuditStatus) -> ColoredString {
    match status {
        AuditStatus::Complete => status.as_str().green(),
        AuditStatus::Pending => status.as_str().yellow(),
        AuditStatus::Waiting => status.as_str().blue(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Human timestamp; the logical counter is shown only when nonzero.
fn fmt_time(time: LedgerTime) -> String {
    let Some(wall) = i64::try_from(time.physical_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
    else {
        return time.to_string();
    };
    let base = wall.format("%Y-%m-%d %H:%M:%S").to_string();
    if time.logical == 0 {
        base
    } else {
        format!("{base}+{}", time.logical)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
