use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use nxapictl::config::{self, Config, Scheme, Scope};
use nxapictl::decode::Decoded;
use nxapictl::model::DomainEntity;
use nxapictl::{LogicalCommand, NxClient, ProtocolMode, RequestEnvelope};
use serde_json::Value;
use std::io::{self, IsTerminal};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "nxapictl",
    version,
    about = "CLI for the Cisco NX-API device management interface"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Device host name or address (otherwise read from config)"
    )]
    host: Option<String>,

    #[arg(long, global = true, help = "Port override (defaults to the scheme's port)")]
    port: Option<u16>,

    #[arg(long, global = true, value_enum)]
    scheme: Option<SchemeArg>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true, help = "Password override for this invocation")]
    password: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        help = "Wire protocol (json-rpc or legacy ins_api)"
    )]
    protocol: Option<ProtocolArg>,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: Option<u64>,

    #[arg(
        long,
        global = true,
        help = "Accept self-signed device certificates"
    )]
    insecure: bool,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format (propagates to subcommands)"
    )]
    output: OutputFormat,

    #[arg(
        long,
        value_name = "COL1,COL2",
        global = true,
        help = "Override table columns (comma-separated)"
    )]
    columns: Option<String>,

    #[arg(
        long,
        value_name = "COLUMN",
        global = true,
        help = "Sort table rows by column (ascending)"
    )]
    sort_by: Option<String>,

    #[arg(
        long,
        value_name = "TEXT",
        global = true,
        help = "Filter rows containing TEXT (case-insensitive)"
    )]
    filter: Option<String>,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "More log output on stderr (-v info, -vv debug, -vvv trace)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist the connection flags given on the command line
    ///
    /// Example: nxapictl configure --host 10.0.0.5 --username admin --password secret
    Configure {
        #[arg(long, value_name = "BOOL", help = "Store whether to verify the device certificate")]
        verify_tls: Option<bool>,
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
    },
    /// Run a show command against the device
    Show {
        #[arg(value_enum)]
        target: ShowTarget,
    },
    /// Print the request that would be sent for COMMAND, without sending it
    Encode {
        /// Command name (e.g. `vlans`) or CLI string (e.g. "show vlan")
        command: LogicalCommand,
    },
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShowTarget {
    Version,
    Interfaces,
    Vlans,
    Resources,
    Environment,
    RunningConfig,
    BgpSummary,
    Transceivers,
}

impl From<ShowTarget> for LogicalCommand {
    fn from(value: ShowTarget) -> Self {
        match value {
            ShowTarget::Version => LogicalCommand::SystemInfo,
            ShowTarget::Interfaces => LogicalCommand::Interfaces,
            ShowTarget::Vlans => LogicalCommand::Vlans,
            ShowTarget::Resources => LogicalCommand::SystemResources,
            ShowTarget::Environment => LogicalCommand::Environment,
            ShowTarget::RunningConfig => LogicalCommand::RunningConfig,
            ShowTarget::BgpSummary => LogicalCommand::BgpSummary,
            ShowTarget::Transceivers => LogicalCommand::Transceivers,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
    Raw,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemeArg {
    Http,
    Https,
}

impl From<SchemeArg> for Scheme {
    fn from(value: SchemeArg) -> Self {
        match value {
            SchemeArg::Http => Scheme::Http,
            SchemeArg::Https => Scheme::Https,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProtocolArg {
    #[value(name = "json-rpc", alias = "jsonrpc")]
    JsonRpc,
    #[value(name = "legacy", aliases = ["ins-api", "ins_api"])]
    Legacy,
}

impl From<ProtocolArg> for ProtocolMode {
    fn from(value: ProtocolArg) -> Self {
        match value {
            ProtocolArg::JsonRpc => ProtocolMode::JsonRpc,
            ProtocolArg::Legacy => ProtocolMode::LegacyInsApi,
        }
    }
}

#[derive(Clone)]
struct RenderOpts {
    columns_override: Option<Vec<String>>,
    sort_by: Option<String>,
    filter: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cwd = std::env::current_dir().context("reading current directory")?;

    match &cli.command {
        Commands::Configure { verify_tls, scope } => {
            let existing = config::load_scope((*scope).into(), &cwd)?;
            let mut update = overrides_from(&cli);
            if verify_tls.is_some() {
                update.verify_tls = *verify_tls;
            }
            let path = config::save((*scope).into(), &config::merge(existing, update), &cwd)?;
            println!("Saved device settings to {}", path.display());
        }
        Commands::Show { target } => {
            let cmd = LogicalCommand::from(*target);
            let overrides = overrides_from(&cli);
            let effective = config::resolve(&cwd, overrides)?;
            let client = NxClient::new(effective).context("building NX-API client")?;
            let render_opts = RenderOpts {
                columns_override: cli.columns.as_ref().map(|c| {
                    c.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }),
                sort_by: cli.sort_by.clone(),
                filter: cli.filter.clone(),
            };
            run_show(&client, cmd, cli.output, &render_opts)?;
        }
        Commands::Encode { command } => {
            let mode = match cli.protocol {
                Some(protocol) => protocol.into(),
                None => config::load(&cwd)?.protocol.unwrap_or_default(),
            };
            let envelope = RequestEnvelope::new(*command, mode);
            let value = serde_json::to_value(&envelope).context("encoding request")?;
            match cli.output {
                OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(&value)?),
                OutputFormat::Json | OutputFormat::Raw => {
                    println!("{}", serde_json::to_string(&value)?)
                }
            }
        }
        Commands::ConfigShow => {
            let merged = config::load(&cwd)?;
            let mut masked = merged.clone();
            if masked.password.is_some() {
                masked.password = Some("*****".into());
            }
            println!("{}", serde_json::to_string_pretty(&masked)?);
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut io::stdout())
                }
                CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, &mut io::stdout()),
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut io::stdout())
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second subscriber can only be installed by tests; ignore it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

fn overrides_from(cli: &Cli) -> Config {
    Config {
        host: cli.host.clone(),
        port: cli.port,
        scheme: cli.scheme.map(Into::into),
        username: cli.username.clone(),
        password: cli.password.clone(),
        protocol: cli.protocol.map(Into::into),
        timeout_secs: cli.timeout,
        verify_tls: cli.insecure.then_some(false),
    }
}

fn run_show(
    client: &NxClient,
    cmd: LogicalCommand,
    output: OutputFormat,
    render_opts: &RenderOpts,
) -> Result<()> {
    let command = cmd.command_string();
    if output == OutputFormat::Raw {
        let payload = client
            .payload(cmd)
            .with_context(|| format!("running `{command}`"))?;
        match payload {
            Value::String(text) => print!("{text}"),
            other => println!("{}", serde_json::to_string(&other)?),
        }
        return Ok(());
    }

    let decoded = client
        .fetch(cmd)
        .with_context(|| format!("running `{command}`"))?;
    report_warnings(&decoded);
    render_entity(&decoded.value, output, render_opts)
}

fn report_warnings(decoded: &Decoded<DomainEntity>) {
    for warning in &decoded.warnings {
        warn!(variant = decoded.variant, "{warning}");
    }
}

fn render_entity(entity: &DomainEntity, output: OutputFormat, render_opts: &RenderOpts) -> Result<()> {
    if let Some(text) = entity.text()
        && output == OutputFormat::Pretty
    {
        print!("{text}");
        if !text.ends_with('\n') {
            println!();
        }
        return Ok(());
    }

    let json = serde_json::to_value(entity).context("serializing result")?;
    match output {
        OutputFormat::Json | OutputFormat::Raw => println!("{}", serde_json::to_string(&json)?),
        OutputFormat::Pretty => match entity {
            DomainEntity::Interfaces(_) => print_table(
                &json,
                Some(&[
                    "name",
                    "state",
                    "admin_state",
                    "mode",
                    "speed",
                    "mtu",
                    "ip_address",
                    "description",
                ]),
                render_opts,
            ),
            DomainEntity::Vlans(_) => print_table(
                &json,
                Some(&["id", "name", "state", "shutdown", "ports"]),
                render_opts,
            ),
            DomainEntity::Transceivers(_) => print_table(
                &json,
                Some(&[
                    "interface",
                    "present",
                    "kind",
                    "vendor",
                    "part_number",
                    "serial_number",
                ]),
                render_opts,
            ),
            DomainEntity::Environment(_) => {
                for (title, section) in [
                    ("Fans", "fans"),
                    ("Power supplies", "power_supplies"),
                    ("Temperature sensors", "sensors"),
                ] {
                    println!("{title}:");
                    print_table(&json[section], None, render_opts);
                    println!();
                }
                println!("{}", serde_json::to_string_pretty(&json["power_summary"])?);
            }
            _ => println!("{}", serde_json::to_string_pretty(&json)?),
        },
    }

    Ok(())
}

fn print_table(json: &Value, columns_hint: Option<&[&str]>, render_opts: &RenderOpts) {
    let rows = match json {
        Value::Array(arr) => arr,
        _ => return,
    };

    if rows.is_empty() {
        println!("No entries found.");
        return;
    }

    let has_value = |key: &str| {
        rows.iter()
            .any(|row| row.get(key).map(is_non_empty).unwrap_or(false))
    };

    let mut columns: Vec<String> = Vec::new();

    if let Some(override_cols) = &render_opts.columns_override {
        columns.extend(override_cols.iter().filter(|k| has_value(k.as_str())).cloned());
    }

    if columns.is_empty()
        && let Some(hint) = columns_hint
    {
        columns.extend(hint.iter().filter(|k| has_value(*k)).map(|k| k.to_string()));
    }

    if columns.is_empty()
        && let Some(Value::Object(first)) = rows.first()
    {
        // Up to 8 scalar fields of the first row that carry a value somewhere.
        columns.extend(
            first
                .iter()
                .filter(|(key, value)| !value.is_object() && has_value(key.as_str()))
                .map(|(key, _)| key.clone())
                .take(8),
        );
    }

    if columns.is_empty() {
        return;
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let mut table: Vec<Vec<String>> = Vec::new();
    let needle = render_opts.filter.as_ref().map(|f| f.to_ascii_lowercase());

    for row in rows {
        if let Value::Object(map) = row {
            let out_row: Vec<String> = columns
                .iter()
                .map(|col| value_to_str(map.get(col).unwrap_or(&Value::Null)))
                .collect();
            if let Some(needle) = &needle
                && !out_row
                    .iter()
                    .any(|cell| cell.to_ascii_lowercase().contains(needle))
            {
                continue;
            }
            for (idx, cell) in out_row.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
            table.push(out_row);
        }
    }

    if table.is_empty() {
        println!("No entries found.");
        return;
    }

    if let Some(sort) = &render_opts.sort_by
        && let Some(idx) = columns.iter().position(|c| c == sort)
    {
        table.sort_by(|a, b| natural_cmp(&a[idx], &b[idx]));
    }

    print_row(&columns, &widths);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    print_row(&separator, &widths);
    for row in &table {
        print_row(row, &widths);
    }
}

fn print_row(cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:width$}"))
        .collect();
    println!("{}", line.join("  ").trim_end());
}

/// Numbers sort numerically, everything else lexically.
fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

fn value_to_str(value: &Value) -> String {
    match value {
        Value::Null => "".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(|i| !i.is_object() && !i.is_array()) => items
            .iter()
            .map(value_to_str)
            .collect::<Vec<_>>()
            .join(","),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(_) => true,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
