use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use dhcppools::{
    AddressFamily, Config, OutputFormat, OutputLimit, Pools, Report, Result, conf_file,
    lease_file, output,
};

#[derive(Parser)]
#[command(name = "dhcppools")]
#[command(author, version, about = "ISC dhcpd pool usage analyzer", long_about = None)]
struct Cli {
    /// JSON settings file; flags below override its values
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Path to dhcpd.conf
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to dhcpd.leases
    #[arg(short, long)]
    leases: Option<PathBuf>,

    /// Sort keys: n(ame) i(p) m(ax) c(urrent) p(ercent) t(ouched) T(ouched+current) e (t+c percent)
    #[arg(short, long)]
    sort: Option<String>,

    /// Reverse the final order
    #[arg(short, long)]
    reverse: bool,

    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Sections to print as two digits, headers then rows: 1 ranges, 2 shared networks, 4 summary
    #[arg(short = 'L', long)]
    limit: Option<OutputLimit>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force the address family (4 or 6) instead of detecting it
    #[arg(long)]
    ip_version: Option<String>,

    /// Report subnets outside shared networks as their own shared networks
    #[arg(short = 'A', long)]
    all_as_shared: bool,

    /// Warning threshold in percent
    #[arg(long)]
    warning: Option<f64>,

    /// Critical threshold in percent
    #[arg(long)]
    critical: Option<f64>,

    /// Warn only while fewer addresses than this are free
    #[arg(long)]
    warn_count: Option<f64>,

    /// Go critical only while fewer addresses than this are free
    #[arg(long)]
    crit_count: Option<f64>,

    /// Never alarm on pools of this size or smaller
    #[arg(long)]
    minsize: Option<f64>,

    /// Alarm on shared networks instead of their ranges
    #[arg(long)]
    snet_alarms: bool,

    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Report,
    /// Print a one-line alarm summary and exit 0 (ok), 1 (warning) or 2 (critical)
    Check,
    ShowConfig,
    ListLeases,
}

impl Cli {
    fn to_config(&self) -> Result<Config> {
        let mut config = match &self.settings {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(path) = &self.config {
            config.dhcpd_conf = path.clone();
        }
        if let Some(path) = &self.leases {
            config.dhcpd_leases = path.clone();
        }
        if let Some(sort) = &self.sort {
            config.sort = sort.clone();
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(path) = &self.output {
            config.output = Some(path.clone());
        }
        if let Some(version) = &self.ip_version {
            config.ip_version = version.parse::<AddressFamily>()?;
        }
        config.reverse |= self.reverse;
        config.all_as_shared |= self.all_as_shared;

        let thresholds = &mut config.thresholds;
        if let Some(warning) = self.warning {
            thresholds.warning = warning;
        }
        if let Some(critical) = self.critical {
            thresholds.critical = critical;
        }
        if self.warn_count.is_some() {
            thresholds.warn_count = self.warn_count;
        }
        if self.crit_count.is_some() {
            thresholds.crit_count = self.crit_count;
        }
        if let Some(minsize) = self.minsize {
            thresholds.minsize = minsize;
        }
        thresholds.snet_alarms |= self.snet_alarms;
        if thresholds.warning > thresholds.critical {
            warn!(
                "Warning threshold {} is above critical threshold {}",
                thresholds.warning, thresholds.critical
            );
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = cli.to_config()?;

    match cli.command.unwrap_or(Commands::Report) {
        Commands::Report => {
            let report = build_report(&config)?;
            output::write_report(
                &report,
                config.format,
                config.limit,
                config.output.as_deref(),
            )?;
        }
        Commands::Check => {
            let report = build_report(&config)?;
            println!("{}", output::render_status_line(&report));
            return Ok(ExitCode::from(report.worst_status().exit_code()));
        }
        Commands::ShowConfig => println!("{}", serde_json::to_string_pretty(&config)?),
        Commands::ListLeases => list_leases(&config)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn build_report(config: &Config) -> Result<Report> {
    let chain = config.sort_chain()?;
    let mut pools = Pools::with_family(config.ip_version);
    conf_file::load_dhcpd_conf(&mut pools, &config.dhcpd_conf, config.conf_options())?;
    lease_file::load_dhcpd_leases(&mut pools, &config.dhcpd_leases)?;

    let stats = pools.analyze();
    debug!(
        "Reconciled {} ranges against {} leases in {} steps",
        stats.ranges, stats.leases, stats.steps
    );
    if !chain.is_empty() {
        info!("Sorting ranges by '{}'", chain);
    }
    pools.order(&chain, config.reverse);

    let mtime = output::lease_file_mtime(&config.dhcpd_leases);
    Ok(Report::build(&pools, &config.thresholds, mtime))
}

fn list_leases(config: &Config) -> Result<()> {
    let mut pools = Pools::with_family(config.ip_version);
    lease_file::load_dhcpd_leases(&mut pools, &config.dhcpd_leases)?;

    let family = pools.family();
    let leases = pools.leases().sorted(family);

    if leases.is_empty() {
        println!("No leases.");
        return Ok(());
    }

    println!("{:<40} {:<8} {:<17}", "IP Address", "State", "Hardware Address");
    println!("{}", "-".repeat(67));
    for lease in leases.iter() {
        println!(
            "{:<40} {:<8} {:<17}",
            family.format(&lease.address),
            lease.state.to_string(),
            lease.hardware_address.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
