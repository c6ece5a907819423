//! Guardian CLI binary.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use guardian_clock::SystemClock;
use guardian_daemon::commands::{
    execute_check, execute_monitor, execute_status, load_config, CommandResult,
};
use guardian_daemon::exit::{codes, exit_code};
use guardian_daemon::{
    CheckArgs, Cli, Command, Logger, MonitorArgs, RealSleeper, ShutdownFlag, StatusArgs,
    StderrLogger,
};
use guardian_engine::{FirewallManager, RuleSettings};
use guardian_platform::{WindowsEventLog, WindowsFirewall};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger = StderrLogger::from_verbosity(cli.verbose);

    let result = match cli.command {
        Command::Monitor(args) => run_monitor(args, &logger),
        Command::Check(args) => run_check(args),
        Command::Status(args) => run_status(args),
    };

    match result {
        Ok(()) => ExitCode::from(codes::SUCCESS as u8),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

/// Run the monitor command in the foreground.
fn run_monitor(args: MonitorArgs, logger: &dyn Logger) -> CommandResult<()> {
    args.validate()?;
    let config = load_config(args.config.as_deref())?;

    let source = WindowsEventLog::new();
    let backend = Arc::new(WindowsFirewall::new());
    let manager = FirewallManager::new(backend, RuleSettings::from(&config.blocking));

    let clock = SystemClock;
    let sleeper = RealSleeper::new();
    let shutdown = ShutdownFlag::new();
    let duration = args.duration_sec.map(Duration::from_secs);

    let report = execute_monitor(
        &config, &source, &manager, &clock, &sleeper, &shutdown, logger, duration,
    )?;

    println!("Monitoring finished:");
    println!("  Adopted rules at startup: {}", report.adopted);
    for (service, summary) in &report.scanners {
        println!(
            "  {}: {} scans, {} events, {} blocks installed",
            service, summary.cycles, summary.parsed, summary.installed
        );
    }
    println!(
        "  Sweeper: {} sweeps, {} blocks removed, {} failures",
        report.sweeper.cycles, report.sweeper.removed, report.sweeper.failed
    );

    Ok(())
}

/// Run the check command.
fn run_check(args: CheckArgs) -> CommandResult<()> {
    let config = load_config(args.config.as_deref())?;
    let report = execute_check(&config)?;

    println!("Configuration is valid:");
    println!("  Services: {}", report.services.join(", "));
    println!("  Failure threshold: {}", report.failure_threshold);
    println!(
        "  Lookback window: {}",
        humantime::format_duration(report.lookback_duration)
    );
    println!(
        "  Check interval: {}",
        humantime::format_duration(report.check_interval)
    );
    if report.permanent_blocks {
        println!("  Block duration: permanent");
    } else {
        println!(
            "  Block duration: {}",
            humantime::format_duration(report.block_duration)
        );
    }
    println!(
        "  Cleanup interval: {}",
        humantime::format_duration(report.cleanup_interval)
    );
    println!("  Whitelist entries: {}", report.whitelist_entries);

    Ok(())
}

/// Run the status command.
fn run_status(args: StatusArgs) -> CommandResult<()> {
    let config = load_config(args.config.as_deref())?;

    let backend = Arc::new(WindowsFirewall::new());
    let manager = FirewallManager::new(backend, RuleSettings::from(&config.blocking));
    let clock = SystemClock;

    let report = execute_status(&manager, &clock)?;

    println!("Active blocks: {}", report.count());
    for block in &report.active_blocks {
        match block.expires_at {
            Some(expires_at) => println!(
                "  {} (rule '{}', expires {})",
                block.source_ip, block.rule_name, expires_at
            ),
            None => println!("  {} (rule '{}', permanent)", block.source_ip, block.rule_name),
        }
    }

    Ok(())
}
