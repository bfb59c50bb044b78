use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use gradle2buck_core::config::{
    default_jobs, GeneratorConfig, DEFAULT_BUILD_FILE_NAME, DEFAULT_THIRD_PARTY_PATH,
};
use gradle2buck_core::diagnostics::{ExitStatus, RunReport};
use gradle2buck_core::run::{exit_status_of, run};
use gradle2buck_core::VERSION;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "gradle2buck",
    version,
    about = "Generate per-package Buck build files for a Gradle Java project",
    long_about = "Indexes every Java source under the project's source roots, derives \
                  package-level dependencies from imports and qualified references, and \
                  writes one BUCK file per package. Packages in a dependency cycle are \
                  reported and left without a build file."
)]
struct CliArgs {
    #[arg(value_name = "PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    #[arg(
        long = "src-root",
        value_name = "DIR",
        help = "Source root relative to the project (repeatable; default: <module>/src/main/java for each build.gradle)"
    )]
    src_roots: Vec<PathBuf>,

    #[arg(long, value_name = "FILE", help = "JSON manifest mapping package prefixes to Maven coordinates")]
    manifest: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = DEFAULT_THIRD_PARTY_PATH, help = "Buck package holding third-party rules")]
    third_party_path: String,

    #[arg(long, value_name = "NAME", default_value = DEFAULT_BUILD_FILE_NAME)]
    build_file_name: String,

    #[arg(
        long = "platform-prefix",
        value_name = "PREFIX",
        help = "Extra package prefix provided by the platform (repeatable)"
    )]
    platform_prefixes: Vec<String>,

    #[arg(short = 'j', long, value_name = "N", help = "Worker threads (default: available cores)")]
    jobs: Option<usize>,

    #[arg(long, help = "Plan and report without writing any file")]
    dry_run: bool,

    #[arg(long, help = "Write a .buckconfig when the project has none")]
    write_buckconfig: bool,

    #[arg(long, value_name = "FILE", help = "Write the run report as JSON")]
    report: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    log_level: Option<String>,

    #[arg(short = 'v', long, help = "Debug logging")]
    verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    quiet: bool,
}

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("gradle2buck v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let config = build_config(&args);
    let outcome = run(&config);
    let status = exit_status_of(&outcome);
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            RunReport::fatal(&e)
        }
    };

    std::process::exit(finish(&config, &report, status).code());
}

fn build_config(args: &CliArgs) -> GeneratorConfig {
    let mut config = GeneratorConfig::new(&args.project_root);
    config.source_roots = args.src_roots.clone();
    config.manifest = args.manifest.clone();
    config.third_party_path = args.third_party_path.clone();
    config.build_file_name = args.build_file_name.clone();
    config.add_platform_prefixes(&args.platform_prefixes);
    config.jobs = args.jobs.unwrap_or_else(default_jobs);
    config.dry_run = args.dry_run;
    config.write_buckconfig = args.write_buckconfig;
    config.report = args.report.clone();
    config
}

fn finish(config: &GeneratorConfig, report: &RunReport, status: ExitStatus) -> ExitStatus {
    if let Some(path) = &config.report {
        if let Err(e) = write_report(path, report) {
            error!("{e:#}");
            return ExitStatus::Fatal;
        }
        info!("report written to {}", path.display());
    }
    if status == ExitStatus::Partial {
        info!(
            cycles = report.cycles.len(),
            "finished with problems, see diagnostics above"
        );
    }
    status
}

fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

/// Crates whose own logging stays at `warn` unless `RUST_LOG` says otherwise.
const NOISY_CRATES: &[&str] = &["ignore", "globset", "walkdir"];

fn init_logging_from_args(args: &CliArgs) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = match (&args.log_level, args.verbose, args.quiet) {
            (Some(name), _, _) => parse_level(name),
            (None, true, _) => Level::DEBUG,
            (None, false, true) => Level::ERROR,
            (None, false, false) => env::var("GRADLE2BUCK_LOG_LEVEL")
                .map(|name| parse_level(&name))
                .unwrap_or(Level::INFO),
        };

        let filter = if env::var_os("RUST_LOG").is_some() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(default_directives(level))
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    });
}

fn default_directives(level: Level) -> String {
    let mut directives = vec![level.to_string().to_lowercase()];
    directives.extend(NOISY_CRATES.iter().map(|name| format!("{name}=warn")));
    directives.join(",")
}

fn parse_level(name: &str) -> Level {
    match name.parse::<Level>() {
        Ok(level) => level,
        Err(_) => {
            eprintln!("gradle2buck: unknown log level {name:?}, using info");
            Level::INFO
        }
    }
}
