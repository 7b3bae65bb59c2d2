//! Binary entry point for the `ftp-mirror` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use ftp_mirror::{FtpConnector, MirrorConfig, RunError, RunOrchestrator, RunSummary};

mod cli;

use cli::Cli;

#[cfg(test)]
mod test_helpers;

const EXIT_SUCCESS: i32 = 0;
const EXIT_ABORTED: i32 = 1;
const EXIT_FILES_FAILED: i32 = 2;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("upload aborted during {} stage: {}", .0.stage(), .0)]
    Run(#[from] RunError),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(&cli) {
        Ok(summary) => {
            report_summary(io::stdout().lock(), &summary);
            exit_code_for(&summary)
        }
        Err(err) => {
            report_error(&err);
            EXIT_ABORTED
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init()
        .ok();
}

const fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn run(cli: &Cli) -> Result<RunSummary, CliError> {
    let loaded =
        MirrorConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let config = apply_overrides(loaded, cli);
    let orchestrator = RunOrchestrator::new(config, FtpConnector)
        .map_err(|err| CliError::Config(err.to_string()))?;

    let mut stdout = io::stdout().lock();
    Ok(orchestrator.execute(&mut stdout)?)
}

fn apply_overrides(mut config: MirrorConfig, cli: &Cli) -> MirrorConfig {
    if let Some(local_root) = &cli.local_root {
        config.local_root.clone_from(local_root);
    }
    if let Some(remote_root) = &cli.remote_root {
        config.remote_root.clone_from(remote_root);
    }
    config
}

const fn exit_code_for(summary: &RunSummary) -> i32 {
    if summary.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FILES_FAILED
    }
}

fn report_summary(mut target: impl Write, summary: &RunSummary) {
    writeln!(
        target,
        "upload complete: files_uploaded={}, files_failed={}",
        summary.files_uploaded, summary.files_failed
    )
    .ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftp_mirror::{SessionError, WalkError};
    use rstest::rstest;

    fn cli(local_root: Option<&str>, remote_root: Option<&str>) -> Cli {
        Cli {
            local_root: local_root.map(str::to_owned),
            remote_root: remote_root.map(str::to_owned),
            verbose: 0,
        }
    }

    fn sample_config() -> MirrorConfig {
        MirrorConfig {
            host: String::from("ftp.example.test"),
            port: 21,
            username: String::from("deploy"),
            password: String::from("secret"),
            remote_root: String::from("."),
            local_root: String::from("dist"),
            connect_timeout_secs: 30,
            passive_mode: true,
        }
    }

    #[test]
    fn overrides_replace_loaded_roots() {
        let config = apply_overrides(sample_config(), &cli(Some("public"), Some("/srv/www")));

        assert_eq!(config.local_root, "public");
        assert_eq!(config.remote_root, "/srv/www");
    }

    #[test]
    fn absent_overrides_keep_loaded_roots() {
        let config = apply_overrides(sample_config(), &cli(None, None));

        assert_eq!(config.local_root, "dist");
        assert_eq!(config.remote_root, ".");
    }

    #[rstest]
    #[case(0, "warn")]
    #[case(1, "info")]
    #[case(2, "debug")]
    #[case(5, "debug")]
    fn verbosity_selects_default_directive(#[case] verbose: u8, #[case] expected: &str) {
        assert_eq!(default_directive(verbose), expected);
    }

    #[rstest]
    #[case(0, EXIT_SUCCESS)]
    #[case(1, EXIT_FILES_FAILED)]
    fn exit_code_reflects_failed_files(#[case] files_failed: usize, #[case] expected: i32) {
        let summary = RunSummary {
            files_uploaded: 3,
            files_failed,
            ..RunSummary::default()
        };

        assert_eq!(exit_code_for(&summary), expected);
    }

    #[test]
    fn report_summary_prints_counters() {
        let mut buf = Vec::new();
        let summary = RunSummary {
            files_uploaded: 2,
            files_failed: 1,
            ..RunSummary::default()
        };

        report_summary(&mut buf, &summary);

        let rendered = String::from_utf8(buf).expect("utf8");
        assert_eq!(rendered, "upload complete: files_uploaded=2, files_failed=1\n");
    }

    #[test]
    fn write_error_names_the_failed_stage() {
        let mut buf = Vec::new();
        let err = CliError::Run(RunError::Connection(SessionError::Connect {
            address: String::from("ftp.example.test:21"),
            message: String::from("Connection refused"),
        }));

        write_error(&mut buf, &err);

        let rendered = String::from_utf8(buf).expect("utf8");
        assert_eq!(
            rendered,
            "upload aborted during connecting stage: failed to reach ftp.example.test:21: Connection refused\n"
        );
    }

    #[test]
    fn missing_source_is_reported_before_connecting() {
        let err = CliError::from(RunError::MissingSource(WalkError::Root {
            path: "dist".into(),
            message: String::from("No such file or directory (os error 2)"),
        }));

        assert!(
            err.to_string()
                .starts_with("upload aborted during preparing stage: local root dist"),
            "rendered: {err}"
        );
    }

    #[test]
    fn run_reports_configuration_errors() {
        let _guard = test_helpers::EnvGuard::set_vars(&[("FTP_MIRROR_HOST", "")]);

        let err = run(&cli(None, None)).expect_err("blank host should be rejected");

        assert!(matches!(err, CliError::Config(_)), "got {err:?}");
    }
}
