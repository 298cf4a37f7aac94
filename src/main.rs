mod backend;
mod collectors;
mod error;
mod metrics;

use clap::Parser;
use clap::error::ErrorKind;
use std::io::Write;
use std::path::PathBuf;
use crate::backend::{AgeSource, Backend};
use crate::metrics::{GpuMap, Report};


fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            emit(&mut std::io::stdout().lock(), &usage_report(&e), false);
            return;
        }
    };

    // stdout carries the JSON document, so logging stays on stderr and is off unless asked for.
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .init();

    let report = collectors::take_report(cli.backend, cli.age_source, &cli.nvidia_smi);
    emit(&mut std::io::stdout().lock(), &report, cli.pretty);
}

/// Bad arguments are reported in the document like any other failure.
fn usage_report(e: &clap::Error) -> Report {
    Report {
        error: Some(e.to_string().trim().to_string()),
        gpus: GpuMap::new(),
    }
}

/// Writes the document, logging instead of panicking when stdout is gone.
fn emit<W: Write>(out: &mut W, report: &Report, pretty: bool) {
    if let Err(e) = writeln!(out, "{}", render(report, pretty)).and_then(|()| out.flush()) {
        log::error!("failed to write report: {}", e);
    }
}

fn render(report: &Report, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    };

    match rendered {
        Ok(json) => json,
        Err(e) => {
            log::error!("failed to serialize report: {}", e);
            serde_json::json!({ "error": e.to_string(), "gpus": {} }).to_string()
        }
    }
}

#[derive(Parser)]
#[command(name = "gpu-apps-agent")]
#[command(about = "Per-GPU compute process count and age as JSON for Zabbix", long_about = None)]
struct Cli {
    /// nvidia-smi executable to invoke
    #[arg(long, default_value = "nvidia-smi")]
    nvidia_smi: PathBuf,

    /// Source of device and process listings
    #[arg(long, value_enum, default_value_t = Backend::Smi)]
    backend: Backend,

    /// How process age is measured
    #[arg(long, value_enum, default_value_t = AgeSource::Proc)]
    age_source: AgeSource,

    /// Indent the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Debug logging on stderr
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollError;
    use crate::metrics::GpuRecord;
    use std::io;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn defaults_match_plain_invocation() {
        let cli = Cli::try_parse_from(["gpu-apps-agent"]).unwrap();
        assert_eq!(cli.nvidia_smi, PathBuf::from("nvidia-smi"));
        assert_eq!(cli.backend, Backend::Smi);
        assert_eq!(cli.age_source, AgeSource::Proc);
        assert!(!cli.pretty);
    }

    #[test]
    fn parses_value_enums() {
        let cli = Cli::try_parse_from([
            "gpu-apps-agent",
            "--backend",
            "nvml",
            "--age-source",
            "start-time",
        ])
        .unwrap();
        assert_eq!(cli.backend, Backend::Nvml);
        assert_eq!(cli.age_source, AgeSource::StartTime);
    }

    #[test]
    fn rendered_output_has_exactly_two_fields() {
        let mut gpus = GpuMap::new();
        gpus.insert("GPU-a".to_string(), GpuRecord::default());

        for report in [
            Report::from_poll(Ok(gpus)),
            Report::from_poll(Err(PollError::CommandFailed { output: "boom".to_string() })),
        ] {
            for pretty in [false, true] {
                let value: serde_json::Value = serde_json::from_str(&render(&report, pretty)).unwrap();
                let object = value.as_object().unwrap();
                assert_eq!(object.len(), 2);
                assert!(object.contains_key("error"));
                assert!(object["gpus"].is_object());
            }
        }
    }

    #[test]
    fn compact_output_is_single_line() {
        let report = Report::from_poll(Ok(GpuMap::new()));
        assert_eq!(render(&report, false), r#"{"error":null,"gpus":{}}"#);
    }

    #[test]
    fn bad_flag_value_becomes_error_document() {
        let err = match Cli::try_parse_from(["gpu-apps-agent", "--backend", "bogus"]) {
            Ok(_) => panic!("bogus backend accepted"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let report = usage_report(&err);
        assert!(report.gpus.is_empty());
        assert!(report.error.as_deref().unwrap().contains("bogus"));

        let mut out = Vec::new();
        emit(&mut out, &report, false);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["error"].as_str().unwrap().contains("--backend"));
        assert_eq!(value["gpus"], serde_json::json!({}));
    }

    #[test]
    fn emit_writes_one_line() {
        let mut out = Vec::new();
        emit(&mut out, &Report::from_poll(Ok(GpuMap::new())), false);
        assert_eq!(out, b"{\"error\":null,\"gpus\":{}}\n");
    }

    #[test]
    fn closed_stdout_does_not_panic() {
        emit(&mut ClosedPipe, &Report::from_poll(Ok(GpuMap::new())), true);
    }
}
