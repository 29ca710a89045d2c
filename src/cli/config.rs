//! Conversion of CLI arguments into options and jobs

use crate::cli::main_impl::Cli;
use crate::{
    config::{RemovalOptions, RemovalOptionsBuilder},
    job::Job,
};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Suffix appended to an input's stem to name its output
const OUTPUT_SUFFIX: &str = "-nobg.png";

/// Convert CLI arguments to `RemovalOptions` and jobs
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build options: JSON file (if any), then flags on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalOptions> {
        let base = match &cli.config {
            Some(path) => RemovalOptions::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => RemovalOptions::default(),
        };

        let mut builder = RemovalOptionsBuilder::from_options(base);
        if let Some(timeout) = cli.timeout {
            builder = builder.timeout_ms(timeout);
        }
        if let Some(fetch_timeout) = cli.fetch_timeout {
            builder = builder.fetch_timeout_ms(Some(fetch_timeout));
        }
        if let Some(limit) = cli.max_concurrent {
            builder = builder.max_concurrent_jobs(limit);
        }
        if let Some(program) = &cli.rembg_bin {
            builder = builder.remover_program(program);
        }
        if let Some(program) = &cli.curl_bin {
            builder = builder.fetcher_program(program);
        }

        builder.build().context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.input.is_empty() {
            anyhow::bail!("At least one input is required");
        }

        if cli.input.iter().any(|input| input.trim().is_empty()) {
            anyhow::bail!("Inputs must not be empty");
        }

        if cli.input.len() > 1 {
            if let Some(output) = &cli.output {
                if output.is_file() {
                    anyhow::bail!(
                        "Output path exists and is a file, not a directory: {}",
                        output.display()
                    );
                }
            }
        }

        Ok(())
    }

    /// One job per input, in input order
    ///
    /// With a single input, `-o` names the output file (or a directory to put
    /// it in). With several inputs, `-o` is a directory, created if missing.
    /// Without `-o`, outputs land in the current directory.
    pub(crate) fn plan_jobs(cli: &Cli, options: &RemovalOptions) -> Result<Vec<Job>> {
        let timeout = options.timeout();
        let single = cli.input.len() == 1;

        let output_dir = match &cli.output {
            Some(output) if !single || output.is_dir() => Some(output.clone()),
            _ => None,
        };
        if let Some(dir) = output_dir.as_ref().filter(|_| !single) {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create output directory: {}", dir.display())
            })?;
        }

        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(cli.input.len());
        for input in &cli.input {
            let output = match (&cli.output, &output_dir) {
                (_, Some(dir)) => dir.join(default_output_name(input)),
                (Some(file), None) => file.clone(),
                (None, None) => PathBuf::from(default_output_name(input)),
            };

            let job = if is_url(input) {
                Job::remote(input, &output, timeout)?
            } else {
                Job::local(input, &output, timeout)?
            };

            if !seen.insert(job.destination().to_path_buf()) {
                anyhow::bail!(
                    "Two inputs would write to the same output file: {}",
                    job.destination().display()
                );
            }
            jobs.push(job);
        }

        Ok(jobs)
    }
}

/// Whether an input should be fetched rather than read from disk
pub(crate) fn is_url(input: &str) -> bool {
    let lower = input.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `<stem>-nobg.png` for a path or the last segment of a URL
pub(crate) fn default_output_name(input: &str) -> String {
    let stem = if is_url(input) {
        let without_scheme = input.trim().split_once("://").map_or(input, |(_, rest)| rest);
        let path = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        // the first segment is the host
        path.split('/')
            .skip(1)
            .filter(|segment| !segment.is_empty())
            .last()
            .and_then(|segment| Path::new(segment).file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "remote-image".to_string())
    } else {
        Path::new(input)
            .file_stem()
            .map_or_else(|| "image".to_string(), |stem| stem.to_string_lossy().into_owned())
    };

    format!("{}{}", stem, OUTPUT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSource;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rembg-process").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://example.com/cat.jpg"));
        assert!(is_url("HTTP://example.com/cat.jpg"));
        assert!(!is_url("cat.jpg"));
        assert!(!is_url("ftp://example.com/cat.jpg"));
    }

    #[test]
    fn test_default_output_names() {
        assert_eq!(default_output_name("photos/cat.jpg"), "cat-nobg.png");
        assert_eq!(
            default_output_name(
                "https://upload.wikimedia.org/wikipedia/commons/4/4d/Cat_November_2010-1a.jpg"
            ),
            "Cat_November_2010-1a-nobg.png"
        );
        assert_eq!(
            default_output_name("https://example.com/images/dog.webp?size=large#top"),
            "dog-nobg.png"
        );
        assert_eq!(default_output_name("https://example.com/"), "remote-image-nobg.png");
        assert_eq!(default_output_name("https://example.com"), "remote-image-nobg.png");
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "cat.jpg",
            "--timeout",
            "2500",
            "--fetch-timeout",
            "800",
            "-j",
            "2",
            "--rembg-bin",
            "/opt/rembg/bin/rembg",
        ]);
        let options = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(options.timeout_ms, 2500);
        assert_eq!(options.fetch_timeout_ms, Some(800));
        assert_eq!(options.max_concurrent_jobs, 2);
        assert_eq!(options.remover.program, PathBuf::from("/opt/rembg/bin/rembg"));
        assert_eq!(options.remover.args, vec!["i".to_string()]);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("options.json");
        std::fs::write(&config, r#"{ "timeout_ms": 1000, "max_concurrent_jobs": 8 }"#).unwrap();

        let cli = parse(&["cat.jpg", "--config", config.to_str().unwrap(), "-t", "4000"]);
        let options = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(options.timeout_ms, 4000);
        assert_eq!(options.max_concurrent_jobs, 8);
    }

    #[test]
    fn test_zero_timeout_flag_is_rejected() {
        let cli = parse(&["cat.jpg", "--timeout", "0"]);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());
    }

    #[test]
    fn test_single_input_with_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.png");
        let cli = parse(&["cat.jpg", "-o", output.to_str().unwrap()]);

        let jobs = CliConfigBuilder::plan_jobs(&cli, &RemovalOptions::default()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].destination(), output);
    }

    #[test]
    fn test_several_inputs_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let cli = parse(&[
            "cat.jpg",
            "https://example.com/dog.jpg",
            "-o",
            out_dir.to_str().unwrap(),
        ]);

        let jobs = CliConfigBuilder::plan_jobs(&cli, &RemovalOptions::default()).unwrap();
        assert!(out_dir.is_dir());
        assert_eq!(jobs[0].destination(), out_dir.join("cat-nobg.png"));
        assert_eq!(jobs[1].destination(), out_dir.join("dog-nobg.png"));
        assert!(matches!(jobs[0].source(), JobSource::File(_)));
        assert_eq!(
            jobs[1].source(),
            &JobSource::Url("https://example.com/dog.jpg".to_string())
        );
    }

    #[test]
    fn test_colliding_outputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cli = parse(&[
            "a/cat.jpg",
            "b/cat.png",
            "-o",
            dir.path().to_str().unwrap(),
        ]);

        let err = CliConfigBuilder::plan_jobs(&cli, &RemovalOptions::default()).unwrap_err();
        assert!(err.to_string().contains("same output file"));
    }

    #[test]
    fn test_output_file_with_several_inputs_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken.png");
        std::fs::write(&file, b"png").unwrap();
        let cli = parse(&["a.jpg", "b.jpg", "-o", file.to_str().unwrap()]);

        assert!(CliConfigBuilder::validate_cli(&cli).is_err());
    }
}
