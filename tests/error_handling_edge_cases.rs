//! Error conditions and boundary values that need no external tools

use rembg_process::{
    remove_background, remove_background_from_url, BackgroundRemover, ExitReason, Job,
    RembgError, RemovalOptions, Result, ToolCommand,
};
use std::error::Error as _;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_options_validation_edge_cases() -> Result<()> {
    // smallest valid deadlines
    let options = RemovalOptions::builder()
        .timeout_ms(1)
        .fetch_timeout_ms(Some(1))
        .build()?;
    assert_eq!(options.timeout(), Duration::from_millis(1));
    assert_eq!(options.fetch_timeout(), Some(Duration::from_millis(1)));

    let err = RemovalOptions::builder().timeout_ms(0).build().unwrap_err();
    assert!(err.to_string().contains("timeout"));

    let err = RemovalOptions::builder()
        .fetch_timeout_ms(Some(0))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("fetch timeout"));

    let err = RemovalOptions::builder()
        .remover(ToolCommand::new(""))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("remover program"));

    let err = RemovalOptions::builder()
        .fetcher(ToolCommand::new(""))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("fetcher program"));

    Ok(())
}

#[test]
fn test_options_file_edge_cases() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    let missing = RemovalOptions::from_json_file(temp_dir.path().join("missing.json"));
    assert!(matches!(missing, Err(RembgError::InvalidConfig(_))));

    let zero = temp_dir.path().join("zero.json");
    std::fs::write(&zero, r#"{ "timeout_ms": 0 }"#).unwrap();
    assert!(matches!(
        RemovalOptions::from_json_file(&zero),
        Err(RembgError::InvalidConfig(_))
    ));

    let empty = temp_dir.path().join("empty.json");
    std::fs::write(&empty, "{}").unwrap();
    let options = RemovalOptions::from_json_file(&empty).unwrap();
    assert_eq!(options.timeout_ms, rembg_process::DEFAULT_TIMEOUT_MS);
    assert_eq!(options.remover, ToolCommand::rembg());
    assert_eq!(options.fetcher, ToolCommand::curl());
}

#[test]
fn test_job_argument_edge_cases() {
    let timeout = Duration::from_secs(1);

    for url in ["", "   ", "--upload-file=/etc/passwd"] {
        assert!(
            matches!(Job::remote(url, "out.png", timeout), Err(RembgError::InvalidConfig(_))),
            "url {:?} was accepted",
            url
        );
    }

    assert!(Job::local("", "out.png", timeout).is_err());
    assert!(Job::local("in.jpg", "", timeout).is_err());
    assert!(Job::local("in.jpg", "out.png", Duration::ZERO).is_err());

    // surrounding whitespace is not part of the URL
    let job = Job::remote("  https://example.com/cat.jpg\n", "out.png", timeout).unwrap();
    assert_eq!(job.source().to_string(), "https://example.com/cat.jpg");
}

#[test]
fn test_error_messages() {
    let spawn = RembgError::spawn(
        "rembg",
        std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
    );
    assert!(spawn
        .to_string()
        .starts_with("Failed to start rembg process. Is it installed and in your PATH?"));
    assert!(spawn.source().is_some());

    let timeout = RembgError::timeout("rembg", Duration::from_millis(10_000));
    assert_eq!(timeout.to_string(), "rembg process timed out after 10000ms.");
    assert!(timeout.is_timeout());
    assert!(timeout.stderr().is_none());

    let fetch = RembgError::fetch("curl", ExitReason::Code(22), "404".to_string());
    assert_eq!(fetch.to_string(), "curl process exited with code 22. Stderr: 404");
    assert_eq!(fetch.stderr(), Some("404"));

    let exit = RembgError::process_exit("rembg", ExitReason::Signal(9), String::new());
    assert_eq!(exit.to_string(), "rembg process exited with signal 9. Stderr: ");
}

#[test]
fn test_not_found_stderr_is_reclassified() {
    let unix = RembgError::process_exit(
        "rembg",
        ExitReason::Code(127),
        "sh: 1: rembg: command not found".to_string(),
    );
    assert!(matches!(unix, RembgError::ToolNotFound { .. }));
    assert!(unix.to_string().contains("Please ensure Python and rembg are installed"));

    let windows = RembgError::process_exit(
        "rembg",
        ExitReason::Code(1),
        "'rembg' is not recognized as an internal or external command".to_string(),
    );
    assert!(matches!(windows, RembgError::ToolNotFound { .. }));
}

#[tokio::test]
async fn test_invalid_calls_fail_before_spawning() {
    let options = RemovalOptions::builder()
        .remover_program("/definitely/not/rembg")
        .fetcher_program("/definitely/not/curl")
        .build()
        .unwrap();

    // argument problems are reported instead of a spawn failure
    let err = remove_background("", "out.png", &options).await.unwrap_err();
    assert!(matches!(err, RembgError::InvalidConfig(_)));

    let err = remove_background_from_url("", "out.png", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, RembgError::InvalidConfig(_)));

    let remover = BackgroundRemover::new(options).unwrap();
    let err = remover.remove_background("in.jpg", "").await.unwrap_err();
    assert!(matches!(err, RembgError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_missing_tool_is_spawn_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let options = RemovalOptions::builder()
        .remover_program(temp_dir.path().join("missing-rembg"))
        .build()
        .unwrap();

    let err = remove_background(
        temp_dir.path().join("cat.jpg"),
        temp_dir.path().join("cat-nobg.png"),
        &options,
    )
    .await
    .unwrap_err();

    match err {
        RembgError::Spawn { tool, source } => {
            assert_eq!(tool, "missing-rembg");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        },
        other => panic!("expected Spawn, got {:?}", other),
    }
}
