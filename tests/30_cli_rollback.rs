use std::path::Path;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use anyhow::Result;

use enginex_panel::config::{AppConfig, ToggleKind};
use enginex_panel::elevation::{ElevationService, DEFAULT_ACTION};

fn enginex(data_dir: &Path, args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_enginex"))
        .args(args)
        .env("APP_ENV", "development")
        .env("STORAGE_DATA_DIR", data_dir)
        .env("PRIVILEGE_TOGGLE", "dry-run")
        .env("ELEVATION_ACTIVATION_SECS", "1")
        .env("RUST_LOG", "error")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .output()?;
    Ok(output)
}

fn verify_session(data_dir: &Path, session: &str) -> Result<()> {
    let mut config = AppConfig::development();
    config.storage.data_dir = data_dir.to_path_buf();
    config.privilege.toggle = ToggleKind::DryRun;
    let service = ElevationService::builder(&config).build()?;

    let challenge = service.challenges().create(session, DEFAULT_ACTION)?;
    assert!(service.challenges().verify(&challenge.code, session)?);
    Ok(())
}

#[test]
fn sweep_command_rolls_back_an_overdue_lock() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let lock = dir.path().join("locks").join("privilege.lock");
    std::fs::create_dir_all(lock.parent().expect("lock has a parent"))?;
    std::fs::write(&lock, "1000")?;

    let output = enginex(dir.path(), &["--json", "sweep"])?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let body: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(body["sweep"]["result"], "rolled_back");
    assert!(!lock.exists());
    Ok(())
}

#[test]
fn cli_activation_is_reverted_after_the_command_exits() -> Result<()> {
    let dir = tempfile::tempdir()?;
    verify_session(dir.path(), "sess-cli")?;

    let output = enginex(dir.path(), &["activate", "--session", "sess-cli", "--user", "ops"])?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    // The activating process is gone; only the background sweep can remove it
    let lock = dir.path().join("locks").join("privilege.lock");
    assert!(lock.exists());
    let deadline = Instant::now() + Duration::from_secs(15);
    while lock.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(200));
    }
    assert!(!lock.exists(), "privilege lock still present after the window");
    Ok(())
}
