use tracing_subscriber::EnvFilter;

use crate::config::SecurityConfig;

/// Install the fmt subscriber. `RUST_LOG` wins over `default_level`; the
/// `audit` target is silenced when audit logging is switched off. Logs go to
/// stderr so CLI output on stdout stays machine-readable.
pub fn init(default_level: &str, security: &SecurityConfig) {
    let mut directives = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    if !security.enable_audit_logging {
        directives.push_str(",audit=off");
    }

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
