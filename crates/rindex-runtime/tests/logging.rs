//! Runs alone in its own binary: the global subscriber can be installed once.

use rindex_runtime::{Runtime, RuntimeConfig};
use tracing::level_filters::LevelFilter;

#[tokio::test]
async fn configured_log_level_is_installed() {
    let config = RuntimeConfig::from_toml_str(
        r#"
name = "logging"
log_level = "debug"
"#,
    )
    .unwrap();

    let runtime = Runtime::start(config).await.unwrap();

    assert_eq!(runtime.report().step_names()[0], "init-logging");
    assert_eq!(LevelFilter::current(), LevelFilter::DEBUG);
}
