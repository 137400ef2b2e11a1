//! Unit tests for Slack credential loading from environment variables.
//!
//! These tests mutate process-global env vars and run serially.

use merge_courier::config::GlobalConfig;

fn make_config() -> (tempfile::TempDir, GlobalConfig) {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "[paths]\nwork_dir = '{root}/work'\nuserdata_dir = '{root}/userdata'\n",
        root = temp.path().to_str().expect("utf8 path")
    );
    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");
    (temp, config)
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn env_var_credentials_are_loaded() {
    let (_temp, mut config) = make_config();
    unsafe {
        std::env::set_var("SLACK_APP_TOKEN", "xapp-test");
        std::env::set_var("SLACK_BOT_TOKEN", "xoxb-test");
    }

    let result = config.load_credentials().await;

    unsafe {
        std::env::remove_var("SLACK_APP_TOKEN");
        std::env::remove_var("SLACK_BOT_TOKEN");
    }
    assert!(result.is_ok(), "load_credentials should succeed with env vars");
    assert_eq!(config.slack.app_token, "xapp-test");
    assert_eq!(config.slack.bot_token, "xoxb-test");
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn missing_credential_names_the_env_var() {
    let (_temp, mut config) = make_config();
    unsafe {
        std::env::remove_var("SLACK_APP_TOKEN");
        std::env::remove_var("SLACK_BOT_TOKEN");
    }

    let err = config.load_credentials().await.expect_err("must fail");
    assert!(err.to_string().contains("SLACK_APP_TOKEN"), "{err}");
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn empty_env_var_counts_as_missing() {
    let (_temp, mut config) = make_config();
    unsafe {
        std::env::set_var("SLACK_APP_TOKEN", "xapp-test");
        std::env::set_var("SLACK_BOT_TOKEN", "");
    }

    let result = config.load_credentials().await;

    unsafe {
        std::env::remove_var("SLACK_APP_TOKEN");
        std::env::remove_var("SLACK_BOT_TOKEN");
    }
    let err = result.expect_err("must fail");
    assert!(err.to_string().contains("SLACK_BOT_TOKEN"), "{err}");
}
