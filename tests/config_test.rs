//! Environment-driven config tests, in the style of this codebase's
//! sibling `pool_config_test.rs`: set/remove env vars around each
//! assertion and restore state afterward.

use std::env;
use waitingroom_backend::config::{AppConfig, AuthMode};

fn clear_auth_env() {
    for var in [
        "AUTH_MODE",
        "JWT_JWKS_URL",
        "JWT_LOCAL_SECRET",
        "REDIS_URL",
        "ENVIRONMENT",
        "DEV_AUTH_BYPASS_TOKENS",
    ] {
        env::remove_var(var);
    }
}

#[test]
fn fails_without_redis_url() {
    clear_auth_env();
    let result = AppConfig::from_env();
    assert!(result.is_err());
    clear_auth_env();
}

#[test]
fn local_mode_requires_local_secret() {
    clear_auth_env();
    env::set_var("REDIS_URL", "redis://localhost:6379");
    env::set_var("AUTH_MODE", "local");
    let result = AppConfig::from_env();
    assert!(result.is_err());
    clear_auth_env();
}

#[test]
fn local_mode_succeeds_with_secret() {
    clear_auth_env();
    env::set_var("REDIS_URL", "redis://localhost:6379");
    env::set_var("AUTH_MODE", "local");
    env::set_var("JWT_LOCAL_SECRET", "a-secret");
    let config = AppConfig::from_env().unwrap();
    assert_eq!(config.auth_mode, AuthMode::Local);
    clear_auth_env();
}

#[test]
fn dev_bypass_tokens_ignored_outside_development() {
    clear_auth_env();
    env::set_var("REDIS_URL", "redis://localhost:6379");
    env::set_var("AUTH_MODE", "local");
    env::set_var("JWT_LOCAL_SECRET", "a-secret");
    env::set_var("ENVIRONMENT", "production");
    env::set_var("DEV_AUTH_BYPASS_TOKENS", "token-a,token-b");
    let config = AppConfig::from_env().unwrap();
    assert!(config.dev_auth_bypass_tokens.is_empty());
    clear_auth_env();
}

#[test]
fn dev_bypass_tokens_parsed_in_development() {
    clear_auth_env();
    env::set_var("REDIS_URL", "redis://localhost:6379");
    env::set_var("AUTH_MODE", "local");
    env::set_var("JWT_LOCAL_SECRET", "a-secret");
    env::set_var("ENVIRONMENT", "development");
    env::set_var("DEV_AUTH_BYPASS_TOKENS", "token-a, token-b");
    let config = AppConfig::from_env().unwrap();
    assert_eq!(config.dev_auth_bypass_tokens, vec!["token-a", "token-b"]);
    clear_auth_env();
}
