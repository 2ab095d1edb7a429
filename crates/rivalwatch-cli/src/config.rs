//! Config + flag resolution: profile lookup, CLI overrides, and client
//! construction. Core never sees these types -- it receives a pre-built
//! scope, provider, and `RealtimeConfig`.

use std::time::Duration;

use secrecy::SecretString;

use rivalwatch_channel::WebSocketProvider;
use rivalwatch_config::{self as cfg, Profile, StreamSettings};
use rivalwatch_core::{Handlers, RealtimeClient, ScopeId};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve settings from the config file, profile, and CLI overrides,
/// then build a disconnected client for them.
pub fn build_client(global: &GlobalOpts) -> Result<RealtimeClient<WebSocketProvider>, CliError> {
    let settings = resolve_settings(global)?;

    let provider = WebSocketProvider::new(settings.endpoint, settings.token);
    Ok(RealtimeClient::new(
        Some(settings.scope),
        provider,
        settings.realtime,
        Handlers::new(),
    ))
}

fn resolve_settings(global: &GlobalOpts) -> Result<StreamSettings, CliError> {
    let config = cfg::load_config_or_default();

    // An explicitly named profile must exist; the implicit default may
    // be absent when flags alone carry the connection details.
    let profile = match cfg::select_profile(&config, global.profile.as_deref()) {
        Ok((_, profile)) => Some(profile),
        Err(cfg::ConfigError::UnknownProfile { name }) if global.profile.is_some() => {
            let mut available: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: available.join(", "),
            });
        }
        Err(_) => None,
    };

    let effective = effective_profile(profile, global)?;
    let mut settings = cfg::profile_to_stream_settings(&effective, &config.defaults)?;

    if let Some(ref token) = global.token {
        settings.token = Some(SecretString::from(token.clone()));
    }
    if let Some(secs) = global.timeout {
        settings.realtime.connect_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(ref user) = global.user {
        settings.scope = ScopeId::for_user(settings.scope.project(), user).ok_or_else(|| {
            CliError::Validation {
                field: "project".into(),
                reason: "project identifier must not be empty".into(),
            }
        })?;
    }

    Ok(settings)
}

/// Layer CLI flags over the profile (flags win), or build a profile
/// from flags alone when no config file exists.
fn effective_profile(profile: Option<&Profile>, global: &GlobalOpts) -> Result<Profile, CliError> {
    let endpoint = global
        .endpoint
        .clone()
        .or_else(|| profile.map(|p| p.endpoint.clone()))
        .ok_or_else(|| CliError::NoConfig {
            path: cfg::config_path().display().to_string(),
        })?;

    let project = global
        .project
        .clone()
        .or_else(|| profile.map(|p| p.project.clone()))
        .ok_or_else(|| CliError::Validation {
            field: "project".into(),
            reason: "no project configured; pass --project or set one in the profile".into(),
        })?;

    let mut effective = Profile {
        endpoint,
        project,
        ..Profile::default()
    };

    if let Some(p) = profile {
        effective.user = p.user.clone();
        effective.auth_token = p.auth_token.clone();
        effective.auth_token_env = p.auth_token_env.clone();
        effective.history_cap = p.history_cap;
        effective.connect_timeout = p.connect_timeout;
        effective.backoff_initial_ms = p.backoff_initial_ms;
        effective.backoff_max_ms = p.backoff_max_ms;
        effective.max_reconnect_attempts = p.max_reconnect_attempts;
    }

    Ok(effective)
}
