use color_eyre::eyre::WrapErr as _;
use tracing::info;

use soundprint::{cleanup, routes, state::AppState};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Create and run the tokio runtime
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(run_application())
}

async fn run_application() -> color_eyre::Result<()> {
    setup_tracing()?;

    let app_state = AppState::from_env()?;

    info!("Spawning application tasks");
    let futures = spawn_application_tasks(app_state);

    for result in futures::future::try_join_all(futures).await? {
        result?;
    }

    Ok(())
}

/// Spawn the server and background tasks
fn spawn_application_tasks(
    app_state: AppState,
) -> Vec<tokio::task::JoinHandle<color_eyre::Result<()>>> {
    let mut futures = vec![];

    if is_feature_enabled("SERVER") {
        info!("Server enabled");
        futures.push(tokio::spawn(run_server(app_state.clone())));
    } else {
        info!("Server disabled");
    }

    if is_feature_enabled("CLEANUP") {
        info!("Cleanup enabled");
        futures.push(tokio::spawn(cleanup::run_cleanup(app_state)));
    } else {
        info!("Cleanup disabled");
    }

    futures
}

async fn run_server(app_state: AppState) -> color_eyre::Result<()> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {addr}");
    axum::serve(listener, routes::routes(app_state))
        .await
        .wrap_err("Server exited")
}

fn setup_tracing() -> color_eyre::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Check if a feature is enabled based on environment variables
fn is_feature_enabled(feature: &str) -> bool {
    std::env::var(format!("{}_DISABLED", feature)).unwrap_or_else(|_| "false".to_string()) != "true"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn feature_is_enabled_when_env_var_not_set() {
        env::remove_var("AAA_FEATURE_DISABLED");
        assert!(is_feature_enabled("AAA_FEATURE"));
    }

    #[test]
    fn feature_is_enabled_when_env_var_is_false() {
        env::set_var("BBB_FEATURE_DISABLED", "false");
        assert!(is_feature_enabled("BBB_FEATURE"));
        env::remove_var("BBB_FEATURE_DISABLED");
    }

    #[test]
    fn feature_is_disabled_when_env_var_is_true() {
        env::set_var("CCC_FEATURE_DISABLED", "true");
        assert!(!is_feature_enabled("CCC_FEATURE"));
        env::remove_var("CCC_FEATURE_DISABLED");
    }

    #[test]
    fn feature_is_enabled_for_other_values() {
        env::set_var("DDD_FEATURE_DISABLED", "yes");
        assert!(is_feature_enabled("DDD_FEATURE"));
        env::remove_var("DDD_FEATURE_DISABLED");
    }
}
