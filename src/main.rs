use std::path::PathBuf;

mod app;
mod auth;
mod catalog;
mod config;
mod error;
#[cfg(test)]
mod fixtures;
mod images;
mod pagination;
mod recipes;
mod state;
mod storage;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "foodgram=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    // `foodgram load-data [DIR]` seeds tags and ingredients, then exits.
    let mut args = std::env::args().skip(1);
    if let Some(cmd) = args.next() {
        if cmd != "load-data" {
            anyhow::bail!("unknown command: {cmd}");
        }
        let dir = PathBuf::from(args.next().unwrap_or_else(|| "data".into()));
        catalog::seed::load_data(&app_state.db, &dir).await?;
        return Ok(());
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
