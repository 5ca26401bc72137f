mod configuration;
mod error;
mod routes;
mod state;

use tracing::info;

use configuration::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;
    let addr = settings.server.socket_addr()?;
    let state = settings.into_state();

    if state.keys.openai_api_key.is_none() && state.keys.groq_api_key.is_none() {
        tracing::warn!(
            "no completion credentials configured; set PARLEY_OPENAI_API_KEY or PARLEY_GROQ_API_KEY"
        );
    }

    let app = routes::configure(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
