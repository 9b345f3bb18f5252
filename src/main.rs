use pocketchat::app::App;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,llama_cpp_2=warn".into()),
        )
        .init();

    tracing::info!("Starting PocketChat v{}", env!("CARGO_PKG_VERSION"));
    dioxus::launch(App);
}
