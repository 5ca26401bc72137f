mod session;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::env;
use std::sync::Arc;

use parley::image::{HfImageClient, ImageBackend, RelayImageClient};
use parley::models::conversation::Conversation;
use parley::orchestrator::ChatOrchestrator;
use parley::providers::configs::ProviderKind;
use parley::store::ConversationStore;
use parley::stream::consumer::resolve_backend;

use session::{ConsolePublisher, Session};
use store::FileStore;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider to use (openai or groq)
    #[arg(short, long, default_value = "openai")]
    #[arg(value_enum)]
    provider: ProviderVariant,

    /// API key for calling the provider directly (can also be set via
    /// PARLEY_OPENAI_API_KEY / PARLEY_GROQ_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Relay base URL, e.g. https://relay.example.com (can also be set via
    /// PARLEY_RELAY_URL); the relay holds the provider keys
    #[arg(long)]
    relay_url: Option<String>,

    /// Hugging Face token for direct image operations (can also be set via
    /// PARLEY_HF_API_TOKEN)
    #[arg(long)]
    hf_token: Option<String>,

    /// Resume the most recently used conversation
    #[arg(long)]
    resume: bool,

    /// List stored conversations and exit
    #[arg(long)]
    list: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProviderVariant {
    Openai,
    Groq,
}

impl From<ProviderVariant> for ProviderKind {
    fn from(variant: ProviderVariant) -> Self {
        match variant {
            ProviderVariant::Openai => ProviderKind::OpenAi,
            ProviderVariant::Groq => ProviderKind::Groq,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list {
        let store = FileStore::new(FileStore::default_dir()?)?;
        for conversation in store.list_all()? {
            println!(
                "{}  {}  ({} messages)",
                style(&conversation.id).dim(),
                conversation.title,
                conversation.messages.len()
            );
        }
        return Ok(());
    }

    let kind: ProviderKind = cli.provider.into();

    let relay_url = cli.relay_url.or_else(|| env::var("PARLEY_RELAY_URL").ok());
    let credential = cli
        .api_key
        .or_else(|| env::var(kind.credential_var()).ok());
    let hf_token = cli
        .hf_token
        .or_else(|| env::var("PARLEY_HF_API_TOKEN").ok());

    let backend = resolve_backend(relay_url.clone(), credential, kind)
        .context("no way to reach a completion provider")?;
    let images: Box<dyn ImageBackend> = match (&relay_url, &hf_token) {
        (Some(url), None) => Box::new(RelayImageClient::new(url.clone())?),
        _ => Box::new(HfImageClient::new(hf_token)?),
    };

    let store = FileStore::new(FileStore::default_dir()?)?;
    let conversation = resume_or_new(&store, cli.resume)?;
    println!(
        "{} {}",
        style("conversation:").dim(),
        style(&conversation.title).cyan()
    );

    let orchestrator = Arc::new(ChatOrchestrator::new(
        conversation,
        backend,
        images,
        Box::new(store),
        Box::new(ConsolePublisher::new()),
    ));

    Session::new(orchestrator).start().await
}

fn resume_or_new(store: &FileStore, resume: bool) -> Result<Conversation> {
    if resume {
        if let Some(id) = store.current_id()? {
            if let Some(conversation) = store.load(&id)? {
                return Ok(conversation);
            }
        }
        eprintln!("{}", style("Nothing to resume; starting fresh.").dim());
    }
    Ok(Conversation::new())
}
