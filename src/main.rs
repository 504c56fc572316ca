use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use council_stream::metrics::STREAM_METRICS;
use council_stream::{
    ChatRequest, ClientConfig, CouncilClient, DeliberationEvent, DeliberationScope, EventKind,
    MessageRequest, ResponseMode, StreamOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "council", version, about = "Ask the AI council and watch it deliberate")]
struct Cli {
    /// Path to a TOML config file (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message and stream the deliberation
    Ask(AskArgs),
}

#[derive(Args, Debug)]
struct AskArgs {
    /// Message to send
    message: String,

    /// Conversation to post into
    #[arg(long)]
    conversation: String,

    #[arg(long)]
    company: Option<String>,

    #[arg(long = "department")]
    departments: Vec<String>,

    #[arg(long = "role")]
    roles: Vec<String>,

    #[arg(long = "playbook")]
    playbooks: Vec<String>,

    #[arg(long)]
    project: Option<String>,

    #[arg(long = "attachment")]
    attachments: Vec<String>,

    #[arg(long, value_enum)]
    mode: Option<ResponseMode>,

    /// Follow-up chat with the synthesizer instead of a full deliberation
    #[arg(long)]
    chat: bool,

    /// Print one JSON object per event
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("council_stream=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env()?,
    };
    let client = CouncilClient::new(config).context("Failed to create council client")?;

    match cli.command {
        Command::Ask(args) => ask(&client, args).await?,
    }

    tracing::debug!("{}", STREAM_METRICS.snapshot());
    Ok(())
}

async fn ask(client: &CouncilClient, args: AskArgs) -> anyhow::Result<()> {
    let scope = DeliberationScope {
        business_id: args.company,
        department_ids: args.departments,
        role_ids: args.roles,
        playbook_ids: args.playbooks,
        project_id: args.project,
    };

    let json = args.json;
    let handler = move |event: &DeliberationEvent| print_event(event, json);

    let handle = if args.chat {
        client.initiate(
            &args.conversation,
            ChatRequest::new(args.message).with_scope(scope),
            handler,
            StreamOptions::default(),
        )
    } else {
        let mut request = MessageRequest::new(args.message)
            .with_scope(scope)
            .with_attachments(args.attachments);
        if let Some(mode) = args.mode {
            request = request.with_response_mode(mode);
        }
        client.initiate(&args.conversation, request, handler, StreamOptions::default())
    };

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = handle.wait().await.context("Deliberation stream failed")?;
    eprintln!(
        "Session {} ended {:?} after {} events",
        outcome.session_id, outcome.state, outcome.events
    );
    Ok(())
}

fn print_event(event: &DeliberationEvent, json: bool) {
    if json {
        let mut line = event.payload().clone();
        line.insert(
            "type".to_string(),
            serde_json::Value::String(event.event_type().to_string()),
        );
        println!("{}", serde_json::Value::Object(line));
        return;
    }

    match event.kind() {
        EventKind::Stage1Start => println!("== Stage 1: individual responses"),
        EventKind::Stage1ModelComplete { model, .. } => println!("  [{}] done", model),
        EventKind::Stage1Complete { data } => {
            for response in data {
                println!("--- {}\n{}\n", response.model, response.response);
            }
        }
        EventKind::Stage2Start => println!("== Stage 2: peer review"),
        EventKind::Stage2Complete { metadata, .. } => {
            if let Some(metadata) = metadata {
                for (rank, entry) in metadata.aggregate_rankings.iter().enumerate() {
                    println!(
                        "  {}. {} (avg {:.2}, {} votes)",
                        rank + 1,
                        entry.model,
                        entry.average_rank,
                        entry.rankings_count
                    );
                }
            }
        }
        EventKind::Stage3Start => println!("== Stage 3: final answer"),
        EventKind::Stage3Token { content } => print!("{}", content),
        EventKind::Stage3Complete { data } => {
            println!("\n--- {}\n{}", data.model, data.response)
        }
        EventKind::TitleComplete { data } => println!("== Title: {}", data.title),
        EventKind::Complete => println!("== Complete"),
        EventKind::Error { message } => eprintln!("Council error: {}", message),
        EventKind::Cancelled => eprintln!("Cancelled"),
        EventKind::Stage1Token { .. } | EventKind::Stage2Token { .. } => {}
        EventKind::Unknown { event_type, .. } => {
            tracing::debug!(%event_type, "Ignoring unknown event")
        }
    }
}
