//! wachat CLI
//!
//! Command-line front end for the sync core. Each command builds a
//! controller, runs one intent through it and prints what landed in the
//! stores. `tail` keeps the live channel open and prints store changes as
//! they happen.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wachat::client::{
    AuthClient, Config, HttpRestClient, LiveClient, LiveSender, PreconditionError,
    RegisterRequest, StoreChange, SyncController, SyncError,
};
use wachat::shared::{ClientFrame, ConnectionStatus, Conversation, ConversationFilter, Message};

/// Characters of message text shown per line in `tail` without a conversation
const PREVIEW_LEN: usize = 60;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// WhatsApp-style chat client
#[derive(Parser, Debug)]
#[command(name = "wachat-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session token
    Login { email: String, password: String },
    /// Create an account and store the session token
    Register {
        username: String,
        email: String,
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        wa_id: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List conversations
    Conversations {
        #[arg(short, long, default_value = "all")]
        filter: ConversationFilter,
    },
    /// Show the message history of a conversation
    History {
        conversation_id: String,
        /// Number of pages to load, newest first
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },
    /// Send a text message
    Send { conversation_id: String, text: String },
    /// Mark a conversation as read
    Read { conversation_id: String },
    /// Follow the live channel
    Tail { conversation_id: Option<String> },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load(args.config.as_deref())?;
    let mut auth = AuthClient::from_config(config)?;
    auth.restore();

    match args.command {
        Command::Login { email, password } => {
            let user = auth.login(&email, &password).await?;
            println!("Logged in as {} ({})", user.username, user.wa_id);
        }
        Command::Register {
            username,
            email,
            password,
            name,
            wa_id,
        } => {
            let request = RegisterRequest {
                username,
                email,
                password,
                name,
                wa_id,
            };
            let user = auth.register(&request).await?;
            println!("Registered {} ({})", user.username, user.wa_id);
        }
        Command::Logout => {
            auth.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = auth.profile().await?;
            println!("{} <{}>", user.username, user.email);
            println!("  name:   {}", user.profile.name);
            println!("  wa_id:  {}", user.wa_id);
            if !user.profile.status.is_empty() {
                println!("  status: {}", user.profile.status);
            }
        }
        Command::Conversations { filter } => {
            let controller = controller(&auth)?;
            controller.load_conversations(filter).await?;
            for conversation in controller.conversations(filter).await {
                print_conversation(&conversation);
            }
            let unread = controller.state().await.conversations().total_unread();
            if unread > 0 {
                println!("{} unread", unread);
            }
        }
        Command::History {
            conversation_id,
            pages,
        } => {
            let controller = controller(&auth)?;
            controller.load_initial_page(&conversation_id).await?;
            for _ in 1..pages {
                match controller.load_older_page(&conversation_id).await {
                    Ok(_) => {}
                    Err(SyncError::Precondition(PreconditionError::NoMorePages(_))) => break,
                    Err(e) => return Err(e.into()),
                }
            }
            for message in controller.messages(&conversation_id).await {
                print_message(&message);
            }
        }
        Command::Send {
            conversation_id,
            text,
        } => {
            let controller = controller(&auth)?;
            let message = controller.send_outgoing(&conversation_id, &text)?.wait().await?;
            println!("Sent {} at {}", message.id, message.timestamp.to_rfc3339());
        }
        Command::Read { conversation_id } => {
            let controller = controller(&auth)?;
            controller.mark_read(&conversation_id).await?;
            println!("Marked {} as read", conversation_id);
        }
        Command::Tail { conversation_id } => {
            tail(&auth, conversation_id).await?;
        }
    }

    Ok(())
}

fn controller(auth: &AuthClient) -> CliResult<SyncController> {
    if !auth.is_authenticated() {
        return Err("not logged in; run `wachat-cli login` first".into());
    }
    let config = auth.config().clone();
    let settings = config.sync_settings();
    Ok(SyncController::new(HttpRestClient::new(config)?, settings))
}

async fn tail(auth: &AuthClient, conversation_id: Option<String>) -> CliResult<()> {
    let controller = controller(auth)?;
    let token = auth.token().unwrap_or_default().to_string();

    controller.load_conversations(ConversationFilter::All).await?;
    if let Some(id) = &conversation_id {
        controller.open_conversation(id).await?;
        controller.load_initial_page(id).await?;
        for message in controller.messages(id).await {
            print_message(&message);
        }
    }

    let changes = controller.subscribe();
    let mut subscription = LiveClient::new(auth.config()).subscribe(token);
    let printer = tokio::spawn(print_changes(
        controller.clone(),
        changes,
        subscription.sender(),
        conversation_id,
    ));

    tokio::select! {
        _ = controller.run_live(&mut subscription) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    printer.abort();
    subscription.cancel();
    Ok(())
}

async fn print_changes(
    controller: SyncController,
    mut changes: broadcast::Receiver<StoreChange>,
    sender: LiveSender,
    focus: Option<String>,
) {
    loop {
        let change = match changes.recv().await {
            Ok(change) => change,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Skipped {} store changes", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match change {
            StoreChange::MessagesChanged { conversation_id } => {
                let Some(message) = controller.messages(&conversation_id).await.pop() else {
                    continue;
                };
                match focus.as_deref() {
                    Some(f) if f == conversation_id => print_message(&message),
                    Some(_) => {}
                    None => println!("{}: {}", conversation_id, message.preview(PREVIEW_LEN)),
                }
            }
            StoreChange::ConversationUpdated { id } if focus.is_none() => {
                if let Some(conversation) = controller.conversation(&id).await {
                    print_conversation(&conversation);
                }
            }
            StoreChange::ConnectivityChanged(status) => {
                eprintln!("-- {:?}", status);
                if let (ConnectionStatus::Connected, Some(id)) = (&status, &focus) {
                    if let Err(e) = sender.send(ClientFrame::JoinConversation(id.clone())).await {
                        warn!("Could not join {}: {}", id, e);
                    }
                }
            }
            StoreChange::Typing { conversation_id, typing } => {
                if typing && focus.as_deref() == Some(conversation_id.as_str()) {
                    eprintln!("-- {} is typing", conversation_id);
                }
            }
            _ => {}
        }
    }
}

fn print_conversation(conversation: &Conversation) {
    let online = if conversation.is_online { "*" } else { " " };
    let unread = if conversation.unread_count > 0 {
        format!(" ({})", conversation.unread_count)
    } else {
        String::new()
    };
    println!(
        "{} {:<16} {:<20}{}  {}",
        online,
        conversation.id,
        conversation.contact_name,
        unread,
        conversation.last_message
    );
}

fn print_message(message: &Message) {
    let direction = if message.is_outgoing { ">" } else { "<" };
    println!(
        "{} {} [{}] {}",
        message.timestamp.to_rfc3339(),
        direction,
        message.status.as_str(),
        message.text
    );
}
