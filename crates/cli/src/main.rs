use async_trait::async_trait;
use clap::{Parser, Subcommand};
use pizzabot::activity::{Activity, ChannelAccount, Reply};
use pizzabot::bot::Bot;
use pizzabot::channels::{ChannelError, ReplySender};
use pizzabot::session::SessionStore;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pizzabot")]
#[command(about = "pizzabot CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, sessions directory).
    Init {
        /// Config file path (default: PIZZABOT_CONFIG_PATH or ~/.pizzabot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the gateway: accepts connector activities on POST /api/messages and posts replies back.
    Gateway {
        /// Config file path (default: PIZZABOT_CONFIG_PATH or ~/.pizzabot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3978)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Talk to the bot in the terminal (no gateway or connector involved).
    Chat {
        /// Config file path (default: PIZZABOT_CONFIG_PATH or ~/.pizzabot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Conversation id to continue (resumes a persisted form session).
        #[arg(long, value_name = "ID")]
        conversation: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("pizzabot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat {
            config,
            conversation,
        }) => {
            if let Err(e) = run_chat(config, conversation).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(pizzabot::config::default_config_path);
    let dir = pizzabot::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = pizzabot::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    pizzabot::gateway::run_gateway(config, path).await
}

const CHAT_CHANNEL: &str = "console";
const CHAT_USER: &str = "user";
const CHAT_BOT: &str = "pizzabot";

/// Prints replies to stdout; card buttons are listed under the text.
struct ConsoleChannel;

#[async_trait]
impl ReplySender for ConsoleChannel {
    fn id(&self) -> &str {
        CHAT_CHANNEL
    }

    async fn send_reply(&self, reply: &Reply) -> Result<(), ChannelError> {
        println!("< {}", reply.text.trim());
        for attachment in &reply.attachments {
            if let Some(card) = attachment.hero_card() {
                for (i, button) in card.buttons.iter().enumerate() {
                    println!("    {}. {}", i + 1, button.title);
                }
            } else if let Some(url) = &attachment.content_url {
                println!("    [{}] {}", attachment.content_type, url);
            }
        }
        Ok(())
    }
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    conversation: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = pizzabot::config::load_config(config_path)?;
    let form = pizzabot::pizza::pizza_form(config.bot.max_attempts)?;
    let sessions = match pizzabot::config::resolve_sessions_dir(&config, &path) {
        Some(dir) => SessionStore::with_dir(dir),
        None => SessionStore::new(),
    };
    let bot = Bot::new(form, sessions, Arc::new(ConsoleChannel));

    let conversation_id = match conversation {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            let joined = Activity::conversation_update(
                CHAT_CHANNEL,
                &id,
                CHAT_BOT,
                vec![ChannelAccount::new(CHAT_USER, None)],
            );
            bot.handle_activity(&joined).await?;
            id
        }
    };
    log::info!("chatting in conversation {}", conversation_id);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let activity = Activity::message(CHAT_CHANNEL, &conversation_id, CHAT_USER, CHAT_BOT, input);
        if let Err(e) = bot.handle_activity(&activity).await {
            eprintln!("chat error: {}", e);
        }
    }

    Ok(())
}
