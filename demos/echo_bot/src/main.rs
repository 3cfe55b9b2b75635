//! Echo Bot Example
//!
//! A small tour of the Courier SDK:
//!
//! - `/start` greets and shows an inline keyboard
//! - `/echo <text>` repeats its arguments
//! - any other text is echoed back
//! - pressing a button answers the callback and reports the data
//! - `/survey` starts a two-question conversation
//!
//! # Usage
//!
//! ```bash
//! COURIER_BOT__TOKEN=123:abc cargo run --package echo-bot
//! cargo run --package echo-bot -- --config courier.toml --mode webhook
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use courier::prelude::*;
use courier::runtime::config::UpdaterMode;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echoes whatever it is sent")]
struct Args {
    /// Configuration file (TOML or YAML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `dev` loads `courier.dev.toml` first.
    #[arg(short, long)]
    profile: Option<String>,

    /// Bot token, overriding the configuration.
    #[arg(long, env = "ECHO_BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// How updates are received.
    #[arg(long, value_enum)]
    mode: Option<Mode>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Polling,
    Webhook,
}

impl From<Mode> for UpdaterMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Polling => UpdaterMode::Polling,
            Mode::Webhook => UpdaterMode::Webhook,
        }
    }
}

fn load_config(args: &Args) -> Result<CourierConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile.clone());
    }
    let mut config = loader.load()?;
    if let Some(token) = &args.token {
        config.bot.token = token.clone();
    }
    if let Some(mode) = args.mode {
        config.updater.mode = mode.into();
    }
    Ok(config)
}

// ============================================================================
// Handlers
// ============================================================================

async fn start(ctx: Context, _cmd: CommandInput) -> HandlerResult {
    let Some(chat_id) = ctx.chat_id() else {
        return Ok(());
    };
    ctx.bot()
        .call_api(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": "Hi! Send me anything and I'll send it back.",
                "reply_markup": {
                    "inline_keyboard": [[
                        { "text": "Ping", "callback_data": "ping" },
                        { "text": "Pong", "callback_data": "pong" },
                    ]]
                }
            }),
        )
        .await?;
    Ok(())
}

async fn echo_command(ctx: Context, cmd: CommandInput) -> HandlerResult {
    if cmd.args.is_empty() {
        ctx.reply("Usage: /echo <text>").await?;
    } else {
        ctx.reply(&cmd.args.join(" ")).await?;
    }
    Ok(())
}

async fn echo_text(ctx: Context, input: TextInput) -> HandlerResult {
    info!(chat = ?ctx.chat_id(), user = ?ctx.sender_id(), "echo: {}", input.text);
    ctx.reply(&input.text).await?;
    Ok(())
}

async fn button(ctx: Context, query: CallbackQuery) -> HandlerResult {
    let data = query.data.as_deref().unwrap_or("<none>");
    info!(user = query.from.id, data, "button pressed");
    if let Some(message) = &query.message {
        ctx.bot()
            .send_message(message.chat.id, &format!("You pressed {data}"))
            .await?;
    }
    Ok(())
}

fn survey(store: ChainStore) -> impl Handler {
    let entry = CommandHandler::new(["survey"], |ctx: Context, _| async move {
        ctx.reply("What's your name?").await?;
        ctx.consume();
        Ok(())
    });
    ConversationHandler::new(
        entry,
        |_update: &Update| ChainToken::from("name"),
        |ctx: Context, token: ChainToken| async move {
            match token.as_str() {
                "name" => {
                    ctx.reply("And your favourite colour?").await?;
                    Ok(Some(ChainToken::from("colour")))
                }
                _ => {
                    ctx.reply("Thanks, that's all!").await?;
                    Ok(None)
                }
            }
        },
    )
    .store(store)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let runtime = CourierRuntime::builder().config(config).build()?;

    runtime.register(CommandHandler::new(["start"], start));
    runtime.register(CommandHandler::new(["echo"], echo_command));
    runtime.register(survey(runtime.new_chain_store()));
    runtime.register(TextHandler::new(echo_text).skip_commands(true));
    runtime.register(CallbackQueryHandler::new(button).answer(CallbackAnswer {
        text: Some("Got it".into()),
        ..Default::default()
    }));

    runtime.register_error_handler(|bot, failure| async move {
        error!(bot = bot.id(), group = ?failure.group, "{}", failure.error);
    });

    info!(mode = %runtime.config().updater.mode, "echo bot starting");
    runtime.run().await?;
    Ok(())
}
