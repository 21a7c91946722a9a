//! `kaio chat` — interactive conversation or single-message mode.
//!
//! Interactive mode is a command loop: lines starting with `/` are slash
//! commands, anything else runs a turn. When an online turn fails, the
//! user is offered an offline retry of the same prompt.

use anyhow::Context;
use kaio_agent::{Mode, ToolDispatcher, TurnController};
use kaio_config::AppConfig;
use kaio_core::error::Error;
use kaio_core::message::Conversation;
use kaio_mcp::McpRegistry;
use kaio_providers::OFFLINE_PROVIDER;
use kaio_tools::CommandDenylist;
use std::io::Write;
use std::sync::Arc;

const HELP: &str = "\
Commands:
  /help                    Show this help
  /provider [name]         Show or switch the active provider
  /model [name]            Show or set the model for the active provider
  /token [provider] <key>  Store an API token
  /mode [online|offline]   Show or switch mode
  /online                  Switch to online mode
  /offline                 Switch to offline mode
  /mcp [list|reload]       Show or reconnect MCP servers
  /clear                   Forget the conversation so far
  /retry                   Re-run the last prompt
  /exit                    Quit";

struct ChatSession {
    config: AppConfig,
    mcp: Arc<McpRegistry>,
    controller: TurnController,
    conversation: Conversation,
    mode: Mode,
    last_input: Option<String>,
}

impl ChatSession {
    async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let mcp = Arc::new(McpRegistry::connect_all(&config.mcp_servers).await);
        let mode = if config.active_provider == OFFLINE_PROVIDER {
            Mode::Offline
        } else {
            Mode::Online
        };
        let controller = build_controller(&config, Arc::clone(&mcp), mode)
            .context("Failed to build provider")?;
        Ok(Self {
            config,
            mcp,
            controller,
            conversation: Conversation::new(),
            mode,
            last_input: None,
        })
    }

    /// Rebuild the controller after a provider, token, model, or mode
    /// change. The conversation is kept.
    fn rebuild(&mut self) -> Result<(), Error> {
        self.controller = build_controller(&self.config, Arc::clone(&self.mcp), self.mode)?;
        Ok(())
    }

    async fn run_prompt(&mut self, input: &str) {
        self.last_input = Some(input.to_string());

        match self.controller.run_turn(&mut self.conversation, input).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => {
                eprintln!("Error: {e}");
                if self.mode == Mode::Online && confirm("Switch to offline mode and retry?") {
                    self.mode = Mode::Offline;
                    match self.rebuild() {
                        Ok(()) => {
                            println!("Switched to offline mode.");
                            match self.controller.run_turn(&mut self.conversation, input).await
                            {
                                Ok(reply) => println!("{reply}"),
                                Err(e) => eprintln!("Offline error: {e}"),
                            }
                        }
                        Err(e) => eprintln!("Cannot switch offline: {e}"),
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        match command {
            "/help" => println!("{HELP}"),
            "/exit" | "/quit" => return false,
            "/clear" => {
                self.conversation.clear();
                println!("Conversation cleared.");
            }
            "/provider" => match args.first() {
                None => {
                    println!("Active provider: {}", self.config.active_provider);
                    println!(
                        "Known providers: {}",
                        kaio_providers::known_providers()
                            .iter()
                            .map(|p| p.name)
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                Some(name) => {
                    if let Err(e) = self.config.set_active_provider(*name) {
                        eprintln!("Failed to persist: {e}");
                    }
                    self.mode = if *name == OFFLINE_PROVIDER {
                        Mode::Offline
                    } else {
                        Mode::Online
                    };
                    match self.rebuild() {
                        Ok(()) => println!("Switched to provider '{name}'."),
                        Err(e) => eprintln!("Provider not usable: {e}"),
                    }
                }
            },
            "/model" => match args.first() {
                None => println!(
                    "Model: {}",
                    kaio_providers::model_for(&self.config, &self.config.active_provider)
                ),
                Some(model) => {
                    let provider = self.config.active_provider.clone();
                    if let Err(e) = self.config.set_model(&provider, *model) {
                        eprintln!("Failed to persist: {e}");
                    }
                    match self.rebuild() {
                        Ok(()) => println!("Model for '{provider}' set to '{model}'."),
                        Err(e) => eprintln!("Provider not usable: {e}"),
                    }
                }
            },
            "/token" => {
                let (provider, token) = match args.as_slice() {
                    [token] => (self.config.active_provider.clone(), token.to_string()),
                    [provider, token] => (provider.to_string(), token.to_string()),
                    _ => {
                        println!("Usage: /token [provider] <key>");
                        return true;
                    }
                };
                if let Err(e) = self.config.set_token(&provider, &token) {
                    eprintln!("Failed to persist: {e}");
                }
                match self.rebuild() {
                    Ok(()) => println!("Token stored for '{provider}'."),
                    Err(e) => eprintln!("Provider not usable: {e}"),
                }
            }
            "/mode" => match args.first() {
                None => println!(
                    "Mode: {}",
                    match self.mode {
                        Mode::Online => "online",
                        Mode::Offline => "offline",
                    }
                ),
                Some(&"online") => self.switch_mode(Mode::Online),
                Some(&"offline") => self.switch_mode(Mode::Offline),
                Some(other) => println!("Unknown mode '{other}'. Use online or offline."),
            },
            "/online" => self.switch_mode(Mode::Online),
            "/offline" => self.switch_mode(Mode::Offline),
            "/mcp" => match args.first() {
                None | Some(&"list") => {
                    let servers = self.mcp.server_names();
                    if servers.is_empty() {
                        println!("No MCP servers connected.");
                    } else {
                        println!("MCP servers: {}", servers.join(", "));
                        for def in self.mcp.definitions() {
                            println!("  {}", def.name);
                        }
                    }
                }
                Some(&"reload") => {
                    self.mcp =
                        Arc::new(McpRegistry::connect_all(&self.config.mcp_servers).await);
                    match self.rebuild() {
                        Ok(()) => println!(
                            "Reconnected {} MCP server(s).",
                            self.mcp.server_names().len()
                        ),
                        Err(e) => eprintln!("Provider not usable: {e}"),
                    }
                }
                Some(other) => println!("Unknown subcommand '{other}'. Use list or reload."),
            },
            "/retry" => match self.last_input.clone() {
                Some(input) => self.run_prompt(&input).await,
                None => println!("Nothing to retry."),
            },
            other => println!("Unknown command '{other}'. Type /help for the list."),
        }

        true
    }

    fn switch_mode(&mut self, mode: Mode) {
        self.mode = mode;
        match self.rebuild() {
            Ok(()) => println!(
                "Now in {} mode.",
                match mode {
                    Mode::Online => "online",
                    Mode::Offline => "offline",
                }
            ),
            Err(e) => eprintln!("Cannot switch: {e}"),
        }
    }
}

fn build_controller(
    config: &AppConfig,
    mcp: Arc<McpRegistry>,
    mode: Mode,
) -> Result<TurnController, Error> {
    let provider_name = match mode {
        Mode::Offline => OFFLINE_PROVIDER.to_string(),
        Mode::Online => config.active_provider.clone(),
    };
    let provider = kaio_providers::build_provider(config, &provider_name)?;
    let model = kaio_providers::model_for(config, &provider_name);
    let dispatcher = ToolDispatcher::new(kaio_tools::default_registry(), mcp)
        .with_policy(Box::new(CommandDenylist::from_config(&config.policy)));

    Ok(TurnController::new(provider, model, dispatcher)
        .with_system_prompt(&config.system_prompt)
        .with_session_memory_max(config.session_memory_max)
        .with_max_steps(config.max_steps)
        .with_mode(mode))
}

fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line.trim().to_string()),
        Err(_) => None,
    }
}

pub async fn run(message: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let mut session = ChatSession::new(config).await?;

    if let Some(msg) = message {
        session.run_prompt(&msg).await;
        return Ok(());
    }

    println!("Kaio — type a message, or /help for commands.");
    println!(
        "Provider: {} | Mode: {}",
        session.config.active_provider,
        match session.mode {
            Mode::Online => "online",
            Mode::Offline => "offline",
        }
    );

    loop {
        let Some(line) = read_line("> ") else { break };
        if line.is_empty() {
            continue;
        }
        if line.starts_with('/') {
            if !session.handle_command(&line).await {
                break;
            }
        } else {
            session.run_prompt(&line).await;
        }
    }

    println!("Bye.");
    Ok(())
}
