//! CLI (Command Line Interface) mode
//!
//! Interactive REPL over the orchestrator, plus a non-interactive execute
//! mode for one-shot routing.

use std::sync::Arc;

use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings,
    MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use retail_core::{AgentId, Message, Orchestrator, Task, TaskStatus};
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help"),
    ("/exit", "Quit"),
    ("/agents", "List agents and their statistics"),
    ("/stats", "Show routing statistics"),
    ("/history", "Show this conversation"),
    ("/new", "Start a new conversation"),
    ("/clear", "Clear the screen"),
    ("/task", "Run a task: /task <type> <description>"),
    ("/use", "Prefer an agent: /use <id | kind | name>"),
    ("/auto", "Clear the preferred agent"),
];

/// A parsed slash command
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Help,
    Exit,
    Agents,
    Stats,
    History,
    New,
    Clear,
    Task {
        task_type: &'a str,
        description: &'a str,
    },
    Use(&'a str),
    Auto,
    Usage(&'static str),
    Unknown(&'a str),
}

/// `None` when the input is a chat message rather than a command
fn parse_command(input: &str) -> Option<Command<'_>> {
    if !input.starts_with('/') {
        return None;
    }

    let (head, rest) = match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    };

    let command = match head.to_lowercase().as_str() {
        "/help" | "/?" => Command::Help,
        "/exit" | "/quit" | "/q" => Command::Exit,
        "/agents" => Command::Agents,
        "/stats" => Command::Stats,
        "/history" => Command::History,
        "/new" => Command::New,
        "/clear" => Command::Clear,
        "/auto" => Command::Auto,
        "/use" if rest.is_empty() => Command::Usage("/use <id | kind | name>"),
        "/use" => Command::Use(rest),
        "/task" => match rest.split_once(char::is_whitespace) {
            Some((task_type, description)) if !description.trim().is_empty() => Command::Task {
                task_type,
                description: description.trim(),
            },
            _ => Command::Usage("/task <type> <description>"),
        },
        _ => Command::Unknown(head),
    };
    Some(command)
}

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

/// Prompt showing the preferred agent, if any
struct ColoredPrompt {
    style: Style,
    preferred: Option<String>,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Cyan.bold(),
            preferred: None,
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<'_, str> {
        let label = match &self.preferred {
            Some(name) => format!("{}> ", name),
            None => "> ".to_string(),
        };
        std::borrow::Cow::Owned(self.style.paint(label).to_string())
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_indicator(
        &self,
        _prompt_mode: reedline::PromptEditMode,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }
}

/// State of one interactive session
struct CliSession {
    orchestrator: Arc<Orchestrator>,
    user_id: String,
    conversation_id: String,
    preferred: Option<AgentId>,
}

impl CliSession {
    fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            user_id: std::env::var("USER").unwrap_or_else(|_| "cli-user".to_string()),
            conversation_id: Uuid::new_v4().to_string(),
            preferred: None,
        }
    }

    async fn send(&self, text: &str) {
        let reply = self
            .orchestrator
            .route_message(
                text,
                &self.user_id,
                Some(&self.conversation_id),
                self.preferred.as_ref(),
            )
            .await;
        print_reply(&self.orchestrator, &reply).await;
    }

    /// Returns false when the session should end
    async fn handle_command(&mut self, command: Command<'_>, prompt: &mut ColoredPrompt) -> bool {
        match command {
            Command::Exit => return false,
            Command::Help => print_help(),
            Command::Agents => print_agents(&self.orchestrator, self.preferred.as_ref()).await,
            Command::Stats => print_stats(&self.orchestrator).await,
            Command::History => print_history(&self.orchestrator, &self.conversation_id),
            Command::New => {
                self.orchestrator.delete_conversation(&self.conversation_id);
                self.conversation_id = Uuid::new_v4().to_string();
                println!("\n✅ Started a new conversation.\n");
            }
            Command::Clear => {
                if let Err(e) = clear_screen() {
                    eprintln!("\n❌ Could not clear the screen: {}\n", e);
                }
            }
            Command::Task {
                task_type,
                description,
            } => {
                let task = Task::new(task_type, description).with_task_type(task_type);
                let done = self
                    .orchestrator
                    .execute_task(
                        task,
                        &self.user_id,
                        Some(&self.conversation_id),
                        self.preferred.as_ref(),
                    )
                    .await;
                print_task(&self.orchestrator, &done).await;
            }
            Command::Use(query) => match find_agent(&self.orchestrator, query).await {
                Some((id, name)) => {
                    println!("\n✅ Preferring {} ({})\n", name, id);
                    prompt.preferred = Some(name);
                    self.preferred = Some(id);
                }
                None => eprintln!("\n❓ No agent matches '{}'. Try /agents.\n", query),
            },
            Command::Auto => {
                self.preferred = None;
                prompt.preferred = None;
                println!("\n✅ Automatic agent selection.\n");
            }
            Command::Usage(usage) => eprintln!("\nUsage: {}\n", usage),
            Command::Unknown(cmd) => {
                eprintln!("\n❓ Unknown command: {}. Type /help for the list.\n", cmd)
            }
        }
        true
    }
}

/// Run CLI interactive mode
pub async fn run_cli(orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    info!(
        "Starting CLI mode with {} agents",
        orchestrator.agents().await.len()
    );

    print_welcome();

    // Setup keybindings
    let mut keybindings = default_keybindings();

    // Trigger completion on '/' key
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(48))
            .with_only_buffer_difference(false),
    );

    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let mut prompt = ColoredPrompt::new();
    let mut session = CliSession::new(orchestrator);

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                match parse_command(input) {
                    Some(command) => {
                        if !session.handle_command(command, &mut prompt).await {
                            println!("\n👋 Goodbye!\n");
                            break;
                        }
                    }
                    None => session.send(input).await,
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("\n👋 Goodbye!\n");
                break;
            }
            Err(err) => {
                eprintln!("\n❌ Error: {}\n", err);
                break;
            }
        }
    }

    Ok(())
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('c'), ReedlineEvent::CtrlC);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::CtrlD);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

fn clear_screen() -> std::io::Result<()> {
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::Clear(crossterm::terminal::ClearType::All),
        crossterm::cursor::MoveTo(0, 0)
    )
}

/// Match an agent by id, id prefix, kind or display name
async fn find_agent(orchestrator: &Orchestrator, query: &str) -> Option<(AgentId, String)> {
    let query = query.to_lowercase();
    orchestrator
        .agents()
        .await
        .into_iter()
        .find(|agent| {
            let id = agent.id().as_str();
            id == query
                || (query.len() >= 4 && id.starts_with(&query))
                || agent.kind() == query
                || agent.name().to_lowercase() == query
        })
        .map(|agent| (agent.id().clone(), agent.name().to_string()))
}

async fn agent_name(orchestrator: &Orchestrator, id: Option<&AgentId>) -> String {
    match id {
        Some(id) => match orchestrator.agent(id).await {
            Some(agent) => agent.name().to_string(),
            None => id.to_string(),
        },
        None => "system".to_string(),
    }
}

/// Scalar metadata as `key=value`, sorted by key
fn metadata_summary(message: &Message) -> String {
    let mut pairs: Vec<String> = message
        .metadata
        .iter()
        .filter(|(key, _)| key.as_str() != "error")
        .filter_map(|(key, value)| match value {
            JsonValue::String(s) => Some(format!("{}={}", key, s)),
            JsonValue::Number(n) => Some(format!("{}={}", key, n)),
            JsonValue::Bool(b) => Some(format!("{}={}", key, b)),
            _ => None,
        })
        .collect();
    pairs.sort();
    pairs.join("  ")
}

async fn print_reply(orchestrator: &Orchestrator, reply: &Message) {
    let name = agent_name(orchestrator, reply.agent_id.as_ref()).await;
    println!();
    println!("{}", Color::Green.bold().paint(format!("[{}]", name)));
    println!("{}", reply.content);

    if let Some(error) = reply.error_kind() {
        println!("{}", Color::Yellow.paint(format!("error: {}", error)));
    }
    let summary = metadata_summary(reply);
    if !summary.is_empty() {
        println!("{}", Style::new().dimmed().paint(summary));
    }
    println!();
}

async fn print_task(orchestrator: &Orchestrator, task: &Task) {
    let name = agent_name(orchestrator, task.agent_id.as_ref()).await;
    let status = match task.status {
        TaskStatus::Completed => Color::Green.paint("completed"),
        TaskStatus::Failed => Color::Red.paint("failed"),
        _ => Color::Yellow.paint(format!("{:?}", task.status).to_lowercase()),
    };

    println!();
    println!("📋 Task {} [{}] by {}", task.name, status, name);
    if let Some(error) = &task.error_message {
        println!("   {}", error);
    }
    if !task.output.is_empty() {
        match serde_json::to_string_pretty(&task.output) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("   (output not printable: {})", e),
        }
    }
    println!();
}

async fn print_agents(orchestrator: &Orchestrator, preferred: Option<&AgentId>) {
    let pool = orchestrator.pool_status().await;
    println!();
    println!(
        "🤖 Agents ({} total, {} active):",
        pool.total_agents, pool.active_agents
    );
    println!("{}", "─".repeat(60));
    for status in &pool.agents {
        let marker = if Some(&status.id) == preferred { "*" } else { " " };
        println!(
            "{} {} [{}] {}",
            marker,
            Color::Cyan.paint(&status.name),
            status.kind,
            status.id
        );
        println!(
            "    requests {}  ok {}  errors {}  avg {:.2}s  tasks {}/{}",
            status.total_requests,
            status.successful_requests,
            status.error_count,
            status.average_response_time,
            status.active_tasks,
            status.completed_tasks_total
        );
    }
    println!("{}", "─".repeat(60));
    println!();
}

async fn print_stats(orchestrator: &Orchestrator) {
    let stats = orchestrator.stats().await;
    println!();
    println!("📊 Routing statistics:");
    println!("  messages        {}", stats.total_messages);
    println!("  routed          {}", stats.successful_routes);
    println!("  success rate    {:.1}%", stats.success_rate * 100.0);
    println!("  tasks           {}", stats.total_tasks);
    println!("  failed tasks    {}", stats.failed_tasks);
    println!("  conversations   {}", stats.active_contexts);
    println!("  routing rules   {}", stats.routing_rules);
    println!(
        "  agents          {} ({} active)",
        stats.total_agents, stats.active_agents
    );
    println!("  agent types     {}", stats.registered_agent_types.join(", "));
    println!();
}

/// Print welcome message
fn print_welcome() {
    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          🛒 retail-gateway CLI - interactive mode          ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Type a question and press Enter                           ║");
    println!("║  Commands: /help, /agents, /task, /use, /exit              ║");
    println!("║  Type / to see command suggestions                         ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

/// Print help message
fn print_help() {
    println!();
    println!("📖 Available commands:");
    for (cmd, desc) in COMMANDS {
        println!("  {:<10} {}", cmd, desc);
    }
    println!();
    println!("💡 Example: /task sales_forecast next quarter for all regions");
    println!();
}

/// Print conversation history
fn print_history(orchestrator: &Orchestrator, conversation_id: &str) {
    let Some(context) = orchestrator.conversation(conversation_id) else {
        println!("\n📜 No messages yet.\n");
        return;
    };

    println!();
    println!("📜 Conversation ({} messages):", context.message_count());
    println!("{}", "─".repeat(50));

    for (i, msg) in context.history.iter().enumerate() {
        let role = match msg.role.as_str() {
            "user" => "👤 you",
            "assistant" => "🤖 agent",
            other => other,
        };
        let preview: String = msg.content.chars().take(100).collect();
        let ellipsis = if msg.content.chars().count() > 100 { "..." } else { "" };
        println!(
            "{}. {}: {}{}",
            i + 1,
            role,
            preview.replace('\n', " "),
            ellipsis
        );
    }

    if !context.capabilities_used.is_empty() {
        let used: Vec<&str> = context.capabilities_used.iter().map(|c| c.as_str()).collect();
        println!("{}", Style::new().dimmed().paint(format!("capabilities: {}", used.join(", "))));
    }
    println!("{}", "─".repeat(50));
    println!();
}

/// Non-interactive mode: route one message, print the reply and exit
///
/// # Example
/// ```bash
/// retail-gateway --execute "How did Q4 revenue compare to Q3?"
/// retail-gateway -e "check stock levels for electronics"
/// ```
pub async fn run_execute(orchestrator: Arc<Orchestrator>, prompt: &str) -> anyhow::Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        anyhow::bail!("the message is empty");
    }

    info!("Executing one-shot message");
    let reply = orchestrator.route_message(prompt, "cli-user", None, None).await;
    println!("{}", reply.content);

    match reply.error_kind() {
        Some(error) => anyhow::bail!("request was not answered: {}", error),
        None => Ok(()),
    }
}
