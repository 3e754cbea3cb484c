mod commands;
mod completer;
pub mod display;
mod history;
mod prompt;
mod session;

use anyhow::{Context, bail};
use clap::Parser;
use hql_core::CompileOptions;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use self::commands::{CommandHandler, CommandResult};
use self::completer::HqlHelper;
use self::display::DisplayConfig;
use self::session::Session;

/// Interactive shell that compiles HQL statements against a domain model.
#[derive(Parser, Debug)]
#[command(name = "hql", version, about)]
struct Args {
	/// Domain model definition (JSON).
	#[arg(short, long)]
	model: Option<PathBuf>,

	/// Compile options file (JSON).
	#[arg(long)]
	options: Option<PathBuf>,

	/// Enable strict JPQL compliance.
	#[arg(long)]
	strict: bool,

	/// Statement or dot command to run; may be repeated.
	#[arg(short = 'c', long = "command")]
	commands: Vec<String>,

	/// Script to run, or `-` for standard input.
	file: Option<String>,

	#[arg(short, long)]
	quiet: bool,

	/// Stop at the first failing statement.
	#[arg(long)]
	exit_on_error: bool,

	#[arg(long)]
	no_history: bool,

	/// Print the full statement tree for every compiled statement.
	#[arg(long)]
	tree: bool,
}

#[derive(Debug, Clone)]
enum InputSource {
	Interactive,
	File(String),
	Stdin,
	CommandLine(Vec<String>),
}

#[derive(Debug, Clone)]
struct ReplOptions {
	input_source: InputSource,
	quiet: bool,
	exit_on_error: bool,
	no_history: bool,
}

struct Repl {
	editor: Editor<HqlHelper, DefaultHistory>,
	command_handler: CommandHandler,
	display_config: DisplayConfig,
	session: Session,
	history: history::HistoryManager,
	options: ReplOptions,
	multiline_buffer: String,
	in_multiline: bool,
	compile_count: usize,
	start_time: Instant,
}

impl Repl {
	fn new(session: Session, display_config: DisplayConfig, options: ReplOptions) -> anyhow::Result<Self> {
		let config = Config::builder()
			.history_ignore_space(true)
			.completion_type(rustyline::CompletionType::List)
			.edit_mode(rustyline::EditMode::Emacs)
			.build();

		let mut helper = HqlHelper::new();
		helper.set_entities(session.entity_names());

		let mut editor = Editor::with_config(config)?;
		editor.set_helper(Some(helper));

		let history = history::HistoryManager::new(history::HISTORY_FILE);
		if !options.no_history {
			history.load(&mut editor);
		}

		Ok(Self {
			editor,
			command_handler: CommandHandler::new(),
			display_config,
			session,
			history,
			options,
			multiline_buffer: String::new(),
			in_multiline: false,
			compile_count: 0,
			start_time: Instant::now(),
		})
	}

	fn run(&mut self) -> anyhow::Result<()> {
		match self.options.input_source.clone() {
			InputSource::Interactive => self.run_interactive(),
			InputSource::File(path) => {
				if !self.options.quiet {
					display::print_info(&format!("Compiling file: {}", path));
				}
				let content =
					fs::read_to_string(&path).with_context(|| format!("Cannot read {}", path))?;
				self.execute_script(&content)
			}
			InputSource::Stdin => {
				let mut content = String::new();
				io::stdin().read_to_string(&mut content)?;
				self.execute_script(&content)
			}
			InputSource::CommandLine(commands) => {
				for command in &commands {
					if !self.execute_single(command)? {
						break;
					}
				}
				Ok(())
			}
		}
	}

	fn run_interactive(&mut self) -> anyhow::Result<()> {
		if !self.options.quiet {
			display::print_welcome();
			self.show_model_status();
		}

		loop {
			let prompt_str = prompt::generate_prompt(
				self.in_multiline,
				self.session.is_strict(),
				self.compile_count,
				&self.display_config,
			);

			match self.editor.readline(&prompt_str) {
				Ok(line) => {
					if !self.handle_line(line)? {
						break;
					}
				}
				Err(ReadlineError::Interrupted) => self.handle_interrupt(),
				Err(ReadlineError::Eof) => {
					println!();
					display::print_goodbye(self.compile_count, self.start_time.elapsed());
					break;
				}
				Err(err) => {
					display::print_error(&format!("Readline error: {:?}", err));
					break;
				}
			}
		}

		if !self.options.no_history {
			self.history.save(&mut self.editor)?;
		}
		Ok(())
	}

	/// Runs a script: dot commands one per line, statements terminated by `;`.
	fn execute_script(&mut self, content: &str) -> anyhow::Result<()> {
		let mut current_statement = String::new();

		for (index, line) in content.lines().enumerate() {
			let trimmed = line.trim();
			if trimmed.is_empty() || trimmed.starts_with("--") {
				continue;
			}

			if trimmed.starts_with('.') && current_statement.trim().is_empty() {
				debug!(line = index + 1, command = trimmed, "script command");
				if !self.execute_single(trimmed)? {
					return Ok(());
				}
				continue;
			}

			if !current_statement.is_empty() {
				current_statement.push('\n');
			}
			current_statement.push_str(line);

			if trimmed.ends_with(';') {
				let statement = std::mem::take(&mut current_statement);
				if !self.execute_single(&statement)? {
					return Ok(());
				}
			}
		}

		if !current_statement.trim().is_empty() {
			self.execute_single(&current_statement)?;
		}

		Ok(())
	}

	/// Returns `false` when the shell should stop.
	fn execute_single(&mut self, input: &str) -> anyhow::Result<bool> {
		let trimmed = input.trim();
		if trimmed.is_empty() {
			return Ok(true);
		}
		if trimmed.starts_with('.') {
			return self.handle_command(trimmed);
		}
		self.compile(trimmed)?;
		Ok(true)
	}

	fn compile(&mut self, input: &str) -> anyhow::Result<()> {
		let query = input.trim_end_matches(';').trim();
		if query.is_empty() {
			return Ok(());
		}

		self.compile_count += 1;
		let start = Instant::now();
		let result = self.session.compile(query);
		let duration = start.elapsed();

		match result {
			Ok(statement) => {
				if !self.options.quiet {
					display::print_statement(&statement, duration, &self.display_config);
				}
				Ok(())
			}
			Err(e) => {
				display::print_compile_error(&e, query);
				if self.options.exit_on_error {
					bail!("compilation failed: {}", e);
				}
				Ok(())
			}
		}
	}

	fn handle_command(&mut self, line: &str) -> anyhow::Result<bool> {
		let result = self
			.command_handler
			.handle(line, &mut self.display_config, &mut self.session);

		match result {
			CommandResult::Continue => Ok(true),
			CommandResult::Exit => {
				if !self.options.quiet {
					display::print_goodbye(self.compile_count, self.start_time.elapsed());
				}
				Ok(false)
			}
			CommandResult::Error(msg) => {
				display::print_error(&msg);
				if self.options.exit_on_error {
					bail!(msg);
				}
				Ok(true)
			}
			CommandResult::ClearScreen => {
				display::clear_screen();
				if !self.options.quiet {
					display::print_welcome();
					self.show_model_status();
				}
				Ok(true)
			}
			CommandResult::ShowHistory => {
				self.history.display(&self.editor);
				Ok(true)
			}
			CommandResult::ExecuteFromHistory(n) => {
				match self.history.get_entry(&self.editor, n) {
					Some(entry) if entry.trim_start().starts_with(".history") => {
						display::print_error("Refusing to replay a .history command");
					}
					Some(entry) => {
						display::print_info(&entry);
						return self.execute_single(&entry);
					}
					None => display::print_error(&format!("History entry {} not found", n)),
				}
				Ok(true)
			}
			CommandResult::ModelChanged => {
				let entities = self.session.entity_names();
				if let Some(helper) = self.editor.helper_mut() {
					helper.set_entities(entities);
				}
				Ok(true)
			}
		}
	}

	fn handle_line(&mut self, line: String) -> anyhow::Result<bool> {
		if !line.trim().is_empty() {
			self.editor.add_history_entry(line.as_str())?;
		}

		if !self.in_multiline && line.trim().starts_with('.') {
			return self.handle_command(line.trim());
		}

		if self.in_multiline {
			self.multiline_buffer.push('\n');
		}
		self.multiline_buffer.push_str(&line);

		let trimmed = line.trim();
		let finished = trimmed.ends_with(';') || (trimmed.is_empty() && self.in_multiline);
		if !finished {
			self.in_multiline = !self.multiline_buffer.trim().is_empty();
			return Ok(true);
		}

		self.in_multiline = false;
		let query = std::mem::take(&mut self.multiline_buffer);
		if !query.trim().is_empty() {
			self.compile(&query)?;
		}
		Ok(true)
	}

	fn handle_interrupt(&mut self) {
		if self.in_multiline {
			display::print_warning("Cancelled multiline input");
			self.multiline_buffer.clear();
			self.in_multiline = false;
		} else {
			display::print_hint("Use .exit or Ctrl+D to quit");
		}
	}

	fn show_model_status(&self) {
		let entities = self.session.entity_names();
		match self.session.model_path() {
			Some(path) => display::print_success(&format!(
				"Model {} ({} entities)",
				path.display(),
				entities.len()
			)),
			None => {
				display::print_warning("No domain model loaded");
				display::print_hint("Use .model <path> or start with --model <path>");
			}
		}
		display::print_toggle("Strict JPQL compliance", self.session.is_strict());
	}
}

fn get_env_filter() -> EnvFilter {
	if std::env::var_os("RUST_LOG").is_some() {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
	} else if cfg!(debug_assertions) {
		EnvFilter::new("hql_core=info,hql=info")
	} else {
		EnvFilter::new("warn")
	}
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(get_env_filter())
		.with_writer(io::stderr)
		.with_target(false)
		.compact()
		.init();

	let args = Args::parse();

	let mut options = match &args.options {
		Some(path) => CompileOptions::load_from_path(path)?,
		None => CompileOptions::default(),
	};
	if args.strict {
		options.jpa_compliance = true;
	}

	let mut session = Session::new(options);
	if let Some(path) = &args.model {
		session.load_model(path)?;
	} else {
		warn!("no domain model given, entity references will not resolve");
	}

	let input_source = if !args.commands.is_empty() {
		InputSource::CommandLine(args.commands.clone())
	} else {
		match args.file.as_deref() {
			Some("-") => InputSource::Stdin,
			Some(path) => InputSource::File(path.to_string()),
			None => InputSource::Interactive,
		}
	};

	let mut display_config = DisplayConfig::default();
	display_config.show_tree = args.tree;
	if args.quiet {
		display_config.show_timing = false;
	}

	let repl_options = ReplOptions {
		input_source,
		quiet: args.quiet,
		exit_on_error: args.exit_on_error,
		no_history: args.no_history,
	};

	let mut repl = Repl::new(session, display_config, repl_options)?;
	repl.run()
}
