use super::display::{self, DisplayConfig};
use super::session::Session;
use colored::Colorize;
use std::path::Path;

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Continue,
    Exit,
    Error(String),
    ClearScreen,
    ShowHistory,
    ExecuteFromHistory(usize),
    /// The domain model changed; completions need the new entity names.
    ModelChanged,
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        CommandHandler
    }

    pub fn handle(
        &self,
        line: &str,
        display_config: &mut DisplayConfig,
        session: &mut Session,
    ) -> CommandResult {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return CommandResult::Continue;
        }

        match parts[0] {
            ".help" | ".h" | ".?" => {
                self.show_help();
                CommandResult::Continue
            }
            ".exit" | ".quit" | ".q" => CommandResult::Exit,
            ".clear" | ".cls" => CommandResult::ClearScreen,
            ".strict" => match parse_switch(parts.get(1).copied(), session.is_strict()) {
                Ok(strict) => {
                    session.set_strict(strict);
                    display::print_toggle("Strict JPQL compliance", strict);
                    CommandResult::Continue
                }
                Err(msg) => CommandResult::Error(format!(".strict: {}", msg)),
            },
            ".model" => {
                let loaded = match parts.get(1) {
                    Some(path) => session.load_model(Path::new(path)),
                    None => match session.reload_model() {
                        Some(result) => result,
                        None => {
                            return CommandResult::Error(
                                "Usage: .model <path> (no model loaded yet)".to_string(),
                            );
                        }
                    },
                };
                match loaded {
                    Ok(count) => {
                        display::print_success(&format!("Loaded {} entities", count));
                        CommandResult::ModelChanged
                    }
                    Err(e) => CommandResult::Error(format!("Failed to load model: {}", e)),
                }
            }
            ".entities" => {
                self.show_entities(session);
                CommandResult::Continue
            }
            ".tree" | ".ast" => match parse_switch(parts.get(1).copied(), display_config.show_tree) {
                Ok(show) => {
                    display_config.show_tree = show;
                    display::print_toggle("Statement tree", show);
                    CommandResult::Continue
                }
                Err(msg) => CommandResult::Error(format!(".tree: {}", msg)),
            },
            ".timing" | ".time" => {
                display_config.show_timing = !display_config.show_timing;
                display::print_toggle("Compile timing", display_config.show_timing);
                CommandResult::Continue
            }
            ".color" | ".colors" => {
                display_config.use_colors = !display_config.use_colors;
                colored::control::set_override(display_config.use_colors);
                display::print_toggle("Colors", display_config.use_colors);
                CommandResult::Continue
            }
            ".options" => match serde_json::to_string_pretty(session.options()) {
                Ok(json) => {
                    println!("{}", json);
                    CommandResult::Continue
                }
                Err(e) => CommandResult::Error(format!("Failed to render options: {}", e)),
            },
            ".history" | ".hist" => match parts.get(1) {
                Some(arg) => match arg.parse::<usize>() {
                    Ok(n) => CommandResult::ExecuteFromHistory(n),
                    Err(_) => CommandResult::Error(format!("Invalid history number: {}", arg)),
                },
                None => CommandResult::ShowHistory,
            },
            _ => CommandResult::Error(format!(
                "Unknown command: {}. Type .help for help.",
                parts[0]
            )),
        }
    }

    fn show_help(&self) {
        println!("\n{}", "HQL Shell Commands".bright_cyan().bold());
        println!("{}", "─".repeat(50).bright_black());

        let commands = [
            (".help, .h, .?", "Show this help message"),
            (".exit, .quit, .q", "Exit the shell"),
            (".clear, .cls", "Clear the screen"),
            ("", ""),
            ("Compilation:", ""),
            (".strict [on|off]", "Toggle strict JPQL compliance"),
            (".model [path]", "Load a domain model (reloads when no path)"),
            (".entities", "List entities of the loaded model"),
            (".options", "Show the active compile options"),
            ("", ""),
            ("Display Options:", ""),
            (".tree [on|off]", "Toggle the full statement tree"),
            (".timing, .time", "Toggle compile timing"),
            (".color, .colors", "Toggle colored output"),
            ("", ""),
            ("History:", ""),
            (".history, .hist", "Show statement history"),
            (".history <n>", "Compile history entry n"),
        ];

        for (cmd, desc) in commands {
            if cmd.is_empty() {
                println!();
            } else if desc.is_empty() {
                println!("\n{}", cmd.bright_yellow());
            } else {
                println!("  {:20} {}", cmd.bright_green(), desc.bright_white());
            }
        }

        println!("\n{}", "Statement Input:".bright_yellow());
        println!("  • End statements with ';' to compile");
        println!("  • Press Enter without ';' for multiline input");
        println!("  • Empty line ends multiline mode");
        println!("  • Ctrl+C cancels current input");
        println!("  • Ctrl+D exits the shell");
        println!();
    }

    fn show_entities(&self, session: &Session) {
        let entities = session.entity_names();
        if entities.is_empty() {
            display::print_info("No entities loaded");
            display::print_hint("Use .model <path> to load a domain model");
            return;
        }
        display::print_info(&format!("{} entit(ies):", entities.len()));
        for entity in &entities {
            println!("  • {}", entity.bright_green());
        }
    }
}

/// `on`/`off` set the flag, no argument flips it.
fn parse_switch(arg: Option<&str>, current: bool) -> Result<bool, String> {
    match arg {
        None => Ok(!current),
        Some("on") | Some("true") => Ok(true),
        Some("off") | Some("false") => Ok(false),
        Some(other) => Err(format!("invalid value {} (expected on or off)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_core::CompileOptions;
    use pretty_assertions::assert_eq;

    fn run(line: &str, session: &mut Session) -> CommandResult {
        let mut config = DisplayConfig::default();
        CommandHandler::new().handle(line, &mut config, session)
    }

    #[test]
    fn test_strict_command() {
        let mut session = Session::new(CompileOptions::default());
        assert_eq!(run(".strict on", &mut session), CommandResult::Continue);
        assert!(session.is_strict());
        assert_eq!(run(".strict", &mut session), CommandResult::Continue);
        assert!(!session.is_strict());
        assert!(matches!(run(".strict maybe", &mut session), CommandResult::Error(_)));
    }

    #[test]
    fn test_tree_command() {
        let mut session = Session::new(CompileOptions::default());
        let mut config = DisplayConfig::default();
        let handler = CommandHandler::new();
        assert_eq!(handler.handle(".tree on", &mut config, &mut session), CommandResult::Continue);
        assert!(config.show_tree);
        assert_eq!(handler.handle(".tree off", &mut config, &mut session), CommandResult::Continue);
        assert!(!config.show_tree);
    }

    #[test]
    fn test_history_argument() {
        let mut session = Session::new(CompileOptions::default());
        assert_eq!(run(".history 3", &mut session), CommandResult::ExecuteFromHistory(3));
        assert_eq!(run(".hist", &mut session), CommandResult::ShowHistory);
        assert!(matches!(run(".history x", &mut session), CommandResult::Error(_)));
    }

    #[test]
    fn test_model_without_path_or_previous_load() {
        let mut session = Session::new(CompileOptions::default());
        assert!(matches!(run(".model", &mut session), CommandResult::Error(_)));
        assert!(matches!(
            run(".model /nonexistent/model.json", &mut session),
            CommandResult::Error(_)
        ));
    }

    #[test]
    fn test_unknown_command() {
        let mut session = Session::new(CompileOptions::default());
        assert!(matches!(run(".frobnicate", &mut session), CommandResult::Error(_)));
        assert_eq!(run(".exit", &mut session), CommandResult::Exit);
    }
}
