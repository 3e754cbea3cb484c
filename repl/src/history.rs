use crate::completer::HqlHelper;
use rustyline::history::{DefaultHistory, History, SearchDirection};
use rustyline::{Editor, Result};

pub const HISTORY_FILE: &str = ".hql_history";

pub struct HistoryManager {
    history_file: String,
}

impl HistoryManager {
    pub fn new(history_file: &str) -> Self {
        Self {
            history_file: history_file.to_string(),
        }
    }

    pub fn load(&self, editor: &mut Editor<HqlHelper, DefaultHistory>) {
        // A missing history file is normal on first start.
        let _ = editor.load_history(&self.history_file);
    }

    pub fn save(&self, editor: &mut Editor<HqlHelper, DefaultHistory>) -> Result<()> {
        editor.save_history(&self.history_file)
    }

    pub fn display(&self, editor: &Editor<HqlHelper, DefaultHistory>) {
        let history_len = editor.history().len();

        if history_len == 0 {
            println!("No history available");
            return;
        }

        println!("\nStatement History:");
        println!("{}", "─".repeat(60));

        for i in history_len.saturating_sub(20)..history_len {
            if let Ok(Some(search_result)) = editor.history().get(i, SearchDirection::Forward) {
                let entry: &str = &search_result.entry;
                let shown = if entry.chars().count() > 60 {
                    format!("{}...", entry.chars().take(57).collect::<String>())
                } else {
                    entry.to_string()
                };
                println!("{:4} │ {}", i + 1, shown);
            }
        }

        println!("{}", "─".repeat(60));
        println!("Use .history <n> to compile entry n");
    }

    pub fn get_entry(&self, editor: &Editor<HqlHelper, DefaultHistory>, n: usize) -> Option<String> {
        if n == 0 || n > editor.history().len() {
            return None;
        }
        editor
            .history()
            .get(n - 1, SearchDirection::Forward)
            .ok()
            .flatten()
            .map(|search_result| search_result.entry.to_string())
    }
}
