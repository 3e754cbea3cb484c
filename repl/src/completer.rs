use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper, Result};
use std::borrow::Cow;

const CLAUSE_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT", "OFFSET", "FETCH",
    "UNION", "UNION ALL", "INTERSECT", "EXCEPT", "INSERT INTO", "VALUES", "UPDATE", "SET",
    "DELETE FROM", "VERSIONED",
];

const JOIN_KEYWORDS: &[&str] = &[
    "JOIN", "INNER JOIN", "LEFT JOIN", "RIGHT JOIN", "FULL JOIN", "CROSS JOIN", "JOIN FETCH",
    "LEFT JOIN FETCH", "ON", "WITH", "AS", "TREAT",
];

const PREDICATE_KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "IS NULL", "IS NOT NULL", "IS EMPTY", "IS NOT EMPTY", "MEMBER OF",
    "BETWEEN", "LIKE", "ILIKE", "ESCAPE", "IN", "EXISTS", "ALL", "ANY", "SOME",
    "IS DISTINCT FROM", "CASE", "WHEN", "THEN", "ELSE", "END",
];

const FUNCTIONS: &[&str] = &[
    "count", "sum", "avg", "min", "max", "upper", "lower", "length", "concat", "substring",
    "trim", "locate", "abs", "sqrt", "mod", "coalesce", "nullif", "cast", "extract", "size",
    "index", "key", "value", "entry", "id", "version", "type", "function", "maxelement",
    "minelement", "maxindex", "minindex", "elements", "indices", "current_date",
    "current_time", "current_timestamp",
];

const DOT_COMMANDS: &[&str] = &[
    ".help", ".exit", ".quit", ".clear", ".strict", ".model", ".entities", ".tree", ".timing",
    ".color", ".options", ".history",
];

/// Tab completion and hints for HQL statements and shell commands.
pub struct HqlHelper {
    entities: Vec<String>,
}

impl HqlHelper {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
        }
    }

    /// Replaces the entity names offered after `from`, `join`, `update` and `into`.
    pub fn set_entities(&mut self, entities: Vec<String>) {
        self.entities = entities;
    }

    fn word_start(line: &str, pos: usize) -> usize {
        line[..pos]
            .rfind(|c: char| c.is_whitespace() || "(),;".contains(c))
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn context(&self, line: &str, start: usize) -> CompletionContext {
        if line.trim_start().starts_with('.') {
            return CompletionContext::Command;
        }
        let before = line[..start].to_uppercase();
        let previous = before.split_whitespace().last().unwrap_or("");
        match previous {
            "" => CompletionContext::Start,
            "FROM" | "JOIN" | "UPDATE" | "INTO" | "VERSIONED" | "FETCH" => {
                CompletionContext::EntityName
            }
            _ if before.contains(" WHERE ") || before.contains(" HAVING ") => {
                CompletionContext::Condition
            }
            _ => CompletionContext::Anywhere,
        }
    }

    fn completions(&self, line: &str, pos: usize) -> Vec<Pair> {
        let start = Self::word_start(line, pos);
        let partial = &line[start..pos];
        let partial_upper = partial.to_uppercase();
        let partial_lower = partial.to_lowercase();

        let keyword = |keyword: &&&str| keyword.starts_with(partial_upper.as_str());
        let mut candidates: Vec<String> = Vec::new();

        match self.context(line, start) {
            CompletionContext::Command => {
                candidates.extend(
                    DOT_COMMANDS
                        .iter()
                        .filter(|command| command.starts_with(partial))
                        .map(|command| command.to_string()),
                );
            }
            CompletionContext::Start => {
                candidates.extend(
                    ["SELECT", "FROM", "INSERT INTO", "UPDATE", "DELETE FROM"]
                        .iter()
                        .filter(keyword)
                        .map(|keyword| keyword.to_string()),
                );
            }
            CompletionContext::EntityName => {
                candidates.extend(
                    self.entities
                        .iter()
                        .filter(|entity| entity.to_lowercase().starts_with(&partial_lower))
                        .cloned(),
                );
            }
            CompletionContext::Condition => {
                candidates.extend(
                    PREDICATE_KEYWORDS
                        .iter()
                        .chain(CLAUSE_KEYWORDS)
                        .filter(keyword)
                        .map(|keyword| keyword.to_string()),
                );
                self.push_functions(&partial_lower, &mut candidates);
            }
            CompletionContext::Anywhere => {
                candidates.extend(
                    CLAUSE_KEYWORDS
                        .iter()
                        .chain(JOIN_KEYWORDS)
                        .chain(PREDICATE_KEYWORDS)
                        .filter(keyword)
                        .map(|keyword| keyword.to_string()),
                );
                self.push_functions(&partial_lower, &mut candidates);
            }
        }

        if partial.is_empty() && candidates.len() > 40 {
            candidates.truncate(40);
        }

        candidates.sort_by(|a, b| {
            let a_exact = a.to_uppercase() == partial_upper;
            let b_exact = b.to_uppercase() == partial_upper;
            match (a_exact, b_exact) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                _ => a.len().cmp(&b.len()),
            }
        });
        candidates.dedup();

        candidates
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect()
    }

    fn push_functions(&self, partial_lower: &str, candidates: &mut Vec<String>) {
        if partial_lower.is_empty() {
            return;
        }
        candidates.extend(
            FUNCTIONS
                .iter()
                .filter(|function| function.starts_with(partial_lower))
                .map(|function| format!("{}(", function)),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletionContext {
    Command,
    Start,
    EntityName,
    Condition,
    Anywhere,
}

impl Completer for HqlHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        Ok((Self::word_start(line, pos), self.completions(line, pos)))
    }
}

impl Hinter for HqlHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }

        let upper = line.to_uppercase();
        let example_entity = self
            .entities
            .first()
            .map(String::as_str)
            .unwrap_or("<Entity>");

        if upper == "SELECT" {
            return Some(" e FROM <Entity> e".to_string());
        }
        if upper == "UPDATE " {
            return Some(format!("{} e SET e.<attribute> = <value>", example_entity));
        }
        if upper == "DELETE FROM " {
            return Some(format!("{} e WHERE <condition>", example_entity));
        }
        if upper == "INSERT INTO " {
            return Some(format!("{} (<attributes>) VALUES (<values>)", example_entity));
        }
        if upper.ends_with(" FROM ") || upper == "FROM " {
            return Some(format!("{} e", example_entity));
        }
        if upper.ends_with(" WHERE ") {
            return Some("<condition>".to_string());
        }
        if upper == ".MODEL " {
            return Some("<path/to/model.json>".to_string());
        }
        if upper == ".STRICT " {
            return Some("on|off".to_string());
        }

        None
    }
}

impl Highlighter for HqlHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        Cow::Borrowed(prompt)
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[2m{}\x1b[0m", hint))
    }
}

impl Validator for HqlHelper {}

impl Helper for HqlHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn helper() -> HqlHelper {
        let mut helper = HqlHelper::new();
        helper.set_entities(vec!["Animal".to_string(), "Person".to_string()]);
        helper
    }

    fn replacements(helper: &HqlHelper, line: &str) -> Vec<String> {
        helper
            .completions(line, line.len())
            .into_iter()
            .map(|pair| pair.replacement)
            .collect()
    }

    #[test]
    fn test_entity_names_after_from() {
        assert_eq!(replacements(&helper(), "select a from An"), vec!["Animal"]);
        assert_eq!(replacements(&helper(), "update p"), vec!["Person"]);
    }

    #[test]
    fn test_dot_commands() {
        assert_eq!(replacements(&helper(), ".st"), vec![".strict"]);
    }

    #[test]
    fn test_statement_starters() {
        assert_eq!(replacements(&helper(), "sel"), vec!["SELECT"]);
    }

    #[test]
    fn test_functions_in_conditions() {
        let candidates = replacements(&helper(), "select a from Animal a where up");
        assert!(candidates.contains(&"upper(".to_string()));
    }
}
