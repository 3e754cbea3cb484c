use super::display::DisplayConfig;
use colored::Colorize;

pub fn generate_prompt(
    in_multiline: bool,
    strict: bool,
    compile_count: usize,
    config: &DisplayConfig,
) -> String {
    if in_multiline {
        return if config.use_colors {
            "    ... ".bright_black().to_string()
        } else {
            "    ... ".to_string()
        };
    }

    let base = if strict { "hql[strict]" } else { "hql" };
    if config.use_colors {
        let base = if strict {
            base.bright_yellow().bold()
        } else {
            base.bright_cyan().bold()
        };
        format!("{}{}> ", base, format!("[{}]", compile_count).bright_black())
    } else {
        format!("{}[{}]> ", base, compile_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plain() -> DisplayConfig {
        DisplayConfig {
            use_colors: false,
            ..DisplayConfig::default()
        }
    }

    #[test]
    fn test_prompt_shows_mode_and_count() {
        assert_eq!(generate_prompt(false, false, 3, &plain()), "hql[3]> ");
        assert_eq!(generate_prompt(false, true, 0, &plain()), "hql[strict][0]> ");
        assert_eq!(generate_prompt(true, true, 0, &plain()), "    ... ");
    }
}
