use colored::Colorize;
use hql_core::sqm::{
	Expression, ExpressionKind, FromElement, FromKind, InstantiationTarget, QueryPart, QuerySpec,
	Selectable, Selection, SortDirection, Statement, StatementKind,
};
use hql_core::{ErrorKind, HqlError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DisplayConfig {
	/// Dump the full statement tree after the summary.
	pub show_tree: bool,
	pub show_timing: bool,
	pub use_colors: bool,
}

impl Default for DisplayConfig {
	fn default() -> Self {
		Self {
			show_tree: false,
			show_timing: true,
			use_colors: true,
		}
	}
}

pub fn print_welcome() {
	println!(
		"\n{}",
		"╔═══════════════════════════════════════╗".bright_cyan()
	);
	println!(
		"{}",
		"║        HQL semantic compiler          ║"
			.bright_cyan()
			.bold()
	);
	println!(
		"{}",
		"╚═══════════════════════════════════════╝".bright_cyan()
	);
	println!();
	println!(
		"Type {} for help, {} to exit",
		".help".bright_green(),
		".exit".bright_green()
	);
	println!();
}

pub fn print_goodbye(compile_count: usize, duration: Duration) {
	println!();
	println!("{}", "─".repeat(40).bright_black());
	println!("   Compiled {} statements in {:.1?}", compile_count, duration);
	println!();
}

pub fn clear_screen() {
	print!("\x1B[2J\x1B[1;1H");
}

pub fn print_error(msg: &str) {
	println!("{} {}", "✗".bright_red().bold(), msg.bright_red());
}

pub fn print_warning(msg: &str) {
	println!("{} {}", "⚠".bright_yellow(), msg.bright_yellow());
}

pub fn print_info(msg: &str) {
	println!("{} {}", "ℹ".bright_blue(), msg.bright_white());
}

pub fn print_success(msg: &str) {
	println!("{} {}", "✓".bright_green().bold(), msg.bright_green());
}

pub fn print_hint(msg: &str) {
	println!("{} {}", "»".bright_white(), msg.bright_white().dimmed());
}

pub fn print_toggle(feature: &str, enabled: bool) {
	let status = if enabled {
		"ON".bright_green().bold()
	} else {
		"OFF".bright_red()
	};
	println!("{}: {}", feature, status);
}

pub fn print_statement(statement: &Statement, duration: Duration, config: &DisplayConfig) {
	print_success(statement_label(&statement.kind));

	match &statement.kind {
		StatementKind::Select(select) => print_query_part(statement, &select.query_part, 1),
		StatementKind::InsertSelect(insert) => {
			print_target(statement, statement.from_element(insert.target));
			for path in &insert.target_paths {
				println!("    {} {}", "→".bright_black(), path.navigable_path);
			}
			print_query_part(statement, &insert.query_part, 1);
		}
		StatementKind::InsertValues(insert) => {
			print_target(statement, statement.from_element(insert.target));
			for path in &insert.target_paths {
				println!("    {} {}", "→".bright_black(), path.navigable_path);
			}
			println!("  {} {} row(s)", "values:".bright_yellow(), insert.values.len());
		}
		StatementKind::Update(update) => {
			print_target(statement, statement.from_element(update.target));
			for assignment in &update.assignments {
				println!(
					"    {} = {}",
					assignment.path.navigable_path,
					describe(&assignment.value)
				);
			}
			if update.where_clause.is_some() {
				println!("  {}", "where: ✓".bright_yellow());
			}
		}
		StatementKind::Delete(delete) => {
			print_target(statement, statement.from_element(delete.target));
			if delete.where_clause.is_some() {
				println!("  {}", "where: ✓".bright_yellow());
			}
		}
	}

	if !statement.parameters.is_empty() {
		let parameters: Vec<String> = statement
			.parameters
			.iter()
			.map(|parameter| {
				if parameter.allow_multi_valued_binding {
					format!("{} (multi-valued)", parameter)
				} else {
					parameter.to_string()
				}
			})
			.collect();
		println!("  {} {}", "parameters:".bright_yellow(), parameters.join(", "));
	}

	if config.show_tree {
		println!("\n{:#?}", statement);
	}

	if config.show_timing {
		println!(
			"  {} {:.3}ms",
			"Time:".bright_black(),
			duration.as_secs_f64() * 1000.0
		);
	}
}

fn statement_label(kind: &StatementKind) -> &'static str {
	match kind {
		StatementKind::Select(_) => "SELECT statement",
		StatementKind::InsertSelect(_) => "INSERT ... SELECT statement",
		StatementKind::InsertValues(_) => "INSERT ... VALUES statement",
		StatementKind::Update(_) => "UPDATE statement",
		StatementKind::Delete(_) => "DELETE statement",
	}
}

fn print_target(statement: &Statement, target: &FromElement) {
	println!(
		"  {} {}",
		"target:".bright_yellow(),
		target.navigable_path.to_string().bright_white()
	);
	for join in &target.joins {
		print_from_element(statement, statement.from_element(*join), 2);
	}
}

fn print_query_part(statement: &Statement, part: &QueryPart, depth: usize) {
	let indent = "  ".repeat(depth);
	match part {
		QueryPart::Spec(spec) => print_query_spec(statement, spec, depth),
		QueryPart::Group(group) => {
			let operator = group
				.operator
				.map(|operator| format!("{:?}", operator).to_uppercase())
				.unwrap_or_else(|| "GROUP".to_string());
			println!("{}{}", indent, operator.bright_magenta().bold());
			for part in &group.parts {
				print_query_part(statement, part, depth + 1);
			}
		}
	}
	let order = part.order();
	if !order.order_by.is_empty() {
		let items: Vec<String> = order
			.order_by
			.iter()
			.map(|sort| {
				let direction = match sort.direction {
					SortDirection::Ascending => "asc",
					SortDirection::Descending => "desc",
				};
				format!("{} {}", describe(&sort.expression), direction)
			})
			.collect();
		println!("{}{} {}", indent, "order by:".bright_yellow(), items.join(", "));
	}
	if let Some(fetch) = &order.fetch {
		println!(
			"{}{} {} ({:?})",
			indent,
			"fetch:".bright_yellow(),
			describe(fetch),
			order.fetch_type
		);
	}
	if let Some(offset) = &order.offset {
		println!("{}{} {}", indent, "offset:".bright_yellow(), describe(offset));
	}
}

fn print_query_spec(statement: &Statement, spec: &QuerySpec, depth: usize) {
	let indent = "  ".repeat(depth);
	println!("{}{}", indent, "from:".bright_yellow());
	for root in &spec.from.roots {
		print_from_element(statement, statement.from_element(*root), depth + 1);
	}

	let distinct = if spec.select.distinct { " distinct" } else { "" };
	println!("{}{}{}", indent, "select:".bright_yellow(), distinct);
	for (position, selection) in spec.select.selections.iter().enumerate() {
		println!("{}  {}. {}", indent, position + 1, describe_selection(selection));
	}

	if spec.where_clause.is_some() {
		println!("{}{}", indent, "where: ✓".bright_yellow());
	}
	if !spec.group_by.is_empty() {
		let items: Vec<String> = spec.group_by.iter().map(describe).collect();
		println!("{}{} {}", indent, "group by:".bright_yellow(), items.join(", "));
	}
	if spec.having.is_some() {
		println!("{}{}", indent, "having: ✓".bright_yellow());
	}
}

fn print_from_element(statement: &Statement, element: &FromElement, depth: usize) {
	let indent = "  ".repeat(depth);
	let kind = match &element.kind {
		FromKind::Root => "root".to_string(),
		FromKind::CrossJoin => "cross join".to_string(),
		FromKind::EntityJoin { join_type } => format!("{} join", join_type.text()),
		FromKind::AttributeJoin {
			join_type,
			fetched,
			implicit,
			..
		} => {
			let mut kind = format!("{} join", join_type.text());
			if *fetched {
				kind.push_str(" fetch");
			}
			if *implicit {
				kind.push_str(" (implicit)");
			}
			kind
		}
		FromKind::Correlation { .. } => "correlation".to_string(),
	};
	let treated = element
		.treated_as
		.as_ref()
		.map(|entity| format!(" treat as {}", entity.name))
		.unwrap_or_default();
	println!(
		"{}{} {} : {}{}",
		indent,
		format!("[{}]", kind).bright_black(),
		element.navigable_path.to_string().bright_white(),
		element.source.semantic_type(),
		treated
	);
	for join in &element.joins {
		print_from_element(statement, statement.from_element(*join), depth + 1);
	}
}

fn describe_selection(selection: &Selection) -> String {
	let body = match &selection.selectable {
		Selectable::Expression(expression) => describe(expression),
		Selectable::DynamicInstantiation(instantiation) => {
			let target = match &instantiation.target {
				InstantiationTarget::Class(name) => name.to_string(),
				InstantiationTarget::List => "list".to_string(),
				InstantiationTarget::Map => "map".to_string(),
			};
			format!("new {}({} args)", target, instantiation.arguments.len())
		}
	};
	let alias = selection
		.alias
		.as_ref()
		.map(|alias| format!(" as {}", alias))
		.unwrap_or_default();
	format!(
		"{} : {}{}",
		body,
		selection.semantic_type().to_string().bright_cyan(),
		alias
	)
}

/// One-line rendering of an expression.
fn describe(expression: &Expression) -> String {
	match &expression.kind {
		ExpressionKind::Path(path) => path.navigable_path.to_string(),
		ExpressionKind::Literal(value) => value.to_string(),
		ExpressionKind::Null => "null".to_string(),
		ExpressionKind::EnumLiteral(constant) => {
			format!("{}.{}", constant.enum_type, constant.name)
		}
		ExpressionKind::EntityTypeLiteral(entity) => entity.name.to_string(),
		ExpressionKind::Parameter(parameter) => parameter.to_string(),
		ExpressionKind::Function(call) => {
			let arguments: Vec<String> = call.arguments.iter().map(describe).collect();
			format!("{}({})", call.name, arguments.join(", "))
		}
		ExpressionKind::AliasedNodeReference { position } => format!("#{}", position),
		ExpressionKind::SubQuery(_) => "(subquery)".to_string(),
		ExpressionKind::Star => "*".to_string(),
		ExpressionKind::Distinct(inner) => format!("distinct {}", describe(inner)),
		ExpressionKind::CollectionSize(path) => format!("size({})", path.navigable_path),
		_ => format!("<{}>", expression.ty),
	}
}

pub fn print_compile_error(error: &HqlError, query: &str) {
	let label = match error.kind() {
		ErrorKind::Syntax | ErrorKind::Parsing => "syntax",
		ErrorKind::Resolution => "resolution",
		ErrorKind::Semantic => "semantic",
		ErrorKind::Compliance => "compliance",
		ErrorKind::NumericFormat => "literal",
		ErrorKind::NotYetImplemented => "unsupported",
		ErrorKind::Config => "config",
	};
	println!(
		"{} {} {}",
		"✗".bright_red().bold(),
		format!("[{}]", label).bright_red().bold(),
		error.to_string().bright_red()
	);
	if let Some(violation) = error.violation() {
		print_hint(&format!(
			"{} is rejected under strict JPQL compliance; .strict off allows it",
			violation.description()
		));
	}

	let lines: Vec<&str> = query.lines().collect();
	if matches!(error.kind(), ErrorKind::Resolution | ErrorKind::Semantic) && lines.len() <= 5 {
		println!();
		println!("{}", "Query:".bright_yellow());
		for (i, line) in lines.iter().enumerate() {
			println!("{:3} │ {}", i + 1, line.dimmed());
		}
	}
}
