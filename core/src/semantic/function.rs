//! Function-call visitors.
//!
//! Calls are resolved against the [`FunctionRegistry`](crate::function::FunctionRegistry);
//! names the registry does not know fall back to a generic descriptor typed
//! `Object`.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::builder::SemanticQueryBuilder;
use super::compliance::ComplianceViolation;
use super::expression::subquery_type;
use crate::domain::{BasicType, SemanticType};
use crate::error::{HqlError, HqlResult};
use crate::function::{FunctionDescriptor, NamedFunctionDescriptor};
use crate::hql::tree;
use crate::sqm::{
    CastTarget, Expression, ExpressionKind, LiteralValue, Predicate, TemporalUnit,
    TrimSpecification,
};

/// Function names the HQL grammar knows about. Anything else is a
/// non-standard call.
const STANDARD_FUNCTIONS: &[&str] = &[
    "abs", "acos", "any", "asin", "atan", "atan2", "avg", "cast", "ceiling", "coalesce",
    "concat", "cos", "count", "current_date", "current_time", "current_timestamp", "every",
    "exp", "extract", "floor", "format", "greatest", "ifnull", "index", "instant", "least",
    "left", "length", "ln", "local_date", "local_datetime", "local_time", "locate", "lower",
    "max", "maxelement", "maxindex", "min", "minelement", "minindex", "mod",
    "nullif", "offset_datetime", "overlay", "pad", "position", "power", "replace", "right",
    "round", "sign", "sin", "size", "sqrt", "str", "substring", "sum", "tan", "trim", "upper",
];

const AGGREGATE_FUNCTIONS: &[&str] = &["max", "min", "sum", "avg", "count", "every", "any"];

/// Datetime fields that may be called like functions, e.g. `year(d)`.
const EXTRACT_SHORTHAND: &[&str] = &[
    "year", "quarter", "month", "week", "day", "hour", "minute", "second", "nanosecond",
];

lazy_static! {
    static ref FORMAT_PATTERN: Regex = Regex::new(
        r"^('[^']+'|[:;/,.!@#$^&?~`|()\[\]{}<>\-+*=]|\s|G{1,2}|[yY]{1,4}|M{1,4}|w{1,2}|W|E{3,4}|e{1,2}|d{1,2}|D{1,3}|a{1,2}|[Hhms]{1,2}|S{1,6}|[zZx]{1,3})*$"
    )
    .expect("valid format pattern");
}

impl SemanticQueryBuilder<'_> {
    pub(super) fn generate_function(
        &self,
        name: &str,
        arguments: Vec<Expression>,
        expected: Option<&SemanticType>,
    ) -> HqlResult<Expression> {
        match self.functions.find_function_descriptor(name) {
            Some(descriptor) => descriptor.generate_expression(arguments, expected),
            None => NamedFunctionDescriptor::generic(name).generate_expression(arguments, expected),
        }
    }

    fn generate_aggregate(
        &self,
        name: &str,
        arguments: Vec<Expression>,
        filter: Option<Predicate>,
    ) -> HqlResult<Expression> {
        match self.functions.find_function_descriptor(name) {
            Some(descriptor) => descriptor.generate_aggregate_expression(arguments, filter, None),
            None => NamedFunctionDescriptor::generic(name)
                .generate_aggregate_expression(arguments, filter, None),
        }
    }

    pub(super) fn visit_function_call(
        &mut self,
        call: &tree::FunctionCallSyntax,
    ) -> HqlResult<Expression> {
        let name = match call.name.text.to_ascii_lowercase().as_str() {
            "all" => "every".to_string(),
            "some" => "any".to_string(),
            other => other.to_string(),
        };

        if EXTRACT_SHORTHAND.contains(&name.as_str())
            && !call.distinct
            && call.filter.is_none()
            && let tree::FunctionArguments::List(arguments) = &call.arguments
            && let [tree::Argument::Expression(argument)] = arguments.as_slice()
        {
            return self.visit_extract(&call.name, argument);
        }

        if AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
            return self.visit_aggregate(&name, call);
        }

        if call.filter.is_some() {
            return Err(HqlError::Semantic(format!(
                "FILTER clause is only allowed for aggregate functions, not {}()",
                name
            )));
        }
        if call.distinct {
            return Err(HqlError::Semantic(format!(
                "DISTINCT is only allowed for aggregate functions, not {}()",
                name
            )));
        }
        let tree::FunctionArguments::List(arguments) = &call.arguments else {
            return Err(HqlError::Semantic(format!(
                "Only count() accepts a '*' argument, not {}()",
                name
            )));
        };

        let arguments = if STANDARD_FUNCTIONS.contains(&name.as_str()) {
            self.visit_arguments(arguments)?
        } else {
            self.check_compliance(ComplianceViolation::FunctionCall, || {
                format!(
                    "Encountered non-compliant non-standard function call [{}], but strict JPA compliance was requested; use JPA's FUNCTION(functionName[,...]) syntax name instead",
                    name
                )
            })?;
            debug!(function = %name, "non-standard function call");
            self.visit_non_standard_arguments(arguments)?
        };

        let expected = match name.as_str() {
            "mod" => arguments.first().map(|argument| argument.ty.clone()),
            _ => None,
        };
        self.generate_function(&name, arguments, expected.as_ref())
    }

    fn visit_argument(&mut self, argument: &tree::Argument) -> HqlResult<Expression> {
        match argument {
            tree::Argument::Expression(expression) => self.visit_expression(expression),
            tree::Argument::Predicate(predicate) => {
                let predicate = self.visit_predicate(predicate)?;
                Ok(Expression::new(
                    ExpressionKind::Predicate(Box::new(predicate)),
                    SemanticType::Basic(BasicType::Boolean),
                ))
            }
        }
    }

    fn visit_arguments(&mut self, arguments: &[tree::Argument]) -> HqlResult<Vec<Expression>> {
        arguments
            .iter()
            .map(|argument| self.visit_argument(argument))
            .collect()
    }

    /// The last argument of a non-standard call may bind a multi-valued
    /// parameter, except under strict compliance.
    fn visit_non_standard_arguments(
        &mut self,
        arguments: &[tree::Argument],
    ) -> HqlResult<Vec<Expression>> {
        let Some((last, leading)) = arguments.split_last() else {
            return Ok(Vec::new());
        };
        let mut visited = self.visit_arguments(leading)?;
        let allow_multi_valued = !self.compliance.is_strict();
        visited.push(
            self.with_parameter_context(allow_multi_valued, |builder| builder.visit_argument(last))?,
        );
        Ok(visited)
    }

    fn visit_aggregate(
        &mut self,
        name: &str,
        call: &tree::FunctionCallSyntax,
    ) -> HqlResult<Expression> {
        if matches!(name, "every" | "any")
            && let tree::FunctionArguments::List(arguments) = &call.arguments
            && let [tree::Argument::Expression(argument)] = arguments.as_slice()
            && let Some(query) = argument.as_subquery()
        {
            if call.filter.is_some() {
                return Err(HqlError::Semantic(
                    "Quantified expression cannot have a filter clause!".to_string(),
                ));
            }
            let subquery = Box::new(self.visit_subquery(query)?);
            let ty = subquery_type(&subquery);
            let kind = if name == "every" {
                ExpressionKind::Every(subquery)
            } else {
                ExpressionKind::Any(subquery)
            };
            return Ok(Expression::new(kind, ty));
        }

        let mut arguments = match &call.arguments {
            tree::FunctionArguments::Star if name == "count" => {
                vec![Expression::new(ExpressionKind::Star, SemanticType::Unknown)]
            }
            tree::FunctionArguments::Star => {
                return Err(HqlError::Semantic(format!(
                    "Only count() accepts a '*' argument, not {}()",
                    name
                )));
            }
            tree::FunctionArguments::List(arguments) => self.visit_arguments(arguments)?,
        };
        if call.distinct
            && let Some(first) = arguments.first_mut()
        {
            let operand = std::mem::replace(first, Expression::null());
            let ty = operand.ty.clone();
            *first = Expression::new(ExpressionKind::Distinct(Box::new(operand)), ty);
        }
        let filter = call
            .filter
            .as_deref()
            .map(|filter| self.visit_predicate(filter))
            .transpose()?;
        self.generate_aggregate(name, arguments, filter)
    }

    pub(super) fn visit_jpa_function(
        &mut self,
        name: &tree::Terminal,
        arguments: &[tree::Expression],
    ) -> HqlResult<Expression> {
        let name = name.text.to_ascii_lowercase();
        let arguments = self.visit_expressions(arguments)?;
        self.generate_function(&name, arguments, None)
    }

    pub(super) fn visit_cast(
        &mut self,
        expression: &tree::Expression,
        target: &tree::CastTargetSyntax,
    ) -> HqlResult<Expression> {
        let argument = self.visit_expression(expression)?;
        let basic = self
            .model
            .resolve_cast_target_type(&target.name.text)
            .ok_or_else(|| {
                HqlError::Resolution(format!(
                    "Could not resolve cast target type [{}]",
                    target.name.text
                ))
            })?;
        let parameters = target
            .parameters
            .iter()
            .map(|parameter| {
                parameter
                    .text
                    .parse::<u32>()
                    .map_err(|_| HqlError::numeric_format(parameter.text.as_str(), BasicType::Integer))
            })
            .collect::<HqlResult<Vec<_>>>()?;
        let (length, precision, scale) = match parameters.as_slice() {
            [] => (None, None, None),
            [length] => (Some(*length), None, None),
            [precision, scale] => (None, Some(*precision), Some(*scale)),
            _ => {
                return Err(HqlError::Semantic(format!(
                    "Too many parameters for cast target type [{}]",
                    target.name.text
                )));
            }
        };
        let target_type = SemanticType::Basic(basic);
        let cast_target = Expression::new(
            ExpressionKind::CastTarget(CastTarget {
                target: basic,
                length,
                precision,
                scale,
            }),
            target_type.clone(),
        );
        self.generate_function("cast", vec![argument, cast_target], Some(&target_type))
    }

    pub(super) fn visit_extract(
        &mut self,
        field: &tree::Ident,
        argument: &tree::Expression,
    ) -> HqlResult<Expression> {
        let source = self.visit_expression(argument)?;
        let jdbc = source.ty.is_jdbc_temporal();
        let (unit, basic) = match field.text.to_ascii_lowercase().as_str() {
            "year" => (TemporalUnit::Year, BasicType::Integer),
            "quarter" => (TemporalUnit::Quarter, BasicType::Integer),
            "month" => (TemporalUnit::Month, BasicType::Integer),
            "week" => (TemporalUnit::Week, BasicType::Integer),
            "day" => (TemporalUnit::Day, BasicType::Integer),
            "hour" => (TemporalUnit::Hour, BasicType::Integer),
            "minute" => (TemporalUnit::Minute, BasicType::Integer),
            "second" => (TemporalUnit::Second, BasicType::Float),
            "nanosecond" => (TemporalUnit::Nanosecond, BasicType::Long),
            "day_of_week" => (TemporalUnit::DayOfWeek, BasicType::Integer),
            "day_of_month" => (TemporalUnit::DayOfMonth, BasicType::Integer),
            "day_of_year" => (TemporalUnit::DayOfYear, BasicType::Integer),
            "week_of_month" => (TemporalUnit::WeekOfMonth, BasicType::Integer),
            "week_of_year" => (TemporalUnit::WeekOfYear, BasicType::Integer),
            "date" if jdbc => (TemporalUnit::Date, BasicType::SqlDate),
            "date" => (TemporalUnit::Date, BasicType::LocalDate),
            "time" if jdbc => (TemporalUnit::Time, BasicType::SqlTime),
            "time" => (TemporalUnit::Time, BasicType::LocalTime),
            "offset" => (TemporalUnit::Offset, BasicType::ZoneOffset),
            "timezone_hour" | "offset_hour" => (TemporalUnit::TimezoneHour, BasicType::Integer),
            "timezone_minute" | "offset_minute" => {
                (TemporalUnit::TimezoneMinute, BasicType::Integer)
            }
            other => {
                return Err(HqlError::Parsing(format!(
                    "Unsupported datetime field [{}]",
                    other
                )));
            }
        };
        let expected = SemanticType::Basic(basic);
        let unit = Expression::new(ExpressionKind::ExtractUnit(unit), expected.clone());
        self.generate_function("extract", vec![unit, source], Some(&expected))
    }

    pub(super) fn visit_format(
        &mut self,
        expression: &tree::Expression,
        pattern: &tree::Terminal,
    ) -> HqlResult<Expression> {
        let argument = self.visit_expression(expression)?;
        if !FORMAT_PATTERN.is_match(&pattern.text) {
            return Err(HqlError::Semantic(format!(
                "illegal format pattern: '{}'",
                pattern.text
            )));
        }
        let format = Expression::new(
            ExpressionKind::Format(pattern.text.as_str().into()),
            SemanticType::Basic(BasicType::String),
        );
        self.generate_function("format", vec![argument, format], None)
    }

    pub(super) fn visit_trim(
        &mut self,
        specification: Option<tree::TrimSpec>,
        character: Option<&tree::Terminal>,
        argument: &tree::Expression,
    ) -> HqlResult<Expression> {
        let specification = trim_specification(specification.unwrap_or(tree::TrimSpec::Both));
        let character = trim_character(character)?;
        let source = self.visit_expression(argument)?;
        self.generate_function("trim", vec![specification, character, source], None)
    }

    pub(super) fn visit_pad(
        &mut self,
        argument: &tree::Expression,
        length: &tree::Expression,
        specification: tree::TrimSpec,
        character: Option<&tree::Terminal>,
    ) -> HqlResult<Expression> {
        let source = self.visit_expression(argument)?;
        let length = self.visit_expression(length)?;
        let specification = trim_specification(specification);
        let character = trim_character(character)?;
        self.generate_function("pad", vec![source, length, specification, character], None)
    }
}

fn trim_specification(specification: tree::TrimSpec) -> Expression {
    let specification = match specification {
        tree::TrimSpec::Leading => TrimSpecification::Leading,
        tree::TrimSpec::Trailing => TrimSpecification::Trailing,
        tree::TrimSpec::Both => TrimSpecification::Both,
    };
    Expression::new(
        ExpressionKind::TrimSpecification(specification),
        SemanticType::Unknown,
    )
}

/// Trim and pad characters default to a single space.
fn trim_character(character: Option<&tree::Terminal>) -> HqlResult<Expression> {
    let text = character.map(|terminal| terminal.text.as_str()).unwrap_or(" ");
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Expression::literal(LiteralValue::Character(c))),
        _ => Err(HqlError::Semantic(format!(
            "Padding/trim character must be a single character, but found '{}'",
            text
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pattern_accepts_common_patterns() {
        for pattern in ["yyyy-MM-dd", "HH:mm:ss", "dd/MM/yyyy 'at' HH", "EEEE d MMMM"] {
            assert!(FORMAT_PATTERN.is_match(pattern), "{}", pattern);
        }
    }

    #[test]
    fn test_format_pattern_rejects_unknown_letters() {
        for pattern in ["qqq", "yyyy-MM-dd'unterminated", "%Y"] {
            assert!(!FORMAT_PATTERN.is_match(pattern), "{}", pattern);
        }
    }

    #[test]
    fn test_trim_character_must_be_single() {
        assert!(trim_character(None).is_ok());
        let err = trim_character(Some(&tree::Terminal {
            kind: crate::hql::TokenKind::StringLiteral,
            text: "ab".to_string(),
            span: Default::default(),
        }))
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Semantic);
    }
}
