use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::{FunctionDescriptor, FunctionRegistry};
use crate::domain::{BasicType, SemanticType};
use crate::error::{HqlError, HqlResult};
use crate::sqm::{Expression, ExpressionKind, FunctionCall, Predicate};

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentsValidator {
    Exactly(usize),
    Between(usize, usize),
    AtLeast(usize),
    Any,
}

impl ArgumentsValidator {
    fn validate(self, name: &str, count: usize) -> HqlResult<()> {
        let (ok, expected) = match self {
            ArgumentsValidator::Exactly(n) => (count == n, format!("exactly {}", n)),
            ArgumentsValidator::Between(min, max) => (
                (min..=max).contains(&count),
                format!("between {} and {}", min, max),
            ),
            ArgumentsValidator::AtLeast(n) => (count >= n, format!("at least {}", n)),
            ArgumentsValidator::Any => (true, String::new()),
        };
        if ok {
            Ok(())
        } else {
            Err(HqlError::Semantic(format!(
                "Function {}() requires {} arguments, but {} arguments given",
                name, expected, count
            )))
        }
    }
}

/// How a descriptor types its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Invariant(SemanticType),
    /// The first argument with a known type, else the expected type.
    FirstArgument,
    /// Whatever the caller expects.
    Expected,
}

impl ReturnType {
    fn resolve(&self, arguments: &[Expression], expected: Option<&SemanticType>) -> SemanticType {
        match self {
            ReturnType::Invariant(ty) => ty.clone(),
            ReturnType::FirstArgument => arguments
                .iter()
                .map(|argument| &argument.ty)
                .find(|ty| !ty.is_unknown())
                .or(expected)
                .cloned()
                .unwrap_or(SemanticType::Unknown),
            ReturnType::Expected => expected.cloned().unwrap_or(SemanticType::Unknown),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamedFunctionDescriptor {
    name: Arc<str>,
    validator: ArgumentsValidator,
    return_type: ReturnType,
}

impl NamedFunctionDescriptor {
    pub fn new(name: &str, validator: ArgumentsValidator, return_type: ReturnType) -> Self {
        Self {
            name: Arc::from(name),
            validator,
            return_type,
        }
    }

    /// A descriptor for a function the registry does not know, typed `Object`.
    pub fn generic(name: &str) -> Self {
        Self::new(
            name,
            ArgumentsValidator::Any,
            ReturnType::Invariant(SemanticType::Basic(BasicType::Object)),
        )
    }

    fn call(
        &self,
        arguments: Vec<Expression>,
        filter: Option<Predicate>,
        aggregate: bool,
        expected: Option<&SemanticType>,
    ) -> HqlResult<Expression> {
        self.validator.validate(&self.name, arguments.len())?;
        let ty = self.return_type.resolve(&arguments, expected);
        trace!(function = %self.name, %ty, "generated function expression");
        Ok(Expression::new(
            ExpressionKind::Function(FunctionCall {
                name: self.name.clone(),
                arguments,
                filter: filter.map(Box::new),
                aggregate,
            }),
            ty,
        ))
    }
}

impl FunctionDescriptor for NamedFunctionDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_expression(
        &self,
        arguments: Vec<Expression>,
        expected: Option<&SemanticType>,
    ) -> HqlResult<Expression> {
        self.call(arguments, None, false, expected)
    }

    fn generate_aggregate_expression(
        &self,
        arguments: Vec<Expression>,
        filter: Option<Predicate>,
        expected: Option<&SemanticType>,
    ) -> HqlResult<Expression> {
        self.call(arguments, filter, true, expected)
    }
}

/// The built-in function set.
#[derive(Debug, Clone)]
pub struct StandardFunctionRegistry {
    functions: HashMap<String, NamedFunctionDescriptor>,
}

impl Default for StandardFunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardFunctionRegistry {
    pub fn new() -> Self {
        use ArgumentsValidator::{AtLeast, Between, Exactly};
        use ReturnType::{Expected, FirstArgument};

        let invariant = |basic: BasicType| ReturnType::Invariant(SemanticType::Basic(basic));
        let mut registry = Self {
            functions: HashMap::new(),
        };

        // Math
        for name in ["abs", "ceiling", "floor"] {
            registry.register_named(name, Exactly(1), FirstArgument);
        }
        for name in ["round", "trunc", "truncate"] {
            registry.register_named(name, Between(1, 2), FirstArgument);
        }
        registry.register_named("mod", Exactly(2), FirstArgument);
        registry.register_named("sign", Exactly(1), invariant(BasicType::Integer));
        for name in [
            "sqrt", "exp", "ln", "log10", "sin", "cos", "tan", "asin", "acos", "atan", "degrees",
            "radians",
        ] {
            registry.register_named(name, Exactly(1), invariant(BasicType::Double));
        }
        registry.register_named("power", Exactly(2), invariant(BasicType::Double));
        registry.register_named("atan2", Exactly(2), invariant(BasicType::Double));
        registry.register_named("pi", Exactly(0), invariant(BasicType::Double));
        registry.register_named("least", AtLeast(2), FirstArgument);
        registry.register_named("greatest", AtLeast(2), FirstArgument);

        // Strings
        registry.register_named("concat", AtLeast(1), invariant(BasicType::String));
        registry.register_named("substring", Between(2, 3), invariant(BasicType::String));
        for name in ["upper", "lower", "str"] {
            registry.register_named(name, Exactly(1), invariant(BasicType::String));
        }
        for name in ["left", "right", "repeat"] {
            registry.register_named(name, Exactly(2), invariant(BasicType::String));
        }
        registry.register_named("replace", Exactly(3), invariant(BasicType::String));
        registry.register_named("length", Exactly(1), invariant(BasicType::Integer));
        registry.register_named("bit_length", Exactly(1), invariant(BasicType::Integer));
        registry.register_named("ascii", Exactly(1), invariant(BasicType::Integer));
        registry.register_named("chr", Exactly(1), invariant(BasicType::Character));
        registry.register_named("locate", Between(2, 3), invariant(BasicType::Integer));
        registry.register_named("position", Exactly(2), invariant(BasicType::Integer));
        // specification, character, source
        registry.register_named("trim", Exactly(3), invariant(BasicType::String));
        // source, length, specification, character
        registry.register_named("pad", Exactly(4), invariant(BasicType::String));

        // Date and time
        registry.register_named("current_date", Exactly(0), invariant(BasicType::SqlDate));
        registry.register_named("current_time", Exactly(0), invariant(BasicType::SqlTime));
        registry.register_named(
            "current_timestamp",
            Exactly(0),
            invariant(BasicType::SqlTimestamp),
        );
        registry.register_named("instant", Exactly(0), invariant(BasicType::Instant));
        registry.register_named("local_date", Exactly(0), invariant(BasicType::LocalDate));
        registry.register_named("local_time", Exactly(0), invariant(BasicType::LocalTime));
        registry.register_named(
            "local_datetime",
            Exactly(0),
            invariant(BasicType::LocalDateTime),
        );
        registry.register_named(
            "offset_datetime",
            Exactly(0),
            invariant(BasicType::OffsetDateTime),
        );
        // unit, source
        registry.register_named("extract", Exactly(2), Expected);
        registry.register_named("format", Exactly(2), invariant(BasicType::String));

        // Conversion and null handling
        registry.register_named("cast", Exactly(2), Expected);
        registry.register_named("coalesce", AtLeast(1), FirstArgument);
        registry.register_named("ifnull", Exactly(2), FirstArgument);
        registry.register_named("nullif", Exactly(2), FirstArgument);

        // Aggregates
        for name in ["max", "min", "sum"] {
            registry.register_named(name, Exactly(1), FirstArgument);
        }
        registry.register_named("avg", Exactly(1), invariant(BasicType::Double));
        registry.register_named("count", Exactly(1), invariant(BasicType::Long));
        registry.register_named("every", Exactly(1), invariant(BasicType::Boolean));
        registry.register_named("any", Exactly(1), invariant(BasicType::Boolean));

        registry
    }

    fn register_named(&mut self, name: &str, validator: ArgumentsValidator, return_type: ReturnType) {
        self.register(NamedFunctionDescriptor::new(name, validator, return_type));
    }

    /// Adds or replaces a descriptor.
    pub fn register(&mut self, descriptor: NamedFunctionDescriptor) {
        self.functions
            .insert(descriptor.name.to_ascii_lowercase(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionRegistry for StandardFunctionRegistry {
    fn find_function_descriptor(&self, name: &str) -> Option<&dyn FunctionDescriptor> {
        self.functions
            .get(&name.to_ascii_lowercase())
            .map(|descriptor| descriptor as &dyn FunctionDescriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqm::LiteralValue;
    use pretty_assertions::assert_eq;

    fn int(value: i32) -> Expression {
        Expression::literal(LiteralValue::Integer(value))
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = StandardFunctionRegistry::new();
        assert!(registry.find_function_descriptor("UPPER").is_some());
        assert!(registry.find_function_descriptor("soundex").is_none());
    }

    #[test]
    fn return_types_follow_descriptor() {
        let registry = StandardFunctionRegistry::new();
        let abs = registry.find_function_descriptor("abs").unwrap();
        assert_eq!(
            abs.generate_expression(vec![int(-1)], None).unwrap().ty,
            SemanticType::Basic(BasicType::Integer)
        );

        let coalesce = registry.find_function_descriptor("coalesce").unwrap();
        let ty = coalesce
            .generate_expression(
                vec![Expression::null(), Expression::literal(LiteralValue::Long(1))],
                None,
            )
            .unwrap()
            .ty;
        assert_eq!(ty, SemanticType::Basic(BasicType::Long));

        let cast = registry.find_function_descriptor("cast").unwrap();
        let expected = SemanticType::Basic(BasicType::String);
        assert_eq!(
            cast.generate_expression(vec![int(1), int(2)], Some(&expected))
                .unwrap()
                .ty,
            expected
        );
    }

    #[test]
    fn argument_count_is_validated() {
        let registry = StandardFunctionRegistry::new();
        let err = registry
            .find_function_descriptor("substring")
            .unwrap()
            .generate_expression(vec![int(1)], None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Semantic error: Function substring() requires between 2 and 3 arguments, but 1 arguments given"
        );
    }

    #[test]
    fn aggregates_carry_filter() {
        let registry = StandardFunctionRegistry::new();
        let filter = Predicate::BooleanExpression(Expression::literal(LiteralValue::Boolean(true)));
        let expression = registry
            .find_function_descriptor("count")
            .unwrap()
            .generate_aggregate_expression(vec![int(1)], Some(filter), None)
            .unwrap();
        match expression.kind {
            ExpressionKind::Function(call) => {
                assert!(call.aggregate);
                assert!(call.filter.is_some());
            }
            other => panic!("Expected function, got {:?}", other),
        }
        assert_eq!(expression.ty, SemanticType::Basic(BasicType::Long));
    }

    #[test]
    fn generic_descriptor_returns_object() {
        let generic = NamedFunctionDescriptor::generic("soundex");
        let expression = generic.generate_expression(vec![int(1)], None).unwrap();
        assert_eq!(expression.ty, SemanticType::Basic(BasicType::Object));
    }
}
