use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Basic value types known to the query layer.
///
/// The `Sql*` and `Calendar` variants are the legacy temporal types produced by
/// JDBC escape literals; they extract differently from the modern ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicType {
    Boolean,
    Character,
    String,
    Integer,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
    Binary,
    LocalDate,
    LocalTime,
    LocalDateTime,
    OffsetDateTime,
    ZonedDateTime,
    Instant,
    SqlDate,
    SqlTime,
    SqlTimestamp,
    Calendar,
    Duration,
    ZoneOffset,
    Object,
}

impl BasicType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            BasicType::Integer
                | BasicType::Long
                | BasicType::BigInteger
                | BasicType::Float
                | BasicType::Double
                | BasicType::BigDecimal
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            BasicType::LocalDate
                | BasicType::LocalTime
                | BasicType::LocalDateTime
                | BasicType::OffsetDateTime
                | BasicType::ZonedDateTime
                | BasicType::Instant
                | BasicType::SqlDate
                | BasicType::SqlTime
                | BasicType::SqlTimestamp
                | BasicType::Calendar
        )
    }

    /// Legacy JDBC temporal types.
    pub fn is_jdbc_temporal(self) -> bool {
        matches!(
            self,
            BasicType::SqlDate | BasicType::SqlTime | BasicType::SqlTimestamp | BasicType::Calendar
        )
    }

    /// Rank used for numeric promotion, wider types rank higher.
    pub(crate) fn numeric_rank(self) -> Option<u8> {
        match self {
            BasicType::Integer => Some(1),
            BasicType::Long => Some(2),
            BasicType::BigInteger => Some(3),
            BasicType::Float => Some(4),
            BasicType::Double => Some(5),
            BasicType::BigDecimal => Some(6),
            _ => None,
        }
    }

    pub fn java_type_name(self) -> &'static str {
        match self {
            BasicType::Boolean => "java.lang.Boolean",
            BasicType::Character => "java.lang.Character",
            BasicType::String => "java.lang.String",
            BasicType::Integer => "java.lang.Integer",
            BasicType::Long => "java.lang.Long",
            BasicType::BigInteger => "java.math.BigInteger",
            BasicType::Float => "java.lang.Float",
            BasicType::Double => "java.lang.Double",
            BasicType::BigDecimal => "java.math.BigDecimal",
            BasicType::Binary => "byte[]",
            BasicType::LocalDate => "java.time.LocalDate",
            BasicType::LocalTime => "java.time.LocalTime",
            BasicType::LocalDateTime => "java.time.LocalDateTime",
            BasicType::OffsetDateTime => "java.time.OffsetDateTime",
            BasicType::ZonedDateTime => "java.time.ZonedDateTime",
            BasicType::Instant => "java.time.Instant",
            BasicType::SqlDate => "java.sql.Date",
            BasicType::SqlTime => "java.sql.Time",
            BasicType::SqlTimestamp => "java.sql.Timestamp",
            BasicType::Calendar => "java.util.Calendar",
            BasicType::Duration => "java.time.Duration",
            BasicType::ZoneOffset => "java.time.ZoneOffset",
            BasicType::Object => "java.lang.Object",
        }
    }

    pub const ALL: [BasicType; 23] = [
        BasicType::Boolean,
        BasicType::Character,
        BasicType::String,
        BasicType::Integer,
        BasicType::Long,
        BasicType::BigInteger,
        BasicType::Float,
        BasicType::Double,
        BasicType::BigDecimal,
        BasicType::Binary,
        BasicType::LocalDate,
        BasicType::LocalTime,
        BasicType::LocalDateTime,
        BasicType::OffsetDateTime,
        BasicType::ZonedDateTime,
        BasicType::Instant,
        BasicType::SqlDate,
        BasicType::SqlTime,
        BasicType::SqlTimestamp,
        BasicType::Calendar,
        BasicType::Duration,
        BasicType::ZoneOffset,
        BasicType::Object,
    ];
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.java_type_name();
        f.write_str(name.rsplit('.').next().unwrap_or(name))
    }
}

/// The inferred type of an expression or path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Basic(BasicType),
    /// Enum type, by fully qualified class name.
    Enum(Arc<str>),
    /// Entity-valued, by entity name.
    Entity(Arc<str>),
    Embeddable(Arc<str>),
    /// The type of a `TYPE(..)` expression or entity type literal.
    EntityType(Arc<str>),
    /// Plural attribute value, typed by its element.
    Collection(Box<SemanticType>),
    MapEntry {
        key: Box<SemanticType>,
        value: Box<SemanticType>,
    },
    Tuple(Vec<SemanticType>),
    /// Dynamic instantiation targets.
    Class(Arc<str>),
    List,
    Map,
    /// Not known at this stage, e.g. parameters and `null`.
    Unknown,
}

impl SemanticType {
    pub fn basic(&self) -> Option<BasicType> {
        match self {
            SemanticType::Basic(basic) => Some(*basic),
            _ => None,
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, SemanticType::Basic(BasicType::Boolean))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SemanticType::Unknown)
    }

    pub fn is_jdbc_temporal(&self) -> bool {
        self.basic().is_some_and(BasicType::is_jdbc_temporal)
    }
}

impl From<BasicType> for SemanticType {
    fn from(basic: BasicType) -> Self {
        SemanticType::Basic(basic)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Basic(basic) => write!(f, "{basic}"),
            SemanticType::Enum(name) => write!(f, "enum {name}"),
            SemanticType::Entity(name) => write!(f, "{name}"),
            SemanticType::Embeddable(name) => write!(f, "embeddable {name}"),
            SemanticType::EntityType(name) => write!(f, "Class<{name}>"),
            SemanticType::Collection(element) => write!(f, "Collection<{element}>"),
            SemanticType::MapEntry { key, value } => write!(f, "Map.Entry<{key}, {value}>"),
            SemanticType::Tuple(types) => {
                f.write_str("(")?;
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(")")
            }
            SemanticType::Class(name) => write!(f, "{name}"),
            SemanticType::List => f.write_str("java.util.List"),
            SemanticType::Map => f.write_str("java.util.Map"),
            SemanticType::Unknown => f.write_str("?"),
        }
    }
}
