//! Type descriptors for the Slate language.
//!
//! Types are plain owned values: `Clone` performs a deep copy so that every
//! symbol owns an independent descriptor and mutating or dropping one can
//! never affect another. Temporary types produced during checking are owned
//! by the caller and released when dropped.

/// Native word size of the target (x86-64)
pub const WORD_SIZE: usize = 8;

#[derive(Debug, Clone, Eq)]
pub enum Type {
    /// The absence of a value; only legal as a function return type
    Void,
    /// true, false
    Boolean,
    /// 'a', '\n'
    Character,
    /// Signed machine integer
    Integer,
    /// A pointer to NUL-terminated character data
    String,
    /// `int a[3]` — a fixed number of elements stored contiguously
    Array { element: Box<Type>, length: usize },
    /// A callable with an ordered parameter list and a return type
    Function {
        returns: Box<Type>,
        parameters: Vec<Parameter>,
    },
    /// The type produced when a semantic error already prevented us from
    /// computing a real one. If you find this in an operand, an error has
    /// already been reported and there is no use emitting another.
    Unknown,
}

#[derive(Debug, Clone, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Parameters compare by type only; the declared name is not part of a
/// function type's identity.
impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

/// Structural equality: primitives by tag, arrays by element type, functions
/// by pairwise parameter types and return type.
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Void, Type::Void)
            | (Type::Boolean, Type::Boolean)
            | (Type::Character, Type::Character)
            | (Type::Integer, Type::Integer)
            | (Type::String, Type::String)
            | (Type::Unknown, Type::Unknown) => true,
            // Lengths are storage information, not part of the shape
            (Type::Array { element: a, .. }, Type::Array { element: b, .. }) => a == b,
            (
                Type::Function {
                    returns: r1,
                    parameters: p1,
                },
                Type::Function {
                    returns: r2,
                    parameters: p2,
                },
            ) => r1 == r2 && p1 == p2,
            _ => false,
        }
    }
}

impl Type {
    pub fn array(element: Type, length: usize) -> Self {
        Type::Array {
            element: Box::new(element),
            length,
        }
    }

    pub fn function(returns: Type, parameters: Vec<Parameter>) -> Self {
        Type::Function {
            returns: Box::new(returns),
            parameters,
        }
    }

    /// Storage size of one value of this type in bytes.
    ///
    /// Integers and strings occupy a native word, characters and booleans a
    /// single byte, arrays their element size times their declared length.
    /// `Unknown` sizes as a word so that best-effort resolution after an
    /// error never computes a degenerate frame.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::Boolean | Type::Character => 1,
            Type::Integer | Type::String => WORD_SIZE,
            Type::Array { element, length } => element.size_in_bytes() * length,
            // Functions are code, not data; they occupy no frame storage
            Type::Function { .. } => 0,
            Type::Unknown => WORD_SIZE,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Boolean)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    /// Element type of an array, or `None` for every other shape
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn return_type(&self) -> Option<&Type> {
        match self {
            Type::Function { returns, .. } => Some(returns),
            _ => None,
        }
    }

    pub fn parameters(&self) -> Option<&[Parameter]> {
        match self {
            Type::Function { parameters, .. } => Some(parameters),
            _ => None,
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Boolean => write!(f, "bool"),
            Self::Character => write!(f, "char"),
            Self::Integer => write!(f, "int"),
            Self::String => write!(f, "string"),
            Self::Array { element, length } => write!(f, "{element}[{length}]"),
            Self::Function {
                returns,
                parameters,
            } => {
                write!(f, "function(")?;
                for (i, parameter) in parameters.iter().enumerate() {
                    write!(f, "{}", parameter.ty)?;

                    if i != parameters.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, ") -> {returns}")
            }
            Self::Unknown => write!(f, "{{unknown}}"),
        }
    }
}
