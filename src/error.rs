use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Malformed rule: {message}")]
    MalformedRule {
        message: String,
        statement: Option<String>,
    },

    #[error("Load error: {message}")]
    Load { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RulesError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRule {
            message: message.into(),
            statement: None,
        }
    }

    pub fn malformed_in(message: impl Into<String>, statement: impl Into<String>) -> Self {
        Self::MalformedRule {
            message: message.into(),
            statement: Some(statement.into()),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }
}

/// Failures of the path addressing layer.
///
/// A path that matches nothing is not represented here; resolution returns
/// an empty match list instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Malformed path '{path}': {message}")]
    Malformed { path: String, message: String },

    #[error("Path '{path}' matched {} nodes where one was required: {}", .matches.len(), .matches.join(", "))]
    Multiplicity { path: String, matches: Vec<String> },

    #[error("Cannot construct '{path}': {message}")]
    Construct { path: String, message: String },

    #[error("Path '{path}' does not resolve")]
    NotFound { path: String },
}

impl PathError {
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn construct(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construct {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("Type '{type_name}' declares unknown parent '{parent}'")]
    UnknownParent { type_name: String, parent: String },

    #[error("Attribute '{type_name}.{attribute}' has unknown type '{attribute_type}'")]
    UnknownAttributeType {
        type_name: String,
        attribute: String,
        attribute_type: String,
    },

    #[error("Inheritance cycle through '{type_name}'")]
    InheritanceCycle { type_name: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Variable '{name}' is not declared")]
    UndeclaredVariable { name: String },

    #[error("Operator '{operator}' cannot combine {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("Cannot combine {left} rows with {right} rows for '{operator}'")]
    ArityMismatch {
        operator: String,
        left: usize,
        right: usize,
    },

    #[error("Expected a boolean but got {actual}")]
    NotBoolean { actual: String },

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("Unknown value set '{code}'")]
    UnknownValueSet { code: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl EvaluationError {
    pub fn type_mismatch(
        operator: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            operator: operator.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("Function '{name}' expects {min}..={max} arguments, got {actual}")]
    InvalidArity {
        name: String,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Function '{name}' argument {index} must be {expected}, got {actual}")]
    InvalidArgumentType {
        name: String,
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Function '{name}' failed: {message}")]
    EvaluationError { name: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Cannot write {value} to '{path}' of type {expected}")]
    TypeMismatch {
        path: String,
        expected: String,
        value: String,
    },

    #[error("'{path}' does not address a primitive attribute")]
    NotPrimitive { path: String },
}

pub type Result<T> = std::result::Result<T, RulesError>;
