//! Error types for mlkit algorithms
//!
//! Validation, allocation and kernel failures are reported as structured
//! [`ErrorDetail`] records collected in an [`ErrorList`]. Checks return a
//! [`Status`] and compose with `?`, which short-circuits at the first failing
//! check. The throwing entry points convert a non-empty list into
//! [`Error::Compute`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of a single validation or compute failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    // Structural
    #[error("Input numeric table is not set")]
    NullInputNumericTable,
    #[error("Result numeric table is not set")]
    NullResultNumericTable,
    #[error("Partial result is not set")]
    NullPartialResult,
    #[error("Input data collection is not set")]
    NullInputDataCollection,
    #[error("Tensor is not set")]
    NullTensor,
    #[error("Model is not set")]
    NullModel,
    #[error("Null parameter is not supported")]
    NullParameterNotSupported,

    // Shape
    #[error("Incorrect number of rows")]
    IncorrectNumberOfRows,
    #[error("Incorrect number of columns")]
    IncorrectNumberOfColumns,
    #[error("Incorrect number of features")]
    IncorrectNumberOfFeatures,
    #[error("Incorrect number of observations")]
    IncorrectNumberOfObservations,
    #[error("Incorrect number of dimensions in tensor")]
    IncorrectNumberOfDimensionsInTensor,
    #[error("Incorrect size of dimension in tensor")]
    IncorrectSizeOfDimensionInTensor,
    #[error("Incorrect number of input numeric tables")]
    IncorrectNumberOfInputNumericTables,

    // Type / layout
    #[error("Incorrect type of numeric table")]
    IncorrectTypeOfNumericTable,
    #[error("Incorrect data type")]
    IncorrectDataType,
    #[error("Attempt to write into a user-allocated buffer")]
    ReadOnlyBuffer,

    // Parameter domain
    #[error("Incorrect parameter")]
    IncorrectParameter,
    #[error("Lower bound is greater than or equal to upper bound")]
    LowerBoundGreaterThanOrEqualToUpperBound,
    #[error("Method is not supported")]
    MethodNotSupported,

    // Allocation
    #[error("Memory allocation failed")]
    MemoryAllocationFailed,

    // Distributed composition
    #[error("Incorrect element in partial result collection")]
    IncorrectElementInPartialResultCollection,
    #[error("Incorrect number of partial clusters")]
    IncorrectNumberOfPartialClusters,
    #[error("Incorrect total number of partial clusters")]
    IncorrectTotalNumberOfPartialClusters,

    // Kernel
    #[error("Input contains NaN or infinite values")]
    NonFiniteValue,
    #[error("Cluster has no assigned observations")]
    EmptyCluster,
    #[error("Computation failed")]
    Computation,

    // Serialization
    #[error("Archive tag does not match the requested type")]
    IncorrectSerializationTag,
}

/// Coarse classification of an [`ErrorKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Structural,
    Shape,
    Layout,
    Parameter,
    Allocation,
    Distributed,
    Kernel,
    Serialization,
}

impl ErrorKind {
    /// The taxonomy bucket this kind belongs to
    pub fn category(&self) -> ErrorCategory {
        use ErrorKind::*;
        match self {
            NullInputNumericTable | NullResultNumericTable | NullPartialResult
            | NullInputDataCollection | NullTensor | NullModel | NullParameterNotSupported => {
                ErrorCategory::Structural
            }
            IncorrectNumberOfRows
            | IncorrectNumberOfColumns
            | IncorrectNumberOfFeatures
            | IncorrectNumberOfObservations
            | IncorrectNumberOfDimensionsInTensor
            | IncorrectSizeOfDimensionInTensor
            | IncorrectNumberOfInputNumericTables => ErrorCategory::Shape,
            IncorrectTypeOfNumericTable | IncorrectDataType | ReadOnlyBuffer => {
                ErrorCategory::Layout
            }
            IncorrectParameter | LowerBoundGreaterThanOrEqualToUpperBound | MethodNotSupported => {
                ErrorCategory::Parameter
            }
            MemoryAllocationFailed => ErrorCategory::Allocation,
            IncorrectElementInPartialResultCollection
            | IncorrectNumberOfPartialClusters
            | IncorrectTotalNumberOfPartialClusters => ErrorCategory::Distributed,
            NonFiniteValue | EmptyCluster | Computation => ErrorCategory::Kernel,
            IncorrectSerializationTag => ErrorCategory::Serialization,
        }
    }
}

/// One structured error record
///
/// Shape errors carry the expected and actual dimension so callers can react
/// without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    /// Name of the offending argument or parameter
    pub argument: Option<String>,
    pub expected: Option<usize>,
    pub actual: Option<usize>,
    /// Position inside a collection or tensor dimension
    pub index: Option<usize>,
    pub message: Option<String>,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            argument: None,
            expected: None,
            actual: None,
            index: None,
            message: None,
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>) -> Self {
        self.argument = Some(name.into());
        self
    }

    pub fn with_dimensions(mut self, expected: usize, actual: usize) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Shortcut for a shape mismatch on a named argument
    pub fn mismatch(kind: ErrorKind, argument: &str, expected: usize, actual: usize) -> Self {
        Self::new(kind)
            .with_argument(argument)
            .with_dimensions(expected, actual)
    }
}

impl From<ErrorKind> for ErrorDetail {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(argument) = &self.argument {
            write!(f, " (argument: {argument})")?;
        }
        if let (Some(expected), Some(actual)) = (self.expected, self.actual) {
            write!(f, " [expected {expected}, got {actual}]")?;
        }
        if let Some(index) = self.index {
            write!(f, " at index {index}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Per-call collection of structured errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorList {
    details: Vec<ErrorDetail>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, detail: impl Into<ErrorDetail>) {
        self.details.push(detail.into());
    }

    /// Append every record of `other`, keeping order
    pub fn append(&mut self, mut other: ErrorList) {
        self.details.append(&mut other.details);
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorDetail> {
        self.details.iter()
    }

    pub fn first(&self) -> Option<&ErrorDetail> {
        self.details.first()
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.details.iter().any(|d| d.kind == kind)
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.details.iter().filter(|d| d.kind == kind).count()
    }

    /// Concatenated human description of every record
    pub fn describe(&self) -> String {
        self.details
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `Ok(())` when empty, otherwise the list itself as the error
    pub fn into_status(self) -> Status {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for ErrorList {}

impl From<ErrorDetail> for ErrorList {
    fn from(detail: ErrorDetail) -> Self {
        Self {
            details: vec![detail],
        }
    }
}

impl From<ErrorKind> for ErrorList {
    fn from(kind: ErrorKind) -> Self {
        ErrorDetail::new(kind).into()
    }
}

impl IntoIterator for ErrorList {
    type Item = ErrorDetail;
    type IntoIter = std::vec::IntoIter<ErrorDetail>;

    fn into_iter(self) -> Self::IntoIter {
        self.details.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a ErrorDetail;
    type IntoIter = std::slice::Iter<'a, ErrorDetail>;

    fn into_iter(self) -> Self::IntoIter {
        self.details.iter()
    }
}

impl FromIterator<ErrorDetail> for ErrorList {
    fn from_iter<I: IntoIterator<Item = ErrorDetail>>(iter: I) -> Self {
        Self {
            details: iter.into_iter().collect(),
        }
    }
}

/// Outcome of a check: `Err` holds at least one record
pub type Status = std::result::Result<(), ErrorList>;

/// Fail with `detail` unless `condition` holds
#[inline]
pub fn ensure(condition: bool, detail: impl Into<ErrorDetail>) -> Status {
    if condition {
        Ok(())
    } else {
        Err(ErrorList::from(detail.into()))
    }
}

/// Core error type for mlkit operations
#[derive(Error, Debug)]
pub enum Error {
    /// Validation, allocation or kernel errors collected during a compute call
    #[error("Compute failed: {0}")]
    Compute(#[from] ErrorList),

    /// Archive encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (for archive files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// The structured records behind a compute failure
    pub fn errors(&self) -> Option<&ErrorList> {
        match self {
            Error::Compute(list) => Some(list),
            _ => None,
        }
    }

    /// Whether this error carries a record of the given kind
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.errors().is_some_and(|list| list.contains(kind))
    }
}

impl From<ErrorDetail> for Error {
    fn from(detail: ErrorDetail) -> Self {
        Error::Compute(detail.into())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::Compute(kind.into())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_display() {
        let detail = ErrorDetail::mismatch(ErrorKind::IncorrectNumberOfRows, "centroids", 5, 4);
        assert_eq!(
            detail.to_string(),
            "Incorrect number of rows (argument: centroids) [expected 5, got 4]"
        );

        let detail = ErrorDetail::new(ErrorKind::IncorrectElementInPartialResultCollection)
            .with_index(3)
            .with_message("unexpected tag");
        assert_eq!(
            detail.to_string(),
            "Incorrect element in partial result collection at index 3: unexpected tag"
        );
    }

    #[test]
    fn test_list_describe_concatenates() {
        let mut list = ErrorList::new();
        list.push(ErrorKind::NullInputNumericTable);
        list.push(ErrorDetail::new(ErrorKind::IncorrectParameter).with_argument("nClusters"));
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.describe(),
            "Input numeric table is not set; Incorrect parameter (argument: nClusters)"
        );
        assert!(list.contains(ErrorKind::IncorrectParameter));
        assert_eq!(list.count(ErrorKind::MemoryAllocationFailed), 0);
    }

    #[test]
    fn test_status_short_circuits() {
        fn checks(rows: usize) -> Status {
            ensure(rows > 0, ErrorKind::IncorrectNumberOfObservations)?;
            ensure(rows < 10, ErrorKind::IncorrectNumberOfRows)?;
            Ok(())
        }

        assert!(checks(5).is_ok());
        let err = checks(0).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.contains(ErrorKind::IncorrectNumberOfObservations));
    }

    #[test]
    fn test_into_status() {
        assert!(ErrorList::new().into_status().is_ok());
        assert!(ErrorList::from(ErrorKind::Computation).into_status().is_err());
    }

    #[test]
    fn test_error_from_list() {
        let err: Error = ErrorList::from(ErrorKind::MemoryAllocationFailed).into();
        assert!(err.has_kind(ErrorKind::MemoryAllocationFailed));
        assert_eq!(err.to_string(), "Compute failed: Memory allocation failed");
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: Error = anyhow::anyhow!("custom error message").into();
        assert!(matches!(err, Error::Other(_)));
        assert!(err.errors().is_none());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ErrorKind::NullInputNumericTable.category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            ErrorKind::IncorrectTotalNumberOfPartialClusters.category(),
            ErrorCategory::Distributed
        );
        assert_eq!(
            ErrorKind::LowerBoundGreaterThanOrEqualToUpperBound.category(),
            ErrorCategory::Parameter
        );
    }
}
