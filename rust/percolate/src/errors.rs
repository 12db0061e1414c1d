use std::path::PathBuf;

/// Problems with the shape or size of the data handed to the engine.
///
/// All of these are fatal, the run never starts with partial data.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    ExpectedNonEmptyData {
        context: &'static str,
    },
    FeatureCountMismatch {
        expected: usize,
        other: usize,
        row: usize,
    },
    FeatureNameCountMismatch {
        names: usize,
        features: usize,
    },
    MissingLabel {
        label: &'static str,
    },
    InvalidFoldCount {
        folds: usize,
    },
    FoldsExceedPopulation {
        folds: usize,
        population: usize,
    },
    WeightLengthMismatch {
        expected: usize,
        other: usize,
    },
    NonFiniteFeature {
        row: usize,
        column: usize,
    },
    FoldWeightCountMismatch {
        folds: usize,
        weights: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    OutOfRange {
        field: &'static str,
        value: f64,
        context: &'static str,
    },
    InvalidDefaultDirection {
        direction: i32,
        num_features: usize,
    },
}

#[derive(Debug)]
pub enum ReadError {
    Csv {
        source: csv::Error,
        path: Option<PathBuf>,
    },
    MissingColumn {
        column: &'static str,
    },
    InvalidLabel {
        row: usize,
        value: String,
    },
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
}

#[derive(Debug)]
pub enum WriteError {
    Csv {
        source: csv::Error,
        path: Option<PathBuf>,
    },
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    EmptyProblem,
    DimensionMismatch { expected: usize, other: usize },
    NonFiniteCost { cpos: f64, cneg: f64 },
}

#[derive(Debug)]
pub enum PercolateError {
    Input(InputError),
    Config(ConfigError),
    Read(ReadError),
    Write(WriteError),
    Solver(SolverError),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExpectedNonEmptyData { context } => write!(f, "No data provided ({})", context),
            Self::FeatureCountMismatch {
                expected,
                other,
                row,
            } => write!(
                f,
                "Row {} has {} features, expected {} as in the first row",
                row, other, expected
            ),
            Self::FeatureNameCountMismatch { names, features } => write!(
                f,
                "{} feature names were given for {} features",
                names, features
            ),
            Self::MissingLabel { label } => write!(f, "No {} examples in the input", label),
            Self::InvalidFoldCount { folds } => write!(
                f,
                "Cannot build {} cross validation folds, at least 2 are needed",
                folds
            ),
            Self::FoldsExceedPopulation { folds, population } => write!(
                f,
                "Requested {} folds but only {} examples are available",
                folds, population
            ),
            Self::WeightLengthMismatch { expected, other } => write!(
                f,
                "Weight vector has length {}, expected {} (features + bias)",
                other, expected
            ),
            Self::NonFiniteFeature { row, column } => write!(
                f,
                "Non finite feature value at row {}, column {}",
                row, column
            ),
            Self::FoldWeightCountMismatch { folds, weights } => write!(
                f,
                "{} folds were given with {} weight vectors",
                folds, weights
            ),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange {
                field,
                value,
                context,
            } => write!(f, "Invalid value {} for {}: {}", value, field, context),
            Self::InvalidDefaultDirection {
                direction,
                num_features,
            } => write!(
                f,
                "Default direction {} does not name one of the {} features",
                direction, num_features
            ),
        }
    }
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv { source, path } => match path {
                Some(path) => write!(f, "Error parsing {}: {}", path.display(), source),
                None => write!(f, "Error parsing input: {}", source),
            },
            Self::MissingColumn { column } => write!(f, "Missing required column '{}'", column),
            Self::InvalidLabel { row, value } => write!(
                f,
                "Invalid label '{}' on row {}, expected 1 or -1",
                value, row
            ),
            Self::InvalidNumber { row, column, value } => write!(
                f,
                "Invalid number '{}' in column '{}' on row {}",
                value, column, row
            ),
            Self::Io { source, path } => match path {
                Some(path) => write!(f, "Error reading {}: {}", path.display(), source),
                None => write!(f, "Error reading input: {}", source),
            },
        }
    }
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv { source, path } => match path {
                Some(path) => write!(f, "Error writing {}: {}", path.display(), source),
                None => write!(f, "Error writing output: {}", source),
            },
            Self::Io { source, path } => match path {
                Some(path) => write!(f, "Error writing {}: {}", path.display(), source),
                None => write!(f, "Error writing output: {}", source),
            },
        }
    }
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::fmt::Display for PercolateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input(x) => write!(f, "Input error: {}", x),
            Self::Config(x) => write!(f, "Configuration error: {}", x),
            Self::Read(x) => write!(f, "Read error: {}", x),
            Self::Write(x) => write!(f, "Write error: {}", x),
            Self::Solver(x) => write!(f, "Solver error: {}", x),
        }
    }
}

impl std::error::Error for PercolateError {}

pub type Result<T> = std::result::Result<T, PercolateError>;

impl From<InputError> for PercolateError {
    fn from(x: InputError) -> Self {
        Self::Input(x)
    }
}

impl From<ConfigError> for PercolateError {
    fn from(x: ConfigError) -> Self {
        Self::Config(x)
    }
}

impl From<ReadError> for PercolateError {
    fn from(x: ReadError) -> Self {
        Self::Read(x)
    }
}

impl From<WriteError> for PercolateError {
    fn from(x: WriteError) -> Self {
        Self::Write(x)
    }
}

impl From<SolverError> for PercolateError {
    fn from(x: SolverError) -> Self {
        Self::Solver(x)
    }
}

impl From<csv::Error> for ReadError {
    fn from(x: csv::Error) -> Self {
        Self::Csv {
            source: x,
            path: None,
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}

impl From<csv::Error> for WriteError {
    fn from(x: csv::Error) -> Self {
        Self::Csv {
            source: x,
            path: None,
        }
    }
}

impl From<std::io::Error> for WriteError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}
