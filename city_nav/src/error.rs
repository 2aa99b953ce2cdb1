// Error taxonomy for the navigation library.
//
// - `BuildError`: the builder rejected its input geometry or matrix. Fatal to
//   that navigation domain; reported synchronously to the caller.
// - `LoadError`: received navigation data could not be turned into a usable
//   engine. The worker reports it as `WorkerError` and stays uninitialized.
// - `QueryError`: one path query failed; other queries are unaffected.
//
// "No path" is not an error anywhere: searches return `Ok(None)`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("walkable geometry is empty or fully degenerate")]
    EmptyOrDegenerate,
    #[error("walkable geometry must be indexed")]
    NotIndexed,
    #[error("index buffer length {len} is not a multiple of 3")]
    MalformedIndices { len: usize },
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("grid is {width}x{height} but matrix has {rows} rows of up to {cols} columns")]
    InvalidDimensions {
        width: u32,
        height: u32,
        rows: usize,
        cols: usize,
    },
    #[error("grid transform must have a finite positive scale and finite offsets")]
    InvalidTransform,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("navigation data could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("navigation data is malformed: {0}")]
    Malformed(String),
    #[error("navigation data failed the validity check: no group found for probe point")]
    ValidityCheckFailed,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("query endpoint is not a finite position")]
    NonFiniteInput,
    #[error("query is missing its {0} position")]
    MissingEndpoint(&'static str),
    #[error("search failed: {0}")]
    Internal(String),
}
