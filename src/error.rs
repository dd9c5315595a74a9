/// Custom Result type for aadd operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the aadd library, encompassing all fatal conditions
/// that can occur while reading indices or annotating alignments.
///
/// Recoverable conditions (an unknown reference or a record without a
/// sufficiently overlapping gene) are never errors; they are only reflected in
/// the [`AnnotationStats`](crate::AnnotationStats) counters.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to the binary index and database layouts
    #[error("Error processing index format: {0}")]
    FormatError(#[from] FormatError),

    /// Errors that occur during random-access reads
    #[error("Error reading file: {0}")]
    ReadError(#[from] ReadError),

    /// Errors in the paths handed to the annotator
    #[error("Usage error: {0}")]
    UsageError(#[from] UsageError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// Errors raised while sniffing or opening a compressed input
    #[error("Error opening compressed input: {0}")]
    CompressionError(#[from] niffler::Error),
}
impl Error {
    /// Checks if the error indicates that the on-disk index must be rebuilt
    ///
    /// # Returns
    ///
    /// * `true` for any [`FormatError`]
    /// * `false` for all other error types
    #[must_use]
    pub fn requires_reindex(&self) -> bool {
        matches!(self, Self::FormatError(_))
    }
}

/// Errors raised while validating the binary index (`.idx`) and database (`.dbx`) files
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The leading magic bytes do not match the expected value
    #[error(
        "Index is too old or incorrect file (wrong magic number). Expected: {} Got: {}. Please recompute index.",
        render_magic(.expected),
        render_magic(.found)
    )]
    InvalidMagicNumber {
        expected: &'static [u8],
        found: Vec<u8>,
    },

    /// A count field was negative
    #[error("Negative {field} ({value}) at byte position {pos}")]
    NegativeCount {
        field: &'static str,
        value: i32,
        pos: u64,
    },

    /// A catalog entry pointed before the start of the database
    #[error("Negative database offset {offset} for reference {id}")]
    NegativeOffset { id: String, offset: i64 },

    /// The strand byte of a gene item was neither 0 nor 1
    #[error("Invalid strand flag {0} at byte position {1}")]
    InvalidStrandFlag(u8, u64),

    /// An interval with start greater than end
    #[error("Invalid interval: start ({start}) is greater than end ({end})")]
    InvalidInterval { start: i32, end: i32 },

    /// A string field was not valid UTF-8
    #[error("Invalid UTF-8 in {field} at byte position {pos}")]
    InvalidString { field: &'static str, pos: u64 },

    /// The file ended in the middle of a structure
    #[error("Unexpected end of file while reading {0}")]
    Truncated(&'static str),
}

/// Errors that can occur while reading through a byte source
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// Attempted to access a byte outside of the source
    #[error("Requested byte index ({requested_index}) is out of range ({limit})")]
    OutOfRange { requested_index: u64, limit: u64 },

    /// The page size is not usable for paging
    #[error("Invalid page bits {0}: expected a value in [1,30]")]
    InvalidPageBits(u32),
}

/// Errors in the input/output configuration of an annotation run
#[derive(thiserror::Error, Debug)]
pub enum UsageError {
    /// The number of outputs does not match the number of inputs
    #[error("Number of output files ({outputs}) doesn't match number of input files ({inputs})")]
    OutputCountMismatch { inputs: usize, outputs: usize },

    /// An input path would be overwritten by its output
    #[error("Input file equals output file: {0}")]
    InputEqualsOutput(String),

    /// The index directory is missing one of its files
    #[error("Missing index file: {0}")]
    MissingIndexFile(String),
}

fn render_magic(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
