pub const BYTES_PER_KB: usize = 1024;
pub const BYTES_PER_MB: usize = 1_048_576;
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;
pub const PERCENT_100: f64 = 100.0;

// Field column names, in tabular column order
pub const COLUMN_KEY: &str = "key";
pub const COLUMN_SECRET: &str = "secret";
pub const COLUMN_NETWORK_ADDRESS: &str = "network_address";
pub const COLUMN_LOCATOR: &str = "locator";
pub const COLUMN_PHONE: &str = "phone";
pub const COLUMN_OTHER: &str = "other";
pub const COLUMN_DOMAIN_GROUP: &str = "domain_group";

pub const TABULAR_COLUMN_COUNT: usize = 7;
pub const TABULAR_COLUMNS: [&str; TABULAR_COLUMN_COUNT] = [
    COLUMN_KEY,
    COLUMN_SECRET,
    COLUMN_NETWORK_ADDRESS,
    COLUMN_LOCATOR,
    COLUMN_PHONE,
    COLUMN_OTHER,
    COLUMN_DOMAIN_GROUP,
];

pub const OTHER_GROUP: &str = "other";
pub const ATTRIBUTE_SEPARATOR: &str = ", ";
pub const TOKEN_DELIMITERS: &[char] = &[';', ',', '\n', ':', ' ', '\t', '\r'];

// Secret masking
pub const CENSOR_VISIBLE_CHARS: usize = 3;
pub const CENSOR_MASK: &str = "****";

/// A re-labeled token may not start another merge.
pub const MAX_RELABEL_DEPTH: usize = 1;

// Input handling
pub const TEXT_EXTENSION: &str = "txt";
pub const CSV_EXTENSION: &str = "csv";
pub const SPREADSHEET_EXTENSION: &str = "xlsx";
pub const REFERENCE_EXTENSION: &str = "txt";

// Processing defaults
pub const DEFAULT_CHUNK_SIZE_MB: usize = 50;
pub const MIN_CHUNK_SIZE_MB: usize = 1;
pub const MAX_CHUNK_SIZE_MB: usize = 4096;
pub const AUTO_CHUNK_MEMORY_PERCENT: f64 = 5.0;
pub const DEFAULT_IO_BUFFER_SIZE_KB: usize = 64;
pub const MAX_PROCESSING_THREADS: usize = 256;

// Output defaults
pub const DEFAULT_RESULTS_DIRECTORY: &str = "results";
pub const DEFAULT_TABULAR_FILE: &str = "results.csv";
pub const SINK_FILE_EXTENSION: &str = "txt";
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

// Finalize (external sort dedup)
pub const DEFAULT_FINALIZE_CHUNK_SIZE_MB: usize = 64;
pub const FINALIZE_CHUNK_FILE_PREFIX: &str = "finalize_chunk_";
pub const FINALIZE_CHUNK_FILE_EXTENSION: &str = ".txt";
pub const FINALIZE_TEMP_DIR_NAME: &str = "domain_sift_finalize";
pub const MERGE_HEAP_INITIAL_CAPACITY: usize = 64;
pub const OUTPUT_BUFFER_SIZE_KB: usize = 512;

pub const DEFAULT_CONFIG_FILE: &str = "domain_sift.json";
