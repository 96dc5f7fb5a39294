// IMPORTANT:
// Keep ALL numeric values centralized here (repo rule: no hardcoded numeric values scattered around).

// NOTE: CRATE_VERSION must stay in sync with the `version` field in Cargo.toml.
pub const CRATE_VERSION: &str = "0.1.0";

pub mod logging {
    pub const LOG_FILE_NAME: &str = "header_tools.log";

    pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
    pub const LOG_ROTATE_KEEP_FILES: usize = 5;
}

pub mod model {
    // Prebuilt fastText vectors trained on dataset field headers.
    pub const MODEL_REMOTE_URL: &str =
        "https://gretel-public-website.s3-us-west-2.amazonaws.com/tools/FT_headers.bin.gz";

    pub const MODEL_FILE_NAME: &str = "FT_headers.bin.gz";

    // Every model file must be a gzip-compressed fastText binary.
    pub const MODEL_FILE_SUFFIX: &str = ".bin.gz";

    // Default cache directory, next to the installed executable.
    pub const MODELS_DIR_NAME: &str = "models";

    // Overrides the default cache directory when set and non-empty.
    pub const MODEL_DIR_ENV: &str = "HEADER_TOOLS_MODEL_DIR";

    // In-flight downloads land here before the final rename.
    pub const PARTIAL_SUFFIX: &str = "part";

    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
    pub const DOWNLOAD_CHUNK_BYTES: usize = 64 * 1024;
}

pub mod query {
    pub const DEFAULT_TOPN: usize = 25;
    pub const DEFAULT_SORT_BY: &str = "score";
}

pub mod fasttext {
    pub const MAGIC: i32 = 793_712_314;
    pub const MAX_VERSION: i32 = 12;

    // Version 11 supervised models were saved without subword n-grams.
    pub const LEGACY_VERSION: i32 = 11;
    pub const MODEL_SUPERVISED: i32 = 3;

    pub const ENTRY_WORD: i8 = 0;

    pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
    pub const FNV_PRIME: u32 = 16_777_619;
}
