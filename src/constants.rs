//! # Pipeline Constants
//!
//! Stage names owned by the engine, state keys shared between stages and the
//! option keys the core recognizes.

/// Stage names reserved by the executor
pub mod stages {
    pub const START: &str = "start";
    pub const QUERY: &str = "query";
    pub const END: &str = "end";

    /// Sorted, as reported in validation errors
    pub const RESERVED: [&str; 3] = [END, QUERY, START];

    pub fn is_reserved(stage: &str) -> bool {
        RESERVED.contains(&stage)
    }
}

/// Well-known keys in the context state store
pub mod state_keys {
    pub const QUERY: &str = "query";
    pub const RESULT: &str = "result";
    pub const PAGINATION: &str = "pagination";
    pub const PAGINATION_OFFSET: &str = "pagination.offset";
    pub const PAGINATION_LIMIT: &str = "pagination.limit";
    pub const PAGINATION_TOTAL: &str = "pagination.total";
    pub const PAGINATION_FILTERED_TOTAL: &str = "pagination.filteredTotal";
}

/// Execution and config option keys
pub mod option_keys {
    pub const RESULT: &str = "result";
    pub const RESULT_CONTEXT: &str = "context";
    pub const ADAPTER: &str = "adapter";
    pub const ADAPTER_OPTIONS: &str = "adapter_options";
    pub const STRATEGY: &str = "strategy";
    pub const STRATEGY_OPTIONS: &str = "strategy_options";
    pub const BASE_QUERY: &str = "base_query";
    pub const OFFSET: &str = "offset";
    pub const LIMIT: &str = "limit";
    pub const DEFAULT_LIMIT: &str = "default_limit";
    pub const MAX_LIMIT: &str = "max_limit";
    pub const SORT: &str = "sort";
}

/// Pagination defaults used when neither options nor settings say otherwise
pub mod pagination {
    pub const DEFAULT_LIMIT: u64 = 100;
    pub const MAX_LIMIT: u64 = 250;

    pub const INIT_STAGE: &str = "init";
    pub const COUNT_TOTAL_STAGE: &str = "countTotal";
    pub const PAGINATE_STAGE: &str = "paginate";
}
