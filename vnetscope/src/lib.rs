// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    SAMPLE_SNAPSHOT, render_report, run_analysis, sample_snapshot, write_default_config,
    write_sample,
};
