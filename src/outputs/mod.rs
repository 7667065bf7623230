//! Output files for crawled articles.
//!
//! # Submodules
//!
//! - [`json`]: Reads and atomically writes pretty-printed article arrays
//! - [`processed`]: Turns raw records into the exported plain-text corpus
//!
//! # Output Structure
//!
//! ```text
//! articles_temp.json       # checkpoint, rewritten after every article
//! articles.json            # every record of the run, HTML bodies
//! articles_processed.json  # strict matches only, plain text, re-numbered IDs
//! ```

pub mod json;
pub mod processed;
