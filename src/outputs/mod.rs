//! Output generation for extracted headlines.
//!
//! # Submodules
//!
//! - [`headline_csv`]: serializes a headline batch to CSV bytes
//!
//! # Output Structure
//!
//! One file per newspaper and day, laid out as Hive-style partitions so the
//! catalog crawler can infer `periodico`, `year`, `month` and `day` columns:
//!
//! ```text
//! headlines/final/
//! └── periodico=portafolio/
//!     └── year=2024/
//!         └── month=05/
//!             └── day=01/
//!                 └── headlines.csv
//! ```

pub mod headline_csv;
