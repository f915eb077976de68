//! CSV serialization of a headline batch.
//!
//! Output is a header row plus one row per headline, `\n`-terminated. Quoting
//! is left to the `csv` writer: a field is wrapped in quotes only when it
//! contains a delimiter, quote or line break, and embedded quotes are doubled.
//!
//! ```text
//! Categoría,Titular,Enlace
//! Economía,"Banco dice ""no""",https://www.portafolio.co/noticia/1
//! ```

use crate::error::PipelineError;
use crate::models::Headline;
use csv::{Terminator, WriterBuilder};
use tracing::{debug, instrument};

/// Header row of every headline file.
pub const CSV_HEADER: [&str; 3] = ["Categoría", "Titular", "Enlace"];

/// Content type declared when the file is stored.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Serialize `headlines` in order. An empty batch yields the header alone.
#[instrument(level = "debug", skip_all, fields(rows = headlines.len()))]
pub fn headlines_to_csv(headlines: &[Headline]) -> Result<Vec<u8>, PipelineError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for headline in headlines {
        writer.write_record([
            headline.category.as_str(),
            headline.title.as_str(),
            headline.link.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| PipelineError::Io(e.into_error()))?;
    debug!(bytes = bytes.len(), "Serialized headline CSV");
    Ok(bytes)
}
