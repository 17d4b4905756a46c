//! Text and JSON rendering for command reports.
//!
//! Every handler builds a report and passes it to [`OutputWriter::render`];
//! the report never decides its own format.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes reports to stdout in the format selected with `--output`.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// # Examples
    ///
    /// ```no_run
    /// use amtlog_cli::cli::OutputFormat;
    /// use amtlog_cli::output::OutputWriter;
    ///
    /// let writer = OutputWriter::new(OutputFormat::Json);
    /// ```
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a report to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload)
    }

    /// Render a report into an arbitrary writer.
    pub fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable rendering, implemented next to `Serialize` on every report.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Counts {
        delivered: u64,
        pending: u64,
    }

    impl Render for Counts {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "delivered={} pending={}", self.delivered, self.pending)
        }
    }

    #[test]
    fn text_format_uses_render_impl() {
        let mut buf = Vec::new();
        OutputWriter::new(OutputFormat::Text)
            .render_to(&mut buf, &Counts { delivered: 3, pending: 1 })
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "delivered=3 pending=1\n");
    }

    #[test]
    fn json_format_is_pretty_and_newline_terminated() {
        let mut buf = Vec::new();
        OutputWriter::new(OutputFormat::Json)
            .render_to(&mut buf, &Counts { delivered: 3, pending: 1 })
            .unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.ends_with("}\n"));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["pending"], 1);
    }
}
