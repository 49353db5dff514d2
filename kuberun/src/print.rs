use std::io::Write;

use clap::ValueEnum;

use crate::{generate::GeneratedObject, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `<resource>/<name> created`.
    #[default]
    Name,
    Json,
    Yaml,
}

pub trait Printer {
    fn print(&mut self, object: &GeneratedObject, dry_run: bool) -> Result<()>;
}

pub struct WriterPrinter<W> {
    format: OutputFormat,
    writer: W,
    printed: usize,
}

impl<W: Write> WriterPrinter<W> {
    pub fn new(format: OutputFormat, writer: W) -> Self {
        Self {
            format,
            writer,
            printed: 0,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Printer for WriterPrinter<W> {
    fn print(&mut self, object: &GeneratedObject, dry_run: bool) -> Result<()> {
        match self.format {
            OutputFormat::Name => {
                let suffix = if dry_run { " (dry run)" } else { "" };
                writeln!(self.writer, "{} created{suffix}", object.resource_name())?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.writer, object)?;
                writeln!(self.writer)?;
            }
            OutputFormat::Yaml => {
                if self.printed > 0 {
                    writeln!(self.writer, "---")?;
                }
                serde_yaml::to_writer(&mut self.writer, object)?;
            }
        }
        self.writer.flush()?;
        self.printed += 1;
        Ok(())
    }
}
