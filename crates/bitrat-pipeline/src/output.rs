//! Output stage: renderers and destinations.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use bitrat_core::{ConfigError, DigestRecord, RunStats};

use crate::error::PipelineError;
use crate::record_set::{Encoding, RecordSet};

/// Default line template: digest, two spaces, path.
pub const DEFAULT_TEMPLATE: &str = "{hash}  {path}";

/// Line template for runs that classify against stored digests.
pub const STATUS_TEMPLATE: &str = "{status} {hash}  {path}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Hash,
    Path,
    Status,
    Size,
}

/// A parsed print template.
///
/// Placeholders are `{hash}`, `{path}`, `{status}` and `{size}`; `{{` and
/// `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    /// Parse a template. Unknown placeholders and unbalanced braces are
    /// configuration errors.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidTemplate {
            template: template.to_string(),
            message: message.to_string(),
        };

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("unmatched '}'")),
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(invalid("unterminated placeholder")),
                        }
                    }
                    let piece = match name.as_str() {
                        "hash" => Piece::Hash,
                        "path" => Piece::Path,
                        "status" => Piece::Status,
                        "size" => Piece::Size,
                        other => {
                            return Err(invalid(format!("unknown placeholder {{{other}}}").as_str()));
                        }
                    };
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(piece);
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self { pieces })
    }

    /// Render one record, without a line terminator.
    pub fn render(&self, record: &DigestRecord) -> String {
        let mut line = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => line.push_str(text),
                Piece::Hash => line.push_str(&record.hex()),
                Piece::Path => {
                    let _ = write!(line, "{}", record.path().display());
                }
                Piece::Status => {
                    if let Some(status) = record.status {
                        let _ = write!(line, "{status}");
                    }
                }
                Piece::Size => {
                    let _ = write!(line, "{}", record.file.size);
                }
            }
        }
        line
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            pieces: vec![
                Piece::Hash,
                Piece::Literal("  ".to_string()),
                Piece::Path,
            ],
        }
    }
}

/// Where rendered output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    /// Standard output.
    #[default]
    Stdout,
    /// A file, created or truncated.
    File(PathBuf),
}

impl Destination {
    /// Parse a destination argument; `-` is standard output.
    pub fn from_arg(arg: &str) -> Self {
        match arg {
            "" | "-" => Self::Stdout,
            path => Self::File(PathBuf::from(path)),
        }
    }

    /// Open for writing.
    pub fn open(&self) -> Result<Box<dyn Write + Send>, ConfigError> {
        match self {
            Self::Stdout => Ok(Box::new(io::stdout())),
            Self::File(path) => {
                let file = File::create(path).map_err(|source| ConfigError::Output {
                    path: path.clone(),
                    source,
                })?;
                Ok(Box::new(file))
            }
        }
    }
}

/// What the output stage produces.
#[derive(Debug, Clone)]
pub enum Output {
    /// One templated line per record.
    Text {
        template: Template,
        destination: Destination,
    },
    /// A single record set written at end of stream.
    Structured {
        encoding: Encoding,
        destination: Destination,
    },
    /// Consume records without rendering.
    Discard,
}

impl Output {
    /// Open the destination and build the renderer. `algorithm` is the
    /// reported name recorded in structured output.
    pub fn into_renderer(self, algorithm: &str) -> Result<Box<dyn Renderer>, ConfigError> {
        Ok(match self {
            Self::Text {
                template,
                destination,
            } => Box::new(TextRenderer::new(template, destination.open()?)),
            Self::Structured {
                encoding,
                destination,
            } => Box::new(StructuredRenderer::new(
                encoding,
                algorithm,
                destination.open()?,
            )),
            Self::Discard => Box::new(Discard),
        })
    }
}

/// Consumes the ordered record stream.
pub trait Renderer: Send {
    /// Handle one record.
    fn render(&mut self, record: &DigestRecord) -> Result<(), PipelineError>;

    /// Flush at end of stream. `stats` is set when statistics are enabled.
    fn finish(self: Box<Self>, stats: Option<&RunStats>) -> Result<(), PipelineError>;
}

/// Line-oriented text renderer.
pub struct TextRenderer<W: Write + Send> {
    template: Template,
    writer: BufWriter<W>,
}

impl<W: Write + Send> TextRenderer<W> {
    /// Create a renderer writing to `writer`.
    pub fn new(template: Template, writer: W) -> Self {
        Self {
            template,
            writer: BufWriter::new(writer),
        }
    }
}

impl<W: Write + Send> Renderer for TextRenderer<W> {
    fn render(&mut self, record: &DigestRecord) -> Result<(), PipelineError> {
        writeln!(self.writer, "{}", self.template.render(record))?;
        Ok(())
    }

    fn finish(mut self: Box<Self>, _stats: Option<&RunStats>) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Accumulates a [`RecordSet`] and writes it once at end of stream.
pub struct StructuredRenderer<W: Write + Send> {
    encoding: Encoding,
    set: RecordSet,
    writer: W,
}

impl<W: Write + Send> StructuredRenderer<W> {
    /// Create a renderer writing to `writer`.
    pub fn new(encoding: Encoding, algorithm: &str, writer: W) -> Self {
        Self {
            encoding,
            set: RecordSet::new(algorithm),
            writer,
        }
    }
}

impl<W: Write + Send> Renderer for StructuredRenderer<W> {
    fn render(&mut self, record: &DigestRecord) -> Result<(), PipelineError> {
        self.set.insert(record);
        Ok(())
    }

    fn finish(mut self: Box<Self>, stats: Option<&RunStats>) -> Result<(), PipelineError> {
        self.set.statistics = stats.cloned();
        let bytes = self.set.encode(self.encoding)?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Renderer that drops every record.
#[derive(Debug, Default)]
pub struct Discard;

impl Renderer for Discard {
    fn render(&mut self, _record: &DigestRecord) -> Result<(), PipelineError> {
        Ok(())
    }

    fn finish(self: Box<Self>, _stats: Option<&RunStats>) -> Result<(), PipelineError> {
        Ok(())
    }
}
