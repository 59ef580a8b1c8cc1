use super::span::Span;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Level {
    Warn,
    Error,
    Bug,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub span: Span,
    pub info: String,
}

/// A rendered compiler message: one primary annotation, plus any number of
/// secondary notes pointing at other spans
#[derive(Clone, PartialEq)]
pub struct Diagnostic {
    pub level: Level,
    pub primary: Annotation,
    pub other: Vec<Annotation>,
}

impl Annotation {
    pub fn new<S: Into<String>>(span: Span, message: S) -> Annotation {
        Annotation {
            span,
            info: message.into(),
        }
    }
}

impl Diagnostic {
    pub fn error<S: Into<String>>(span: Span, message: S) -> Diagnostic {
        Diagnostic {
            level: Level::Error,
            primary: Annotation::new(span, message),
            other: Vec::new(),
        }
    }

    pub fn warn<S: Into<String>>(span: Span, message: S) -> Diagnostic {
        Diagnostic {
            level: Level::Warn,
            primary: Annotation::new(span, message),
            other: Vec::new(),
        }
    }

    pub fn bug<S: Into<String>>(span: Span, message: S) -> Diagnostic {
        Diagnostic {
            level: Level::Bug,
            primary: Annotation::new(span, message),
            other: Vec::new(),
        }
    }

    pub fn message<S: Into<String>>(mut self, span: Span, message: S) -> Diagnostic {
        self.other.push(Annotation::new(span, message));
        self
    }

    /// Render the diagnostic against the source text it refers to. With
    /// `verbosity` of 1 or more the offending source line is echoed below
    /// the message.
    pub fn report(&self, verbosity: u8, src: &str) -> String {
        use std::fmt::Write;
        let mut buf = String::new();
        let _ = write!(
            buf,
            "{:?} at {}: {}",
            self.level, self.primary.span, self.primary.info
        );
        if verbosity > 0 && !self.primary.span.is_dummy() {
            if let Some(line) = src.lines().nth(self.primary.span.start.line as usize) {
                let _ = write!(buf, "\n  | {}", line);
            }
        }
        for note in &self.other {
            let _ = write!(buf, "\n  note at {}: {}", note.span, note.info);
        }
        buf
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:?}: {} at {}",
            self.level, self.primary.info, self.primary.span
        )
    }
}
