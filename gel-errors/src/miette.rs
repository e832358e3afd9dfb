//! Optional [`miette::Diagnostic`] support, enabled by the `miette` feature.
//!
//! This lets an [`Error`] be reported with source-span highlighting when the
//! server attached a query text and a position.

use miette::{Diagnostic, LabeledSpan, SourceCode};

use crate::error::Error;
use crate::fields::QueryText;

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("{:#010x}", self.code())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.hint().map(|h| Box::new(h.into_owned()) as Box<_>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.get_field::<QueryText>().map(|s| s as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let start = self.position_start()?;
        let end = self.position_end().unwrap_or(start);
        let span = LabeledSpan::new(self.details().map(|d| d.into_owned()), start, end - start);
        Some(Box::new(std::iter::once(span)))
    }
}
