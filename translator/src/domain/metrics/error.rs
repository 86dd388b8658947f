//! Converter error types

use thiserror::Error;

use crate::domain::filters::FilterError;
use crate::domain::translation::TranslationError;

#[derive(Error, Debug)]
pub enum ConverterError {
    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}
