use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrequenciaError {
    #[error("calendário de segundas-feiras indisponível ({path}): {reason}")]
    CalendarUnavailable { path: PathBuf, reason: String },

    #[error("arquivo não encontrado: {0}")]
    MissingFile(PathBuf),

    #[error("arquivo corrompido {path}: {source}")]
    CorruptFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("falha ao gravar {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("data inválida: {0:?}")]
    InvalidDate(String),

    #[error("marcação inválida: {0:?}")]
    InvalidMark(String),

    #[error("valor inválido na coluna {column}: {value:?}")]
    InvalidColumn { column: &'static str, value: String },

    #[error("livro inválido: {0}")]
    InvalidBook(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrequenciaError>;
