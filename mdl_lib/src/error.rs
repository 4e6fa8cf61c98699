use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadFileError {
    #[error("error reading file")]
    Io(#[from] std::io::Error),

    #[error("error reading data")]
    Binrw(#[from] binrw::Error),
}
