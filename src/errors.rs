use failure::Fail;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{}", _0)]
    IO(::std::io::Error),
    #[fail(display = "{}", _0)]
    Bincode(::bincode::Error),
    #[fail(display = "{}", _0)]
    Json(::serde_json::Error),
    #[fail(display = "Undefined {}.", _0)]
    NotFound(String),
    #[fail(display = "Duplicated {}.", _0)]
    DuplicateKey(String),
    #[fail(
        display = "Access of {} bytes out of data block bounds ({} bytes remaining).",
        requested, remaining
    )]
    OutOfBounds { requested: u64, remaining: u64 },
    #[fail(display = "No loader command registered for loader id {:08X}.", _0)]
    UnresolvedLoader(u32),
    #[fail(display = "Loader failed to load resource {:08X}.", _0)]
    LoadFailed(u32),
    #[fail(display = "{}", _0)]
    Malformed(String),
    #[fail(display = "Data file is not bound to any project directory.")]
    NotBound,
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<::std::io::Error> for Error {
    fn from(err: ::std::io::Error) -> Self {
        Error::IO(err)
    }
}

impl From<::bincode::Error> for Error {
    fn from(err: ::bincode::Error) -> Self {
        Error::Bincode(err)
    }
}

impl From<::serde_json::Error> for Error {
    fn from(err: ::serde_json::Error) -> Self {
        Error::Json(err)
    }
}
