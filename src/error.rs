use std::fmt;

#[derive(Debug)]
pub enum PagePressError {
    MissingRoot,
    InvalidConfiguration(String),
    Raster(String),
    Pdf(String),
    Io(std::io::Error),
}

impl fmt::Display for PagePressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagePressError::MissingRoot => {
                write!(f, "root container is not attached to any element")
            }
            PagePressError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            PagePressError::Raster(message) => write!(f, "rasterization failed: {}", message),
            PagePressError::Pdf(message) => write!(f, "pdf write error: {}", message),
            PagePressError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PagePressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PagePressError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PagePressError {
    fn from(value: std::io::Error) -> Self {
        PagePressError::Io(value)
    }
}
