/// Errors writing or reading a pepXML document
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// I/O error on the output or input stream
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// XML error
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// Invalid attribute syntax in an input document
    #[error("XML attribute error: {0}")]
    AttributeError(#[from] quick_xml::events::attributes::AttrError),

    /// Writer used out of order (e.g. a run before the document start)
    #[error("Invalid writer state: {0}")]
    InvalidState(&'static str),

    /// Input document does not have the expected structure
    #[error("Invalid pepXML document: {0}")]
    InvalidDocument(String),
}
