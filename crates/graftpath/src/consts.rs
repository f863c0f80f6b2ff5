/// Namespace of the W3C error codes (xqt-errors). Project specific codes live here too.
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
/// Reserved namespace bound to the `xml` prefix.
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` attributes; never produces an implied binding.
pub const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";
