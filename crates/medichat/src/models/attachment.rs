use serde::{Deserialize, Serialize};

/// An inline image carried by a message, stored as base64 so the whole
/// conversation stays serializable as plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    pub data: String,
}

impl Attachment {
    pub fn new<S: Into<String>, T: Into<String>>(mime_type: S, data: T) -> Self {
        Attachment {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parse a browser-style data URI, e.g. `data:image/png;base64,iVBOR...`.
    ///
    /// Clients hand us whatever `FileReader.readAsDataURL` produced, so the
    /// value is validated before splitting: no comma, or an empty media type,
    /// means the attachment is dropped rather than panicking downstream.
    pub fn from_data_uri(value: &str) -> Option<Self> {
        let (meta, payload) = value.split_once(',')?;
        let meta = meta.strip_prefix("data:").unwrap_or(meta);
        let meta = meta.strip_suffix(";base64").unwrap_or(meta);
        if meta.is_empty() {
            return None;
        }
        Some(Attachment::new(meta, payload))
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_uri() {
        let attachment = Attachment::from_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.data, "iVBORw0KGgo=");
    }

    #[test]
    fn parses_uri_without_scheme_prefix() {
        let attachment = Attachment::from_data_uri("image/jpeg;base64,/9j/4AAQ").unwrap();
        assert_eq!(attachment.mime_type, "image/jpeg");
        assert_eq!(attachment.data, "/9j/4AAQ");
    }

    #[test]
    fn rejects_value_without_comma() {
        assert!(Attachment::from_data_uri("data:image/png;base64").is_none());
        assert!(Attachment::from_data_uri("not an image at all").is_none());
    }

    #[test]
    fn rejects_empty_media_type() {
        assert!(Attachment::from_data_uri("data:,payload").is_none());
    }

    #[test]
    fn round_trips_through_data_uri() {
        let attachment = Attachment::new("image/png", "AAAA");
        assert_eq!(
            Attachment::from_data_uri(&attachment.to_data_uri()),
            Some(attachment)
        );
    }
}
