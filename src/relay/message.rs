use std::fmt;

/// Platform-neutral view of one source message, as delivered by the listener.
#[derive(Debug, Clone, Default)]
pub struct SourceMessage {
    pub first_name: Option<String>,
    pub username: Option<String>,
    /// Title of the originating group; absent for one-to-one chats.
    pub chat_title: Option<String>,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Every size variant Telegram offers for a single photo.
    pub photo: Vec<PhotoVariant>,
    pub video: Option<MediaFile>,
    pub document: Option<MediaFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoVariant {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Video,
    Document,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentKind::Photo => write!(f, "photo"),
            AttachmentKind::Video => write!(f, "video"),
            AttachmentKind::Document => write!(f, "document"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub remote_id: String,
    pub suggested_name: String,
}

/// A normalized message ready for relaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_display_name: String,
    pub origin_label: Option<String>,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty()).cloned()
}

impl InboundMessage {
    /// Normalize a source message. Returns `None` when there is nothing to relay.
    pub fn from_source(source: &SourceMessage) -> Option<Self> {
        let text = non_empty(source.text.as_ref()).or_else(|| non_empty(source.caption.as_ref()));
        let attachment = select_attachment(source);

        let message = Self {
            sender_display_name: display_name(source),
            origin_label: non_empty(source.chat_title.as_ref()),
            text,
            attachment,
        };

        message.is_relayable().then_some(message)
    }

    pub fn is_relayable(&self) -> bool {
        self.text.is_some() || self.attachment.is_some()
    }
}

/// First name, then handle, then "Unknown".
fn display_name(source: &SourceMessage) -> String {
    non_empty(source.first_name.as_ref())
        .or_else(|| non_empty(source.username.as_ref()))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Photo beats video beats document.
fn select_attachment(source: &SourceMessage) -> Option<Attachment> {
    if let Some(photo) = largest_photo(&source.photo) {
        return Some(Attachment {
            kind: AttachmentKind::Photo,
            remote_id: photo.file_id.clone(),
            suggested_name: format!("photo_{}.jpg", photo.file_id),
        });
    }

    if let Some(video) = &source.video {
        return Some(Attachment {
            kind: AttachmentKind::Video,
            remote_id: video.file_id.clone(),
            suggested_name: non_empty(video.file_name.as_ref())
                .unwrap_or_else(|| format!("video_{}.mp4", video.file_id)),
        });
    }

    source.document.as_ref().map(|document| Attachment {
        kind: AttachmentKind::Document,
        remote_id: document.file_id.clone(),
        suggested_name: non_empty(document.file_name.as_ref())
            .unwrap_or_else(|| format!("document_{}", document.file_id)),
    })
}

fn largest_photo(variants: &[PhotoVariant]) -> Option<&PhotoVariant> {
    variants
        .iter()
        .max_by_key(|p| (u64::from(p.width) * u64::from(p.height), p.file_size))
}
