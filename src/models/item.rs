use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Store-assigned identifier of a media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub i64);

impl ItemId {
    /// Reserved id of the synthetic capture item.
    pub const CAPTURE: ItemId = ItemId(-1);
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        mime_from_extension(ext).and_then(Self::from_mime)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }
}

/// Maps a file extension to the MIME type the index records for it.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mkv" => Some("video/x-matroska"),
        "avi" => Some("video/x-msvideo"),
        "mov" => Some("video/quicktime"),
        "3gp" => Some("video/3gpp"),
        _ => None,
    }
}

/// Locator of a media resource. Local files use the `file://` scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri(String);

impl Uri {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(format!("{}{}", FILE_SCHEME, path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The local path behind a `file://` uri.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0
            .strip_prefix(FILE_SCHEME)
            .filter(|rest| !rest.is_empty())
            .map(PathBuf::from)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One media asset as read from the store.
///
/// Immutable once built. Two items are equal when their ids are equal, so a
/// re-read record with refreshed metadata still matches the selected copy.
#[derive(Debug, Clone)]
pub struct Item {
    id: ItemId,
    mime_type: String,
    is_gif: bool,
    is_video: bool,
    duration_ms: u64,
    size_bytes: u64,
    uri: Uri,
}

impl Item {
    pub fn new(
        id: ItemId,
        mime_type: impl Into<String>,
        size_bytes: u64,
        duration_ms: u64,
        uri: Uri,
    ) -> Self {
        let mime_type = mime_type.into();
        let is_gif = mime_type == "image/gif";
        let is_video = mime_type.starts_with("video/");
        Self {
            id,
            mime_type,
            is_gif,
            is_video,
            duration_ms,
            size_bytes,
            uri,
        }
    }

    /// The synthetic item standing for the capture cell.
    pub fn capture() -> Self {
        Self::new(ItemId::CAPTURE, "", 0, 0, Uri::new(""))
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_capture(&self) -> bool {
        self.id == ItemId::CAPTURE
    }

    pub fn is_gif(&self) -> bool {
        self.is_gif
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// `None` for the capture item and for unrecognised MIME types.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime_type)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id() {
        let a = Item::new(ItemId(7), "image/jpeg", 10, 0, Uri::new("file:///a.jpg"));
        let b = Item::new(ItemId(7), "image/png", 99, 0, Uri::new("file:///b.png"));
        let c = Item::new(ItemId(8), "image/jpeg", 10, 0, Uri::new("file:///a.jpg"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_flags_follow_mime() {
        let gif = Item::new(ItemId(1), "image/gif", 0, 0, Uri::new("file:///x.gif"));
        assert!(gif.is_gif());
        assert!(gif.is_image());
        assert_eq!(gif.kind(), Some(MediaKind::Image));

        let video = Item::new(ItemId(2), "video/mp4", 0, 3000, Uri::new("file:///x.mp4"));
        assert!(video.is_video());
        assert!(!video.is_gif());
        assert_eq!(video.kind(), Some(MediaKind::Video));
    }

    #[test]
    fn test_capture_item() {
        let capture = Item::capture();
        assert!(capture.is_capture());
        assert_eq!(capture.kind(), None);
    }

    #[test]
    fn test_uri_path_round_trip() {
        let path = PathBuf::from("/photos/IMG_0001.jpg");
        let uri = Uri::from_path(&path);
        assert_eq!(uri.as_str(), "file:///photos/IMG_0001.jpg");
        assert_eq!(uri.to_file_path(), Some(path));
        assert_eq!(Uri::new("content://media/1").to_file_path(), None);
    }

    #[test]
    fn test_media_kind_from_extension() {
        assert_eq!(MediaKind::from_extension("JPG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("mov"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_extension("txt"), None);
    }
}
