use crate::index::media::MediaType;

/// Every container extension the discoverer will pick up, lowercase and
/// sorted so membership is a binary search.
pub const SUPPORTED: &[&str] = &[
    "3gp", "a52", "aac", "ac3", "aiff", "amr", "amv", "aob", "ape", "asf",
    "avi", "divx", "dts", "dv", "flac", "flv", "gxf", "iso", "it", "m1v",
    "m2t", "m2ts", "m2v", "m4a", "m4p", "m4v", "mid", "mka", "mkv", "mlp",
    "mod", "mov", "mp1", "mp2", "mp3", "mp4", "mpc", "mpeg", "mpeg1",
    "mpeg2", "mpeg4", "mpg", "mts", "mxf", "nsv", "nuv", "oga", "ogg",
    "ogm", "ogv", "ogx", "oma", "ps", "rec", "rm", "rmi", "rmvb", "s3m",
    "spx", "tod", "ts", "tta", "vob", "voc", "vqf", "vro", "w64", "wav",
    "webm", "wma", "wmv", "wv", "xa", "xm",
];

const VIDEO: &[&str] = &[
    "3gp", "amv", "asf", "avi", "divx", "dv", "flv", "gxf", "iso", "m1v",
    "m2t", "m2ts", "m2v", "m4v", "mkv", "mov", "mp2", "mp4", "mpeg",
    "mpeg1", "mpeg2", "mpeg4", "mpg", "mts", "mxf", "nsv", "nuv", "ogg",
    "ogm", "ogv", "ogx", "ps", "rec", "rm", "rmvb", "tod", "ts", "vob",
    "vro", "webm", "wmv",
];

const AUDIO: &[&str] = &[
    "a52", "aac", "ac3", "aiff", "amr", "aob", "ape", "dts", "flac", "it",
    "m4a", "m4p", "mid", "mka", "mlp", "mod", "mp1", "mp2", "mp3", "mpc",
    "oga", "ogg", "oma", "rmi", "s3m", "spx", "tta", "voc", "vqf", "w64",
    "wav", "wma", "wv", "xa", "xm",
];

pub fn is_supported(extension: &str) -> bool {
    let ext = extension.to_lowercase();
    SUPPORTED.binary_search(&ext.as_str()).is_ok()
}

/// Best-effort type guess from the extension alone; the parser refines it
/// later. Extensions used by both audio and video containers count as video.
pub fn media_type_for(extension: &str) -> MediaType {
    let ext = extension.to_lowercase();
    if VIDEO.binary_search(&ext.as_str()).is_ok() {
        MediaType::Video
    } else if AUDIO.binary_search(&ext.as_str()).is_ok() {
        MediaType::Audio
    } else {
        MediaType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_are_sorted() {
        for set in [SUPPORTED, VIDEO, AUDIO] {
            for pair in set.windows(2) {
                assert!(pair[0] < pair[1], "{} >= {}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn case_insensitive() {
        assert!(is_supported("avi"));
        assert!(is_supported("AVI"));
        assert!(is_supported("Mp3"));
        assert!(!is_supported("something"));
    }

    #[test]
    fn classification() {
        assert_eq!(media_type_for("mkv"), MediaType::Video);
        assert_eq!(media_type_for("MP3"), MediaType::Audio);
        assert_eq!(media_type_for("txt"), MediaType::Unknown);
        // Shared by both container families, video wins
        assert_eq!(media_type_for("ogg"), MediaType::Video);
    }
}
