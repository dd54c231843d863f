//! MRL helpers. An MRL is `scheme://[authority]/path`; local files use
//! `file://`. Folder paths are always stored with a trailing slash.

/// Returns the scheme part including the `://` separator, or None when the
/// string isn't an MRL.
pub fn scheme(mrl: &str) -> Option<&str> {
    let pos = mrl.find("://")?;
    Some(&mrl[..pos + 3])
}

pub fn has_scheme(mrl: &str) -> bool {
    scheme(mrl).is_some()
}

/// Everything up to and including the last `/`.
pub fn directory(mrl: &str) -> &str {
    match mrl.rfind('/') {
        Some(pos) => &mrl[..=pos],
        None => "",
    }
}

/// The last path component.
pub fn file_name(mrl: &str) -> &str {
    match mrl.rfind('/') {
        Some(pos) => &mrl[pos + 1..],
        None => mrl,
    }
}

/// The extension of the last component, without the dot. Empty when the
/// name has no extension or ends with a dot.
pub fn extension(mrl: &str) -> &str {
    let name = file_name(mrl);
    match name.rfind('.') {
        Some(pos) => &name[pos + 1..],
        None => "",
    }
}

/// Removes one trailing component, keeping the trailing slash.
pub fn parent_directory(mrl: &str) -> &str {
    let trimmed = mrl.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &mrl[..=pos],
        None => "",
    }
}

/// Strips `prefix` from the beginning of `mrl` along with any leading
/// slashes left over, yielding a relative path.
pub fn remove_path<'a>(mrl: &'a str, prefix: &str) -> &'a str {
    let prefix = prefix.trim_end_matches('/');
    let rest = match mrl.strip_prefix(prefix) {
        Some(rest) => rest,
        None => {
            // Tolerate redundant leading slashes on either side
            let mrl_trimmed = mrl.trim_start_matches('/');
            let prefix_trimmed = prefix.trim_start_matches('/');
            match mrl_trimmed.strip_prefix(prefix_trimmed) {
                Some(rest) => rest,
                None => return mrl,
            }
        }
    };
    rest.trim_start_matches('/')
}

/// Converts a `file://` MRL to a local path, percent-decoding as needed.
pub fn to_local_path(mrl: &str) -> String {
    let path = match mrl.strip_prefix("file://") {
        Some(p) => p,
        None => mrl,
    };
    percent_decode(path)
}

/// Converts a local path to a `file://` MRL, percent-encoding everything
/// outside the unreserved set (slashes excepted).
pub fn from_local_path(path: &str) -> String {
    let mut res = String::with_capacity(path.len() + 7);
    res.push_str("file://");
    for b in path.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_'
            | b'~' | b'/' => res.push(b as char),
            _ => {
                res.push('%');
                res.push_str(&format!("{:02X}", b));
            }
        }
    }
    res
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut res = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                res.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        res.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&res).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!("ext", extension("file.ext"));
        assert_eq!("", extension("file."));
        assert_eq!("ext2", extension("file.ext.ext2"));
        assert_eq!("", extension(""));
        assert_eq!("", extension("file.ext."));
    }

    #[test]
    fn directories() {
        assert_eq!("/a/b/c/", directory("/a/b/c/d.e"));
        assert_eq!("", directory(""));
        assert_eq!("", directory("file.test"));
    }

    #[test]
    fn file_names() {
        assert_eq!("d.e", file_name("/a/b/c/d.e"));
        assert_eq!("noextfile", file_name("/a/b/noextfile"));
        assert_eq!("file.test", file_name("file.test"));
    }

    #[test]
    fn parent_directories() {
        assert_eq!("/a/b/", parent_directory("/a/b/c/"));
        assert_eq!("/a/b/", parent_directory("/a/b/c"));
        assert_eq!("", parent_directory(""));
    }

    #[test]
    fn remove_paths() {
        assert_eq!("bar/", remove_path("f00/bar/", "f00"));
        assert_eq!("bar/", remove_path("/f00/bar/", "/f00"));
        assert_eq!("bar", remove_path("f00/bar", "f00"));
        assert_eq!("bar", remove_path("/f00/bar", "/f00"));
        assert_eq!("bar", remove_path("/f00///bar", "/f00"));
        assert_eq!("bar", remove_path("/f00///bar", "/f00/"));
        assert_eq!("bar", remove_path("bar", ""));
        assert_eq!("", remove_path("bar/", "bar"));
        assert_eq!("", remove_path("/f00/", "/f00/"));
    }

    #[test]
    fn local_paths() {
        assert_eq!("/a/b/c/movie.avi", to_local_path("file:///a/b/c/movie.avi"));
        assert_eq!("/yea /sp ace", to_local_path("file:///yea%20/sp%20ace"));
        assert_eq!(
            "/tést/ßóíú/file",
            to_local_path("file:///t%C3%A9st/%C3%9F%C3%B3%C3%AD%C3%BA/file")
        );
        assert_eq!("/&/#/~", to_local_path("file:///%26/%23/%7E"));
    }

    #[test]
    fn local_path_round_trip() {
        let mrl = from_local_path("/some dir/média.mkv");
        assert_eq!("file:///some%20dir/m%C3%A9dia.mkv", mrl);
        assert_eq!("/some dir/média.mkv", to_local_path(&mrl));
    }

    #[test]
    fn schemes() {
        assert_eq!(Some("file://"), scheme("file:///a/b"));
        assert_eq!(Some("smb://"), scheme("smb://server/share"));
        assert_eq!(None, scheme("/a/b"));
    }
}
