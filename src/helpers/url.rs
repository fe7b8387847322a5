//! URL helper functions

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Join a base URL and a relative object path, encoding each segment
///
/// # Examples
/// ```ignore
/// join_url("/media/", "posts/3/a b.png") // -> "/media/posts/3/a%20b.png"
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let encoded = path
        .trim_start_matches('/')
        .split('/')
        .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", base, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("/media", "temp/1.png"), "/media/temp/1.png");
        assert_eq!(
            join_url("https://cdn.example.com/blog-images/", "/posts/3/a b.png"),
            "https://cdn.example.com/blog-images/posts/3/a%20b.png"
        );
    }
}
