//! Responsive source selection from a `srcset` string.
//!
//! Candidates are `"url NNNw"` entries separated by commas. An entry without a
//! width descriptor counts as arbitrarily wide. Selection sorts candidates by
//! width (widest first, `.webp` first among equal widths) and walks down until
//! the next candidate would be narrower than the container.

/// Width assigned to candidates without a `w` descriptor.
const UNSIZED_WIDTH: u32 = 999_998;

/// One parsed `srcset` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate {
    pub url: String,
    pub width: u32,
}

impl SrcsetCandidate {
    fn is_webp(&self) -> bool {
        self.url.ends_with(".webp")
    }
}

/// Parse a `srcset` string. Entries with an unreadable width are skipped.
pub fn parse_srcset(srcset: &str) -> Vec<SrcsetCandidate> {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.rsplit_once(char::is_whitespace) {
            None => Some(SrcsetCandidate {
                url: item.to_string(),
                width: UNSIZED_WIDTH,
            }),
            Some((url, descriptor)) => {
                let width = descriptor.trim().strip_suffix('w')?.parse().ok()?;
                Some(SrcsetCandidate {
                    url: url.trim().to_string(),
                    width,
                })
            }
        })
        .collect()
}

/// Pick the best candidate for a container `container_width` pixels wide.
///
/// Returns `None` when the string holds no usable candidate.
pub fn select_from_srcset(srcset: &str, container_width: f64) -> Option<String> {
    let mut candidates = parse_srcset(srcset);
    candidates.sort_by(|a, b| {
        b.width
            .cmp(&a.width)
            .then_with(|| b.is_webp().cmp(&a.is_webp()))
    });

    let mut iter = candidates.iter().peekable();
    while let Some(candidate) = iter.next() {
        match iter.peek() {
            Some(next) if f64::from(next.width) < container_width => {
                return Some(candidate.url.clone())
            }
            Some(_) => continue,
            None => return Some(candidate.url.clone()),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRCSET: &str = "large.jpg 1200w, medium.jpg 800w, small.jpg 320w";

    #[test]
    fn test_parse_srcset() {
        let candidates = parse_srcset("a.png 100w, b.png");
        assert_eq!(
            candidates,
            vec![
                SrcsetCandidate {
                    url: "a.png".to_string(),
                    width: 100
                },
                SrcsetCandidate {
                    url: "b.png".to_string(),
                    width: UNSIZED_WIDTH
                },
            ]
        );
    }

    #[test]
    fn test_select_smallest_covering_candidate() {
        assert_eq!(select_from_srcset(SRCSET, 700.0).as_deref(), Some("medium.jpg"));
        assert_eq!(select_from_srcset(SRCSET, 900.0).as_deref(), Some("large.jpg"));
    }

    #[test]
    fn test_select_falls_through_to_smallest() {
        assert_eq!(select_from_srcset(SRCSET, 100.0).as_deref(), Some("small.jpg"));
    }

    #[test]
    fn test_webp_preferred_on_equal_width() {
        let srcset = "photo.jpg 800w, photo.webp 800w, thumb.jpg 200w";
        assert_eq!(select_from_srcset(srcset, 900.0).as_deref(), Some("photo.webp"));
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        assert_eq!(select_from_srcset("a.png 12x, ,", 100.0), None);
        assert_eq!(select_from_srcset("", 100.0), None);
    }
}
