//! Recovers single documents from a concatenated multi-document dump
//!
//! A bulk dump is many complete XML documents glued together, each with its own
//! `<?xml ...?>` prolog and `<!DOCTYPE ...>` declaration, so the file as a whole
//! is not well-formed. The framer scans the text line by line for the root
//! element of the requested kind and cuts one fragment per document, holding
//! at most one document in memory.
//!
//! Root elements are assumed never to nest. A second opening tag seen before
//! the closing tag is taken as the start of the next document; the unfinished
//! one is dropped and counted. Input that really does nest the root tag is
//! misframed.

use crate::types::PatentType;
use std::io::BufRead;
use thiserror::Error;

/// Errors raised while reading a dump
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("failed to read dump: {0}")]
    Read(#[from] std::io::Error),
}

/// The raw text of one patent document recovered from a dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Position of the fragment among the fragments of this dump (0-based)
    pub index: usize,
    pub text: String,
}

/// Result of framing a whole in-memory dump
#[derive(Debug, Clone, Default)]
pub struct FramedDump {
    pub fragments: Vec<Fragment>,
    /// Opening tags that never saw their closing tag
    pub dropped: usize,
}

/// Frame an in-memory dump
pub fn frame(raw: &str, patent_type: PatentType) -> FramedDump {
    let mut reader = FragmentReader::new(raw.as_bytes(), patent_type);
    // Reading from a byte slice cannot fail
    let fragments = reader.by_ref().filter_map(Result::ok).collect();
    FramedDump {
        fragments,
        dropped: reader.dropped(),
    }
}

/// Streaming framer over any buffered reader
pub struct FragmentReader<R> {
    reader: R,
    scanner: BoundaryScanner,
    line: Vec<u8>,
    next_index: usize,
    exhausted: bool,
}

impl<R: BufRead> FragmentReader<R> {
    pub fn new(reader: R, patent_type: PatentType) -> Self {
        Self {
            reader,
            scanner: BoundaryScanner::new(patent_type.root_tag()),
            line: Vec::with_capacity(4096),
            next_index: 0,
            exhausted: false,
        }
    }

    /// Fragments dropped so far for lack of a closing tag.
    ///
    /// Final once the iterator has returned `None`.
    pub fn dropped(&self) -> usize {
        self.scanner.dropped
    }
}

impl<R: BufRead> Iterator for FragmentReader<R> {
    type Item = Result<Fragment, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(text) = self.scanner.next_fragment() {
                let index = self.next_index;
                self.next_index += 1;
                return Some(Ok(Fragment {
                    index,
                    text: clean_fragment(&text),
                }));
            }

            if self.exhausted {
                return None;
            }

            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    self.exhausted = true;
                    self.scanner.finish();
                }
                Ok(_) => self.scanner.push(&String::from_utf8_lossy(&self.line)),
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Incremental open/close tag matcher over buffered text
struct BoundaryScanner {
    open_tag: String,
    close_tag: String,
    pending: String,
    /// `pending` starts with an opening tag whose close has not been seen
    inside: bool,
    /// Where the next close-tag search resumes within `pending`
    search_from: usize,
    dropped: usize,
}

impl BoundaryScanner {
    fn new(root_tag: &str) -> Self {
        Self {
            open_tag: format!("<{}", root_tag),
            close_tag: format!("</{}>", root_tag),
            pending: String::new(),
            inside: false,
            search_from: 0,
            dropped: 0,
        }
    }

    fn push(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    fn next_fragment(&mut self) -> Option<String> {
        loop {
            if !self.inside {
                match find_open(&self.pending, &self.open_tag, 0) {
                    Some(start) => {
                        self.pending.replace_range(..start, "");
                        self.inside = true;
                        self.search_from = self.open_tag.len();
                    }
                    None => {
                        // Text between documents; keep only a tail that could
                        // hold the start of an opening tag.
                        let keep_from = floor_char_boundary(
                            &self.pending,
                            self.pending.len().saturating_sub(self.open_tag.len()),
                        );
                        self.pending.replace_range(..keep_from, "");
                        return None;
                    }
                }
            }

            let close = self.pending[self.search_from..]
                .find(&self.close_tag)
                .map(|pos| pos + self.search_from);
            let reopen = find_open(&self.pending, &self.open_tag, self.search_from);

            match (close, reopen) {
                (close, Some(next)) if close.map_or(true, |c| next < c) => {
                    self.dropped += 1;
                    self.pending.replace_range(..next, "");
                    self.search_from = self.open_tag.len();
                }
                (Some(close), _) => {
                    let end = close + self.close_tag.len();
                    let fragment = self.pending[..end].to_string();
                    self.pending.replace_range(..end, "");
                    self.inside = false;
                    self.search_from = 0;
                    return Some(fragment);
                }
                _ => {
                    let resume = self
                        .pending
                        .len()
                        .saturating_sub(self.close_tag.len())
                        .max(self.open_tag.len());
                    self.search_from = floor_char_boundary(&self.pending, resume);
                    return None;
                }
            }
        }
    }

    /// End of input: an open document without its closing tag is dropped
    fn finish(&mut self) {
        if self.inside {
            self.dropped += 1;
            self.inside = false;
        }
        self.pending.clear();
        self.search_from = 0;
    }
}

/// Find `tag` (e.g. `<us-patent-grant`) as a complete element name
fn find_open(haystack: &str, tag: &str, from: usize) -> Option<usize> {
    let mut offset = from;
    while let Some(pos) = haystack[offset..].find(tag) {
        let start = offset + pos;
        let after = start + tag.len();
        match haystack[after..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => return Some(start),
            _ => offset = after,
        }
    }
    None
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut index = index;
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Strip prolog and DOCTYPE declarations and collapse runs of newlines
pub fn clean_fragment(text: &str) -> String {
    collapse_newlines(&strip_declarations(text))
}

fn strip_declarations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    loop {
        let prolog = find_prolog(rest);
        let doctype = rest.find("<!DOCTYPE");
        let next = match (prolog, doctype) {
            (Some(p), Some(d)) => Some(p.min(d)),
            (p, d) => p.or(d),
        };

        let Some(start) = next else {
            out.push_str(rest);
            return out;
        };

        out.push_str(&rest[..start]);
        let declaration = &rest[start..];
        let end = if declaration.starts_with("<?xml") {
            declaration.find("?>").map(|e| e + 2)
        } else {
            doctype_end(declaration)
        };

        match end {
            Some(end) => rest = &declaration[end..],
            None => {
                // Unterminated declaration; leave it for the parser to reject
                out.push_str(declaration);
                return out;
            }
        }
    }
}

fn find_prolog(text: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find("<?xml") {
        let start = offset + pos;
        match text[start + 5..].chars().next() {
            Some(c) if c.is_whitespace() || c == '?' => return Some(start),
            _ => offset = start + 5,
        }
    }
    None
}

/// End of a DOCTYPE declaration, skipping over an internal `[...]` subset
fn doctype_end(declaration: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in declaration.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '>' if depth == 0 => return Some(i + 1),
            _ => {}
        }
    }
    None
}

fn collapse_newlines(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let mut out = String::with_capacity(text.len());
    let mut previous_newline = false;
    for c in text.chars() {
        if c == '\n' {
            if previous_newline {
                continue;
            }
            previous_newline = true;
        } else {
            previous_newline = false;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn grant(id: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE us-patent-grant SYSTEM \"us-patent-grant-v45-2014-04-03.dtd\" [ ]>\n\
             <us-patent-grant lang=\"EN\" id=\"us-patent-grant\">\n\
             <doc-number>{}</doc-number>\n\n\n\
             </us-patent-grant>\n",
            id
        )
    }

    #[test]
    fn test_frames_documents_in_source_order() {
        let dump = format!("{}{}{}", grant("1"), grant("2"), grant("3"));
        let framed = frame(&dump, PatentType::Grant);

        assert_eq!(framed.fragments.len(), 3);
        assert_eq!(framed.dropped, 0);
        for (i, fragment) in framed.fragments.iter().enumerate() {
            assert_eq!(fragment.index, i);
            assert!(fragment.text.starts_with("<us-patent-grant"));
            assert!(fragment.text.ends_with("</us-patent-grant>"));
            assert!(fragment.text.contains(&format!("<doc-number>{}</doc-number>", i + 1)));
        }
    }

    #[test]
    fn test_fragments_exclude_declarations_and_blank_runs() {
        let framed = frame(&grant("7"), PatentType::Grant);
        let text = &framed.fragments[0].text;

        assert!(!text.contains("<?xml"));
        assert!(!text.contains("<!DOCTYPE"));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn test_unclosed_fragment_is_dropped_and_counted() {
        let dump = format!(
            "{}<us-patent-grant id=\"us-patent-grant\">\n<doc-number>lost</doc-number>\n{}",
            grant("1"),
            grant("2")
        );
        let framed = frame(&dump, PatentType::Grant);

        assert_eq!(framed.fragments.len(), 2);
        assert_eq!(framed.dropped, 1);
        assert!(framed.fragments[1].text.contains("<doc-number>2</doc-number>"));
        assert!(!framed.fragments.iter().any(|f| f.text.contains("lost")));
    }

    #[test]
    fn test_trailing_unclosed_fragment_is_dropped() {
        let dump = format!("{}<us-patent-grant id=\"x\">\n<abstract>", grant("1"));
        let framed = frame(&dump, PatentType::Grant);

        assert_eq!(framed.fragments.len(), 1);
        assert_eq!(framed.dropped, 1);
    }

    #[test]
    fn test_other_kind_is_ignored() {
        let application = "<us-patent-application id=\"us-patent-application\">\n\
                           </us-patent-application>\n";
        let dump = format!("{}{}", application, grant("1"));

        assert_eq!(frame(&dump, PatentType::Grant).fragments.len(), 1);
        assert_eq!(frame(&dump, PatentType::Application).fragments.len(), 1);
    }

    #[test]
    fn test_tag_prefix_is_not_a_root() {
        let dump = "<us-patent-grant-notice>x</us-patent-grant-notice>\n";
        let framed = frame(dump, PatentType::Grant);
        assert!(framed.fragments.is_empty());
        assert_eq!(framed.dropped, 0);
    }

    #[test]
    fn test_fragment_on_single_line() {
        let dump = "<us-patent-grant id=\"a\"><x/></us-patent-grant><us-patent-grant id=\"b\"></us-patent-grant>";
        let framed = frame(dump, PatentType::Grant);
        assert_eq!(framed.fragments.len(), 2);
        assert!(framed.fragments[1].text.contains("id=\"b\""));
    }

    #[test]
    fn test_small_read_buffer_gives_same_result() {
        let dump = format!("{}{}", grant("1"), grant("2"));
        let reader = BufReader::with_capacity(7, dump.as_bytes());
        let mut fragments = FragmentReader::new(reader, PatentType::Grant);
        let texts: Vec<String> = fragments.by_ref().map(|f| f.unwrap().text).collect();

        let expected: Vec<String> = frame(&dump, PatentType::Grant)
            .fragments
            .into_iter()
            .map(|f| f.text)
            .collect();
        assert_eq!(texts, expected);
        assert_eq!(fragments.dropped(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut dump = b"<us-patent-grant id=\"x\">caf".to_vec();
        dump.push(0xff);
        dump.extend_from_slice(b"</us-patent-grant>\n");

        let mut reader = FragmentReader::new(dump.as_slice(), PatentType::Grant);
        let fragment = reader.next().unwrap().unwrap();
        assert!(fragment.text.contains('\u{fffd}'));
    }

    #[test]
    fn test_doctype_with_internal_subset() {
        let text = "<!DOCTYPE x [ <!ENTITY a \"b\"> ]>\n<root/>";
        assert_eq!(clean_fragment(text), "\n<root/>");
    }

    #[test]
    fn test_stylesheet_instruction_is_kept() {
        let text = "<?xml-stylesheet href=\"a.xsl\"?><root/>";
        assert_eq!(clean_fragment(text), text);
    }
}
