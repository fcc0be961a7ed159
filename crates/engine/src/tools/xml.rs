//! Structured text helpers. All tool outputs are structured text
//! (XML-like) so agents can parse them uniformly.
//!
//! CDATA-wrapped content plus path/type/token metadata attributes.

/// Escape `]]>` sequences so CDATA sections round-trip safely.
pub fn escape_cdata(content: &str) -> String {
    content.replace("]]>", "]]]]><![CDATA[>")
}

/// Escape characters unsafe inside an XML attribute value.
pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Wrap a single file's content with path/type/token metadata — mirrors
/// `XMLWrapper.wrap_file`.
pub fn wrap_file(path: &str, file_type: &str, content: &str, tokens: usize) -> String {
    format!(
        "<file path=\"{}\" type=\"{}\" tokens=\"{}\" encoding=\"utf-8\">\n<content><![CDATA[\n{}\n]]></content>\n</file>",
        escape_attr(path),
        escape_attr(file_type),
        tokens,
        escape_cdata(content)
    )
}

/// Wrap a named chunk (class/function/method) within a file.
pub fn wrap_chunk(path: &str, chunk_name: &str, content: &str, base_indent: usize) -> String {
    format!(
        "<chunk path=\"{}\" name=\"{}\" base_indent=\"{}\"><content><![CDATA[\n{}\n]]></content></chunk>",
        escape_attr(path),
        escape_attr(chunk_name),
        base_indent,
        escape_cdata(content)
    )
}

/// `<error><message/><suggestion/></error>`
pub fn wrap_error(message: &str, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!(
            "<error><message>{}</message><suggestion>{}</suggestion></error>",
            escape_attr(message),
            escape_attr(s)
        ),
        None => format!("<error><message>{}</message></error>", escape_attr(message)),
    }
}

/// Add 1-based line numbers as a left-hand gutter, for `include_line_numbers`.
pub fn add_line_numbers(content: &str) -> String {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>5} | {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_cdata_terminator() {
        assert_eq!(escape_cdata("a]]>b"), "a]]]]><![CDATA[>b");
    }

    #[test]
    fn wraps_file_with_metadata() {
        let xml = wrap_file("a.py", "python", "x = 1", 3);
        assert!(xml.contains("path=\"a.py\""));
        assert!(xml.contains("tokens=\"3\""));
        assert!(xml.contains("x = 1"));
    }

    #[test]
    fn wraps_error_with_suggestion() {
        let xml = wrap_error("not found", Some("check the path"));
        assert!(xml.contains("<message>not found</message>"));
        assert!(xml.contains("<suggestion>check the path</suggestion>"));
    }

    #[test]
    fn line_numbers_are_added_per_line() {
        let out = add_line_numbers("a\nb");
        assert!(out.contains("1 | a"));
        assert!(out.contains("2 | b"));
    }
}
