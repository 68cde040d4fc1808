//! Built-in format handlers for text-based inputs

use crate::{ConvertError, DocumentConverter, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Read a source file as UTF-8 text, dropping a leading byte order mark
async fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConvertError::NotFound(path.to_path_buf()),
        _ => ConvertError::Io(e),
    })?;

    let text = String::from_utf8(bytes).map_err(|_| {
        ConvertError::Failed(format!("{} is not valid UTF-8 text", path.display()))
    })?;

    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Passes plain text and Markdown through unchanged.
pub struct PlainTextConverter;

#[async_trait]
impl DocumentConverter for PlainTextConverter {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn media_types(&self) -> Vec<String> {
        strings(&["text/plain", "text/markdown", "text/x-markdown"])
    }

    fn extensions(&self) -> Vec<String> {
        strings(&["txt", "text", "md", "markdown"])
    }

    async fn convert(&self, path: &Path, _media_type: Option<&str>) -> Result<String> {
        read_text(path).await
    }
}

/// Renders delimited text (CSV, TSV) as a Markdown table.
///
/// The first record becomes the header row. Short rows are padded so every
/// row has as many cells as the widest one.
pub struct CsvConverter {
    name: &'static str,
    delimiter: char,
    media_types: &'static [&'static str],
    extensions: &'static [&'static str],
}

impl CsvConverter {
    pub fn csv() -> Self {
        Self {
            name: "csv",
            delimiter: ',',
            media_types: &["text/csv", "application/csv"],
            extensions: &["csv"],
        }
    }

    pub fn tsv() -> Self {
        Self {
            name: "tsv",
            delimiter: '\t',
            media_types: &["text/tab-separated-values"],
            extensions: &["tsv", "tab"],
        }
    }

    /// Split delimited text into records, honoring RFC 4180 quoting.
    fn parse(&self, text: &str) -> Result<Vec<Vec<String>>> {
        let mut records = Vec::new();
        let mut record = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        field.push('"');
                        chars.next();
                    }
                    '"' => in_quotes = false,
                    _ => field.push(c),
                }
                continue;
            }

            match c {
                '"' if field.is_empty() => in_quotes = true,
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    Self::finish_record(&mut records, std::mem::take(&mut record));
                }
                c if c == self.delimiter => record.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }

        if in_quotes {
            return Err(ConvertError::Failed(
                "unterminated quoted field".to_string(),
            ));
        }

        if !field.is_empty() || !record.is_empty() {
            record.push(field);
            Self::finish_record(&mut records, record);
        }

        Ok(records)
    }

    fn finish_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
        // Blank lines carry no data
        if record.len() == 1 && record[0].is_empty() {
            return;
        }
        records.push(record);
    }

    fn escape_cell(cell: &str) -> String {
        cell.trim()
            .replace('|', "\\|")
            .replace("\r\n", "<br>")
            .replace('\n', "<br>")
    }

    fn render(records: &[Vec<String>]) -> String {
        let width = records.iter().map(Vec::len).max().unwrap_or(0);
        let mut out = String::new();

        for (idx, record) in records.iter().enumerate() {
            let cells: Vec<String> = (0..width)
                .map(|i| record.get(i).map(|c| Self::escape_cell(c)).unwrap_or_default())
                .collect();
            out.push_str("| ");
            out.push_str(&cells.join(" | "));
            out.push_str(" |\n");

            if idx == 0 {
                out.push('|');
                out.push_str(&" --- |".repeat(width));
                out.push('\n');
            }
        }

        out
    }
}

#[async_trait]
impl DocumentConverter for CsvConverter {
    fn name(&self) -> &str {
        self.name
    }

    fn media_types(&self) -> Vec<String> {
        strings(self.media_types)
    }

    fn extensions(&self) -> Vec<String> {
        strings(self.extensions)
    }

    async fn convert(&self, path: &Path, _media_type: Option<&str>) -> Result<String> {
        let text = read_text(path).await?;
        let records = self.parse(&text)?;
        if records.is_empty() {
            return Err(ConvertError::Failed(format!(
                "{} contains no rows",
                path.display()
            )));
        }
        Ok(Self::render(&records))
    }
}

/// Pretty-prints JSON documents inside a fenced code block.
pub struct JsonConverter;

impl JsonConverter {
    /// A backtick fence longer than any backtick run inside `body`
    fn fence_for(body: &str) -> String {
        let longest_run = body
            .split(|c| c != '`')
            .map(str::len)
            .max()
            .unwrap_or(0);
        "`".repeat(longest_run.max(2) + 1)
    }
}

#[async_trait]
impl DocumentConverter for JsonConverter {
    fn name(&self) -> &str {
        "json"
    }

    fn media_types(&self) -> Vec<String> {
        strings(&["application/json", "text/json"])
    }

    fn extensions(&self) -> Vec<String> {
        strings(&["json"])
    }

    async fn convert(&self, path: &Path, _media_type: Option<&str>) -> Result<String> {
        let text = read_text(path).await?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ConvertError::Failed(format!("invalid JSON: {}", e)))?;
        let pretty = serde_json::to_string_pretty(&value)
            .map_err(|e| ConvertError::Failed(format!("invalid JSON: {}", e)))?;
        let fence = Self::fence_for(&pretty);
        Ok(format!("{fence}json\n{pretty}\n{fence}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_plain_text_passthrough() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.txt", "\u{feff}# Title\n\nBody".as_bytes());

        let markdown = PlainTextConverter.convert(&path, None).await.unwrap();
        assert_eq!(markdown, "# Title\n\nBody");
    }

    #[tokio::test]
    async fn test_plain_text_rejects_binary() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.txt", &[0xff, 0xfe, 0x00, 0x9f]);

        let err = PlainTextConverter.convert(&path, None).await.unwrap_err();
        assert!(matches!(err, ConvertError::Failed(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = JsonConverter
            .convert(&dir.path().join("gone.json"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_csv_table() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "people.csv",
            b"name,role\r\n\"Doe, Jane\",\"says \"\"hi\"\"\"\nBob\n\na|b,x\n",
        );

        let markdown = CsvConverter::csv().convert(&path, None).await.unwrap();
        assert_eq!(
            markdown,
            "| name | role |\n\
             | --- | --- |\n\
             | Doe, Jane | says \"hi\" |\n\
             | Bob |  |\n\
             | a\\|b | x |\n"
        );
    }

    #[tokio::test]
    async fn test_tsv_table() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.tsv", b"a\tb\n1\t2");

        let markdown = CsvConverter::tsv().convert(&path, None).await.unwrap();
        assert_eq!(markdown, "| a | b |\n| --- | --- |\n| 1 | 2 |\n");
    }

    #[tokio::test]
    async fn test_csv_errors() {
        let dir = TempDir::new().unwrap();
        let empty = write(&dir, "empty.csv", b"\n\n");
        let broken = write(&dir, "broken.csv", b"a,\"unterminated\n");

        assert!(matches!(
            CsvConverter::csv().convert(&empty, None).await,
            Err(ConvertError::Failed(_))
        ));
        assert!(matches!(
            CsvConverter::csv().convert(&broken, None).await,
            Err(ConvertError::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_json_code_block() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "data.json", br#"{"a":[1,2]}"#);

        let markdown = JsonConverter.convert(&path, None).await.unwrap();
        assert_eq!(
            markdown,
            "```json\n{\n  \"a\": [\n    1,\n    2\n  ]\n}\n```\n"
        );

        let invalid = write(&dir, "bad.json", b"{nope");
        assert!(matches!(
            JsonConverter.convert(&invalid, None).await,
            Err(ConvertError::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_json_fence_outgrows_backticks_in_content() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "snippet.json", br#"{"code":"```rust\nfn main() {}\n````"}"#);

        let markdown = JsonConverter.convert(&path, None).await.unwrap();
        assert!(markdown.starts_with("`````json\n"));
        assert!(markdown.ends_with("\n`````\n"));
        assert_eq!(JsonConverter::fence_for("no ticks"), "```");
        assert_eq!(JsonConverter::fence_for("a ` b `` c"), "```");
        assert_eq!(JsonConverter::fence_for("```"), "````");
    }
}
