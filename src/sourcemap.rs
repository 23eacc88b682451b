//! Source Map v3 generation (spec §4.9): VLQ segment encoding, the mapping
//! string builder, and the three output forms (JSON object, data URI,
//! referring comment).
//!
//! No teacher analogue emits anything map-like, so this one is grounded
//! directly in the spec's bit-packing contract and styled after the
//! teacher's `py_hash.rs`: a self-contained bit-twiddling module with its
//! unit tests sitting right beside the implementation.

use ahash::AHashMap;

const BASE64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Encodes one signed integer as a VLQ run of base-64 digits (spec's
/// `((|v|<<1) | (v<0 ? 1 : 0))`, split into 5-bit groups from the LSB, with
/// the 6th bit of each digit as the continuation flag).
fn vlq_encode(value: i64, out: &mut String) {
    let mut n = if value < 0 { ((-value) as u64) << 1 | 1 } else { (value as u64) << 1 };
    loop {
        let mut digit = (n & 0b1_1111) as u8;
        n >>= 5;
        if n > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_ALPHABET[digit as usize] as char);
        if n == 0 {
            break;
        }
    }
}

fn base64_digit_value(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes a single VLQ value starting at `bytes[pos]`, returning the value
/// and the number of base-64 digits consumed. Used by tests to round-trip
/// `vlq_encode`.
fn vlq_decode(bytes: &[u8], pos: usize) -> (i64, usize) {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let mut i = pos;
    loop {
        let digit = base64_digit_value(bytes[i]).expect("invalid VLQ digit");
        result |= u64::from(digit & 0b1_1111) << shift;
        i += 1;
        if digit & 0b10_0000 == 0 {
            break;
        }
        shift += 5;
    }
    let negative = result & 1 == 1;
    let magnitude = result >> 1;
    let value = if negative { -(magnitude as i64) } else { magnitude as i64 };
    (value, i - pos)
}

/// Standard padded base-64, used for the data-URI output form (distinct
/// algorithm from VLQ despite sharing an alphabet: this one packs 3 input
/// bytes into 4 output digits rather than variable-length 5-bit groups).
fn base64_encode_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();
        out.push(BASE64_ALPHABET[(b0 >> 2) as usize] as char);
        out.push(BASE64_ALPHABET[(((b0 & 0b11) << 4) | (b1.unwrap_or(0) >> 4)) as usize] as char);
        if let Some(b1) = b1 {
            out.push(BASE64_ALPHABET[(((b1 & 0b1111) << 2) | (b2.unwrap_or(0) >> 6)) as usize] as char);
        } else {
            out.push('=');
        }
        if let Some(b2) = b2 {
            out.push(BASE64_ALPHABET[(b2 & 0b11_1111) as usize] as char);
        } else {
            out.push('=');
        }
    }
    out
}

/// One recorded mapping: a generated position, the source position it maps
/// to, and an optional name (original identifier text).
#[derive(Debug, Clone)]
struct Mapping {
    gen_line: u32,
    gen_col: u32,
    src_line: u32,
    src_col: u32,
    name_idx: Option<u32>,
}

/// Caller-facing knobs for source-map output (spec §6).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SourceMapOptions {
    pub file: String,
    pub source_name: String,
    pub include_source: bool,
    pub cover_lines_without_mappings: bool,
}

/// Accumulates mappings as the printer emits generated text, then builds
/// the final Source Map v3 document.
#[derive(Debug)]
pub struct SourceMapBuilder {
    options: SourceMapOptions,
    source_content: Option<String>,
    mappings: Vec<Mapping>,
    names: Vec<String>,
    name_index: AHashMap<String, u32>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new(options: SourceMapOptions) -> Self {
        Self { options, source_content: None, mappings: Vec::new(), names: Vec::new(), name_index: AHashMap::new() }
    }

    pub fn set_source_content(&mut self, content: &str) {
        self.source_content = Some(content.to_string());
    }

    /// Records one generated-position → source-position mapping. `name`,
    /// when given, is the identifier's original (pre-rename) text.
    pub fn add_mapping(&mut self, gen_line: u32, gen_col: u32, src_line: u32, src_col: u32, name: Option<&str>) {
        let name_idx = name.map(|n| self.intern_name(n));
        self.mappings.push(Mapping { gen_line, gen_col, src_line, src_col, name_idx });
    }

    fn intern_name(&mut self, name: &str) -> u32 {
        if let Some(&idx) = self.name_index.get(name) {
            return idx;
        }
        let idx = u32::try_from(self.names.len()).expect("fewer than u32::MAX names");
        self.names.push(name.to_string());
        self.name_index.insert(name.to_string(), idx);
        idx
    }

    /// Builds the final document. `generated_line_count` is the number of
    /// lines in the generated output, needed so the line-coverage
    /// workaround can fill in lines with no mapping of their own.
    #[must_use]
    pub fn build(mut self, generated_line_count: u32) -> SourceMapV3 {
        self.mappings.sort_by(|a, b| (a.gen_line, a.gen_col).cmp(&(b.gen_line, b.gen_col)));

        let mut by_line: Vec<Vec<Mapping>> = vec![Vec::new(); generated_line_count.max(1) as usize];
        for m in self.mappings {
            if let Some(bucket) = by_line.get_mut(m.gen_line as usize) {
                bucket.push(m);
            }
        }

        if self.options.cover_lines_without_mappings {
            let mut last: Option<(u32, u32)> = None;
            for line in &mut by_line {
                if line.is_empty() {
                    if let Some((src_line, src_col)) = last {
                        line.push(Mapping { gen_line: 0, gen_col: 0, src_line, src_col, name_idx: None });
                    }
                } else if let Some(last_on_line) = line.last() {
                    last = Some((last_on_line.src_line, last_on_line.src_col));
                }
            }
        }

        let mut mappings_str = String::new();
        let mut prev_src_line = 0i64;
        let mut prev_src_col = 0i64;
        let mut prev_name_idx = 0i64;
        let mut had_name_before = false;
        for (i, line) in by_line.iter().enumerate() {
            if i > 0 {
                mappings_str.push(';');
            }
            let mut prev_gen_col = 0i64;
            for (j, m) in line.iter().enumerate() {
                if j > 0 {
                    mappings_str.push(',');
                }
                vlq_encode(i64::from(m.gen_col) - prev_gen_col, &mut mappings_str);
                prev_gen_col = i64::from(m.gen_col);
                vlq_encode(0, &mut mappings_str); // single source, index always 0
                vlq_encode(i64::from(m.src_line) - prev_src_line, &mut mappings_str);
                prev_src_line = i64::from(m.src_line);
                vlq_encode(i64::from(m.src_col) - prev_src_col, &mut mappings_str);
                prev_src_col = i64::from(m.src_col);
                if let Some(idx) = m.name_idx {
                    let idx = i64::from(idx);
                    vlq_encode(idx - if had_name_before { prev_name_idx } else { 0 }, &mut mappings_str);
                    prev_name_idx = idx;
                    had_name_before = true;
                }
            }
        }

        SourceMapV3 {
            version: 3,
            file: self.options.file.clone(),
            sources: vec![self.options.source_name.clone()],
            sources_content: if self.options.include_source { Some(vec![self.source_content.clone()]) } else { None },
            names: self.names,
            mappings: mappings_str,
        }
    }
}

/// A Source Map v3 document, serializable verbatim via `serde_json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceMapV3 {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMapV3 {
    /// Serializes to the plain JSON object form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("SourceMapV3 always serializes")
    }

    /// Serializes to a `data:` URI suitable for embedding directly in
    /// generated code.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        let json = self.to_json();
        format!("data:application/json;charset=utf-8;base64,{}", base64_encode_bytes(json.as_bytes()))
    }

    /// The `//# sourceMappingURL=…` comment form.
    #[must_use]
    pub fn to_comment(&self) -> String {
        format!("//# sourceMappingURL={}", self.to_data_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlq_round_trips_signed_values() {
        for v in [0i64, 1, -1, 15, -15, 16, -16, 1000, -123_456] {
            let mut s = String::new();
            vlq_encode(v, &mut s);
            let (decoded, consumed) = vlq_decode(s.as_bytes(), 0);
            assert_eq!(decoded, v);
            assert_eq!(consumed, s.len());
        }
    }

    #[test]
    fn single_mapping_builds_one_segment() {
        let mut builder = SourceMapBuilder::new(SourceMapOptions { file: "out.wgsl".into(), source_name: "in.wgsl".into(), include_source: false, cover_lines_without_mappings: true });
        builder.add_mapping(0, 0, 0, 0, None);
        let map = builder.build(1);
        assert_eq!(map.mappings, "AAAA");
        assert!(map.sources_content.is_none());
    }

    #[test]
    fn line_without_mapping_is_covered_from_previous() {
        let mut builder = SourceMapBuilder::new(SourceMapOptions { file: String::new(), source_name: "in.wgsl".into(), include_source: false, cover_lines_without_mappings: true });
        builder.add_mapping(0, 0, 5, 2, None);
        let map = builder.build(2);
        let lines: Vec<&str> = map.mappings.split(';').collect();
        assert_eq!(lines.len(), 2);
        assert!(!lines[1].is_empty(), "second line should have a synthesized covering segment");
    }

    #[test]
    fn data_uri_round_trips_through_base64() {
        let builder = SourceMapBuilder::new(SourceMapOptions { file: "a".into(), source_name: "b".into(), include_source: false, cover_lines_without_mappings: false });
        let map = builder.build(1);
        let uri = map.to_data_uri();
        assert!(uri.starts_with("data:application/json;charset=utf-8;base64,"));
        let comment = map.to_comment();
        assert!(comment.starts_with("//# sourceMappingURL=data:"));
    }
}
