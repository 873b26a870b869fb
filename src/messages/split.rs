/// The platform's outbound text length limit, in characters.
pub const TEXT_OUT_LIMIT: usize = 320;

/// Split `text` into chunks that each fit within `limit` characters.
///
/// HTML entities are decoded and the input trimmed once up front. Chunks
/// prefer to break on whitespace: when the chunk's trailing run of
/// non-whitespace characters is shorter than the chunk itself, the chunk
/// shrinks by that run so no word is cut in half. A single run longer
/// than the limit is split mid-word.
///
/// Always returns at least one (possibly empty) chunk.
pub fn split_text_message(text: &str, limit: usize) -> Vec<String> {
    let decoded = html_escape::decode_html_entities(text.trim());
    let chars: Vec<char> = decoded.chars().collect();

    let mut parts = Vec::new();
    let mut start = 0;
    loop {
        let mut take = limit.min(chars.len() - start);
        if chars.len() > start + take {
            let chunk = &chars[start..start + take];
            let trailing = chunk
                .iter()
                .rev()
                .take_while(|c| !c.is_whitespace())
                .count();
            if trailing > 0 && trailing < chunk.len() {
                take -= trailing;
            }
        }
        let chunk: String = chars[start..start + take].iter().collect();
        parts.push(chunk.trim().to_string());

        if chars.len() > start + take {
            start += take;
        } else {
            return parts;
        }
    }
}
